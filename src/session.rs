//! Session state and the stop-event handler.
//!
//! One `Session` owns the editor connection, the fixed window layout and
//! the registered extensions. Every debugger stop becomes a single
//! batched editor command: focus the code window, open the stopped-at
//! file if it changed, center and highlight the line, append whatever
//! the extensions contribute, refocus the user's window.
//!
//! Editor and extension failures never propagate to the debugger loop;
//! the debugging session must survive any editor mishap.

use std::path::Path;

use tracing::{debug, warn};

use crate::batch::{
    Batch, HL_GROUP, HlSource, WindowId, center_on_line, clear_highlight, edit_file, focus_window,
    highlight_line,
};
use crate::error::Result;
use crate::gdb::DebuggerLink;
use crate::mi::event::{Frame, StopEvent};
use crate::nvim::editor::EditorApi;

/// What an extension sees while a stop is being handled.
pub struct StopContext<'a> {
    pub editor: &'a mut dyn EditorApi,
    pub link: &'a mut dyn DebuggerLink,
    /// The window the user interacts with; focus must return to it.
    pub main_window: WindowId,
    /// Shared highlight namespace. Marks are per buffer, so extensions
    /// can reuse it in their own windows.
    pub hl: HlSource,
}

/// A display layer invoked on every handled stop.
pub trait Extension {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Contributes commands to the stop batch. Side calls through the
    /// context (window creation, debugger queries) are allowed; the
    /// returned batch is appended before the final refocus.
    fn on_stop(&mut self, ctx: &mut StopContext<'_>, event: &StopEvent) -> Result<Batch>;
}

pub struct Session<E: EditorApi> {
    editor: E,
    main_window: WindowId,
    code_window: WindowId,
    hl: HlSource,
    last_file: Option<String>,
    extensions: Vec<Box<dyn Extension>>,
}

impl<E: EditorApi> Session<E> {
    /// Prepares the editor side: global options, the highlight group, the
    /// code window next to the user's window, the highlight namespace.
    pub fn start(mut editor: E) -> Result<Session<E>> {
        let mut setup = Batch::new();
        setup.push("set noswapfile");
        setup.push("set splitright");
        setup.push("set splitbelow");
        setup.push(format!("highlight {HL_GROUP} ctermbg=202 guibg=#ff5f00"));
        setup.push("set nocursorline");
        editor.run_batch(&setup)?;

        let main_window = editor.current_window()?;
        let code_window = editor.vsplit()?;
        editor.command(&focus_window(main_window))?;
        let hl = editor.highlight_source()?;

        Ok(Session {
            editor,
            main_window,
            code_window,
            hl,
            last_file: None,
            extensions: Vec::new(),
        })
    }

    pub fn register_extension(&mut self, extension: Box<dyn Extension>) {
        self.extensions.push(extension);
    }

    /// Handles one stop end to end. Never fails; a broken editor call is
    /// logged and the event is dropped.
    pub fn handle_stop(&mut self, link: &mut dyn DebuggerLink, event: &StopEvent) {
        let Some(frame) = event.frame.as_ref() else {
            // Target exited, or stopped somewhere without a frame.
            return;
        };

        let mut batch = Batch::new();
        if let Some((path, line)) = frame.position() {
            self.navigate(&mut batch, path, line);
        }

        for ext in &mut self.extensions {
            let mut ctx = StopContext {
                editor: &mut self.editor,
                link,
                main_window: self.main_window,
                hl: self.hl,
            };
            match ext.on_stop(&mut ctx, event) {
                Ok(extra) => {
                    batch.append(extra);
                }
                Err(err) => warn!(extension = ext.name(), %err, "extension failed on stop"),
            }
        }

        batch.push(focus_window(self.main_window));

        debug!(batch = %batch.render(), "stop batch");
        if let Err(err) = self.editor.run_batch(&batch) {
            // The edit may not have run; forget the cached file so the
            // next stop reloads it.
            self.last_file = None;
            warn!(%err, "editor rejected stop batch");
        }
    }

    /// Follows CLI frame and thread switches (`frame`, `up`, `down`,
    /// `thread`). Runs the same path as a stop, querying the debugger
    /// when the notification carried no frame of its own.
    pub fn handle_frame_change(&mut self, link: &mut dyn DebuggerLink, frame: Option<Frame>) {
        let frame = match frame {
            Some(frame) => Some(frame),
            None => match link.query_frame() {
                Ok(frame) => frame,
                Err(err) => {
                    debug!(%err, "frame query failed");
                    None
                }
            },
        };
        let Some(frame) = frame else {
            return;
        };

        let event = StopEvent {
            reason: None,
            frame: Some(frame),
        };
        self.handle_stop(link, &event);
    }

    /// Code-window navigation for one source position. Files that are
    /// not on local disk (remote debugging, generated sources) leave the
    /// window untouched.
    fn navigate(&mut self, batch: &mut Batch, path: &str, line: u32) {
        batch.push(focus_window(self.code_window));

        if !Path::new(path).exists() {
            debug!(path, "stop position not on local disk");
            return;
        }

        if self.last_file.as_deref() != Some(path) {
            batch.push(edit_file(path));
            self.last_file = Some(path.to_string());
        }

        batch.append(center_on_line(line));
        batch.push(clear_highlight(self.hl));
        batch.push(highlight_line(self.hl, line));
    }
}
