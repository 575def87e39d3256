//! Langkit DSL display layer.
//!
//! Langkit compiles a language specification, written in a DSL, into a
//! generated parser. When such generated code is under the debugger,
//! plain source sync can only show the generated sources, which nobody
//! wants to read. If the inferior embeds the langkit runtime, this
//! extension asks its gdb toolkit where execution is in the *DSL*
//! sources and mirrors that position in a second code window, with the
//! toolkit's rendered interpreter state in a third.
//!
//! All toolkit access happens over the debugger console: [`probe`]
//! installs a python helper, [`report`] decodes what it prints.

pub mod probe;
pub mod report;

use tracing::debug;

use crate::batch::{
    Batch, BufNr, WindowId, center_on_line, clear_highlight, edit_file, focus_window,
    highlight_line, normal, replace_buffer_lines,
};
use crate::error::Result;
use crate::mi::event::StopEvent;
use crate::session::{Extension, StopContext};

pub use probe::ToolkitSupport;

/// Extra windows, created on the first stop that finds a langkit
/// context and reused for the rest of the session.
enum Views {
    Unbuilt,
    Built {
        dsl_window: WindowId,
        state_buffer: BufNr,
    },
}

pub struct LangkitExtension {
    support: ToolkitSupport,
    views: Views,
    last_file: Option<String>,
}

impl LangkitExtension {
    pub fn new(support: ToolkitSupport) -> LangkitExtension {
        LangkitExtension {
            support,
            views: Views::Unbuilt,
            last_file: None,
        }
    }

    /// Builds the DSL code window (vertical, next to the user's window)
    /// and the state window (horizontal, below it). The state window
    /// keeps its fresh buffer for the whole session, so its number is
    /// remembered for targeted dump updates. The trailing `normal! i`
    /// re-enters terminal mode, since the user's window normally holds
    /// the terminal gdb runs in.
    fn ensure_views(&mut self, ctx: &mut StopContext<'_>) -> Result<(WindowId, BufNr)> {
        if let Views::Built {
            dsl_window,
            state_buffer,
        } = self.views
        {
            return Ok((dsl_window, state_buffer));
        }

        ctx.editor.command(&focus_window(ctx.main_window))?;
        let dsl_window = ctx.editor.vsplit()?;
        ctx.editor.command(&focus_window(ctx.main_window))?;
        let state_window = ctx.editor.split()?;
        let state_buffer = ctx.editor.current_buffer()?;

        let mut setup = Batch::new();
        setup.push("set filetype=lalstate");
        setup.push(focus_window(ctx.main_window));
        setup.push(normal("i"));
        ctx.editor.run_batch(&setup)?;

        debug!(%dsl_window, %state_window, %state_buffer, "built DSL views");
        self.views = Views::Built {
            dsl_window,
            state_buffer,
        };
        Ok((dsl_window, state_buffer))
    }
}

impl Extension for LangkitExtension {
    fn name(&self) -> &'static str {
        "langkit"
    }

    fn on_stop(&mut self, ctx: &mut StopContext<'_>, _event: &StopEvent) -> Result<Batch> {
        if self.support != ToolkitSupport::Available {
            return Ok(Batch::new());
        }

        let console = ctx.link.console_exec(probe::DUMP_COMMAND)?;
        let Some(state) = report::parse(&console) else {
            // No langkit context at this stop; leave the layout alone.
            return Ok(Batch::new());
        };

        let (dsl_window, state_buffer) = self.ensure_views(ctx)?;

        let mut batch = Batch::new();
        if let Some(pos) = &state.current_expr {
            batch.push(focus_window(dsl_window));
            if self.last_file.as_deref() != Some(pos.file.as_str()) {
                batch.push(edit_file(&pos.file));
                self.last_file = Some(pos.file.clone());
            }
            batch.append(center_on_line(pos.line));
            batch.push(clear_highlight(ctx.hl));
            batch.push(highlight_line(ctx.hl, pos.line));
            batch.push(focus_window(ctx.main_window));
        }
        // A report with no dump keeps the previous interpreter state on
        // screen instead of blanking the window.
        if !state.dump.is_empty() {
            batch.append(replace_buffer_lines(state_buffer, &state.dump));
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::HlSource;
    use crate::error::Error;
    use crate::gdb::DebuggerLink;
    use crate::mi::event::Frame;
    use crate::nvim::editor::EditorApi;

    struct Recording {
        calls: Vec<String>,
        evals: Vec<i64>,
    }

    impl Recording {
        fn new(evals: Vec<i64>) -> Self {
            Self {
                calls: Vec::new(),
                evals,
            }
        }
    }

    impl EditorApi for Recording {
        fn command(&mut self, cmd: &str) -> Result<()> {
            self.calls.push(cmd.to_string());
            Ok(())
        }

        fn eval_int(&mut self, expr: &str) -> Result<i64> {
            self.calls.push(format!("eval {expr}"));
            if self.evals.is_empty() {
                return Err(Error::RpcProtocol("script exhausted".into()));
            }
            Ok(self.evals.remove(0))
        }
    }

    struct ConsoleLink {
        replies: Vec<Result<String>>,
        sent: Vec<String>,
    }

    impl ConsoleLink {
        fn new(replies: Vec<Result<String>>) -> Self {
            Self {
                replies,
                sent: Vec::new(),
            }
        }
    }

    impl DebuggerLink for ConsoleLink {
        fn features(&self) -> &[String] {
            &[]
        }

        fn console_exec(&mut self, command: &str) -> Result<String> {
            self.sent.push(command.to_string());
            if self.replies.is_empty() {
                return Ok(String::new());
            }
            self.replies.remove(0)
        }

        fn query_frame(&mut self) -> Result<Option<Frame>> {
            Ok(None)
        }
    }

    const REPORT: &str = "!nvgdb-state v1\n\
                          !current-expr /dsl/gram.lkt:12\n\
                          !dump-begin\n\
                          Running: gram\n\
                          !dump-end\n";

    fn stop() -> StopEvent {
        StopEvent {
            reason: Some("breakpoint-hit".into()),
            frame: None,
        }
    }

    fn run_stop(
        ext: &mut LangkitExtension,
        editor: &mut Recording,
        link: &mut ConsoleLink,
    ) -> Result<Batch> {
        let mut ctx = StopContext {
            editor,
            link,
            main_window: WindowId(1000),
            hl: HlSource(7),
        };
        ext.on_stop(&mut ctx, &stop())
    }

    #[test]
    fn test_disabled_toolkit_is_inert() {
        for support in [ToolkitSupport::Unavailable, ToolkitSupport::Incompatible] {
            let mut ext = LangkitExtension::new(support);
            let mut editor = Recording::new(vec![]);
            let mut link = ConsoleLink::new(vec![]);
            let batch = run_stop(&mut ext, &mut editor, &mut link).unwrap();
            assert!(batch.is_empty());
            assert!(link.sent.is_empty());
            assert!(editor.calls.is_empty());
        }
    }

    #[test]
    fn test_stop_without_context_is_noop() {
        let mut ext = LangkitExtension::new(ToolkitSupport::Available);
        let mut editor = Recording::new(vec![]);
        let mut link = ConsoleLink::new(vec![Ok(String::new())]);
        let batch = run_stop(&mut ext, &mut editor, &mut link).unwrap();
        assert!(batch.is_empty());
        assert_eq!(link.sent, vec!["python __nvgdb_dump_state()"]);
        assert!(editor.calls.is_empty(), "no windows before the first context");
    }

    // win_getid (dsl), win_getid (state), bufnr (state dump)
    fn recorder() -> Recording {
        Recording::new(vec![1002, 1003, 42])
    }

    #[test]
    fn test_first_state_builds_views_and_navigates() {
        let mut ext = LangkitExtension::new(ToolkitSupport::Available);
        let mut editor = recorder();
        let mut link = ConsoleLink::new(vec![Ok(REPORT.into())]);

        let batch = run_stop(&mut ext, &mut editor, &mut link).unwrap();

        assert_eq!(
            editor.calls,
            vec![
                "call win_gotoid(1000)",
                "vsplit | enew",
                "eval win_getid()",
                "call win_gotoid(1000)",
                "split | enew",
                "eval win_getid()",
                "eval bufnr('%')",
                "set filetype=lalstate | call win_gotoid(1000) | execute \"normal! i\"",
            ]
        );

        let Views::Built {
            dsl_window,
            state_buffer,
        } = ext.views
        else {
            panic!("views not built");
        };
        assert_eq!(dsl_window, WindowId(1002));
        assert_eq!(state_buffer, BufNr(42));

        assert_eq!(
            batch.render(),
            "call win_gotoid(1002) | execute 'edit' fnameescape('/dsl/gram.lkt') | 12 | \
             execute \"normal! z.\" | redraw! | \
             call nvim_buf_clear_namespace(0, 7, 0, -1) | \
             call nvim_buf_add_highlight(0, 7, 'NvgdbCurrent', 11, 0, -1) | \
             call win_gotoid(1000) | \
             call deletebufline(42, 1, '$') | \
             call setbufline(42, 1, ['Running: gram'])"
        );
    }

    #[test]
    fn test_views_are_built_once_and_file_not_reloaded() {
        let mut ext = LangkitExtension::new(ToolkitSupport::Available);
        let mut editor = recorder();
        let mut link = ConsoleLink::new(vec![Ok(REPORT.into()), Ok(REPORT.into())]);

        run_stop(&mut ext, &mut editor, &mut link).unwrap();
        editor.calls.clear();
        let batch = run_stop(&mut ext, &mut editor, &mut link).unwrap();

        assert!(editor.calls.is_empty(), "layout rebuilt: {:?}", editor.calls);
        let rendered = batch.render();
        assert!(!rendered.contains("edit"), "same DSL file reloaded: {rendered}");
        assert!(rendered.contains(" 12 | "));
        assert!(rendered.contains("call setbufline(42, 1, ['Running: gram'])"));
    }

    #[test]
    fn test_state_without_position_only_dumps() {
        let mut ext = LangkitExtension::new(ToolkitSupport::Available);
        let mut editor = recorder();
        let report = "!nvgdb-state v1\n!dump-begin\nidle\n!dump-end\n";
        let mut link = ConsoleLink::new(vec![Ok(report.into())]);

        let batch = run_stop(&mut ext, &mut editor, &mut link).unwrap();
        assert_eq!(
            batch.render(),
            "call deletebufline(42, 1, '$') | call setbufline(42, 1, ['idle'])"
        );
    }

    #[test]
    fn test_context_without_state_builds_views_only() {
        let mut ext = LangkitExtension::new(ToolkitSupport::Available);
        let mut editor = recorder();
        // Header alone: the inferior has a context but execution has not
        // reached interpreted code yet.
        let mut link = ConsoleLink::new(vec![Ok("!nvgdb-state v1\n".into())]);

        let batch = run_stop(&mut ext, &mut editor, &mut link).unwrap();
        assert!(batch.is_empty(), "unexpected commands: {}", batch.render());
        assert!(matches!(ext.views, Views::Built { .. }));
        assert_eq!(editor.calls.len(), 8, "layout not built: {:?}", editor.calls);
    }

    #[test]
    fn test_report_without_dump_keeps_the_state_window() {
        let mut ext = LangkitExtension::new(ToolkitSupport::Available);
        let mut editor = recorder();
        let bare = "!nvgdb-state v1\n!current-expr /dsl/gram.lkt:12\n";
        let mut link = ConsoleLink::new(vec![Ok(REPORT.into()), Ok(bare.into())]);

        run_stop(&mut ext, &mut editor, &mut link).unwrap();
        let batch = run_stop(&mut ext, &mut editor, &mut link).unwrap();

        let rendered = batch.render();
        assert!(rendered.contains(" 12 | "), "position dropped: {rendered}");
        assert!(
            !rendered.contains("deletebufline"),
            "empty report wiped the dump: {rendered}"
        );
    }

    #[test]
    fn test_console_failure_reaches_the_session() {
        let mut ext = LangkitExtension::new(ToolkitSupport::Available);
        let mut editor = Recording::new(vec![]);
        let mut link = ConsoleLink::new(vec![Err(Error::GdbGone)]);
        assert!(run_stop(&mut ext, &mut editor, &mut link).is_err());
    }
}
