//! Editor command batching.
//!
//! Every editor interaction nvgdb performs is an ex-command string. A
//! [`Batch`] accumulates them and renders one composite command joined with
//! `" | "`, Vim's sequential-execution separator, so a whole stop event
//! costs a single remote round trip. Batches perform no validation; a
//! malformed command fails in the editor, not here.

use std::fmt;

/// Highlight group used for the current-execution line.
pub const HL_GROUP: &str = "NvgdbCurrent";

/// A Neovim window handle, as returned by `win_getid()`.
///
/// Window *ids* are stable for the lifetime of a window, unlike window
/// numbers, which shift whenever the user opens or closes a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(pub i64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "win:{}", self.0)
    }
}

/// A Neovim buffer number, as returned by `bufnr('%')`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufNr(pub i64);

impl fmt::Display for BufNr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buf:{}", self.0)
    }
}

/// Namespace id for highlight application, from `nvim_create_namespace()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HlSource(pub i64);

/// An ordered sequence of ex-commands, sent to the editor as one string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    items: Vec<String>,
}

impl Batch {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Append a single command.
    pub fn push(&mut self, cmd: impl Into<String>) -> &mut Self {
        self.items.push(cmd.into());
        self
    }

    /// Splice another batch onto the end of this one.
    ///
    /// Nesting is flattening: a spliced batch renders exactly as if its
    /// commands had been pushed here one by one.
    pub fn append(&mut self, other: Batch) -> &mut Self {
        self.items.extend(other.items);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Render the batch as one `" | "`-joined command string.
    pub fn render(&self) -> String {
        self.items.join(" | ")
    }
}

/// Quote a string as a VimL single-quoted literal.
///
/// Inside single quotes VimL has exactly one escape: `''` for a literal
/// quote. Everything else passes through verbatim.
pub fn viml_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        if ch == '\'' {
            out.push('\'');
        }
        out.push(ch);
    }
    out.push('\'');
    out
}

/// Focus the window with the given id.
pub fn focus_window(win: WindowId) -> String {
    format!("call win_gotoid({})", win.0)
}

/// Load a file into the focused window.
///
/// `fnameescape()` runs editor-side so paths with spaces or wildcards
/// survive; the single-quote literal is escaped here.
pub fn edit_file(path: &str) -> String {
    format!("execute 'edit' fnameescape({})", viml_quote(path))
}

/// Run keys as a `normal!` command. Keys must not contain double quotes.
pub fn normal(keys: &str) -> String {
    format!("execute \"normal! {keys}\"")
}

/// Move to a line and center the view on it.
pub fn center_on_line(line: u32) -> Batch {
    let mut b = Batch::new();
    b.push(line.to_string());
    b.push(normal("z."));
    b.push("redraw!");
    b
}

/// Drop every highlight previously applied through `hl` in the focused
/// window's buffer.
pub fn clear_highlight(hl: HlSource) -> String {
    format!("call nvim_buf_clear_namespace(0, {}, 0, -1)", hl.0)
}

/// Highlight one whole line (1-based) in the focused window's buffer.
pub fn highlight_line(hl: HlSource, line: u32) -> String {
    format!(
        "call nvim_buf_add_highlight(0, {}, '{}', {}, 0, -1)",
        hl.0,
        HL_GROUP,
        line.saturating_sub(1)
    )
}

/// Replace the entire contents of a buffer with the given lines.
pub fn replace_buffer_lines(buf: BufNr, lines: &[String]) -> Batch {
    let mut b = Batch::new();
    b.push(format!("call deletebufline({}, 1, '$')", buf.0));
    let quoted: Vec<String> = lines.iter().map(|l| viml_quote(l)).collect();
    b.push(format!("call setbufline({}, 1, [{}])", buf.0, quoted.join(", ")));
    b
}
