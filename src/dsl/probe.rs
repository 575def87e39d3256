//! Langkit toolkit detection.
//!
//! Runs once at startup, before the event loop. The outcome never
//! changes afterwards: a debugger does not grow python support mid
//! session, and a langkit that failed to import will keep failing.

use tracing::{info, warn};

use crate::gdb::DebuggerLink;

/// Console command the extension runs on every stop to fetch the state
/// report. The function it calls is installed by [`ToolkitSupport::probe`].
pub const DUMP_COMMAND: &str = "python __nvgdb_dump_state()";

/// Python half of the state report. Prints nothing when the inferior
/// has no langkit context at all. With a context the versioned header
/// always goes out, and the position and dump sections follow only when
/// there is interpreter state to show.
const HELPER_SOURCE: &str = "\
def __nvgdb_dump_state():
    from langkit.gdb import get_current_gdb_context
    from langkit.gdb.commands import StatePrinter
    ctx = get_current_gdb_context()
    if not ctx:
        return
    print('!nvgdb-state v1')
    state = ctx.decode_state()
    if not state:
        return
    scope = state.scopes and state.scopes[-1]
    if scope:
        _, expr = scope.sorted_expressions()
        if expr and expr.dsl_sloc:
            sloc = expr.dsl_sloc
            print('!current-expr {}:{}'.format(sloc.filename, sloc.line_no))
    rendered = StatePrinter(ctx, with_locs=True, with_ellipsis=False).render()
    if rendered:
        print('!dump-begin')
        print(rendered)
        print('!dump-end')
";

/// What the probe found out about the inferior's langkit toolkit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolkitSupport {
    /// Toolkit present and the dump helper is installed.
    Available,
    /// No python, or no langkit in the inferior's python path.
    Unavailable,
    /// Langkit is importable but does not expose the context accessor
    /// this build was written against.
    Incompatible,
}

impl ToolkitSupport {
    /// Checks the debugger for a usable langkit toolkit and installs
    /// the state dump helper when it finds one.
    pub fn probe(link: &mut dyn DebuggerLink) -> ToolkitSupport {
        if !link.features().iter().any(|f| f == "python") {
            info!("debugger built without python, DSL views stay off");
            return ToolkitSupport::Unavailable;
        }
        if link.console_exec("python import langkit.gdb").is_err() {
            info!("langkit is not importable, DSL views stay off");
            return ToolkitSupport::Unavailable;
        }
        if let Err(err) =
            link.console_exec("python from langkit.gdb import get_current_gdb_context")
        {
            warn!(%err, "langkit found but of another vintage, DSL views stay off");
            return ToolkitSupport::Incompatible;
        }
        if let Err(err) = link.console_exec(&exec_line(HELPER_SOURCE)) {
            warn!(%err, "state dump helper rejected, DSL views stay off");
            return ToolkitSupport::Incompatible;
        }
        ToolkitSupport::Available
    }
}

/// Wraps multi-line python source into a single console command. The
/// console line must stay one line, so the newlines travel as `\n`
/// escapes inside the `exec()` string literal.
fn exec_line(source: &str) -> String {
    let mut code = String::with_capacity(source.len() + 16);
    for ch in source.chars() {
        match ch {
            '\\' => code.push_str("\\\\"),
            '"' => code.push_str("\\\""),
            '\n' => code.push_str("\\n"),
            _ => code.push(ch),
        }
    }
    format!("python exec(\"{code}\")")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::report;
    use crate::error::{Error, Result};
    use crate::mi::event::Frame;

    struct FakeLink {
        features: Vec<String>,
        replies: Vec<Result<String>>,
        sent: Vec<String>,
    }

    impl FakeLink {
        fn new(features: &[&str], replies: Vec<Result<String>>) -> Self {
            Self {
                features: features.iter().map(|f| f.to_string()).collect(),
                replies,
                sent: Vec::new(),
            }
        }
    }

    impl DebuggerLink for FakeLink {
        fn features(&self) -> &[String] {
            &self.features
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

    fn refused() -> Result<String> {
        Err(Error::GdbCommand("Undefined command".into()))
    }

    #[test]
    fn test_no_python_is_unavailable() {
        let mut link = FakeLink::new(&["thread-info"], vec![]);
        assert_eq!(ToolkitSupport::probe(&mut link), ToolkitSupport::Unavailable);
        assert!(link.sent.is_empty(), "probed a pythonless debugger");
    }

    #[test]
    fn test_missing_langkit_is_unavailable() {
        let mut link = FakeLink::new(&["python"], vec![refused()]);
        assert_eq!(ToolkitSupport::probe(&mut link), ToolkitSupport::Unavailable);
        assert_eq!(link.sent, vec!["python import langkit.gdb"]);
    }

    #[test]
    fn test_wrong_vintage_is_incompatible() {
        let mut link = FakeLink::new(&["python"], vec![Ok(String::new()), refused()]);
        assert_eq!(
            ToolkitSupport::probe(&mut link),
            ToolkitSupport::Incompatible
        );
        assert_eq!(
            link.sent[1],
            "python from langkit.gdb import get_current_gdb_context"
        );
    }

    #[test]
    fn test_rejected_helper_is_incompatible() {
        let mut link = FakeLink::new(
            &["python"],
            vec![Ok(String::new()), Ok(String::new()), refused()],
        );
        assert_eq!(
            ToolkitSupport::probe(&mut link),
            ToolkitSupport::Incompatible
        );
        assert_eq!(link.sent.len(), 3);
    }

    #[test]
    fn test_working_toolkit_installs_helper() {
        let mut link = FakeLink::new(&["python", "thread-info"], vec![]);
        assert_eq!(ToolkitSupport::probe(&mut link), ToolkitSupport::Available);
        assert_eq!(link.sent.len(), 3);

        let install = &link.sent[2];
        assert!(install.starts_with("python exec(\"def __nvgdb_dump_state():"));
        assert!(install.ends_with("\")"));
        assert!(!install.contains('\n'), "install command spans lines");
    }

    #[test]
    fn test_helper_prints_the_versioned_header() {
        assert!(HELPER_SOURCE.contains(report::HEADER));
        assert!(HELPER_SOURCE.contains("!dump-begin"));
        assert!(HELPER_SOURCE.contains("!dump-end"));
        assert!(HELPER_SOURCE.contains("!current-expr"));
    }

    #[test]
    fn test_exec_line_escapes() {
        assert_eq!(
            exec_line("print('x')\n"),
            r#"python exec("print('x')\n")"#
        );
        assert_eq!(exec_line(r#"a"b"#), r#"python exec("a\"b")"#);
        assert_eq!(exec_line(r"a\b"), r#"python exec("a\\b")"#);
    }
}
