//! Decoding of the interpreter state report.
//!
//! The python helper prints a line-oriented report on the debugger
//! console; this module turns the captured console text back into a
//! [`StateReport`]. The format is versioned so a stale helper from an
//! earlier nvgdb never feeds us lines we misread. Text without a
//! recognized header decodes to "no report", which callers treat as a
//! stop with no langkit context.

use regex::Regex;

/// Report header the helper prints first. The version bumps whenever
/// the line format changes.
pub const HEADER: &str = "!nvgdb-state v1";

/// A position inside a DSL source file, 1-based line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DslPosition {
    pub file: String,
    pub line: u32,
}

/// One decoded state report: where the interpreter currently is, and
/// the rendered state dump for the state window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateReport {
    pub current_expr: Option<DslPosition>,
    pub dump: Vec<String>,
}

/// Decodes captured console text. `None` means no state was reported.
///
/// Lines before the header are tolerated; python warnings and other
/// console chatter routinely precede the helper's output.
pub fn parse(text: &str) -> Option<StateReport> {
    let mut lines = text.lines().map(|l| l.trim_end_matches('\r'));
    lines.find(|l| *l == HEADER)?;

    let mut report = StateReport {
        current_expr: None,
        dump: Vec::new(),
    };
    let mut in_dump = false;
    for line in lines {
        if in_dump {
            if line == "!dump-end" {
                break;
            }
            // A missing terminator keeps the partial dump.
            report.dump.push(line.to_string());
        } else if line == "!dump-begin" {
            in_dump = true;
        } else if let Some(rest) = line.strip_prefix("!current-expr ") {
            report.current_expr = position_of(rest);
        }
    }
    Some(report)
}

/// Splits `FILE:LINE` on the last colon. Paths containing colons stay
/// intact; a missing or non-numeric line yields no position.
fn position_of(rest: &str) -> Option<DslPosition> {
    let re = Regex::new(r"^(.+):([0-9]+)$").ok()?;
    let caps = re.captures(rest)?;
    let line = caps[2].parse().ok()?;
    Some(DslPosition {
        file: caps[1].to_string(),
        line,
    })
}
