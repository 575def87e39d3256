//! Source positions and stop events extracted from MI records.

use crate::mi::output::{AsyncRecord, ResultRecord, Value, lookup};

/// Source position of a stack frame, from a `frame={...}` tuple.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    pub func: Option<String>,
    pub file: Option<String>,
    pub fullname: Option<String>,
    pub line: Option<u32>,
}

impl Frame {
    /// Extracts the `frame` tuple from a record's results, if present.
    pub fn from_results(results: &[(String, Value)]) -> Option<Frame> {
        match lookup(results, "frame") {
            Some(Value::Tuple(pairs)) => Some(Frame::from_pairs(pairs)),
            _ => None,
        }
    }

    fn from_pairs(pairs: &[(String, Value)]) -> Frame {
        let text = |name: &str| {
            lookup(pairs, name)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        Frame {
            func: text("func"),
            file: text("file"),
            fullname: text("fullname"),
            line: lookup(pairs, "line")
                .and_then(Value::as_str)
                .and_then(|s| s.parse().ok()),
        }
    }

    /// Source path plus 1-based line, `fullname` preferred over `file`.
    /// `None` when the frame has no source information (no debug info,
    /// or stopped in a stripped library).
    pub fn position(&self) -> Option<(&str, u32)> {
        let path = self.fullname.as_deref().or(self.file.as_deref())?;
        Some((path, self.line?))
    }
}

/// A `*stopped` record reduced to what the stop handler consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct StopEvent {
    /// E.g. `breakpoint-hit`, `end-stepping-range`, `exited-normally`.
    pub reason: Option<String>,
    /// Absent when the target exited or stopped without a selectable frame.
    pub frame: Option<Frame>,
}

impl StopEvent {
    pub fn from_record(record: &AsyncRecord) -> StopEvent {
        StopEvent {
            reason: lookup(&record.results, "reason")
                .and_then(Value::as_str)
                .map(str::to_string),
            frame: Frame::from_results(&record.results),
        }
    }
}

/// Feature names from a `^done,features=[...]` reply to `-list-features`.
pub fn features(reply: &ResultRecord) -> Vec<String> {
    match lookup(&reply.results, "features") {
        Some(Value::List(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mi::output::Record;

    fn exec_async(line: &str) -> AsyncRecord {
        match Record::parse(line) {
            Ok(Record::ExecAsync(rec)) => rec,
            other => panic!("expected exec-async record, got {other:?}"),
        }
    }

    #[test]
    fn test_stop_event_with_frame() {
        let rec = exec_async(
            "*stopped,reason=\"breakpoint-hit\",frame={addr=\"0x401090\",\
             func=\"main\",args=[],file=\"main.c\",\
             fullname=\"/home/user/main.c\",line=\"5\"},thread-id=\"1\"",
        );
        let event = StopEvent::from_record(&rec);

        assert_eq!(event.reason.as_deref(), Some("breakpoint-hit"));
        let frame = event.frame.unwrap();
        assert_eq!(frame.func.as_deref(), Some("main"));
        assert_eq!(frame.position(), Some(("/home/user/main.c", 5)));
    }

    #[test]
    fn test_stop_event_without_frame() {
        let rec = exec_async("*stopped,reason=\"exited-normally\"");
        let event = StopEvent::from_record(&rec);

        assert_eq!(event.reason.as_deref(), Some("exited-normally"));
        assert_eq!(event.frame, None);
    }

    #[test]
    fn test_frame_falls_back_to_relative_file() {
        let rec = match Record::parse(
            "=thread-selected,id=\"3\",frame={level=\"0\",func=\"f\",\
             file=\"rel/f.c\",line=\"7\"}",
        ) {
            Ok(Record::Notify(rec)) => rec,
            other => panic!("expected notify record, got {other:?}"),
        };
        let frame = Frame::from_results(&rec.results).unwrap();

        assert_eq!(frame.fullname, None);
        assert_eq!(frame.position(), Some(("rel/f.c", 7)));
    }

    #[test]
    fn test_frame_without_source_info() {
        let rec = exec_async(
            "*stopped,reason=\"signal-received\",frame={addr=\"0x7ffff7e12345\",\
             func=\"??\",args=[]}",
        );
        let frame = StopEvent::from_record(&rec).frame.unwrap();

        assert_eq!(frame.position(), None);
    }

    #[test]
    fn test_frame_with_unparseable_line() {
        let rec = exec_async("*stopped,frame={file=\"a.c\",line=\"xyz\"}");
        let frame = StopEvent::from_record(&rec).frame.unwrap();

        assert_eq!(frame.line, None);
        assert_eq!(frame.position(), None);
    }

    #[test]
    fn test_features_extraction() {
        let reply = match Record::parse(
            "^done,features=[\"frozen-varobjs\",\"python\",\"async\"]",
        ) {
            Ok(Record::Result(rec)) => rec,
            other => panic!("expected result record, got {other:?}"),
        };
        assert_eq!(features(&reply), vec!["frozen-varobjs", "python", "async"]);

        let bare = match Record::parse("^done") {
            Ok(Record::Result(rec)) => rec,
            other => panic!("expected result record, got {other:?}"),
        };
        assert!(features(&bare).is_empty());
    }
}
