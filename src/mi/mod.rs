//! GDB/MI wire protocol: record parsing and the events the session consumes.

pub mod event;
pub mod output;
