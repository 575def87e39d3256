//! Error taxonomy for nvgdb.
//!
//! Most failure modes here degrade to reduced functionality in the run loop
//! (a stop with no frame is a no-op, a toolkit without support disables the
//! extension). The variants below are the ones that actually travel through
//! `Result`: transport problems, protocol problems, and startup problems.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// No usable listen address for the editor connection.
    #[error("cannot reach Neovim: {0}")]
    Env(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// MessagePack serialization failed while writing a request.
    #[error("rpc encode error: {0}")]
    RpcEncode(#[from] rmp_serde::encode::Error),

    /// MessagePack deserialization failed while reading a response.
    #[error("rpc decode error: {0}")]
    RpcDecode(#[from] rmp_serde::decode::Error),

    /// The editor processed a request and reported an error value.
    #[error("editor error ({code}): {message}")]
    Editor { code: i64, message: String },

    /// The editor sent a response we did not ask for.
    #[error("rpc protocol error: {0}")]
    RpcProtocol(String),

    /// A GDB/MI output record could not be parsed.
    #[error("malformed MI record: {0}")]
    MiParse(String),

    /// GDB reported an error result for one of our own MI commands.
    #[error("gdb error: {0}")]
    GdbCommand(String),

    /// The debugger process could not be started.
    #[error("failed to spawn gdb: {0}")]
    Spawn(String),

    /// The debugger process went away mid-session.
    #[error("gdb terminated")]
    GdbGone,
}
