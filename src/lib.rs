//! nvgdb keeps a Neovim instance in sync with an interactive gdb
//! session: every stop, frame switch and thread switch is mirrored as
//! source navigation in a dedicated window, with optional extra views
//! for langkit-built language interpreters.
//!
//! Argument parsing and the runner live on the binary side; this
//! library carries everything a session is made of.

pub mod batch;
pub mod dsl;
pub mod error;
pub mod gdb;
pub mod mi;
pub mod nvim;
pub mod session;
