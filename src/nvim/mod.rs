//! Neovim control surface: the msgpack-RPC wire client and the typed
//! editor calls built on it.

pub mod editor;
pub mod rpc;
