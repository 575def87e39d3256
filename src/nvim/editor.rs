//! Typed editor surface over the RPC client.
//!
//! `EditorApi` is the seam the session and extensions are written
//! against; `Editor` is the live implementation. Fakes implementing the
//! trait stand in for a running editor in tests.

use std::env;

use crate::batch::{Batch, BufNr, HlSource, WindowId};
use crate::error::{Error, Result};
use crate::nvim::rpc::RpcClient;

/// The two calls everything else is built from, plus window helpers
/// derived from them.
pub trait EditorApi {
    /// Runs one ex-command, or a `" | "` joined batch of them.
    fn command(&mut self, cmd: &str) -> Result<()>;

    /// Evaluates a VimL expression with an integer result.
    fn eval_int(&mut self, expr: &str) -> Result<i64>;

    /// Sends a batch as a single command. Empty batches are not sent.
    fn run_batch(&mut self, batch: &Batch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.command(&batch.render())
    }

    /// Id of the focused window. Ids are stable across window
    /// rearrangement, unlike window numbers.
    fn current_window(&mut self) -> Result<WindowId> {
        Ok(WindowId(self.eval_int("win_getid()")?))
    }

    /// Buffer number of the focused window's buffer.
    fn current_buffer(&mut self) -> Result<BufNr> {
        Ok(BufNr(self.eval_int("bufnr('%')")?))
    }

    /// Opens a horizontal split on a fresh empty buffer and returns the
    /// new window's id. The new window has focus afterwards.
    fn split(&mut self) -> Result<WindowId> {
        self.command("split | enew")?;
        self.current_window()
    }

    /// Opens a vertical split on a fresh empty buffer and returns the
    /// new window's id.
    fn vsplit(&mut self) -> Result<WindowId> {
        self.command("vsplit | enew")?;
        self.current_window()
    }

    /// Allocates the namespace the current-position highlight lives in.
    /// Allocation is idempotent on the editor side.
    fn highlight_source(&mut self) -> Result<HlSource> {
        Ok(HlSource(self.eval_int("nvim_create_namespace('nvgdb')")?))
    }
}

/// Live connection to the surrounding editor instance.
pub struct Editor {
    rpc: RpcClient,
}

impl Editor {
    /// Connects to the address the editor exported into our environment.
    pub fn connect() -> Result<Editor> {
        Editor::connect_to(&listen_address()?)
    }

    pub fn connect_to(address: &str) -> Result<Editor> {
        Ok(Editor {
            rpc: RpcClient::connect(address)?,
        })
    }
}

impl EditorApi for Editor {
    fn command(&mut self, cmd: &str) -> Result<()> {
        self.rpc.call("nvim_command", cmd)
    }

    fn eval_int(&mut self, expr: &str) -> Result<i64> {
        self.rpc.call_int("nvim_eval", expr)
    }
}

/// Socket address of the surrounding editor. `$NVIM` is what the editor
/// exports into embedded terminals since 0.8; `$NVIM_LISTEN_ADDRESS` is
/// the older spelling.
pub fn listen_address() -> Result<String> {
    listen_address_from(|var| env::var(var).ok())
}

/// Internal resolution with injectable environment lookup.
fn listen_address_from<F>(get: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    for var in ["NVIM", "NVIM_LISTEN_ADDRESS"] {
        if let Some(addr) = get(var) {
            if !addr.is_empty() {
                return Ok(addr);
            }
        }
    }
    Err(Error::Env(
        "NVIM or NVIM_LISTEN_ADDRESS must point at a running editor".into(),
    ))
}
