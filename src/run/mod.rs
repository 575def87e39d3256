//! Session runner.
//!
//! Wires the pieces together in dependency order: logging, editor
//! connection, window layout, debugger spawn, capability probes, then
//! the event loop. The loop owns the calling thread until gdb exits;
//! gdb itself runs interactively on the user's terminal the whole time.

use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use nvgdb::dsl::{LangkitExtension, ToolkitSupport};
use nvgdb::gdb::{DebuggerEvent, GdbHost};
use nvgdb::nvim::editor::Editor;
use nvgdb::session::Session;

use crate::cli::Cli;

/// How long the MI channel gets to produce its first prompt before the
/// debugger is declared too old for `new-ui` (added in gdb 7.12).
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

pub fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let editor = match &cli.listen {
        Some(addr) => Editor::connect_to(addr)?,
        None => Editor::connect()?,
    };
    let mut session = Session::start(editor)?;

    let program = cli.gdb.as_deref().unwrap_or("gdb");
    let mut gdb = GdbHost::spawn(program, &cli.gdb_args)?;

    if !gdb.handshake(HANDSHAKE_TIMEOUT) {
        warn!("debugger never spoke on the MI channel (gdb older than 7.12?), source sync is off");
        gdb.wait_for_exit();
        return Ok(());
    }
    if let Err(err) = gdb.probe_features() {
        warn!(%err, "feature listing failed, DSL views stay off");
    }

    if !cli.no_dsl {
        let support = ToolkitSupport::probe(&mut gdb);
        session.register_extension(Box::new(LangkitExtension::new(support)));
    }

    loop {
        match gdb.next_event() {
            DebuggerEvent::Stopped(event) => session.handle_stop(&mut gdb, &event),
            DebuggerEvent::FrameChanged(frame) => session.handle_frame_change(&mut gdb, frame),
            DebuggerEvent::Exited => break,
        }
    }
    info!("debugger exited");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
