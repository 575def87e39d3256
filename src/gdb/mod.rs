//! GDB process host.
//!
//! Runs `gdb` as an ordinary child on the user's terminal, with a second,
//! machine-facing interpreter attached through `new-ui mi <tty>`: we
//! allocate a pty pair, pass the slave's device path on gdb's command
//! line, and read clean MI records off the master. The user keeps gdb's
//! own readline; nothing is bridged or re-rendered.
//!
//! The pty slave is held until gdb's first prompt confirms it opened its
//! own copy by path; reads on the master fail once no slave fd is open
//! anywhere. After the handshake our copy is released, so the master
//! sees EOF exactly when gdb closes its end, which is how normal exit
//! is detected.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, Command};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use portable_pty::{MasterPty, NativePtySystem, PtyPair, PtySize, PtySystem, SlavePty};
use tracing::debug;

use crate::error::{Error, Result};
use crate::mi::event::{self, Frame, StopEvent};
use crate::mi::output::{self, Record, ResultClass, ResultRecord};

/// What the run loop consumes.
#[derive(Debug, Clone, PartialEq)]
pub enum DebuggerEvent {
    /// `*stopped` on the MI channel.
    Stopped(StopEvent),
    /// `=thread-selected`, sent when the user changes frame or thread
    /// from the CLI. Debuggers before 8.1 never emit it. Carries the new
    /// frame when the notification included one.
    FrameChanged(Option<Frame>),
    /// The debugger process ended.
    Exited,
}

/// Command surface the session and extensions use to reach the debugger.
pub trait DebuggerLink {
    /// MI feature names reported at startup. Empty when the probe failed.
    fn features(&self) -> &[String];

    /// Runs a CLI command over the MI channel and returns its console
    /// output.
    fn console_exec(&mut self, command: &str) -> Result<String>;

    /// Source position of the currently selected frame. `Ok(None)` when
    /// no frame is selected.
    fn query_frame(&mut self) -> Result<Option<Frame>>;
}

/// A live gdb child plus its MI side channel.
pub struct GdbHost {
    child: Child,
    // Keeps the pty device alive for as long as gdb may write to it.
    _master: Box<dyn MasterPty + Send>,
    // Held until the handshake confirms gdb attached; see `handshake`.
    slave: Option<Box<dyn SlavePty + Send>>,
    writer: Box<dyn Write + Send>,
    lines: Receiver<String>,
    pending: VecDeque<DebuggerEvent>,
    next_token: u64,
    features: Vec<String>,
}

impl GdbHost {
    /// Spawns the debugger. It inherits our stdio, so it runs interactively
    /// on whatever terminal nvgdb was started from.
    pub fn spawn(program: &str, args: &[String]) -> Result<GdbHost> {
        let pty_system = NativePtySystem::default();
        let pair = pty_system
            .openpty(PtySize {
                rows: 24,
                cols: 80,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| Error::Spawn(format!("openpty: {e}")))?;
        let PtyPair { master, slave } = pair;

        let tty = master
            .tty_name()
            .ok_or_else(|| Error::Spawn("pty has no resolvable tty name".into()))?;
        let writer = master
            .take_writer()
            .map_err(|e| Error::Spawn(format!("pty writer: {e}")))?;
        let reader = master
            .try_clone_reader()
            .map_err(|e| Error::Spawn(format!("pty reader: {e}")))?;

        let mut command = Command::new(program);
        command.arg("-ex").arg(format!("new-ui mi {}", tty.display()));
        command.args(args);
        let child = command
            .spawn()
            .map_err(|e| Error::Spawn(format!("{program}: {e}")))?;

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut reader = BufReader::new(reader);
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        let trimmed = line.trim_end_matches(['\r', '\n']).to_string();
                        if tx.send(trimmed).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        // gdb opens the slave by path only once startup reaches the -ex
        // command. Our copy keeps the master readable across that gap.
        Ok(GdbHost {
            child,
            _master: master,
            slave: Some(slave),
            writer,
            lines: rx,
            pending: VecDeque::new(),
            next_token: 1,
            features: Vec::new(),
        })
    }

    /// Waits for the side channel to produce its first prompt. Returns
    /// false when it stays silent for the whole window, which is what
    /// happens on debuggers too old to know `new-ui` (before 7.12).
    pub fn handshake(&mut self, timeout: Duration) -> bool {
        if !await_prompt(&self.lines, &mut self.pending, timeout) {
            return false;
        }
        // gdb holds its own slave fd now. Releasing ours lets the master
        // report EOF when gdb exits.
        self.slave = None;
        true
    }

    /// Asks the debugger which MI features it carries (`-list-features`).
    pub fn probe_features(&mut self) -> Result<()> {
        let (reply, _) = self.round_trip("list-features")?;
        if reply.class == ResultClass::Error {
            return Err(Error::GdbCommand(
                reply.error_message().unwrap_or("list-features failed").to_string(),
            ));
        }
        self.features = event::features(&reply);
        Ok(())
    }

    /// Blocks until the debugger produces something the session reacts to.
    pub fn next_event(&mut self) -> DebuggerEvent {
        if let Some(ev) = self.pending.pop_front() {
            return ev;
        }
        loop {
            match self.lines.recv() {
                Err(_) => return DebuggerEvent::Exited,
                Ok(line) => {
                    if let Some(ev) = classify(&line).and_then(event_from) {
                        return ev;
                    }
                }
            }
        }
    }

    /// Parks until the debugger process ends. Used when the side channel
    /// never came up and there is nothing to relay.
    pub fn wait_for_exit(&mut self) {
        let _ = self.child.wait();
    }

    /// One token-stamped synchronous MI command. Async records arriving
    /// while we wait are queued for `next_event`; console stream output
    /// belonging to the command is collected and returned.
    fn round_trip(&mut self, command: &str) -> Result<(ResultRecord, String)> {
        let token = self.next_token;
        self.next_token += 1;

        writeln!(self.writer, "{token}-{command}")?;
        self.writer.flush()?;

        collect_reply(&self.lines, &mut self.pending, token)
    }
}

impl DebuggerLink for GdbHost {
    fn features(&self) -> &[String] {
        &self.features
    }

    fn console_exec(&mut self, command: &str) -> Result<String> {
        let escaped = output::escape_argument(command);
        let (reply, console) =
            self.round_trip(&format!("interpreter-exec console \"{escaped}\""))?;
        match reply.class {
            ResultClass::Error => Err(Error::GdbCommand(
                reply.error_message().unwrap_or("command failed").to_string(),
            )),
            _ => Ok(console),
        }
    }

    fn query_frame(&mut self) -> Result<Option<Frame>> {
        let (reply, _) = self.round_trip("stack-info-frame")?;
        match reply.class {
            ResultClass::Error => Ok(None),
            _ => Ok(Frame::from_results(&reply.results)),
        }
    }
}

impl Drop for GdbHost {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Parses one line off the channel. Blank lines, echoed input and
/// unparseable text yield `None`.
fn classify(line: &str) -> Option<Record> {
    let line = line.trim_end();
    if line.is_empty() || output::is_command_echo(line) {
        return None;
    }
    match Record::parse(line) {
        Ok(record) => Some(record),
        Err(err) => {
            debug!(%err, "unparseable line on mi channel");
            None
        }
    }
}

/// The records the session reacts to.
fn event_from(record: Record) -> Option<DebuggerEvent> {
    match record {
        Record::ExecAsync(rec) if rec.class == "stopped" => {
            Some(DebuggerEvent::Stopped(StopEvent::from_record(&rec)))
        }
        Record::Notify(rec) if rec.class == "thread-selected" => {
            Some(DebuggerEvent::FrameChanged(Frame::from_results(&rec.results)))
        }
        Record::Result(rec) if rec.class == ResultClass::Exit => Some(DebuggerEvent::Exited),
        _ => None,
    }
}

/// Drains the channel until the first prompt or the end of the window.
/// Records arriving before the prompt (a `.gdbinit` that runs `start`
/// can stop the target that early) are queued, not lost.
fn await_prompt(
    lines: &Receiver<String>,
    pending: &mut VecDeque<DebuggerEvent>,
    timeout: Duration,
) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return false;
        }
        match lines.recv_timeout(left) {
            Err(_) => return false,
            Ok(line) => match classify(&line) {
                Some(Record::Prompt) => return true,
                Some(record) => {
                    if let Some(ev) = event_from(record) {
                        pending.push_back(ev);
                    }
                }
                None => {}
            },
        }
    }
}

fn collect_reply(
    lines: &Receiver<String>,
    pending: &mut VecDeque<DebuggerEvent>,
    token: u64,
) -> Result<(ResultRecord, String)> {
    let mut console = String::new();
    loop {
        let line = lines.recv().map_err(|_| Error::GdbGone)?;
        let Some(record) = classify(&line) else {
            continue;
        };
        match record {
            Record::Console(text) => console.push_str(&text),
            Record::Result(reply) => {
                if reply.token == Some(token) {
                    return Ok((reply, console));
                }
                debug!(token = ?reply.token, "dropping stale reply");
            }
            other => {
                if let Some(ev) = event_from(other) {
                    pending.push_back(ev);
                }
            }
        }
    }
}
