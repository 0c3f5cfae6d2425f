//! Line sources: byte streams turned into cancellable channels of lines.
//!
//! Each source runs two threads. The reader blocks on the underlying stream
//! and pushes lines into an intermediate channel; the forwarder selects over
//! that channel and the side's cancel latch. Cancelling only has to wake the
//! forwarder, so a reader stuck in a blocking read is simply abandoned.

use crate::error::{DiffError, Result};
use crate::streaming::lines::LineReader;
use crate::streaming::signal::Latch;
use crossbeam_channel::{select, unbounded, Receiver, Sender};
use std::fmt;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use tracing::{debug, trace, warn};

/// Which input a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// The live feed whose lines are classified.
    Primary,
    /// The command output that defines set membership.
    Reference,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Primary => "primary",
            Side::Reference => "reference",
        }
    }

    fn thread_names(&self) -> (&'static str, &'static str) {
        match self {
            Side::Primary => ("primary-reader", "primary-lines"),
            Side::Reference => ("reference-reader", "reference-lines"),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of text tagged with its side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItem {
    pub side: Side,
    pub text: String,
}

/// A readable byte stream, optionally backed by a child process.
pub struct Upstream {
    reader: Box<dyn Read + Send>,
    child: Option<Child>,
}

impl Upstream {
    /// Wrap an already open stream such as standard input.
    pub fn from_reader<R: Read + Send + 'static>(reader: R) -> Self {
        Self {
            reader: Box::new(reader),
            child: None,
        }
    }

    /// Take a spawned child's stdout. The child is killed once its output
    /// is no longer wanted.
    pub fn from_child(command: &str, mut child: Child) -> Result<Self> {
        let stdout = child.stdout.take().ok_or_else(|| DiffError::Spawn {
            command: command.to_string(),
            source: std::io::Error::other("stdout was not captured"),
        })?;
        Ok(Self {
            reader: Box::new(stdout),
            child: Some(child),
        })
    }
}

impl fmt::Debug for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upstream")
            .field("child", &self.child.as_ref().map(Child::id))
            .finish()
    }
}

/// Factory for the reference side: runs a command and exposes its stdout.
pub trait Spawner: Send + Sync {
    fn spawn(&self, command: &str) -> Result<Upstream>;
}

/// Runs commands through `<shell> -c`.
#[derive(Debug, Clone)]
pub struct ShellSpawner {
    shell: PathBuf,
    inherit_stderr: bool,
}

impl Default for ShellSpawner {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellSpawner {
    pub fn new() -> Self {
        Self {
            shell: PathBuf::from("/bin/bash"),
            inherit_stderr: false,
        }
    }

    pub fn with_shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Pass the command's stderr through instead of discarding it.
    pub fn inherit_stderr(mut self, inherit: bool) -> Self {
        self.inherit_stderr = inherit;
        self
    }
}

impl Spawner for ShellSpawner {
    fn spawn(&self, command: &str) -> Result<Upstream> {
        let stderr = if self.inherit_stderr {
            Stdio::inherit()
        } else {
            Stdio::null()
        };
        let child = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(stderr)
            .spawn()
            .map_err(|source| DiffError::Spawn {
                command: command.to_string(),
                source,
            })?;
        debug!(pid = child.id(), shell = %self.shell.display(), command, "spawned reference command");
        Upstream::from_child(command, child)
    }
}

/// A running line source.
#[derive(Debug)]
pub struct LineSource {
    side: Side,
    lines: Receiver<LineItem>,
    forwarder: Option<JoinHandle<()>>,
}

impl LineSource {
    /// Start streaming `upstream` as lines until it ends or `cancel` closes.
    pub fn start(upstream: Upstream, side: Side, cancel: Latch) -> Result<Self> {
        let (reader_name, forwarder_name) = side.thread_names();
        let (raw_tx, raw_rx) = unbounded();
        let (tx, lines) = unbounded();
        let Upstream { reader, child } = upstream;

        thread::Builder::new()
            .name(reader_name.to_string())
            .spawn(move || read_lines(reader, side, raw_tx))?;

        let forwarder = thread::Builder::new()
            .name(forwarder_name.to_string())
            .spawn(move || forward(side, raw_rx, tx, cancel, child))?;

        Ok(Self {
            side,
            lines,
            forwarder: Some(forwarder),
        })
    }

    /// Lines in stream order; disconnects at end of stream or cancellation.
    pub fn lines(&self) -> &Receiver<LineItem> {
        &self.lines
    }

    /// Wait for the forwarder, which also reaps a child process.
    ///
    /// Only call once the source has ended or been cancelled.
    pub fn finish(mut self) -> Result<()> {
        match self.forwarder.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| DiffError::Worker(self.side.thread_names().1)),
            None => Ok(()),
        }
    }
}

fn read_lines(reader: Box<dyn Read + Send>, side: Side, tx: Sender<String>) {
    let mut lines = LineReader::new(reader);
    loop {
        match lines.read_line() {
            Ok(Some(line)) => {
                if tx.send(line).is_err() {
                    // Forwarder is gone: the source was cancelled.
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(%side, line = lines.line_number() + 1, error = %e, "read failed, treating as end of input");
                break;
            }
        }
    }
    trace!(%side, lines = lines.line_number(), "reader finished");
}

fn forward(
    side: Side,
    raw: Receiver<String>,
    tx: Sender<LineItem>,
    cancel: Latch,
    child: Option<Child>,
) {
    loop {
        select! {
            recv(raw) -> msg => match msg {
                Ok(text) => {
                    if cancel.is_closed() {
                        break;
                    }
                    if tx.send(LineItem { side, text }).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
            recv(cancel.receiver()) -> _ => {
                debug!(%side, "source cancelled, abandoning stream");
                break;
            }
        }
    }
    drop(tx);

    if let Some(child) = child {
        reap(side, child);
    }
}

fn reap(side: Side, mut child: Child) {
    // The command may have exited already; a failed kill is expected then.
    let _ = child.kill();
    match child.wait() {
        Ok(status) => debug!(%side, pid = child.id(), %status, "reference command reaped"),
        Err(e) => warn!(%side, pid = child.id(), error = %e, "failed to reap command"),
    }
}
