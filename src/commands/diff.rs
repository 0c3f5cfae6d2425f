//! Streaming set difference (or intersection) between a live primary feed
//! and the output of a reference command.
//!
//! # Threads
//!
//! - two line sources (reader + forwarder each)
//! - the reference controller, accumulating the reference set
//! - the primary controller, on the calling thread, dispatching one rayon
//!   task per line
//! - the output sink, the only writer of `output`
//!
//! Classification tasks block on the reference set's completion latch, the
//! single synchronization point between the two sides. The output channel
//! closes once both controllers and every classification task are done.

use crate::commands::compare::{reference_set, Comparator, Mode};
use crate::commands::ingest::{ingest_primary, ingest_reference, SideReport};
use crate::config::DiffConfig;
use crate::error::{DiffError, Result};
use crate::streaming::{
    latch, write_verdicts, LineSource, ShellSpawner, Side, Spawner, Upstream,
};
use crate::timeout::TimeoutPolicy;
use crossbeam_channel::unbounded;
use std::fmt;
use std::io::{Read, Write};
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

/// Default idle timeout for both sides (10 seconds).
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Diff command configuration.
pub struct DiffCommand {
    /// Difference or intersection
    pub mode: Mode,
    /// Timeout policy for the primary feed
    pub primary_timeout: TimeoutPolicy,
    /// Timeout policy for the reference command
    pub reference_timeout: TimeoutPolicy,
    spawner: Box<dyn Spawner>,
}

impl Default for DiffCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DiffCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiffCommand")
            .field("mode", &self.mode)
            .field("primary_timeout", &self.primary_timeout)
            .field("reference_timeout", &self.reference_timeout)
            .finish_non_exhaustive()
    }
}

/// Statistics from a diff run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffStats {
    pub primary: SideReport,
    pub reference: SideReport,
    /// Lines written to the output
    pub written: usize,
}

impl fmt::Display for DiffStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Primary: {} ({}), Reference: {} ({}), Written: {}",
            self.primary.lines,
            self.primary.end,
            self.reference.lines,
            self.reference.end,
            self.written
        )
    }
}

impl DiffCommand {
    pub fn new() -> Self {
        Self {
            mode: Mode::Difference,
            primary_timeout: TimeoutPolicy::idle(DEFAULT_IDLE_TIMEOUT),
            reference_timeout: TimeoutPolicy::idle(DEFAULT_IDLE_TIMEOUT),
            spawner: Box::new(ShellSpawner::new()),
        }
    }

    /// Build from user configuration, resolving both timeout policies.
    pub fn from_config(config: &DiffConfig) -> Result<Self> {
        let timeouts = config.timeouts()?;
        Ok(Self::new()
            .with_mode(config.mode())
            .with_timeouts(timeouts.primary, timeouts.reference))
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_timeouts(mut self, primary: TimeoutPolicy, reference: TimeoutPolicy) -> Self {
        self.primary_timeout = primary;
        self.reference_timeout = reference;
        self
    }

    /// Replace how the reference command is started.
    pub fn with_spawner<S: Spawner + 'static>(mut self, spawner: S) -> Self {
        self.spawner = Box::new(spawner);
        self
    }

    /// Run the diff until both sides are done and all output is written.
    ///
    /// Failing to start `command` is reported before anything is read or
    /// written. Timeouts, read errors and a non-zero exit of the command
    /// are all normal ways for a side to finish.
    pub fn run<R, W>(&self, command: &str, primary: R, output: &mut W) -> Result<DiffStats>
    where
        R: Read + Send + 'static,
        W: Write + Send,
    {
        if command.trim().is_empty() {
            return Err(DiffError::InvalidOption("command is empty".to_string()));
        }
        let upstream = self.spawner.spawn(command)?;

        let (reference_closer, reference_cancel) = latch();
        let (primary_closer, primary_cancel) = latch();
        let reference_source = LineSource::start(upstream, Side::Reference, reference_cancel)?;
        let primary_source = LineSource::start(
            Upstream::from_reader(primary),
            Side::Primary,
            primary_cancel,
        )?;

        let (writer, reader) = reference_set();
        let comparator = Comparator::new(self.mode);
        let reference_policy = self.reference_timeout;
        debug!(
            mode = ?self.mode,
            primary = %self.primary_timeout,
            reference = %reference_policy,
            command,
            "starting diff"
        );

        thread::scope(|scope| -> Result<DiffStats> {
            let (verdict_tx, verdict_rx) = unbounded();

            let sink = thread::Builder::new()
                .name("output".to_string())
                .spawn_scoped(scope, move || write_verdicts(output, verdict_rx))?;

            let reference_worker = thread::Builder::new()
                .name("reference".to_string())
                .spawn_scoped(scope, move || {
                    let report = ingest_reference(
                        reference_source.lines(),
                        reference_policy,
                        reference_closer,
                        writer,
                    );
                    (report, reference_source)
                })?;

            let primary_report = ingest_primary(
                primary_source.lines(),
                self.primary_timeout,
                primary_closer,
                &reader,
                comparator,
                &verdict_tx,
            );

            let (reference_report, reference_source) = reference_worker
                .join()
                .map_err(|_| DiffError::Worker("reference"))?;

            // Every classification task has finished; closing the channel
            // lets the sink drain and stop.
            drop(verdict_tx);
            let written = sink.join().map_err(|_| DiffError::Worker("output"))??;

            primary_source.finish()?;
            reference_source.finish()?;

            let stats = DiffStats {
                primary: primary_report,
                reference: reference_report,
                written,
            };
            info!(%stats, "diff complete");
            Ok(stats)
        })
    }
}

/// Run a diff with the default shell spawner.
pub fn run<R, W>(command: &str, config: &DiffConfig, primary: R, output: &mut W) -> Result<DiffStats>
where
    R: Read + Send + 'static,
    W: Write + Send,
{
    DiffCommand::from_config(config)?.run(command, primary, output)
}
