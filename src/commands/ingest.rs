//! Ingestion controllers for the reference and primary sides.
//!
//! Both sides share one state machine:
//!
//! ```text
//! Armed -> Reading -> (line: rearm, stay Reading) -> Terminating -> Done
//! ```
//!
//! `Reading` is a `select!` over the next line and the side's deadline.
//! Reaching end of stream or the deadline moves to `Terminating`; on a
//! deadline the side's own line source is cancelled so nothing read after
//! that point can leak in.

use crate::commands::compare::{Comparator, ReferenceReader, ReferenceWriter, Verdict};
use crate::streaming::signal::LatchCloser;
use crate::streaming::{LineItem, Side};
use crate::timeout::TimeoutPolicy;
use crossbeam_channel::{select, Receiver, Sender};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, trace};

/// Why a side stopped reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The line source ended on its own.
    Eof,
    /// The side's deadline fired and its source was cancelled.
    Timeout,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndReason::Eof => write!(f, "end of input"),
            EndReason::Timeout => write!(f, "timeout"),
        }
    }
}

/// Controller lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Armed,
    Reading,
    Terminating,
    Done,
}

/// Summary of one side's ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SideReport {
    pub side: Side,
    /// Lines received before the side stopped reading.
    pub lines: usize,
    pub end: EndReason,
    /// Time from arming to the end of reading.
    pub elapsed: Duration,
}

/// Drives one line source against one timeout policy.
#[derive(Debug)]
pub struct IngestController {
    side: Side,
    policy: TimeoutPolicy,
    phase: Phase,
}

impl IngestController {
    pub fn new(side: Side, policy: TimeoutPolicy) -> Self {
        Self {
            side,
            policy,
            phase: Phase::Armed,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn enter(&mut self, phase: Phase) {
        debug!(side = %self.side, from = ?self.phase, to = ?phase, "controller transition");
        self.phase = phase;
    }

    /// Read `lines` until end of stream or deadline, handing each line to
    /// `on_item` and rearming right after it returns.
    ///
    /// `cancel` belongs to this side's line source and is closed on a
    /// deadline. At end of stream the source has already stopped, so
    /// dropping the closer there is harmless.
    pub fn drive<F>(
        &mut self,
        lines: &Receiver<LineItem>,
        cancel: LatchCloser,
        mut on_item: F,
    ) -> SideReport
    where
        F: FnMut(LineItem),
    {
        debug!(side = %self.side, policy = %self.policy, "armed");
        let mut deadline = self.policy.arm();
        self.enter(Phase::Reading);

        let mut received = 0;
        let end = loop {
            let timer = deadline.signal().clone();
            select! {
                recv(lines) -> msg => match msg {
                    Ok(item) => {
                        received += 1;
                        trace!(side = %self.side, line = received, "received");
                        on_item(item);
                        self.policy.rearm(&mut deadline);
                    }
                    Err(_) => break EndReason::Eof,
                },
                recv(timer) -> _ => break EndReason::Timeout,
            }
        };

        let elapsed = deadline.elapsed();
        self.enter(Phase::Terminating);
        if end == EndReason::Timeout {
            cancel.close();
        }

        SideReport {
            side: self.side,
            lines: received,
            end,
            elapsed,
        }
    }

    fn done(&mut self) {
        self.enter(Phase::Done);
    }
}

/// Accumulate reference lines, then publish the set.
///
/// Publishing closes the completion latch exactly once, releasing every
/// classification task. Lines the command prints after a timeout are never
/// added.
pub fn ingest_reference(
    lines: &Receiver<LineItem>,
    policy: TimeoutPolicy,
    cancel: LatchCloser,
    mut writer: ReferenceWriter,
) -> SideReport {
    let mut controller = IngestController::new(Side::Reference, policy);
    let report = controller.drive(lines, cancel, |item| writer.push(item.text));

    let published = writer.finish();
    info!(
        lines = published,
        end = %report.end,
        elapsed = ?report.elapsed,
        "reference set complete"
    );
    controller.done();
    report
}

/// Dispatch every primary line to its own classification task.
///
/// Tasks run on the rayon pool and block on the completion latch before
/// reading the reference set, so ingestion never waits on classification.
/// The controller returns only after every dispatched task has finished,
/// including when this side times out before the reference side completes:
/// undispatched lines are dropped with the cancelled source, while tasks
/// already dispatched stay parked until the reference set is published.
pub fn ingest_primary(
    lines: &Receiver<LineItem>,
    policy: TimeoutPolicy,
    cancel: LatchCloser,
    reference: &ReferenceReader,
    comparator: Comparator,
    verdicts: &Sender<Verdict>,
) -> SideReport {
    let mut controller = IngestController::new(Side::Primary, policy);

    let report = rayon::in_place_scope(|scope| {
        controller.drive(lines, cancel, |item| {
            let reference = reference.clone();
            let verdicts = verdicts.clone();
            scope.spawn(move |_| {
                let set = reference.wait();
                if let Some(verdict) = comparator.verdict(item, set) {
                    // The sink only goes away when output is closed downstream.
                    let _ = verdicts.send(verdict);
                }
            });
        })
    });

    debug!(
        lines = report.lines,
        end = %report.end,
        "all classification tasks finished"
    );
    controller.done();
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::compare::{reference_set, Mode};
    use crate::streaming::signal::latch;
    use crossbeam_channel::unbounded;
    use std::thread;
    use std::time::Instant;

    fn item(side: Side, text: &str) -> LineItem {
        LineItem {
            side,
            text: text.to_string(),
        }
    }

    fn sorted(rx: &Receiver<Verdict>) -> Vec<String> {
        let mut out: Vec<String> = rx.try_iter().map(|v| v.text).collect();
        out.sort();
        out
    }

    #[test]
    fn test_controller_phases() {
        let (tx, rx) = unbounded();
        let (closer, _cancel) = latch();
        drop(tx);

        let mut controller = IngestController::new(Side::Primary, TimeoutPolicy::Never);
        assert_eq!(controller.phase(), Phase::Armed);
        let report = controller.drive(&rx, closer, |_| {});
        assert_eq!(controller.phase(), Phase::Terminating);
        assert_eq!(report.end, EndReason::Eof);
        controller.done();
        assert_eq!(controller.phase(), Phase::Done);
    }

    #[test]
    fn test_reference_eof_publishes_lines() {
        let (tx, rx) = unbounded();
        let (closer, cancel) = latch();
        let (writer, reader) = reference_set();

        for text in ["1", "2"] {
            tx.send(item(Side::Reference, text)).unwrap();
        }
        drop(tx);

        let report = ingest_reference(&rx, TimeoutPolicy::Never, closer, writer);
        assert_eq!(report.lines, 2);
        assert_eq!(report.end, EndReason::Eof);
        assert!(reader.completion().is_closed());
        assert_eq!(reader.wait().iter().collect::<Vec<_>>(), vec!["1", "2"]);
        // Dropping the closer at end of stream is harmless
        assert!(cancel.is_closed());
    }

    #[test]
    fn test_reference_timeout_cancels_source() {
        let (tx, rx) = unbounded();
        let (closer, cancel) = latch();
        let (writer, reader) = reference_set();
        tx.send(item(Side::Reference, "1")).unwrap();

        let policy = TimeoutPolicy::idle(Duration::from_millis(50));
        let report = ingest_reference(&rx, policy, closer, writer);

        assert_eq!(report.end, EndReason::Timeout);
        assert_eq!(report.lines, 1);
        assert!(cancel.is_closed());

        // A line arriving after the timeout is never added
        tx.send(item(Side::Reference, "late")).unwrap();
        assert!(!reader.wait().contains("late"));
        assert_eq!(reader.wait().len(), 1);
    }

    #[test]
    fn test_steady_traffic_keeps_idle_side_alive() {
        let (tx, rx) = unbounded();
        let (closer, _cancel) = latch();
        let (writer, reader) = reference_set();

        let producer = thread::spawn(move || {
            for i in 0..5 {
                thread::sleep(Duration::from_millis(30));
                tx.send(item(Side::Reference, &i.to_string())).unwrap();
            }
        });

        let policy = TimeoutPolicy::idle(Duration::from_millis(100));
        let report = ingest_reference(&rx, policy, closer, writer);
        producer.join().unwrap();

        assert_eq!(report.end, EndReason::Eof);
        assert_eq!(reader.wait().len(), 5);
    }

    #[test]
    fn test_hard_timeout_ignores_traffic() {
        let (tx, rx) = unbounded();
        let (closer, _cancel) = latch();
        let (writer, _reader) = reference_set();

        let producer = thread::spawn(move || {
            while tx.send(item(Side::Reference, "x")).is_ok() {
                thread::sleep(Duration::from_millis(5));
            }
        });

        let started = Instant::now();
        let policy = TimeoutPolicy::Hard(Duration::from_millis(100));
        let report = ingest_reference(&rx, policy, closer, writer);

        // Drop the receiver so the producer stops
        drop(rx);
        producer.join().unwrap();

        assert_eq!(report.end, EndReason::Timeout);
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn test_primary_waits_for_reference_completion() {
        let (tx, rx) = unbounded();
        let (closer, _cancel) = latch();
        let (mut writer, reader) = reference_set();
        let (verdict_tx, verdict_rx) = unbounded();

        for text in ["1", "2", "3", "4"] {
            tx.send(item(Side::Primary, text)).unwrap();
        }
        drop(tx);

        let primary = thread::spawn(move || {
            ingest_primary(
                &rx,
                TimeoutPolicy::Never,
                closer,
                &reader,
                Comparator::new(Mode::Difference),
                &verdict_tx,
            )
        });

        thread::sleep(Duration::from_millis(50));
        // Nothing is classified while the reference set is still growing
        assert!(verdict_rx.try_recv().is_err());
        assert!(!primary.is_finished());

        writer.push("1".to_string());
        writer.push("2".to_string());
        writer.finish();

        let report = primary.join().unwrap();
        assert_eq!(report.lines, 4);
        assert_eq!(sorted(&verdict_rx), vec!["3", "4"]);
    }

    #[test]
    fn test_primary_timeout_before_reference_releases_dispatched_tasks() {
        let (tx, rx) = unbounded();
        let (closer, cancel) = latch();
        let (mut writer, reader) = reference_set();
        let (verdict_tx, verdict_rx) = unbounded();

        for text in ["a", "b", "a"] {
            tx.send(item(Side::Primary, text)).unwrap();
        }

        let primary = thread::spawn(move || {
            ingest_primary(
                &rx,
                TimeoutPolicy::idle(Duration::from_millis(30)),
                closer,
                &reader,
                Comparator::new(Mode::Intersection),
                &verdict_tx,
            )
        });

        // Primary times out and cancels its source while tasks stay parked
        cancel.wait();
        thread::sleep(Duration::from_millis(20));
        assert!(!primary.is_finished());

        writer.push("a".to_string());
        drop(writer);

        let report = primary.join().unwrap();
        assert_eq!(report.end, EndReason::Timeout);
        assert_eq!(report.lines, 3);
        assert_eq!(sorted(&verdict_rx), vec!["a", "a"]);
        drop(tx);
    }
}
