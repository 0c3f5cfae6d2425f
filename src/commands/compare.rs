//! Reference set and per-line classification.
//!
//! The reference set has exactly two phases. While the reference side is
//! ingesting, a single [`ReferenceWriter`] owns the lines. Finishing (or
//! dropping) the writer freezes them into a [`ReferenceSet`], publishes it,
//! and only then closes the completion latch. Readers wait on that latch
//! before looking at the set, so no read can race an append and no lock is
//! needed on the read path.

use crate::streaming::signal::{latch, Latch, LatchCloser};
use crate::streaming::LineItem;
use rustc_hash::FxHashSet;
use std::sync::{Arc, OnceLock};

/// Whether primary lines are kept when absent from or present in the
/// reference set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Emit primary lines not in the reference set.
    #[default]
    Difference,
    /// Emit primary lines that are in the reference set.
    Intersection,
}

/// A primary line selected for output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub text: String,
}

/// Frozen reference lines in arrival order, indexed for membership.
#[derive(Debug, Default)]
pub struct ReferenceSet {
    lines: Vec<Arc<str>>,
    index: FxHashSet<Arc<str>>,
}

impl ReferenceSet {
    pub fn from_lines(lines: Vec<String>) -> Self {
        let lines: Vec<Arc<str>> = lines.into_iter().map(Arc::from).collect();
        let index = lines.iter().cloned().collect();
        Self { lines, index }
    }

    /// Exact string membership.
    #[inline]
    pub fn contains(&self, line: &str) -> bool {
        self.index.contains(line)
    }

    /// Number of reference lines received, duplicates included.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines in the order the reference command produced them.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(|line| &**line)
    }
}

/// Create the write and read halves of a reference set.
pub fn reference_set() -> (ReferenceWriter, ReferenceReader) {
    let slot = Arc::new(OnceLock::new());
    let (closer, done) = latch();
    (
        ReferenceWriter {
            lines: Vec::new(),
            slot: Arc::clone(&slot),
            closer: Some(closer),
        },
        ReferenceReader { slot, done },
    )
}

/// Append-only accumulator owned by the reference side.
///
/// Publishing happens exactly once, on [`finish`](Self::finish) or drop, so
/// even a reference worker that unwinds releases every waiting reader.
#[derive(Debug)]
pub struct ReferenceWriter {
    lines: Vec<String>,
    slot: Arc<OnceLock<ReferenceSet>>,
    closer: Option<LatchCloser>,
}

impl ReferenceWriter {
    pub fn push(&mut self, line: String) {
        self.lines.push(line);
    }

    /// Freeze and publish the set, then close the completion latch.
    /// Returns the number of lines published.
    pub fn finish(mut self) -> usize {
        let published = self.lines.len();
        self.publish();
        published
    }

    /// Only the first call publishes; the closer is its token.
    fn publish(&mut self) {
        let Some(closer) = self.closer.take() else {
            return;
        };
        let set = ReferenceSet::from_lines(std::mem::take(&mut self.lines));
        let _ = self.slot.set(set);
        closer.close();
    }
}

impl Drop for ReferenceWriter {
    fn drop(&mut self) {
        self.publish();
    }
}

/// Read side of a reference set, cloned into every classification task.
#[derive(Debug, Clone)]
pub struct ReferenceReader {
    slot: Arc<OnceLock<ReferenceSet>>,
    done: Latch,
}

impl ReferenceReader {
    /// Block until the reference side has completed, then borrow the set.
    pub fn wait(&self) -> &ReferenceSet {
        self.done.wait();
        match self.slot.get() {
            Some(set) => set,
            None => empty(),
        }
    }

    /// The completion latch, closed once the set is published.
    pub fn completion(&self) -> &Latch {
        &self.done
    }
}

fn empty() -> &'static ReferenceSet {
    static EMPTY: OnceLock<ReferenceSet> = OnceLock::new();
    EMPTY.get_or_init(ReferenceSet::default)
}

/// Classifies primary lines against a completed reference set.
#[derive(Debug, Clone, Copy, Default)]
pub struct Comparator {
    mode: Mode,
}

impl Comparator {
    pub fn new(mode: Mode) -> Self {
        Self { mode }
    }

    /// Whether `line` belongs in the output.
    #[inline]
    pub fn keeps(&self, line: &str, reference: &ReferenceSet) -> bool {
        let present = reference.contains(line);
        match self.mode {
            Mode::Difference => !present,
            Mode::Intersection => present,
        }
    }

    pub fn verdict(&self, item: LineItem, reference: &ReferenceSet) -> Option<Verdict> {
        self.keeps(&item.text, reference)
            .then_some(Verdict { text: item.text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::Side;
    use std::thread;
    use std::time::Duration;

    fn set(lines: &[&str]) -> ReferenceSet {
        ReferenceSet::from_lines(lines.iter().map(|s| s.to_string()).collect())
    }

    fn primary(text: &str) -> LineItem {
        LineItem {
            side: Side::Primary,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_reference_set_keeps_order_and_duplicates() {
        let reference = set(&["b", "a", "b"]);
        assert_eq!(reference.len(), 3);
        assert_eq!(reference.iter().collect::<Vec<_>>(), vec!["b", "a", "b"]);
        assert!(reference.contains("a"));
        assert!(!reference.contains("c"));
    }

    #[test]
    fn test_membership_is_exact() {
        let reference = set(&["1", "abc"]);
        assert!(!reference.contains("1 "));
        assert!(!reference.contains("ABC"));
        assert!(!reference.contains(""));
    }

    #[test]
    fn test_difference_mode() {
        let reference = set(&["1", "2"]);
        let comparator = Comparator::new(Mode::Difference);
        let kept: Vec<_> = ["1", "2", "3", "4"]
            .into_iter()
            .filter_map(|t| comparator.verdict(primary(t), &reference))
            .map(|v| v.text)
            .collect();
        assert_eq!(kept, vec!["3", "4"]);
    }

    #[test]
    fn test_intersection_mode_duplicates_each_reported() {
        let reference = set(&["2", "3", "9"]);
        let comparator = Comparator::new(Mode::Intersection);
        let kept: Vec<_> = ["1", "2", "3", "2"]
            .into_iter()
            .filter_map(|t| comparator.verdict(primary(t), &reference))
            .map(|v| v.text)
            .collect();
        assert_eq!(kept, vec!["2", "3", "2"]);
    }

    #[test]
    fn test_readers_wait_for_finish() {
        let (mut writer, reader) = reference_set();
        writer.push("1".to_string());

        let waiter = {
            let reader = reader.clone();
            thread::spawn(move || reader.wait().len())
        };

        thread::sleep(Duration::from_millis(20));
        assert!(!reader.completion().is_closed());
        writer.push("2".to_string());
        assert_eq!(writer.finish(), 2);

        assert_eq!(waiter.join().unwrap(), 2);
        assert!(reader.wait().contains("2"));
    }

    #[test]
    fn test_finish_publishes_before_returning() {
        let (mut writer, reader) = reference_set();
        writer.push("a".to_string());
        writer.push("b".to_string());
        writer.push("a".to_string());

        assert_eq!(writer.finish(), 3);
        assert!(reader.completion().is_closed());
        let published = reader.wait();
        assert_eq!(published.iter().collect::<Vec<_>>(), vec!["a", "b", "a"]);
    }

    #[test]
    fn test_dropped_writer_still_publishes() {
        let (mut writer, reader) = reference_set();
        writer.push("x".to_string());
        drop(writer);
        assert!(reader.wait().contains("x"));
    }
}
