//! Streaming plumbing shared by both sides of a diff:
//! - Newline framing over byte streams
//! - Cancellable line sources backed by a reader or a child process
//! - One-shot latches for cancel and completion signals
//! - The single-writer output sink

pub mod buffers;
pub mod lines;
pub mod output;
pub mod signal;
pub mod source;

pub use lines::LineReader;
pub use output::{write_verdicts, LineWriter};
pub use signal::{latch, Latch, LatchCloser};
pub use source::{LineItem, LineSource, ShellSpawner, Side, Spawner, Upstream};
