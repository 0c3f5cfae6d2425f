//! Output sink: the single writer for classified lines.
//!
//! Classification runs concurrently, but only this sink touches the output
//! stream. Verdicts are written in the order they arrive on the channel.

use crate::commands::Verdict;
use crate::error::Result;
use crate::streaming::buffers::DEFAULT_OUTPUT_BUFFER;
use crossbeam_channel::{Receiver, TryRecvError};
use std::io::{self, BufWriter, Write};
use tracing::debug;

/// Buffered line writer.
pub struct LineWriter<W: Write> {
    writer: BufWriter<W>,
}

impl<W: Write> LineWriter<W> {
    pub fn new(output: W) -> Self {
        Self::with_capacity(DEFAULT_OUTPUT_BUFFER, output)
    }

    pub fn with_capacity(capacity: usize, output: W) -> Self {
        Self {
            writer: BufWriter::with_capacity(capacity, output),
        }
    }

    /// Write a full line as-is with newline.
    #[inline]
    pub fn write_line(&mut self, line: &[u8]) -> io::Result<()> {
        self.writer.write_all(line)?;
        self.writer.write_all(b"\n")
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Write every verdict received until the channel disconnects.
///
/// The buffer is flushed whenever the channel runs dry, so a slow live feed
/// sees its output promptly while bursts are still batched. A closed
/// downstream (`BrokenPipe`) ends the sink quietly. Returns the number of
/// lines written.
pub fn write_verdicts<W: Write>(output: W, verdicts: Receiver<Verdict>) -> Result<usize> {
    let mut writer = LineWriter::new(output);
    let mut written = 0;

    match drain(&mut writer, &verdicts, &mut written) {
        Ok(()) => Ok(written),
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            debug!(written, "output closed by reader");
            Ok(written)
        }
        Err(e) => Err(e.into()),
    }
}

fn drain<W: Write>(
    writer: &mut LineWriter<W>,
    verdicts: &Receiver<Verdict>,
    written: &mut usize,
) -> io::Result<()> {
    loop {
        let verdict = match verdicts.try_recv() {
            Ok(verdict) => verdict,
            Err(TryRecvError::Empty) => {
                writer.flush()?;
                match verdicts.recv() {
                    Ok(verdict) => verdict,
                    Err(_) => break,
                }
            }
            Err(TryRecvError::Disconnected) => break,
        };
        writer.write_line(verdict.text.as_bytes())?;
        *written += 1;
    }
    writer.flush()
}
