//! Newline framing over a byte stream.

use crate::streaming::buffers::{DEFAULT_INPUT_BUFFER, DEFAULT_LINE_BUFFER};
use memchr::memchr;
use std::io::{self, BufRead, BufReader, Read};

/// Splits a byte stream into text lines.
///
/// Lines end at `\n`; a trailing `\r` is dropped and invalid UTF-8 is
/// replaced. A final line without a terminator is still returned.
pub struct LineReader<R: Read> {
    reader: BufReader<R>,
    buffer: Vec<u8>,
    line_number: usize,
}

impl<R: Read> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_capacity(DEFAULT_INPUT_BUFFER, reader)
    }

    pub fn with_capacity(capacity: usize, reader: R) -> Self {
        Self {
            reader: BufReader::with_capacity(capacity, reader),
            buffer: Vec::with_capacity(DEFAULT_LINE_BUFFER),
            line_number: 0,
        }
    }

    /// Read the next line, or `None` at end of stream.
    ///
    /// Returns as soon as one full line is buffered, so a live producer's
    /// lines are seen without waiting for the buffer to fill.
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        self.buffer.clear();
        loop {
            let available = match self.reader.fill_buf() {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if available.is_empty() {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                break;
            }
            match memchr(b'\n', available) {
                Some(newline) => {
                    self.buffer.extend_from_slice(&available[..newline]);
                    self.reader.consume(newline + 1);
                    break;
                }
                None => {
                    let len = available.len();
                    self.buffer.extend_from_slice(available);
                    self.reader.consume(len);
                }
            }
        }

        if self.buffer.last() == Some(&b'\r') {
            self.buffer.pop();
        }
        self.line_number += 1;
        Ok(Some(String::from_utf8_lossy(&self.buffer).into_owned()))
    }

    /// Number of lines returned so far.
    pub fn line_number(&self) -> usize {
        self.line_number
    }
}

impl<R: Read> Iterator for LineReader<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_line().transpose()
    }
}
