//! Buffer size constants for line streaming.
//!
//! Inputs are often live feeds, so buffers stay small enough that a slow
//! producer is never starved behind a large read.

/// Input buffer size (64 KB) for each line source.
pub const DEFAULT_INPUT_BUFFER: usize = 64 * 1024;

/// Output buffer size (64 KB). The sink flushes whenever it runs idle, so
/// this only bounds how much is batched during bursts.
pub const DEFAULT_OUTPUT_BUFFER: usize = 64 * 1024;

/// Initial line buffer capacity (1 KB).
pub const DEFAULT_LINE_BUFFER: usize = 1024;
