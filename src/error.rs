//! Error type shared by the library and the `sd` binary.

use std::io;
use thiserror::Error;

/// Errors that abort a diff run.
///
/// Timeouts are not errors: they are how a side decides it is finished.
/// Read errors on either input are absorbed as end-of-stream and never show
/// up here.
#[derive(Error, Debug)]
pub enum DiffError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to start command `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("Invalid option: {0}")]
    InvalidOption(String),

    #[error("{0} worker panicked")]
    Worker(&'static str),
}

pub type Result<T> = std::result::Result<T, DiffError>;
