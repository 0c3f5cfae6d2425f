//! streamdiff: streaming set difference between a live feed and a command.
//!
//! Lines arriving on a primary stream are emitted once they are known not
//! to appear (or, in intersection mode, to appear) in the output of a
//! reference command. Because the reference output may never end on its
//! own, each side is governed by its own timeout policy, and no primary
//! line is classified until the reference side has finished.
//!
//! # Features
//!
//! - **Independent timeouts**: patience for the first line, idle timeout,
//!   hard deadline or none, per side
//! - **Concurrent classification**: one rayon task per primary line, no lock
//!   on the reference set
//! - **Live output**: lines are written as soon as they are classified
//!
//! # Example
//!
//! ```rust,no_run
//! use streamdiff::{run, DiffConfig};
//!
//! let config = DiffConfig::default();
//! let input = std::io::Cursor::new("1\n2\n3\n4\n");
//! let mut output = Vec::new();
//! let stats = run(r#"echo -e "1\n2""#, &config, input, &mut output).unwrap();
//! assert_eq!(stats.written, 2);
//! ```

pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod streaming;
pub mod timeout;

// Re-export commonly used types
pub use commands::{run, DiffCommand, DiffStats, EndReason, Mode};
pub use config::DiffConfig;
pub use error::{DiffError, Result};
pub use timeout::{TimeoutPolicy, Wait};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::commands::{Comparator, DiffCommand, DiffStats, EndReason, Mode};
    pub use crate::config::DiffConfig;
    pub use crate::error::{DiffError, Result};
    pub use crate::streaming::{ShellSpawner, Side, Spawner, Upstream};
    pub use crate::timeout::{TimeoutPolicy, Wait};
}
