//! Run configuration for a diff.
//!
//! `DiffConfig` mirrors the command-line options one to one. It is resolved
//! into one [`TimeoutPolicy`] per side before the engine starts, so the
//! engine itself never looks at the raw numbers.

use crate::commands::Mode;
use crate::error::{DiffError, Result};
use crate::timeout::{TimeoutPolicy, Wait};
use std::time::Duration;

/// Patience value meaning "use the idle timeout for the first line too".
pub const PATIENCE_UNSET: i64 = -1;

/// Default idle timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: i64 = 10;

/// User facing configuration of a diff run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffConfig {
    /// The primary side never times out; it runs until its input ends.
    pub follow: bool,
    /// The reference side never times out; it runs until the command ends.
    pub command_never_times_out: bool,
    /// Wait for the first line, in seconds. 0 waits forever,
    /// [`PATIENCE_UNSET`] uses `timeout_secs`.
    pub patience_secs: i64,
    /// Idle timeout after the last received line, in seconds.
    pub timeout_secs: i64,
    /// Absolute deadline for both sides, in seconds. 0 disables it.
    pub hard_timeout_secs: i64,
    /// Emit primary lines present in the reference set instead of absent ones.
    pub intersection: bool,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            follow: false,
            command_never_times_out: false,
            patience_secs: PATIENCE_UNSET,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            hard_timeout_secs: 0,
            intersection: false,
        }
    }
}

/// Resolved timeout policies, one per side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub primary: TimeoutPolicy,
    pub reference: TimeoutPolicy,
}

impl DiffConfig {
    pub fn mode(&self) -> Mode {
        if self.intersection {
            Mode::Intersection
        } else {
            Mode::Difference
        }
    }

    /// Reject values that have no meaning.
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs < 0 {
            return Err(DiffError::InvalidOption(format!(
                "timeout must be >= 0, got {}",
                self.timeout_secs
            )));
        }
        if self.hard_timeout_secs < 0 {
            return Err(DiffError::InvalidOption(format!(
                "hard timeout must be >= 0, got {}",
                self.hard_timeout_secs
            )));
        }
        if self.patience_secs < PATIENCE_UNSET {
            return Err(DiffError::InvalidOption(format!(
                "patience must be >= 0 (or -1 for the timeout value), got {}",
                self.patience_secs
            )));
        }
        Ok(())
    }

    /// Resolve the per side timeout policies.
    ///
    /// A hard timeout overrides every other setting on both sides.
    pub fn timeouts(&self) -> Result<Timeouts> {
        self.validate()?;

        if self.hard_timeout_secs > 0 {
            let hard = TimeoutPolicy::Hard(secs(self.hard_timeout_secs));
            return Ok(Timeouts {
                primary: hard,
                reference: hard,
            });
        }

        let first = match self.patience_secs {
            PATIENCE_UNSET => Wait::Finite(secs(self.timeout_secs)),
            p => Wait::from_secs_or_forever(p as u64),
        };
        let adaptive = TimeoutPolicy::Adaptive {
            first,
            recurring: Wait::Finite(secs(self.timeout_secs)),
        };

        Ok(Timeouts {
            primary: if self.follow {
                TimeoutPolicy::Never
            } else {
                adaptive
            },
            reference: if self.command_never_times_out {
                TimeoutPolicy::Never
            } else {
                adaptive
            },
        })
    }
}

fn secs(n: i64) -> Duration {
    Duration::from_secs(n.max(0) as u64)
}
