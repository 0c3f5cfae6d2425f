//! Adaptive timeout policies for the two ingestion sides.
//!
//! A side is considered finished when its stream ends or when its deadline
//! fires. The deadline is a one-shot `crossbeam_channel` receiver so that a
//! controller can `select!` over "next line" and "deadline" in one place.
//!
//! The combinations the CLI can produce are:
//!
//! | policy                          | before first line | after each line      |
//! |---------------------------------|-------------------|----------------------|
//! | `Never`                         | never fires       | never fires          |
//! | `Hard(h)`                       | fires at `h`      | unchanged            |
//! | `Adaptive { first, recurring }` | fires at `first`  | restarts `recurring` |

use crossbeam_channel::{after, never, Receiver};
use std::fmt;
use std::time::{Duration, Instant};

/// How long to wait for something, or not at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    Finite(Duration),
    Forever,
}

impl Wait {
    /// Interpret a user supplied number of seconds where 0 means "forever".
    pub fn from_secs_or_forever(secs: u64) -> Self {
        if secs == 0 {
            Wait::Forever
        } else {
            Wait::Finite(Duration::from_secs(secs))
        }
    }

    fn signal(self) -> Receiver<Instant> {
        match self {
            Wait::Finite(d) => after(d),
            Wait::Forever => never(),
        }
    }
}

impl fmt::Display for Wait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Wait::Finite(d) => write!(f, "{:?}", d),
            Wait::Forever => write!(f, "forever"),
        }
    }
}

/// Timeout policy for one side of a diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPolicy {
    /// The side only ends when its stream does.
    Never,
    /// Absolute deadline measured from arming; traffic never extends it.
    Hard(Duration),
    /// Patience for the first line, then an idle timeout reset by every line.
    ///
    /// With `recurring: Wait::Forever` the first wait is the only timeout
    /// that can ever fire.
    Adaptive { first: Wait, recurring: Wait },
}

impl TimeoutPolicy {
    /// Idle timeout `d` for every wait, including the first one.
    pub fn idle(d: Duration) -> Self {
        TimeoutPolicy::Adaptive {
            first: Wait::Finite(d),
            recurring: Wait::Finite(d),
        }
    }

    /// Start the clock.
    pub fn arm(&self) -> Deadline {
        let signal = match *self {
            TimeoutPolicy::Never => never(),
            TimeoutPolicy::Hard(h) => after(h),
            TimeoutPolicy::Adaptive { first, .. } => first.signal(),
        };
        Deadline {
            signal,
            armed_at: Instant::now(),
            first_pending: true,
        }
    }

    /// Account for a received line.
    ///
    /// Must be called after every line. For `Never` and `Hard` the existing
    /// signal is kept untouched.
    pub fn rearm(&self, deadline: &mut Deadline) {
        match *self {
            TimeoutPolicy::Never | TimeoutPolicy::Hard(_) => {}
            TimeoutPolicy::Adaptive {
                recurring: Wait::Finite(d),
                ..
            } => deadline.signal = after(d),
            TimeoutPolicy::Adaptive {
                recurring: Wait::Forever,
                ..
            } => {
                if deadline.first_pending {
                    deadline.signal = never();
                }
            }
        }
        deadline.first_pending = false;
    }

    /// Whether this policy can ever fire.
    pub fn can_expire(&self) -> bool {
        !matches!(
            self,
            TimeoutPolicy::Never
                | TimeoutPolicy::Adaptive {
                    first: Wait::Forever,
                    recurring: Wait::Forever,
                }
        )
    }
}

impl fmt::Display for TimeoutPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutPolicy::Never => write!(f, "never"),
            TimeoutPolicy::Hard(h) => write!(f, "hard {:?}", h),
            TimeoutPolicy::Adaptive { first, recurring } => {
                write!(f, "first {}, then idle {}", first, recurring)
            }
        }
    }
}

/// A one-shot deadline owned by a single ingestion controller.
#[derive(Debug)]
pub struct Deadline {
    signal: Receiver<Instant>,
    armed_at: Instant,
    first_pending: bool,
}

impl Deadline {
    /// Receiver that yields once when the deadline passes.
    pub fn signal(&self) -> &Receiver<Instant> {
        &self.signal
    }

    /// Time since the policy was armed.
    pub fn elapsed(&self) -> Duration {
        self.armed_at.elapsed()
    }
}
