//! # Lifecycle
//!
//! Deterministic deadline and interrupt primitives for the game host.
//!
//! ## Philosophy
//!
//! - **Explicit over implicit**: A call is bounded by a [`Deadline`] that the
//!   host creates, never by an ambient timer
//! - **Testability first**: Time comes from a [`Clock`]; tests use
//!   [`ManualClock`] to simulate slow polling without sleeping
//! - **Mechanism not policy**: [`InterruptCheck`] answers continue/abort; the
//!   embedding engine decides how often to ask
//! - **No async runtime required**: Everything works in sync contexts
//!
//! ## Core Concepts
//!
//! - `Clock`: Source of monotonic instants
//! - `Deadline`: Point in time when an operation should stop
//! - `Timeout`: Duration-based timeout converted to a deadline at call start
//! - `InterruptCheck`: Polling callback returning [`InterruptDecision`]
//! - `DeadlineCheck`: The standard check that aborts once a deadline passes

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Source of monotonic time
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Wall-clock time from [`Instant::now`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to
///
/// Clones share the same timeline. With [`ManualClock::with_auto_step`] every
/// call to `now()` also advances time, which models an engine that polls at a
/// fixed cost per poll.
#[derive(Debug, Clone)]
pub struct ManualClock {
    base: Instant,
    offset: Rc<Cell<Duration>>,
    auto_step: Duration,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Rc::new(Cell::new(Duration::ZERO)),
            auto_step: Duration::ZERO,
        }
    }

    /// Creates a clock that advances by `step` every time it is read
    pub fn with_auto_step(step: Duration) -> Self {
        Self {
            auto_step: step,
            ..Self::new()
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset.set(self.offset.get() + by);
    }

    /// Total simulated time since the clock was created
    pub fn elapsed(&self) -> Duration {
        self.offset.get()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let now = self.base + self.offset.get();
        if !self.auto_step.is_zero() {
            self.advance(self.auto_step);
        }
        now
    }
}

/// A deadline represents a point in time when an operation should stop
///
/// Deadlines are absolute times, making them suitable for passing through
/// multiple layers without duration confusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline {
    instant: Instant,
}

impl Deadline {
    pub fn at(instant: Instant) -> Self {
        Self { instant }
    }

    pub fn instant(&self) -> Instant {
        self.instant
    }

    pub fn has_passed(&self, now: Instant) -> bool {
        now >= self.instant
    }

    /// Returns None if the deadline has passed
    pub fn time_remaining(&self, now: Instant) -> Option<Duration> {
        if now < self.instant {
            Some(self.instant.duration_since(now))
        } else {
            None
        }
    }
}

/// Timeout specifies a duration-based limit
///
/// Unlike Deadline, Timeout is relative and is converted to a Deadline when
/// the bounded operation starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeout {
    duration: Duration,
}

impl Timeout {
    pub fn after(duration: Duration) -> Self {
        Self { duration }
    }

    pub fn from_millis(millis: u64) -> Self {
        Self {
            duration: Duration::from_millis(millis),
        }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self {
            duration: Duration::from_secs(secs),
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn to_deadline(&self, now: Instant) -> Deadline {
        Deadline::at(now + self.duration)
    }
}

/// Why an interrupt check asked the engine to stop
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbortReason {
    #[error("execution exceeded {limit:?} (ran for {elapsed:?})")]
    Timeout { limit: Duration, elapsed: Duration },

    #[error("{0}")]
    Custom(String),
}

/// Answer returned by one interrupt poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterruptDecision {
    Continue,
    Abort(AbortReason),
}

impl InterruptDecision {
    pub fn is_abort(&self) -> bool {
        matches!(self, InterruptDecision::Abort(_))
    }
}

/// A callback the execution engine invokes at its own polling granularity
pub trait InterruptCheck {
    fn poll(&mut self) -> InterruptDecision;
}

impl<F> InterruptCheck for F
where
    F: FnMut() -> InterruptDecision,
{
    fn poll(&mut self) -> InterruptDecision {
        self()
    }
}

/// Aborts once a deadline computed at construction has passed
pub struct DeadlineCheck {
    clock: Rc<dyn Clock>,
    started: Instant,
    deadline: Deadline,
    limit: Duration,
    polls: u64,
}

impl DeadlineCheck {
    /// Starts the timer now
    pub fn start(clock: Rc<dyn Clock>, timeout: Timeout) -> Self {
        let started = clock.now();
        Self {
            clock,
            started,
            deadline: timeout.to_deadline(started),
            limit: timeout.duration(),
            polls: 0,
        }
    }

    pub fn deadline(&self) -> Deadline {
        self.deadline
    }

    /// Number of times the engine has polled this check
    pub fn polls(&self) -> u64 {
        self.polls
    }

    pub fn elapsed(&self) -> Duration {
        self.clock.now().saturating_duration_since(self.started)
    }
}

impl InterruptCheck for DeadlineCheck {
    fn poll(&mut self) -> InterruptDecision {
        self.polls += 1;
        let now = self.clock.now();
        if self.deadline.has_passed(now) {
            InterruptDecision::Abort(AbortReason::Timeout {
                limit: self.limit,
                elapsed: now.saturating_duration_since(self.started),
            })
        } else {
            InterruptDecision::Continue
        }
    }
}

impl fmt::Debug for DeadlineCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeadlineCheck")
            .field("limit", &self.limit)
            .field("polls", &self.polls)
            .finish()
    }
}
