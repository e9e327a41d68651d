//! One-shot countdown for River Rush session loops.
//!
//! A [`Countdown`] is armed with a delay and later reports that it
//! expired. It never spawns a task or a thread: the owner polls
//! [`Countdown::wait`] from its own `tokio::select!` loop, so the expiry
//! is handled on the same task as every other input of the session.
//!
//! # Idle mode
//!
//! While the countdown is not armed, [`Countdown::wait`] pends forever.
//! That is the correct behavior inside `select!`: the branch simply never
//! fires and the other branches keep being served.
//!
//! # Integration
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands */ }
//!         expired = countdown.wait() => {
//!             session.on_countdown(expired);
//!         }
//!     }
//! }
//! ```
//!
//! `wait` is cancel-safe: if another branch wins, the deadline is kept
//! and the next call sleeps until the same instant.

use std::fmt;
use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace};

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Identifies one arming of a countdown.
///
/// Generations increase every time the countdown is armed, so an expiry
/// that arrives after a cancel and re-arm can be told apart from the
/// current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen-{}", self.0)
    }
}

/// Returned by [`Countdown::wait`] when the deadline passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expired {
    /// Which arming expired.
    pub generation: Generation,
    /// How late the expiry was observed, relative to the deadline.
    pub late_by: Duration,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Counters for a countdown's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountdownMetrics {
    /// Times the countdown was armed.
    pub armed: u64,
    /// Times it expired.
    pub expired: u64,
    /// Times an armed countdown was cancelled.
    pub cancelled: u64,
    /// Arm requests refused because the countdown was already running.
    pub rearm_refused: u64,
}

// ---------------------------------------------------------------------------
// Countdown
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Pending {
    generation: Generation,
    deadline: Instant,
}

/// A cancellable one-shot timer.
#[derive(Debug, Default)]
pub struct Countdown {
    pending: Option<Pending>,
    last_generation: u64,
    metrics: CountdownMetrics,
}

impl Countdown {
    /// Creates an idle countdown.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the countdown to expire `delay` from now.
    ///
    /// Returns `None` without touching the deadline if the countdown is
    /// already armed; a running countdown is never pushed back or
    /// duplicated.
    pub fn arm(&mut self, delay: Duration) -> Option<Generation> {
        if let Some(pending) = self.pending {
            self.metrics.rearm_refused += 1;
            debug!(generation = %pending.generation, "countdown already armed, ignoring");
            return None;
        }

        self.last_generation += 1;
        let generation = Generation(self.last_generation);
        self.pending = Some(Pending {
            generation,
            deadline: Instant::now() + delay,
        });
        self.metrics.armed += 1;
        debug!(%generation, delay_ms = delay.as_millis() as u64, "countdown armed");
        Some(generation)
    }

    /// Disarms the countdown. Returns `true` if it was armed.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(pending) => {
                self.metrics.cancelled += 1;
                debug!(generation = %pending.generation, "countdown cancelled");
                true
            }
            None => false,
        }
    }

    /// Whether the countdown is armed.
    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// The generation currently armed, if any.
    pub fn current(&self) -> Option<Generation> {
        self.pending.map(|p| p.generation)
    }

    /// Returns `true` if `generation` is the one currently armed.
    pub fn is_current(&self, generation: Generation) -> bool {
        self.current() == Some(generation)
    }

    /// Time left until expiry, or `None` when idle.
    pub fn remaining(&self) -> Option<Duration> {
        self.pending
            .map(|p| p.deadline.saturating_duration_since(Instant::now()))
    }

    /// Waits for the armed deadline, disarms, and reports the expiry.
    ///
    /// Pends forever while idle.
    pub async fn wait(&mut self) -> Expired {
        let Some(pending) = self.pending else {
            std::future::pending::<()>().await;
            unreachable!()
        };

        time::sleep_until(pending.deadline).await;

        let late_by = Instant::now().saturating_duration_since(pending.deadline);
        self.pending = None;
        self.metrics.expired += 1;
        trace!(generation = %pending.generation, late_ms = late_by.as_millis() as u64, "countdown expired");

        Expired {
            generation: pending.generation,
            late_by,
        }
    }

    /// Snapshot of the counters.
    pub fn metrics(&self) -> &CountdownMetrics {
        &self.metrics
    }
}
