//! Request deadline shared by the rasterize and recognize stages.

use std::time::Duration;
use tokio::time::Instant;

/// Same horizon tokio uses for an unbounded sleep.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// A fixed point in time after which no new work may start.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    at: Instant,
}

impl Deadline {
    /// A deadline `budget` from now.
    ///
    /// Budgets too large to represent saturate to a point about thirty
    /// years out instead of overflowing.
    pub fn after(budget: Duration) -> Self {
        let started = Instant::now();
        let at = started
            .checked_add(budget)
            .or_else(|| started.checked_add(FAR_FUTURE))
            .unwrap_or(started);
        Self { started, at }
    }

    pub fn at(&self) -> Instant {
        self.at
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Milliseconds since the deadline was armed.
    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}
