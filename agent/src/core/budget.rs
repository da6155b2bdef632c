//! Consecutive-failure accounting for the agent loop.

/// Counts consecutive faulty turns. A clean turn resets the count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureStreak {
    count: u32,
    limit: u32,
}

impl FailureStreak {
    pub fn new(limit: u32) -> Self {
        Self { count: 0, limit }
    }

    /// Record a turn. Returns `true` once the limit is reached.
    pub fn record(&mut self, faulty: bool) -> bool {
        if faulty {
            self.count += 1;
        } else {
            self.count = 0;
        }
        self.exhausted()
    }

    pub fn exhausted(&self) -> bool {
        self.count >= self.limit
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}
