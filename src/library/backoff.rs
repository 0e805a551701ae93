//! Exponential backoff implementations

use std::{iter::Iterator, time::Duration};

/// Exponential backoff iterator
///
/// This struct implements the iterator trait and returns monotonically increasing values until a specified limit of iterations, specified by the `limit` field, is reached.
/// Each element in the Iterator is the previous element multiplied by the `multiplier` property.
#[derive(Debug, Clone)]
pub struct Backoff {
    retries: u32,
    limit: u32,
    multiplier: u32,
    initial: Duration,
    current: Duration,
}

impl Backoff {
    /// Creates a new instance which starts at `initial` and yields `limit` values
    pub fn new(initial: Duration, multiplier: u32, limit: u32) -> Self {
        Self {
            retries: 0,
            limit,
            multiplier,
            initial,
            current: initial,
        }
    }

    /// Largest value this instance will ever yield
    pub fn ceiling(&self) -> Duration {
        self.initial * self.multiplier.pow(self.limit)
    }

    /// Starts over from the initial value
    pub fn reset(&mut self) {
        self.retries = 0;
        self.current = self.initial;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(25), 2, 8)
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        self.retries += 1;

        if self.retries > self.limit {
            None
        } else {
            self.current *= self.multiplier;
            Some(self.current)
        }
    }
}
