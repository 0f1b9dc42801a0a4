// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Request counts of a rule over one reporting cycle
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatisticsSnapshot {
    pub matched: u64,
    pub sampled: u64,
    pub borrowed: u64,
}

/// Counters reported to the collector on every targets poll.
///
/// All three counters live under one lock so a snapshot never mixes two cycles.
#[derive(Debug, Default)]
pub struct Statistics {
    inner: Mutex<StatisticsSnapshot>,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StatisticsSnapshot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records one matched request. `borrowed` implies `sampled`.
    pub fn record(&self, sampled: bool, borrowed: bool) {
        let mut counts = self.lock();
        counts.matched += 1;
        if sampled || borrowed {
            counts.sampled += 1;
        }
        if borrowed {
            counts.borrowed += 1;
        }
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        *self.lock()
    }

    /// Returns the current counts and zeroes them
    pub fn take(&self) -> StatisticsSnapshot {
        std::mem::take(&mut *self.lock())
    }

    pub fn reset(&self) {
        *self.lock() = StatisticsSnapshot::default();
    }

    /// Adds back counts that could not be delivered
    pub fn restore(&self, snapshot: StatisticsSnapshot) {
        let mut counts = self.lock();
        counts.matched += snapshot.matched;
        counts.sampled += snapshot.sampled;
        counts.borrowed += snapshot.borrowed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_record() {
        let stats = Statistics::new();
        stats.record(false, false);
        stats.record(true, false);
        stats.record(true, true);
        assert_eq!(
            stats.snapshot(),
            StatisticsSnapshot {
                matched: 3,
                sampled: 2,
                borrowed: 1,
            }
        );
    }

    #[test]
    fn test_take_resets() {
        let stats = Statistics::new();
        stats.record(true, false);
        let first = stats.take();
        assert_eq!(first.matched, 1);
        assert_eq!(stats.snapshot(), StatisticsSnapshot::default());

        stats.record(false, false);
        stats.restore(first);
        assert_eq!(
            stats.snapshot(),
            StatisticsSnapshot {
                matched: 2,
                sampled: 1,
                borrowed: 0,
            }
        );

        stats.reset();
        assert_eq!(stats.snapshot(), StatisticsSnapshot::default());
    }

    #[test]
    fn test_concurrent_take_loses_nothing() {
        let stats = Arc::new(Statistics::new());
        let writers: Vec<_> = (0..4)
            .map(|_| {
                let stats = stats.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.record(true, false);
                    }
                })
            })
            .collect();

        let mut total = StatisticsSnapshot::default();
        for _ in 0..50 {
            let snapshot = stats.take();
            total.matched += snapshot.matched;
            total.sampled += snapshot.sampled;
        }
        for writer in writers {
            writer.join().unwrap();
        }
        let rest = stats.take();
        assert_eq!(total.matched + rest.matched, 4000);
        assert_eq!(total.sampled + rest.sampled, 4000);
    }
}
