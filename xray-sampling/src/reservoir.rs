// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::utils::epoch_secs;

/// Outcome of asking a reservoir for a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservoirDecision {
    /// Consumed one unit of the quota assigned for the current second
    Reserved,
    /// Quota exhausted or unassigned, took the one sample allowed per second
    Borrowed,
    /// Nothing left this second
    NoCapacity,
}

/// Per-second sampling budget of a rule.
///
/// The capacity is the quota computed by the collector from the statistics of every client.
/// Until a quota is assigned, or once it expires, the capacity is zero and a rule with a non
/// zero reservoir size can only borrow one sample per second.
pub struct Reservoir {
    inner: Mutex<ReservoirState>,
}

struct ReservoirState {
    /// Reservoir size from the rule definition
    reservoir_size: u64,
    /// Samples per second assigned by the collector
    quota: Option<u64>,
    /// Epoch second from which the quota no longer applies
    quota_expires_at: Option<u64>,
    current_epoch: u64,
    used: u64,
    borrowed: bool,
}

impl ReservoirState {
    fn capacity_at(&self, now: u64) -> u64 {
        match (self.quota, self.quota_expires_at) {
            (Some(_), Some(expires_at)) if now >= expires_at => 0,
            (Some(quota), _) => quota,
            (None, _) => 0,
        }
    }

    fn roll_epoch(&mut self, now: u64) {
        if now != self.current_epoch {
            self.current_epoch = now;
            self.used = 0;
            self.borrowed = false;
        }
    }
}

impl fmt::Debug for Reservoir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("Reservoir")
            .field("reservoir_size", &state.reservoir_size)
            .field("quota", &state.quota)
            .field("quota_expires_at", &state.quota_expires_at)
            .field("used", &state.used)
            .finish()
    }
}

impl Reservoir {
    pub fn new(reservoir_size: u64) -> Self {
        Reservoir {
            inner: Mutex::new(ReservoirState {
                reservoir_size,
                quota: None,
                quota_expires_at: None,
                current_epoch: 0,
                used: 0,
                borrowed: false,
            }),
        }
    }

    // The state is a handful of counters, a panic mid-update leaves them usable
    fn lock(&self) -> MutexGuard<'_, ReservoirState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn take(&self) -> ReservoirDecision {
        self.take_at(epoch_secs())
    }

    /// Takes a sample from the budget of the epoch second `now`
    pub fn take_at(&self, now: u64) -> ReservoirDecision {
        let mut state = self.lock();
        state.roll_epoch(now);

        if state.used < state.capacity_at(now) {
            state.used += 1;
            return ReservoirDecision::Reserved;
        }
        if !state.borrowed && state.reservoir_size > 0 {
            state.borrowed = true;
            return ReservoirDecision::Borrowed;
        }
        ReservoirDecision::NoCapacity
    }

    /// Installs a quota assigned by the collector.
    ///
    /// `expires_at` is the epoch second from which the quota stops applying, `None` keeps it
    /// until the next assignment.
    pub fn set_quota(&self, quota: u64, expires_at: Option<u64>) {
        let mut state = self.lock();
        state.quota = Some(quota);
        state.quota_expires_at = expires_at;
    }

    pub fn quota(&self) -> Option<u64> {
        self.lock().quota
    }

    pub fn quota_expires_at(&self) -> Option<u64> {
        self.lock().quota_expires_at
    }

    /// Samples per second available at `now`, borrowing excluded
    pub fn capacity_at(&self, now: u64) -> u64 {
        self.lock().capacity_at(now)
    }

    pub fn reservoir_size(&self) -> u64 {
        self.lock().reservoir_size
    }
}
