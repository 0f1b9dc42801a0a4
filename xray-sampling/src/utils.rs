// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::cell::RefCell;
use std::time::Duration;

use rand::{Rng, SeedableRng};

use crate::constants::polling::CLIENT_ID_LEN;

thread_local! {
    static RNG: RefCell<rand::rngs::SmallRng> = RefCell::new(rand::rngs::SmallRng::from_entropy());
}

/// Wall clock time in whole seconds since the UNIX epoch
pub(crate) fn epoch_secs() -> u64 {
    std::time::UNIX_EPOCH
        .elapsed()
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Wall clock time in fractional seconds since the UNIX epoch, as the collector expects it
pub(crate) fn epoch_secs_f64() -> f64 {
    std::time::UNIX_EPOCH
        .elapsed()
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Random identifier of `CLIENT_ID_LEN` lowercase hex characters
pub(crate) fn generate_client_id() -> String {
    RNG.with(|rng| {
        let mut rng = rng.borrow_mut();
        (0..CLIENT_ID_LEN)
            .map(|_| char::from_digit(rng.gen_range(0..16), 16).unwrap_or('0'))
            .collect()
    })
}

/// Returns `interval` plus a random delay in `[0, max_jitter)`
pub(crate) fn with_jitter(interval: Duration, max_jitter: Duration) -> Duration {
    let max_ms = max_jitter.as_millis() as u64;
    if max_ms == 0 {
        return interval;
    }
    let jitter = RNG.with(|rng| rng.borrow_mut().gen_range(0..max_ms));
    interval + Duration::from_millis(jitter)
}
