// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use crate::constants::{numeric, rate};
use crate::types::TraceIdLike;
use numeric::{KNUTH_FACTOR, MAX_UINT_64BITS};

/// Keeps (100 * `sample_rate`)% of the traces.
///
/// The trial is keyed on the trace id, so every process sampling the same trace at the same
/// rate takes the same decision.
#[derive(Clone)]
pub struct RateSampler {
    sample_rate: f64,
    sampling_id_threshold: u64,
}

impl fmt::Debug for RateSampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateSampler")
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

impl RateSampler {
    fn calculate_threshold(rate: f64) -> u64 {
        if rate >= rate::MAX_SAMPLE_RATE {
            MAX_UINT_64BITS
        } else {
            (rate * (MAX_UINT_64BITS as f64)) as u64
        }
    }

    fn clamp(sample_rate: f64) -> f64 {
        if sample_rate.is_nan() {
            return rate::MIN_SAMPLE_RATE;
        }
        sample_rate.clamp(rate::MIN_SAMPLE_RATE, rate::MAX_SAMPLE_RATE)
    }

    /// `sample_rate` is clamped between 0.0 and 1.0 inclusive, NaN counts as 0.0.
    pub fn new(sample_rate: f64) -> Self {
        let clamped_rate = Self::clamp(sample_rate);
        RateSampler {
            sample_rate: clamped_rate,
            sampling_id_threshold: Self::calculate_threshold(clamped_rate),
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        let clamped_rate = Self::clamp(sample_rate);
        self.sample_rate = clamped_rate;
        self.sampling_id_threshold = Self::calculate_threshold(clamped_rate);
    }

    pub fn sample<T: TraceIdLike + ?Sized>(&self, trace_id: &T) -> bool {
        if self.sample_rate <= rate::MIN_SAMPLE_RATE {
            return false;
        }
        if self.sample_rate >= rate::MAX_SAMPLE_RATE {
            return true;
        }
        // Lower 64 bits of the trace id
        let hashed_id = (trace_id.to_u128() as u64).wrapping_mul(KNUTH_FACTOR);
        hashed_id <= self.sampling_id_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_debug_impl() {
        let sampler = RateSampler::new(0.5);
        let debug_output = format!("{:?}", sampler);
        assert!(debug_output.contains("RateSampler"));
        assert!(debug_output.contains("sample_rate: 0.5"));
    }

    #[test]
    fn test_rate_sampler_new() {
        let sampler = RateSampler::new(0.0);
        assert_eq!(sampler.sampling_id_threshold, 0);

        let sampler = RateSampler::new(0.25);
        assert_eq!(
            sampler.sampling_id_threshold,
            (0.25 * (MAX_UINT_64BITS as f64)) as u64
        );

        let sampler = RateSampler::new(1.0);
        assert_eq!(sampler.sampling_id_threshold, MAX_UINT_64BITS);

        assert_eq!(RateSampler::new(-0.1).sample_rate(), 0.0);
        assert_eq!(RateSampler::new(1.1).sample_rate(), 1.0);
        assert_eq!(RateSampler::new(f64::NAN).sample_rate(), 0.0);
    }

    #[test]
    fn test_rate_sampler_set_rate() {
        let mut sampler = RateSampler::new(0.25);
        sampler.set_sample_rate(0.75);
        assert_eq!(sampler.sample_rate(), 0.75);
        assert_eq!(
            sampler.sampling_id_threshold,
            (0.75 * (MAX_UINT_64BITS as f64)) as u64
        );

        sampler.set_sample_rate(-1.0);
        assert_eq!(sampler.sampling_id_threshold, 0);

        sampler.set_sample_rate(1.5);
        assert_eq!(sampler.sampling_id_threshold, MAX_UINT_64BITS);
    }

    #[test]
    fn test_fast_paths() {
        let never = RateSampler::new(0.0);
        let always = RateSampler::new(1.0);
        for id in [0u128, 1, u128::MAX, 0xdead_beef] {
            assert!(!never.sample(&id));
            assert!(always.sample(&id));
        }
    }

    #[test]
    fn test_decision_is_deterministic() {
        let sampler = RateSampler::new(0.5);
        // zero hashes to zero, always under the threshold
        assert!(sampler.sample(&0u128));

        let bytes: [u8; 16] = [
            0x5b, 0x8e, 0xfe, 0xf4, 0xc8, 0x20, 0x11, 0x9e, 0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc,
            0xde, 0xf0,
        ];
        let first = sampler.sample(&bytes);
        for _ in 0..10 {
            assert_eq!(sampler.sample(&bytes), first);
        }
    }

    #[test]
    fn test_sampled_proportion() {
        let sampler = RateSampler::new(0.5);
        let sampled = (1..=10_000u128).filter(|id| sampler.sample(id)).count();
        assert!(
            (4_500..=5_500).contains(&sampled),
            "sampled {sampled} out of 10000"
        );
    }
}
