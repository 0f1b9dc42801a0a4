// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Client side of AWS X-Ray centralized sampling
//!
//! This crate provides:
//! - Wildcard and attribute matching of sampling rules
//! - Per rule reservoirs with collector assigned quotas, and fixed rate sampling
//! - A rule cache ordered by priority, refreshed from the collector
//! - [`RemoteSampler`], which polls rules and targets in the background and takes sampling
//!   decisions locally
//!
//! It is tracer agnostic: requests are described through the [`TraceIdLike`] and
//! [`RequestAttributes`] traits.

/// Runs `$operation`, logging and returning `$fallback` if it panics
macro_rules! catch_panic {
    ($logger:expr, $operation:expr, $fallback:expr) => {
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| $operation)) {
            Ok(result) => result,
            Err(error) => {
                $crate::xray_error!($logger, "Panic caught {error:?}");
                $fallback
            }
        }
    };
}
pub(crate) use catch_panic;

pub mod configuration;
pub mod constants;
pub mod error;
pub mod glob_matcher;
pub mod log;
pub mod rate_sampler;
pub mod remote_sampler;
pub mod reservoir;
pub mod rule_cache;
pub mod sampling_client;
pub mod sampling_rule;
pub mod sampling_rule_config;
pub mod statistics;
pub mod types;

mod utils;
mod worker;

pub use configuration::{Config, ConfigBuilder, ConfigError};
pub use error::SamplerError;
pub use remote_sampler::{RemoteSampler, SamplerState, SamplingResult};
pub use rule_cache::RuleCache;
pub use sampling_client::{HttpSamplingClient, SamplingClient};
pub use sampling_rule::{SamplingDecision, SamplingRule};
pub use sampling_rule_config::SamplingRuleConfig;
pub use types::{RequestAttributes, SamplerResource, TraceIdLike, ValueLike};
