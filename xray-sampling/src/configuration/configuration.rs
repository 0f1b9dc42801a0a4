// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::{borrow::Cow, str::FromStr, time::Duration};

use super::sources::{CompositeSource, ConfigError};
use crate::{constants::polling, log::LevelFilter};

#[derive(Debug, Clone)]
#[non_exhaustive]
/// Configuration of the remote sampler
///
/// # Usage
/// ```
/// use std::time::Duration;
/// use xray_sampling::Config;
///
/// // This pulls configuration from the environment
/// let mut builder = Config::builder();
///
/// // Manual overrides
/// builder
///     .set_endpoint("http://collector:2000".into())
///     .set_target_polling_interval(Duration::from_secs(5));
///
/// let config = builder.build();
/// assert_eq!(config.endpoint(), "http://collector:2000");
/// ```
pub struct Config {
    /// Base url of the sampling rules and targets API
    endpoint: Cow<'static, str>,
    /// Period of the rules refresh
    polling_interval: Duration,
    /// Default period of the targets refresh, the collector may shorten it
    target_polling_interval: Duration,
    /// Connect and overall timeout of one request to the collector
    request_timeout: Duration,
    log_level: LevelFilter,
    /// Values of the sources that were ignored
    errors: Vec<ConfigError>,
}

const ENDPOINT: &str = "XRAY_SAMPLER_ENDPOINT";
const POLLING_INTERVAL: &str = "XRAY_SAMPLER_POLLING_INTERVAL_MS";
const TARGET_POLLING_INTERVAL: &str = "XRAY_SAMPLER_TARGET_POLLING_INTERVAL_MS";
const REQUEST_TIMEOUT: &str = "XRAY_SAMPLER_REQUEST_TIMEOUT_MS";
const LOG_LEVEL: &str = "XRAY_SAMPLER_LOG_LEVEL";

/// Wrapper to parse a number of milliseconds
struct Millis(Duration);

impl FromStr for Millis {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(|ms| Millis(Duration::from_millis(ms)))
    }
}

impl Config {
    fn from_sources(sources: &CompositeSource) -> Self {
        let default = Config::default();
        let mut errors = Vec::new();

        let mut millis = |key: &'static str, default: Duration| {
            sources
                .get_parse::<Millis>(key, &mut errors)
                .map_or(default, |Millis(d)| d)
        };
        let polling_interval = millis(POLLING_INTERVAL, default.polling_interval);
        let target_polling_interval =
            millis(TARGET_POLLING_INTERVAL, default.target_polling_interval);
        let request_timeout = millis(REQUEST_TIMEOUT, default.request_timeout);

        Self {
            endpoint: sources
                .get_parse::<String>(ENDPOINT, &mut errors)
                .map_or(default.endpoint, Cow::Owned),
            polling_interval,
            target_polling_interval,
            request_timeout,
            log_level: sources
                .get_parse(LOG_LEVEL, &mut errors)
                .unwrap_or(default.log_level),
            errors,
        }
    }

    pub(crate) fn builder_with_sources(sources: &CompositeSource) -> ConfigBuilder {
        ConfigBuilder {
            config: Config::from_sources(sources),
        }
    }

    /// Creates a new builder to set overrides detected configuration
    pub fn builder() -> ConfigBuilder {
        Self::builder_with_sources(&CompositeSource::default_sources())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn polling_interval(&self) -> Duration {
        self.polling_interval
    }

    pub fn target_polling_interval(&self) -> Duration {
        self.target_polling_interval
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    /// Configured values that could not be parsed, their defaults were used instead
    pub fn errors(&self) -> &[ConfigError] {
        &self.errors
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            endpoint: Cow::Borrowed(polling::DEFAULT_ENDPOINT),
            polling_interval: polling::DEFAULT_RULES_POLLING_INTERVAL,
            target_polling_interval: polling::DEFAULT_TARGET_POLLING_INTERVAL,
            request_timeout: polling::DEFAULT_REQUEST_TIMEOUT,
            log_level: LevelFilter::default(),
            errors: Vec::new(),
        }
    }
}

pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Finalizes the builder and returns the configuration
    pub fn build(self) -> Config {
        self.config
    }

    fn overridden(&mut self, key: &'static str) {
        self.config.errors.retain(|e| e.key != key);
    }

    pub fn set_endpoint(&mut self, endpoint: Cow<'static, str>) -> &mut Self {
        self.config.endpoint = endpoint;
        self.overridden(ENDPOINT);
        self
    }

    pub fn set_polling_interval(&mut self, interval: Duration) -> &mut Self {
        self.config.polling_interval = interval;
        self.overridden(POLLING_INTERVAL);
        self
    }

    pub fn set_target_polling_interval(&mut self, interval: Duration) -> &mut Self {
        self.config.target_polling_interval = interval;
        self.overridden(TARGET_POLLING_INTERVAL);
        self
    }

    pub fn set_request_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.config.request_timeout = timeout;
        self.overridden(REQUEST_TIMEOUT);
        self
    }

    pub fn set_log_level(&mut self, log_level: LevelFilter) -> &mut Self {
        self.config.log_level = log_level;
        self.overridden(LOG_LEVEL);
        self
    }
}
