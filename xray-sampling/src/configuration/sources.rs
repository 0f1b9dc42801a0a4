// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::{fmt, str::FromStr};

/// Where a configuration value was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSourceOrigin {
    EnvVar,
    Code,
}

impl fmt::Display for ConfigSourceOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConfigSourceOrigin::EnvVar => "environment variable",
            ConfigSourceOrigin::Code => "code",
        })
    }
}

/// A configured value that could not be parsed and was ignored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub origin: ConfigSourceOrigin,
    /// Parser message
    pub reason: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ignoring {} {}={:?}: {}",
            self.origin, self.key, self.value, self.reason
        )
    }
}

/// Represent a source of raw configuration values
pub(crate) trait ConfigurationSource {
    fn origin(&self) -> ConfigSourceOrigin;

    fn get(&self, key: &'static str) -> Option<String>;
}

pub(crate) struct EnvSource;

impl ConfigurationSource for EnvSource {
    fn origin(&self) -> ConfigSourceOrigin {
        ConfigSourceOrigin::EnvVar
    }

    fn get(&self, key: &'static str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Sources by decreasing precedence
pub(crate) struct CompositeSource {
    sources: Vec<Box<dyn ConfigurationSource>>,
}

impl CompositeSource {
    pub fn new() -> Self {
        CompositeSource {
            sources: Vec::new(),
        }
    }

    pub fn default_sources() -> Self {
        let mut sources = Self::new();
        sources.add_source(EnvSource);
        sources
    }

    pub fn add_source<C: ConfigurationSource + 'static>(&mut self, source: C) {
        self.sources.push(Box::new(source));
    }

    /// First value of `key` that parses as `T`.
    ///
    /// Values that fail to parse are skipped and reported in `errors`.
    pub fn get_parse<T>(&self, key: &'static str, errors: &mut Vec<ConfigError>) -> Option<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.sources.iter().find_map(|source| {
            let value = source.get(key)?;
            value
                .trim()
                .parse()
                .inspect_err(|e: &T::Err| {
                    errors.push(ConfigError {
                        key,
                        reason: e.to_string(),
                        value: value.clone(),
                        origin: source.origin(),
                    })
                })
                .ok()
        })
    }
}

#[cfg(test)]
pub(crate) struct HashMapSource {
    map: std::collections::HashMap<&'static str, String>,
    origin: ConfigSourceOrigin,
}

#[cfg(test)]
impl HashMapSource {
    pub(crate) fn new<const N: usize>(
        entries: [(&'static str, &str); N],
        origin: ConfigSourceOrigin,
    ) -> Self {
        HashMapSource {
            map: entries
                .into_iter()
                .map(|(k, v)| (k, v.to_string()))
                .collect(),
            origin,
        }
    }
}

#[cfg(test)]
impl ConfigurationSource for HashMapSource {
    fn origin(&self) -> ConfigSourceOrigin {
        self.origin
    }

    fn get(&self, key: &'static str) -> Option<String> {
        self.map.get(key).cloned()
    }
}
