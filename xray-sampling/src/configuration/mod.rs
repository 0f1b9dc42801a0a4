// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#[allow(clippy::module_inception)]
mod configuration;
mod sources;

pub use configuration::{Config, ConfigBuilder};
pub use sources::{ConfigError, ConfigSourceOrigin};

#[cfg(test)]
pub(crate) use sources::{CompositeSource, HashMapSource};
