// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! OpenTelemetry integration of X-Ray centralized sampling
//!
//! ```no_run
//! use opentelemetry_sdk::{trace::SdkTracerProvider, Resource};
//! use xray_sampling::Config;
//! use xray_sampling_opentelemetry::XrayRemoteSampler;
//!
//! let resource = Resource::builder().with_service_name("checkout").build();
//! let sampler = XrayRemoteSampler::new(&Config::builder().build(), &resource).unwrap();
//! let provider = SdkTracerProvider::builder()
//!     .with_resource(resource)
//!     .with_sampler(sampler.clone())
//!     .build();
//!
//! // ... application code ...
//!
//! let _ = provider.shutdown();
//! sampler.stop_pollers();
//! ```

mod otel_mappings;
mod sampler;

pub use otel_mappings::{resource_from_otel, OtelAttributes};
pub use sampler::XrayRemoteSampler;
