// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! X-Ray remote OTel Sampler

use std::{sync::Arc, time::Duration};

use opentelemetry::trace::{SamplingDecision, SamplingResult, TraceContextExt};
use opentelemetry_sdk::{trace::ShouldSample, Resource};
use xray_sampling::{Config, RemoteSampler, SamplerError};

use crate::otel_mappings::{resource_from_otel, OtelAttributes};

/// OpenTelemetry sampler following the X-Ray centralized sampling rules.
///
/// Child spans follow the sampling decision of their parent. Root spans are decided by the
/// wrapped [`RemoteSampler`], sampled requests are recorded and exported while the others
/// are dropped.
#[derive(Debug, Clone)]
pub struct XrayRemoteSampler {
    sampler: Arc<RemoteSampler>,
}

impl XrayRemoteSampler {
    /// Creates a sampler polling the collector of `config` for the service described by
    /// `resource`
    pub fn new(config: &Config, resource: &Resource) -> Result<Self, SamplerError> {
        Ok(Self::from_remote_sampler(RemoteSampler::new(
            config,
            resource_from_otel(resource),
        )?))
    }

    pub fn from_remote_sampler(sampler: RemoteSampler) -> Self {
        Self {
            sampler: Arc::new(sampler),
        }
    }

    pub fn remote_sampler(&self) -> &RemoteSampler {
        &self.sampler
    }

    /// Stops the background polling without waiting for it. Decisions keep using the last
    /// known rules.
    pub fn stop_pollers(&self) {
        self.sampler.trigger_shutdown();
    }

    /// Stops the background polling and waits for it to finish
    pub fn shutdown(&self, timeout: Duration) -> Result<(), SamplerError> {
        self.sampler.shutdown(timeout)
    }
}

impl ShouldSample for XrayRemoteSampler {
    fn should_sample(
        &self,
        parent_context: Option<&opentelemetry::Context>,
        trace_id: opentelemetry::trace::TraceId,
        _name: &str,
        _span_kind: &opentelemetry::trace::SpanKind,
        attributes: &[opentelemetry::KeyValue],
        _links: &[opentelemetry::trace::Link],
    ) -> SamplingResult {
        let is_parent_sampled = parent_context
            .filter(|c| c.has_active_span())
            .map(|c| c.span().span_context().trace_flags().is_sampled());

        let is_sampled = match is_parent_sampled {
            Some(sampled) => sampled,
            None => self
                .sampler
                .should_sample(&trace_id.to_bytes(), &OtelAttributes(attributes))
                .is_sampled(),
        };

        SamplingResult {
            decision: if is_sampled {
                SamplingDecision::RecordAndSample
            } else {
                SamplingDecision::Drop
            },
            attributes: Vec::new(),
            trace_state: parent_context
                .map(|c| c.span().span_context().trace_state().clone())
                .unwrap_or_default(),
        }
    }
}
