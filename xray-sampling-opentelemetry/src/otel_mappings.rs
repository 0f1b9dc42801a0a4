// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::borrow::Cow;

use opentelemetry::{Key, KeyValue, Value};
use opentelemetry_sdk::Resource;
use opentelemetry_semantic_conventions::resource::{
    AWS_ECS_CLUSTER_ARN, AWS_ECS_CONTAINER_ARN, AWS_EKS_CLUSTER_ARN, CLOUD_PLATFORM,
    CLOUD_RESOURCE_ID, SERVICE_NAME,
};
use xray_sampling::{RequestAttributes, SamplerResource};

/// Span attributes seen by the sampling rules.
///
/// Only string values are visible, a rule never matches a number or a boolean.
#[derive(Debug, Clone, Copy)]
pub struct OtelAttributes<'a>(pub &'a [KeyValue]);

impl RequestAttributes for OtelAttributes<'_> {
    fn get_str(&self, key: &str) -> Option<Cow<'_, str>> {
        self.0
            .iter()
            .find(|kv| kv.key.as_str() == key)
            .and_then(|kv| match &kv.value {
                Value::String(s) => Some(Cow::Borrowed(s.as_str())),
                _ => None,
            })
    }
}

fn resource_str(resource: &Resource, key: &'static str) -> Option<String> {
    match resource.get(&Key::from_static_str(key))? {
        Value::String(s) => Some(s.as_str().to_string()),
        _ => None,
    }
}

/// Extracts the attributes rules can match on from an OpenTelemetry resource
pub fn resource_from_otel(resource: &Resource) -> SamplerResource {
    let mut sampler_resource = SamplerResource::new();
    if let Some(service_name) = resource_str(resource, SERVICE_NAME) {
        sampler_resource = sampler_resource.with_service_name(service_name);
    }
    if let Some(platform) = resource_str(resource, CLOUD_PLATFORM) {
        sampler_resource = sampler_resource.with_cloud_platform(platform);
    }
    if let Some(arn) = resource_str(resource, AWS_ECS_CONTAINER_ARN) {
        sampler_resource = sampler_resource.with_ecs_container_arn(arn);
    }
    if let Some(arn) = resource_str(resource, AWS_ECS_CLUSTER_ARN) {
        sampler_resource = sampler_resource.with_ecs_cluster_arn(arn);
    }
    if let Some(arn) = resource_str(resource, AWS_EKS_CLUSTER_ARN) {
        sampler_resource = sampler_resource.with_eks_cluster_arn(arn);
    }
    if let Some(resource_id) = resource_str(resource, CLOUD_RESOURCE_ID) {
        sampler_resource = sampler_resource.with_cloud_resource_id(resource_id);
    }
    sampler_resource
}
