// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Type definitions and traits for sampling

use std::borrow::Cow;
use std::collections::HashMap;

use crate::constants::cloud_platform;

/// A trait for converting trace IDs to a numeric representation.
///
/// The conversion must be deterministic, the fixed rate trial hashes the lower 64 bits of the
/// returned value.
///
/// # Examples
///
/// ```
/// use xray_sampling::TraceIdLike;
///
/// struct MyTraceId(u128);
///
/// impl TraceIdLike for MyTraceId {
///     fn to_u128(&self) -> u128 {
///         self.0
///     }
/// }
/// ```
pub trait TraceIdLike {
    /// Converts the trace ID to a 128-bit unsigned integer.
    fn to_u128(&self) -> u128;
}

impl TraceIdLike for u128 {
    fn to_u128(&self) -> u128 {
        *self
    }
}

impl TraceIdLike for [u8; 16] {
    fn to_u128(&self) -> u128 {
        u128::from_be_bytes(*self)
    }
}

/// A trait for extracting string values from attribute values.
///
/// Only string values take part in rule matching, other kinds return `None`.
pub trait ValueLike {
    fn extract_string(&self) -> Option<Cow<'_, str>>;
}

impl ValueLike for String {
    fn extract_string(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(self.as_str()))
    }
}

impl ValueLike for &str {
    fn extract_string(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(*self))
    }
}

impl ValueLike for Cow<'_, str> {
    fn extract_string(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(self.as_ref()))
    }
}

impl<V: ValueLike> ValueLike for Option<V> {
    fn extract_string(&self) -> Option<Cow<'_, str>> {
        self.as_ref().and_then(ValueLike::extract_string)
    }
}

/// Per-request attributes a rule is matched against.
///
/// Implemented by the tracer integration, for example over a span's attribute slice.
pub trait RequestAttributes {
    /// Returns the string value stored under `key`, if any.
    fn get_str(&self, key: &str) -> Option<Cow<'_, str>>;
}

impl<V: ValueLike> RequestAttributes for HashMap<String, V> {
    fn get_str(&self, key: &str) -> Option<Cow<'_, str>> {
        self.get(key).and_then(ValueLike::extract_string)
    }
}

impl<K: AsRef<str>, V: ValueLike> RequestAttributes for [(K, V)] {
    fn get_str(&self, key: &str) -> Option<Cow<'_, str>> {
        self.iter()
            .find(|(k, _)| k.as_ref() == key)
            .and_then(|(_, v)| v.extract_string())
    }
}

impl<K: AsRef<str>, V: ValueLike, const N: usize> RequestAttributes for [(K, V); N] {
    fn get_str(&self, key: &str) -> Option<Cow<'_, str>> {
        self.as_slice().get_str(key)
    }
}

/// Static attributes describing the process reporting traces.
///
/// Rules can match on the service name, the service type derived from the cloud platform, and
/// the ARN of the resource hosting the service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SamplerResource {
    service_name: Option<String>,
    cloud_platform: Option<String>,
    ecs_container_arn: Option<String>,
    ecs_cluster_arn: Option<String>,
    eks_cluster_arn: Option<String>,
    cloud_resource_id: Option<String>,
}

impl SamplerResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_service_name(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = Some(service_name.into());
        self
    }

    pub fn with_cloud_platform(mut self, cloud_platform: impl Into<String>) -> Self {
        self.cloud_platform = Some(cloud_platform.into());
        self
    }

    pub fn with_ecs_container_arn(mut self, arn: impl Into<String>) -> Self {
        self.ecs_container_arn = Some(arn.into());
        self
    }

    pub fn with_ecs_cluster_arn(mut self, arn: impl Into<String>) -> Self {
        self.ecs_cluster_arn = Some(arn.into());
        self
    }

    pub fn with_eks_cluster_arn(mut self, arn: impl Into<String>) -> Self {
        self.eks_cluster_arn = Some(arn.into());
        self
    }

    pub fn with_cloud_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.cloud_resource_id = Some(resource_id.into());
        self
    }

    pub fn service_name(&self) -> Option<&str> {
        self.service_name.as_deref()
    }

    pub fn cloud_platform(&self) -> Option<&str> {
        self.cloud_platform.as_deref()
    }

    /// X-Ray service type for the cloud platform, `None` for unknown platforms
    pub fn service_type(&self) -> Option<&'static str> {
        self.cloud_platform
            .as_deref()
            .and_then(cloud_platform::service_type)
    }

    pub fn is_lambda(&self) -> bool {
        self.cloud_platform.as_deref() == Some(cloud_platform::AWS_LAMBDA)
    }

    /// ARN of the hosting resource.
    ///
    /// On Lambda this is the function's resource id. Elsewhere the ECS container ARN is
    /// preferred over the ECS cluster ARN, then the EKS cluster ARN.
    pub fn resource_arn(&self) -> Option<&str> {
        if self.is_lambda() {
            return self.cloud_resource_id.as_deref();
        }
        self.ecs_container_arn
            .as_deref()
            .or(self.ecs_cluster_arn.as_deref())
            .or(self.eks_cluster_arn.as_deref())
    }
}
