// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::borrow::Cow;
use std::fmt;
use std::sync::{PoisonError, RwLock};

use crate::constants::{attr, rule};
use crate::glob_matcher::{attribute_match, GlobMatcher};
use crate::rate_sampler::RateSampler;
use crate::reservoir::{Reservoir, ReservoirDecision};
use crate::sampling_rule_config::{SamplingRuleConfig, SamplingTargetDocument};
use crate::statistics::Statistics;
use crate::types::{RequestAttributes, SamplerResource, TraceIdLike};
use crate::utils::epoch_secs;

/// Decision taken by a rule for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingDecision {
    /// Sampled from the quota of the current second
    Reserved,
    /// Sampled as the one borrowed request of the current second
    Borrowed,
    /// Sampled by the fixed rate trial
    FixedRate,
    NotSampled,
}

impl SamplingDecision {
    pub fn is_sampled(&self) -> bool {
        !matches!(self, SamplingDecision::NotSampled)
    }
}

/// A sampling rule with its runtime state.
///
/// The definition never changes once built. The reservoir, the statistics and the fixed rate
/// override are updated by sampling and by collector targets, and survive rule refreshes as
/// long as the definition stays the same.
pub struct SamplingRule {
    config: SamplingRuleConfig,

    service_name: GlobMatcher,
    service_type: GlobMatcher,
    host: GlobMatcher,
    http_method: GlobMatcher,
    url_path: GlobMatcher,
    resource_arn: GlobMatcher,

    reservoir: Reservoir,
    statistics: Statistics,
    /// Fixed rate of the definition until a target overrides it
    rate_sampler: RwLock<RateSampler>,
}

impl fmt::Debug for SamplingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SamplingRule")
            .field("name", &self.config.rule_name)
            .field("priority", &self.config.priority)
            .field("reservoir", &self.reservoir)
            .field("fixed_rate", &self.fixed_rate())
            .finish()
    }
}

impl SamplingRule {
    pub fn new(mut config: SamplingRuleConfig) -> Self {
        if config.rule_name == rule::DEFAULT_RULE_NAME {
            config.priority = rule::DEFAULT_RULE_PRIORITY;
        }
        SamplingRule {
            service_name: GlobMatcher::new(&config.service_name),
            service_type: GlobMatcher::new(&config.service_type),
            host: GlobMatcher::new(&config.host),
            http_method: GlobMatcher::new(&config.http_method),
            url_path: GlobMatcher::new(&config.url_path),
            resource_arn: GlobMatcher::new(&config.resource_arn),
            reservoir: Reservoir::new(config.reservoir_size.max(0) as u64),
            statistics: Statistics::new(),
            rate_sampler: RwLock::new(RateSampler::new(config.fixed_rate)),
            config,
        }
    }

    /// Catch-all rule used when the collector does not send one
    pub fn default_rule() -> Self {
        SamplingRule::new(SamplingRuleConfig {
            reservoir_size: rule::DEFAULT_RESERVOIR_SIZE,
            fixed_rate: rule::DEFAULT_FIXED_RATE,
            ..SamplingRuleConfig::default()
        })
    }

    pub fn name(&self) -> &str {
        &self.config.rule_name
    }

    pub fn priority(&self) -> i64 {
        self.config.priority
    }

    pub fn config(&self) -> &SamplingRuleConfig {
        &self.config
    }

    pub fn is_default(&self) -> bool {
        self.config.rule_name == rule::DEFAULT_RULE_NAME
    }

    pub fn reservoir(&self) -> &Reservoir {
        &self.reservoir
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    /// Rate currently applied after the reservoir, target override included
    pub fn fixed_rate(&self) -> f64 {
        self.rate_sampler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .sample_rate()
    }

    /// True when both rules were built from the same definition
    pub fn is_definition_equal(&self, other: &SamplingRule) -> bool {
        self.config == other.config
    }

    /// Checks whether the request is covered by this rule.
    ///
    /// A dimension with no observed value is not compared. Custom attributes are always
    /// compared and must all be present.
    pub fn matches<A: RequestAttributes + ?Sized>(
        &self,
        attributes: &A,
        resource: &SamplerResource,
    ) -> bool {
        if self.is_default() {
            return true;
        }
        if !attribute_match(Some(attributes), &self.config.attributes) {
            return false;
        }

        let host = attributes
            .get_str(attr::HTTP_HOST)
            .or_else(|| attributes.get_str(attr::SERVER_ADDRESS))
            .or_else(|| attributes.get_str(attr::CLIENT_ADDRESS));
        let http_method = attributes
            .get_str(attr::HTTP_METHOD)
            .or_else(|| attributes.get_str(attr::HTTP_REQUEST_METHOD));
        let url = attributes
            .get_str(attr::HTTP_URL)
            .or_else(|| attributes.get_str(attr::URL_FULL));
        let url_path = attributes
            .get_str(attr::HTTP_TARGET)
            .or_else(|| attributes.get_str(attr::URL_PATH))
            .or_else(|| url.as_deref().and_then(path_from_url).map(Cow::Borrowed));
        let resource_arn = match resource.resource_arn() {
            Some(arn) => Some(Cow::Borrowed(arn)),
            None if resource.is_lambda() => attributes.get_str(attr::AWS_LAMBDA_INVOKED_ARN),
            None => None,
        };

        fn predicate(matcher: &GlobMatcher, observed: Option<&str>) -> bool {
            observed.is_none_or(|value| matcher.matches(Some(value)))
        }

        predicate(&self.host, host.as_deref())
            && predicate(&self.http_method, http_method.as_deref())
            && predicate(&self.service_name, resource.service_name())
            && predicate(&self.url_path, url_path.as_deref())
            && predicate(&self.service_type, resource.service_type())
            && predicate(&self.resource_arn, resource_arn.as_deref())
    }

    pub fn sample<T: TraceIdLike + ?Sized>(&self, trace_id: &T) -> SamplingDecision {
        self.sample_at(trace_id, epoch_secs())
    }

    /// Takes a decision at the epoch second `now` and records it in the statistics
    pub fn sample_at<T: TraceIdLike + ?Sized>(&self, trace_id: &T, now: u64) -> SamplingDecision {
        let decision = match self.reservoir.take_at(now) {
            ReservoirDecision::Reserved => SamplingDecision::Reserved,
            ReservoirDecision::Borrowed => SamplingDecision::Borrowed,
            ReservoirDecision::NoCapacity => {
                let sampled = self
                    .rate_sampler
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .sample(trace_id);
                if sampled {
                    SamplingDecision::FixedRate
                } else {
                    SamplingDecision::NotSampled
                }
            }
        };
        self.statistics.record(
            decision.is_sampled(),
            decision == SamplingDecision::Borrowed,
        );
        decision
    }

    /// Applies the quota and rate computed by the collector
    pub fn apply_target(&self, target: &SamplingTargetDocument) {
        self.apply_target_at(target, epoch_secs())
    }

    /// Applies a target received at the epoch second `now`. A quota without a TTL is
    /// already expired.
    pub fn apply_target_at(&self, target: &SamplingTargetDocument, now: u64) {
        if let Some(quota) = target.reservoir_quota {
            let expires_at = target
                .reservoir_quota_ttl
                .map_or(now, |ttl| ttl.max(0.0) as u64);
            self.reservoir.set_quota(quota, Some(expires_at));
        }
        if let Some(fixed_rate) = target.fixed_rate {
            self.rate_sampler
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .set_sample_rate(fixed_rate);
        }
    }
}

/// Path component of an absolute URL, `/` when the URL has none
fn path_from_url(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once("://")?;
    // the authority ends at the first of `/`, `?` or `#`
    let path = match rest.find(['/', '?', '#']) {
        Some(start) if rest[start..].starts_with('/') => &rest[start..],
        _ => return Some("/"),
    };
    let end = path.find(['?', '#']).unwrap_or(path.len());
    Some(&path[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const NOW: u64 = 1_700_000_000;

    fn rule(name: &str) -> SamplingRuleConfig {
        SamplingRuleConfig {
            rule_name: name.to_string(),
            priority: 1,
            ..SamplingRuleConfig::default()
        }
    }

    fn no_attributes() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn test_default_rule_matches_everything() {
        let default = SamplingRule::new(SamplingRuleConfig {
            priority: 5,
            host: "nothing-matches-this".to_string(),
            ..SamplingRuleConfig::default()
        });
        assert!(default.is_default());
        assert_eq!(default.priority(), 10000);
        assert!(default.matches(&[("http.host", "example.com")], &SamplerResource::new()));
    }

    #[test]
    fn test_synthesized_default_rule() {
        let default = SamplingRule::default_rule();
        assert_eq!(default.name(), "Default");
        assert_eq!(default.priority(), 10000);
        assert_eq!(default.reservoir().reservoir_size(), 1);
        assert_eq!(default.fixed_rate(), 0.05);
    }

    #[test]
    fn test_matches_all_predicates() {
        let rule = SamplingRule::new(SamplingRuleConfig {
            service_name: "checkout-*".to_string(),
            service_type: "AWS::EC2::Instance".to_string(),
            host: "*.example.com".to_string(),
            http_method: "GET".to_string(),
            url_path: "/api/*".to_string(),
            resource_arn: "arn:aws:ecs:*".to_string(),
            ..rule("all")
        });
        let resource = SamplerResource::new()
            .with_service_name("checkout-service")
            .with_cloud_platform("aws_ec2")
            .with_ecs_container_arn("arn:aws:ecs:us-east-1:123:container/abc");
        let attributes = [
            ("http.host", "shop.example.com"),
            ("http.method", "get"),
            ("http.target", "/api/cart"),
        ];
        assert!(rule.matches(&attributes, &resource));

        let attributes = [
            ("http.host", "shop.example.com"),
            ("http.method", "POST"),
            ("http.target", "/api/cart"),
        ];
        assert!(!rule.matches(&attributes, &resource));

        let other_service = resource.clone().with_service_name("billing");
        assert!(!rule.matches(&[("http.method", "GET")], &other_service));
    }

    #[test]
    fn test_missing_observed_value_is_not_compared() {
        let rule = SamplingRule::new(SamplingRuleConfig {
            host: "api.example.com".to_string(),
            http_method: "GET".to_string(),
            service_name: "checkout".to_string(),
            ..rule("partial")
        });
        assert!(rule.matches(&no_attributes(), &SamplerResource::new()));
        let resource = SamplerResource::new();
        assert!(!rule.matches(&[("server.address", "other.example.com")], &resource));
        assert!(rule.matches(&[("server.address", "api.example.com")], &resource));
    }

    #[test]
    fn test_current_semantic_conventions() {
        let rule = SamplingRule::new(SamplingRuleConfig {
            http_method: "POST".to_string(),
            url_path: "/orders/*".to_string(),
            ..rule("semconv")
        });
        let resource = SamplerResource::new();
        assert!(rule.matches(
            &[("http.request.method", "POST"), ("url.path", "/orders/42")],
            &resource
        ));
        assert!(rule.matches(
            &[
                ("http.request.method", "POST"),
                ("url.full", "https://shop.example.com/orders/42?expand=true")
            ],
            &resource
        ));
        assert!(!rule.matches(
            &[("http.url", "https://shop.example.com/carts/42")],
            &resource
        ));
        // no path at all in the URL
        assert!(!rule.matches(&[("http.url", "https://shop.example.com")], &resource));
    }

    #[test]
    fn test_custom_attributes_are_required() {
        let rule = SamplingRule::new(SamplingRuleConfig {
            attributes: HashMap::from([("tenant".to_string(), "gold-*".to_string())]),
            ..rule("attrs")
        });
        let resource = SamplerResource::new();
        assert!(rule.matches(&[("tenant", "gold-eu")], &resource));
        assert!(!rule.matches(&[("tenant", "silver")], &resource));
        assert!(!rule.matches(&no_attributes(), &resource));
    }

    #[test]
    fn test_lambda_resource_arn() {
        let rule = SamplingRule::new(SamplingRuleConfig {
            resource_arn: "arn:aws:lambda:*:function:checkout".to_string(),
            ..rule("lambda")
        });
        let resource = SamplerResource::new().with_cloud_platform("aws_lambda");
        assert!(rule.matches(
            &[(
                "aws.lambda.invoked_arn",
                "arn:aws:lambda:us-east-1:123:function:checkout"
            )],
            &resource
        ));
        assert!(!rule.matches(
            &[(
                "aws.lambda.invoked_arn",
                "arn:aws:lambda:us-east-1:123:function:billing"
            )],
            &resource
        ));
        let resource =
            resource.with_cloud_resource_id("arn:aws:lambda:eu-west-1:1:function:checkout");
        assert!(rule.matches(&no_attributes(), &resource));
    }

    #[test]
    fn test_sample_statistics() {
        let rule = SamplingRule::new(SamplingRuleConfig {
            reservoir_size: 1,
            fixed_rate: 0.0,
            ..rule("stats")
        });
        assert_eq!(rule.sample_at(&1u128, NOW), SamplingDecision::Borrowed);
        assert_eq!(rule.sample_at(&2u128, NOW), SamplingDecision::NotSampled);
        assert_eq!(rule.sample_at(&3u128, NOW), SamplingDecision::NotSampled);

        let stats = rule.statistics().take();
        assert_eq!(stats.matched, 3);
        assert_eq!(stats.sampled, 1);
        assert_eq!(stats.borrowed, 1);
    }

    #[test]
    fn test_fixed_rate_after_reservoir() {
        let rule = SamplingRule::new(SamplingRuleConfig {
            reservoir_size: 0,
            fixed_rate: 1.0,
            ..rule("always")
        });
        for id in 0..10u128 {
            assert_eq!(rule.sample_at(&id, NOW), SamplingDecision::FixedRate);
        }
        let stats = rule.statistics().snapshot();
        assert_eq!((stats.matched, stats.sampled, stats.borrowed), (10, 10, 0));
    }

    #[test]
    fn test_apply_target() {
        let rule = SamplingRule::new(SamplingRuleConfig {
            reservoir_size: 1,
            fixed_rate: 0.0,
            ..rule("target")
        });
        rule.apply_target(&SamplingTargetDocument {
            rule_name: "target".to_string(),
            fixed_rate: Some(1.0),
            interval: None,
            reservoir_quota: Some(2),
            reservoir_quota_ttl: Some((NOW + 10) as f64),
        });
        assert_eq!(rule.fixed_rate(), 1.0);
        assert_eq!(rule.sample_at(&1u128, NOW), SamplingDecision::Reserved);
        assert_eq!(rule.sample_at(&2u128, NOW), SamplingDecision::Reserved);
        assert_eq!(rule.sample_at(&3u128, NOW), SamplingDecision::Borrowed);
        assert_eq!(rule.sample_at(&4u128, NOW), SamplingDecision::FixedRate);

        // quota expired, back to borrowing
        assert_eq!(rule.sample_at(&5u128, NOW + 10), SamplingDecision::Borrowed);

        // definition is unchanged by targets
        assert!(rule.is_definition_equal(&SamplingRule::new(SamplingRuleConfig {
            reservoir_size: 1,
            fixed_rate: 0.0,
            ..self::rule("target")
        })));
    }

    #[test]
    fn test_quota_without_ttl_is_not_applied() {
        let rule = SamplingRule::new(SamplingRuleConfig {
            reservoir_size: 1,
            ..rule("no-ttl")
        });
        rule.apply_target_at(
            &SamplingTargetDocument {
                rule_name: "no-ttl".to_string(),
                reservoir_quota: Some(5),
                ..Default::default()
            },
            NOW,
        );
        assert_eq!(rule.reservoir().quota_expires_at(), Some(NOW));
        assert_eq!(rule.reservoir().capacity_at(NOW), 0);
        assert_eq!(rule.sample_at(&1u128, NOW), SamplingDecision::Borrowed);
        assert_eq!(rule.sample_at(&2u128, NOW), SamplingDecision::NotSampled);
    }

    #[test]
    fn test_path_from_url() {
        assert_eq!(path_from_url("http://host/a/b?c=d"), Some("/a/b"));
        assert_eq!(path_from_url("https://host"), Some("/"));
        assert_eq!(path_from_url("https://host/#frag"), Some("/"));
        assert_eq!(path_from_url("/relative/path"), None);
        assert_eq!(
            path_from_url("https://shop.example.com?redirect=/admin/delete"),
            Some("/")
        );
        assert_eq!(path_from_url("https://shop.example.com#/admin"), Some("/"));
        assert_eq!(path_from_url("http://host:8080/x?next=/y"), Some("/x"));
    }

    #[test]
    fn test_query_string_is_not_a_path() {
        let admin = SamplingRule::new(SamplingRuleConfig {
            url_path: "/admin/*".to_string(),
            ..rule("admin")
        });
        let resource = SamplerResource::new();

        let redirect = [(
            "url.full",
            "https://shop.example.com?redirect=/admin/delete",
        )];
        assert!(!admin.matches(&redirect, &resource));
        let fragment = [("http.url", "https://shop.example.com#/admin/users")];
        assert!(!admin.matches(&fragment, &resource));
        let direct = [("url.full", "https://shop.example.com/admin/users?page=2")];
        assert!(admin.matches(&direct, &resource));
    }
}
