// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Documents exchanged with the collector's sampling API

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt::Display;

use crate::constants::rule::{
    DEFAULT_RULE_NAME, DEFAULT_RULE_PRIORITY, DEFAULT_RULE_VERSION, MATCH_ALL,
};

fn default_rule_name() -> String {
    DEFAULT_RULE_NAME.to_string()
}

fn default_priority() -> i64 {
    DEFAULT_RULE_PRIORITY
}

fn default_version() -> i64 {
    DEFAULT_RULE_VERSION
}

fn match_all() -> String {
    MATCH_ALL.to_string()
}

// Explicit nulls take the same defaults as missing fields
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_match_all<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(match_all))
}

fn null_as_default_rule_name<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_rule_name))
}

fn null_as_default_priority<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<i64>::deserialize(deserializer)?.unwrap_or_else(default_priority))
}

fn null_as_default_version<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<i64>::deserialize(deserializer)?.unwrap_or_else(default_version))
}

/// Definition of a sampling rule, as returned by `GetSamplingRules`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct SamplingRuleConfig {
    #[serde(default = "default_rule_name", deserialize_with = "null_as_default_rule_name")]
    pub rule_name: String,

    #[serde(rename = "RuleARN", default, skip_serializing_if = "Option::is_none")]
    pub rule_arn: Option<String>,

    /// Lower values are evaluated first
    #[serde(
        default = "default_priority",
        deserialize_with = "null_as_default_priority"
    )]
    pub priority: i64,

    /// Samples per second the rule guarantees across all clients
    #[serde(default, deserialize_with = "null_as_default")]
    pub reservoir_size: i64,

    /// Share of the requests sampled once the reservoir is exhausted
    #[serde(default, deserialize_with = "null_as_default")]
    pub fixed_rate: f64,

    #[serde(default = "match_all", deserialize_with = "null_as_match_all")]
    pub service_name: String,

    #[serde(default = "match_all", deserialize_with = "null_as_match_all")]
    pub service_type: String,

    #[serde(default = "match_all", deserialize_with = "null_as_match_all")]
    pub host: String,

    #[serde(
        rename = "HTTPMethod",
        default = "match_all",
        deserialize_with = "null_as_match_all"
    )]
    pub http_method: String,

    #[serde(
        rename = "URLPath",
        default = "match_all",
        deserialize_with = "null_as_match_all"
    )]
    pub url_path: String,

    #[serde(
        rename = "ResourceARN",
        default = "match_all",
        deserialize_with = "null_as_match_all"
    )]
    pub resource_arn: String,

    /// Request attributes that must all be present and match
    #[serde(default, deserialize_with = "null_as_default")]
    pub attributes: HashMap<String, String>,

    #[serde(default = "default_version", deserialize_with = "null_as_default_version")]
    pub version: i64,
}

impl Default for SamplingRuleConfig {
    fn default() -> Self {
        SamplingRuleConfig {
            rule_name: default_rule_name(),
            rule_arn: None,
            priority: default_priority(),
            reservoir_size: 0,
            fixed_rate: 0.0,
            service_name: match_all(),
            service_type: match_all(),
            host: match_all(),
            http_method: match_all(),
            url_path: match_all(),
            resource_arn: match_all(),
            attributes: HashMap::new(),
            version: default_version(),
        }
    }
}

impl Display for SamplingRuleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", serde_json::to_string(self).unwrap_or_default())
    }
}

/// Body of `GetSamplingRules`, always an empty object
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct GetSamplingRulesRequest {}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct SamplingRuleRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampling_rule: Option<SamplingRuleConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct GetSamplingRulesResponse {
    /// `None` when the collector omitted the field, which is not the same as no rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampling_rule_records: Option<Vec<SamplingRuleRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

impl GetSamplingRulesResponse {
    /// Rule definitions of the records that carry one
    pub fn rule_configs(&self) -> impl Iterator<Item = &SamplingRuleConfig> {
        self.sampling_rule_records
            .iter()
            .flatten()
            .filter_map(|record| record.sampling_rule.as_ref())
    }
}

/// Counts of one rule over the last reporting cycle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct SamplingStatisticsDocument {
    #[serde(rename = "ClientID")]
    pub client_id: String,
    pub rule_name: String,
    pub request_count: u64,
    pub borrow_count: u64,
    pub sampled_count: u64,
    /// Epoch seconds
    pub timestamp: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct GetSamplingTargetsRequest {
    pub sampling_statistics_documents: Vec<SamplingStatisticsDocument>,
}

/// Quota override computed by the collector for one rule
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct SamplingTargetDocument {
    pub rule_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_rate: Option<f64>,
    /// Seconds until the collector wants the next statistics report
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reservoir_quota: Option<u64>,
    /// Epoch seconds after which the quota no longer applies
    #[serde(
        rename = "ReservoirQuotaTTL",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub reservoir_quota_ttl: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct UnprocessedStatistic {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct GetSamplingTargetsResponse {
    /// Epoch seconds of the last rule change on the collector side
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_rule_modification: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sampling_target_documents: Vec<SamplingTargetDocument>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub unprocessed_statistics: Vec<UnprocessedStatistic>,
}
