// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::constants::rule::RULE_CACHE_TTL_SECS;
use crate::sampling_rule::SamplingRule;
use crate::sampling_rule_config::{SamplingStatisticsDocument, SamplingTargetDocument};
use crate::statistics::StatisticsSnapshot;
use crate::types::{RequestAttributes, SamplerResource};
use crate::utils::epoch_secs;

/// Ordered set of sampling rules shared by the decision path and the pollers.
///
/// The list is rebuilt and swapped on every refresh, so a reader always scans a complete
/// rule set. It is kept sorted by priority, then by name.
pub struct RuleCache {
    inner: RwLock<RuleCacheState>,
}

struct RuleCacheState {
    rules: Arc<[Arc<SamplingRule>]>,
    /// Epoch seconds of the last refresh
    last_updated: Option<u64>,
}

impl fmt::Debug for RuleCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read();
        f.debug_struct("RuleCache")
            .field("rules", &state.rules)
            .field("last_updated", &state.last_updated)
            .finish()
    }
}

impl Default for RuleCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleCache {
    pub fn new() -> Self {
        RuleCache {
            inner: RwLock::new(RuleCacheState {
                rules: Arc::new([]),
                last_updated: None,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, RuleCacheState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RuleCacheState> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the current rules, in evaluation order
    pub fn rules(&self) -> Arc<[Arc<SamplingRule>]> {
        self.read().rules.clone()
    }

    pub fn len(&self) -> usize {
        self.read().rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().rules.is_empty()
    }

    pub fn last_updated(&self) -> Option<u64> {
        self.read().last_updated
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(epoch_secs())
    }

    /// True if the cache was never refreshed or its last refresh is older than the TTL
    pub fn is_expired_at(&self, now: u64) -> bool {
        match self.read().last_updated {
            None => true,
            Some(last_updated) => now > last_updated.saturating_add(RULE_CACHE_TTL_SECS),
        }
    }

    /// First rule, in evaluation order, covering the request
    pub fn get_matched_rule<A: RequestAttributes + ?Sized>(
        &self,
        attributes: &A,
        resource: &SamplerResource,
    ) -> Option<Arc<SamplingRule>> {
        let rules = self.rules();
        rules
            .iter()
            .find(|rule| rule.matches(attributes, resource))
            .cloned()
    }

    pub fn update_rules(&self, new_rules: Vec<SamplingRule>) {
        self.update_rules_at(new_rules, epoch_secs())
    }

    /// Replaces the rule set.
    ///
    /// A rule whose definition did not change keeps its current instance, and with it the
    /// state of its reservoir and statistics. Rules missing from `new_rules` are dropped. The
    /// `Default` rule is synthesized if absent. Duplicate names keep their first occurrence.
    pub fn update_rules_at(&self, new_rules: Vec<SamplingRule>, now: u64) {
        let mut new_rules = new_rules;
        if !new_rules.iter().any(SamplingRule::is_default) {
            new_rules.push(SamplingRule::default_rule());
        }

        let mut state = self.write();
        let mut rules: Vec<Arc<SamplingRule>> = {
            let current: HashMap<&str, &Arc<SamplingRule>> = state
                .rules
                .iter()
                .map(|rule| (rule.name(), rule))
                .collect();
            let mut seen = HashSet::new();
            new_rules
                .into_iter()
                .filter(|rule| seen.insert(rule.name().to_string()))
                .map(|rule| match current.get(rule.name()) {
                    Some(existing) if existing.is_definition_equal(&rule) => Arc::clone(existing),
                    _ => Arc::new(rule),
                })
                .collect()
        };
        rules.sort_by(|a, b| {
            a.priority()
                .cmp(&b.priority())
                .then_with(|| a.name().cmp(b.name()))
        });

        state.rules = rules.into();
        state.last_updated = Some(now);
    }

    /// Applies collector targets to the rules they name.
    ///
    /// Unknown rule names are ignored and rules without a target keep their current quota.
    /// Returns the number of targets applied.
    pub fn update_targets(&self, targets: &[SamplingTargetDocument]) -> usize {
        let rules = self.rules();
        targets
            .iter()
            .filter_map(|target| {
                let rule = rules.iter().find(|rule| rule.name() == target.rule_name)?;
                rule.apply_target(target);
                Some(())
            })
            .count()
    }

    /// Takes the statistics of every rule for a report, resetting them
    pub fn create_statistics_documents(
        &self,
        client_id: &str,
        timestamp: f64,
    ) -> Vec<SamplingStatisticsDocument> {
        self.rules()
            .iter()
            .map(|rule| {
                let snapshot = rule.statistics().take();
                SamplingStatisticsDocument {
                    client_id: client_id.to_string(),
                    rule_name: rule.name().to_string(),
                    request_count: snapshot.matched,
                    borrow_count: snapshot.borrowed,
                    sampled_count: snapshot.sampled,
                    timestamp,
                }
            })
            .collect()
    }

    /// Adds back the counts of a report that did not reach the collector
    pub fn restore_statistics(&self, documents: &[SamplingStatisticsDocument]) {
        let rules = self.rules();
        for document in documents {
            if let Some(rule) = rules.iter().find(|rule| rule.name() == document.rule_name) {
                rule.statistics().restore(StatisticsSnapshot {
                    matched: document.request_count,
                    sampled: document.sampled_count,
                    borrowed: document.borrow_count,
                });
            }
        }
    }
}
