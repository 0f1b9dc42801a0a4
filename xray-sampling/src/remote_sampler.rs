// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::{
    fmt,
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::sync::Notify;

use crate::{
    configuration::Config,
    constants::polling::{RULES_POLLING_JITTER, TARGET_POLLING_JITTER},
    error::SamplerError,
    log::{ConsoleLogger, Logger},
    rule_cache::RuleCache,
    sampling_client::{HttpSamplingClient, SamplingClient},
    sampling_rule::{SamplingDecision, SamplingRule},
    sampling_rule_config::{
        GetSamplingRulesResponse, GetSamplingTargetsRequest, GetSamplingTargetsResponse,
    },
    types::{RequestAttributes, SamplerResource, TraceIdLike},
    utils::{epoch_secs_f64, generate_client_id, with_jitter},
    worker::{ShutdownReceiver, WorkerHandle},
    xray_debug, xray_error, xray_warn,
};

/// Lifecycle of a [`RemoteSampler`]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerState {
    Uninitialized = 0,
    /// The worker runs but no rules were received yet
    Polling = 1,
    /// Rules were received at least once
    Steady = 2,
}

impl SamplerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SamplerState::Uninitialized,
            1 => SamplerState::Polling,
            _ => SamplerState::Steady,
        }
    }
}

/// Outcome of [`RemoteSampler::should_sample`]
#[derive(Debug, Clone)]
pub struct SamplingResult {
    pub decision: SamplingDecision,
    /// Rule which took the decision, `None` while no rules are known
    pub rule: Option<Arc<SamplingRule>>,
}

impl SamplingResult {
    fn not_sampled() -> Self {
        SamplingResult {
            decision: SamplingDecision::NotSampled,
            rule: None,
        }
    }

    pub fn is_sampled(&self) -> bool {
        self.decision.is_sampled()
    }

    pub fn rule_name(&self) -> Option<&str> {
        self.rule.as_deref().map(SamplingRule::name)
    }
}

/// What the sampler does after a targets response
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct TargetsOutcome {
    pub(crate) applied: usize,
    /// Shortest interval asked by the collector
    pub(crate) next_interval: Option<Duration>,
    pub(crate) refresh_rules: bool,
}

/// State shared by the sampler and its polling worker
struct SamplerShared {
    client_id: String,
    cache: RuleCache,
    resource: SamplerResource,
    state: AtomicU8,
    logger: Arc<dyn Logger>,
}

impl SamplerShared {
    fn new(resource: SamplerResource, logger: Arc<dyn Logger>) -> Self {
        SamplerShared {
            client_id: generate_client_id(),
            cache: RuleCache::new(),
            resource,
            state: AtomicU8::new(SamplerState::Uninitialized as u8),
            logger,
        }
    }

    fn set_state(&self, state: SamplerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn state(&self) -> SamplerState {
        SamplerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Replaces the cached rules. Returns false if the response carried no rule list.
    fn apply_rules_response(&self, response: GetSamplingRulesResponse) -> bool {
        let Some(records) = response.sampling_rule_records else {
            xray_error!(
                self.logger,
                "RemoteSampler: sampling rules response has no SamplingRuleRecords"
            );
            return false;
        };
        let mut rules = Vec::with_capacity(records.len());
        for record in records {
            match record.sampling_rule {
                Some(config) => rules.push(SamplingRule::new(config)),
                None => xray_debug!(
                    self.logger,
                    "RemoteSampler: skipping sampling rule record without a rule"
                ),
            }
        }
        let received = rules.len();
        self.cache.update_rules(rules);
        self.set_state(SamplerState::Steady);
        xray_debug!(
            self.logger,
            "RemoteSampler: updated sampling rules, {} received, {} cached",
            received,
            self.cache.len()
        );
        true
    }

    fn apply_targets_response(&self, response: &GetSamplingTargetsResponse) -> TargetsOutcome {
        let applied = self.cache.update_targets(&response.sampling_target_documents);

        let next_interval = response
            .sampling_target_documents
            .iter()
            .filter_map(|target| target.interval)
            .filter(|&interval| interval > 0)
            .min()
            .map(Duration::from_secs);

        let mut refresh_rules = match (response.last_rule_modification, self.cache.last_updated())
        {
            (Some(modified), Some(updated)) => modified > updated as f64,
            (Some(_), None) => true,
            (None, _) => false,
        };

        for unprocessed in &response.unprocessed_statistics {
            let rule_name = unprocessed.rule_name.as_deref().unwrap_or("<unknown>");
            let error_code = unprocessed.error_code.as_deref().unwrap_or("");
            let message = unprocessed.message.as_deref().unwrap_or("");
            if error_code.starts_with('4') {
                xray_warn!(
                    self.logger,
                    "RemoteSampler: statistics of rule {} rejected ({}): {}",
                    rule_name,
                    error_code,
                    message
                );
                refresh_rules = true;
            } else if error_code.starts_with('5') {
                xray_error!(
                    self.logger,
                    "RemoteSampler: collector failed to process statistics of rule {} ({}): {}",
                    rule_name,
                    error_code,
                    message
                );
            } else {
                xray_debug!(
                    self.logger,
                    "RemoteSampler: unprocessed statistics for rule {} ({}): {}",
                    rule_name,
                    error_code,
                    message
                );
            }
        }

        TargetsOutcome {
            applied,
            next_interval,
            refresh_rules,
        }
    }
}

/// Sampler driven by the rules and quotas of an X-Ray compatible collector.
///
/// A worker thread refreshes the rules every polling interval and exchanges statistics for
/// reservoir quotas every target interval. Decisions are taken locally from the cached rules
/// and never wait on the network.
///
/// ```no_run
/// use xray_sampling::{Config, RemoteSampler, SamplerResource};
///
/// let sampler = RemoteSampler::new(
///     &Config::builder().build(),
///     SamplerResource::new().with_service_name("checkout"),
/// )
/// .unwrap();
/// let result = sampler.should_sample(&0x1234_u128, &[("http.request.method", "GET")]);
/// println!("sampled: {}", result.is_sampled());
/// ```
pub struct RemoteSampler {
    shared: Arc<SamplerShared>,
    worker: WorkerHandle,
}

impl fmt::Debug for RemoteSampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSampler")
            .field("client_id", &self.shared.client_id)
            .field("state", &self.shared.state())
            .field("rules", &self.shared.cache.len())
            .finish()
    }
}

impl RemoteSampler {
    /// Creates a sampler polling the configured endpoint over HTTP, logging to the console
    pub fn new(config: &Config, resource: SamplerResource) -> Result<Self, SamplerError> {
        let client = HttpSamplingClient::new(config.endpoint(), config.request_timeout())?;
        let logger = Arc::new(ConsoleLogger::new(config.log_level()));
        Self::with_client(config, resource, client, logger)
    }

    /// Creates a sampler polling through `client`
    pub fn with_client<C>(
        config: &Config,
        resource: SamplerResource,
        client: C,
        logger: Arc<dyn Logger>,
    ) -> Result<Self, SamplerError>
    where
        C: SamplingClient + Send + 'static,
    {
        for error in config.errors() {
            xray_warn!(logger, "RemoteSampler: {}", error);
        }
        if config.polling_interval().is_zero() || config.target_polling_interval().is_zero() {
            return Err(SamplerError::InvalidPollingInterval);
        }

        let shared = Arc::new(SamplerShared::new(resource, logger.clone()));
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| SamplerError::RuntimeCreation(e.to_string()))?;
        let poller = Poller {
            client,
            shared: shared.clone(),
            rules_interval: config.polling_interval(),
            target_interval: config.target_polling_interval(),
            rules_refresh: Notify::new(),
        };

        shared.set_state(SamplerState::Polling);
        let worker = WorkerHandle::spawn("xray-sampler-poller", logger, move |shutdown| {
            rt.block_on(poller.run(shutdown));
        })
        .inspect_err(|_| shared.set_state(SamplerState::Uninitialized))?;

        Ok(RemoteSampler { shared, worker })
    }

    /// Random id identifying this sampler in statistics reports
    pub fn client_id(&self) -> &str {
        &self.shared.client_id
    }

    pub fn state(&self) -> SamplerState {
        self.shared.state()
    }

    pub fn rule_cache(&self) -> &RuleCache {
        &self.shared.cache
    }

    pub fn resource(&self) -> &SamplerResource {
        &self.shared.resource
    }

    /// Decides for a request of the sampler's own resource
    pub fn should_sample<T, A>(&self, trace_id: &T, attributes: &A) -> SamplingResult
    where
        T: TraceIdLike + ?Sized,
        A: RequestAttributes + ?Sized,
    {
        self.should_sample_with_resource(trace_id, attributes, &self.shared.resource)
    }

    /// Decides with the first cached rule matching the request.
    ///
    /// Without rules nothing is sampled.
    pub fn should_sample_with_resource<T, A>(
        &self,
        trace_id: &T,
        attributes: &A,
        resource: &SamplerResource,
    ) -> SamplingResult
    where
        T: TraceIdLike + ?Sized,
        A: RequestAttributes + ?Sized,
    {
        crate::catch_panic!(
            self.shared.logger,
            match self.shared.cache.get_matched_rule(attributes, resource) {
                Some(rule) => SamplingResult {
                    decision: rule.sample(trace_id),
                    rule: Some(rule),
                },
                None => SamplingResult::not_sampled(),
            },
            SamplingResult::not_sampled()
        )
    }

    /// Asks the worker to stop without waiting for it
    pub fn trigger_shutdown(&self) {
        self.worker.trigger_shutdown();
    }

    /// Stops polling and waits for the worker thread. In-flight requests are dropped.
    pub fn shutdown(&self, timeout: Duration) -> Result<(), SamplerError> {
        self.worker.trigger_shutdown();
        self.worker.wait_for_shutdown(timeout)
    }
}

/// Background side of the sampler, owned by the worker thread
struct Poller<C> {
    client: C,
    shared: Arc<SamplerShared>,
    rules_interval: Duration,
    target_interval: Duration,
    rules_refresh: Notify,
}

impl<C: SamplingClient> Poller<C> {
    async fn run(self, shutdown: ShutdownReceiver) {
        xray_debug!(self.shared.logger, "RemoteSampler: started polling worker");
        tokio::select! {
            _ = shutdown.cancelled() => {
                xray_debug!(self.shared.logger, "RemoteSampler: polling worker stopped");
            }
            _ = async { tokio::join!(self.rules_loop(), self.targets_loop()) } => {}
        }
    }

    async fn rules_loop(&self) {
        loop {
            self.refresh_rules().await;
            let wait = with_jitter(self.rules_interval, RULES_POLLING_JITTER);
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = self.rules_refresh.notified() => {
                    xray_debug!(self.shared.logger, "RemoteSampler: early rules refresh");
                }
            }
        }
    }

    async fn refresh_rules(&self) {
        match self.client.fetch_sampling_rules().await {
            Ok(response) => {
                self.shared.apply_rules_response(response);
            }
            Err(e) => {
                xray_warn!(
                    self.shared.logger,
                    "RemoteSampler: Failed to fetch sampling rules: {}",
                    e
                );
            }
        }
    }

    async fn targets_loop(&self) {
        let mut interval = self.target_interval;
        loop {
            tokio::time::sleep(with_jitter(interval, TARGET_POLLING_JITTER)).await;
            interval = self
                .refresh_targets()
                .await
                .unwrap_or(self.target_interval);
        }
    }

    /// Reports statistics and applies the returned targets. Returns the next interval if the
    /// collector asked for one.
    async fn refresh_targets(&self) -> Option<Duration> {
        let cache = &self.shared.cache;
        if cache.is_empty() {
            return None;
        }
        let request = GetSamplingTargetsRequest {
            sampling_statistics_documents: cache
                .create_statistics_documents(&self.shared.client_id, epoch_secs_f64()),
        };
        let response = match self.client.fetch_sampling_targets(&request).await {
            Ok(response) => response,
            Err(e) => {
                xray_warn!(
                    self.shared.logger,
                    "RemoteSampler: Failed to fetch sampling targets: {}",
                    e
                );
                cache.restore_statistics(&request.sampling_statistics_documents);
                return None;
            }
        };

        let outcome = self.shared.apply_targets_response(&response);
        xray_debug!(
            self.shared.logger,
            "RemoteSampler: applied {} sampling targets",
            outcome.applied
        );
        // Only wakes a rules loop that is waiting. A refresh already in flight is not
        // followed by a second one.
        if outcome.refresh_rules {
            self.rules_refresh.notify_waiters();
        }
        outcome.next_interval
    }
}
