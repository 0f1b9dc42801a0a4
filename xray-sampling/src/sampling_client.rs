// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use http_body_util::{BodyExt, Full};
use hyper::{body::Bytes, Method, Request};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    constants::polling::{GET_SAMPLING_RULES_PATH, SAMPLING_TARGETS_PATH},
    error::SamplerError,
    sampling_rule_config::{
        GetSamplingRulesRequest, GetSamplingRulesResponse, GetSamplingTargetsRequest,
        GetSamplingTargetsResponse,
    },
};

/// Access to the collector's sampling API.
///
/// Calls are driven by the sampler's own single threaded runtime, so the returned futures
/// don't need to be `Send`.
#[allow(async_fn_in_trait)]
pub trait SamplingClient {
    /// Fetches the full list of sampling rules
    async fn fetch_sampling_rules(&self) -> Result<GetSamplingRulesResponse>;

    /// Reports statistics and fetches the quotas computed from them
    async fn fetch_sampling_targets(
        &self,
        request: &GetSamplingTargetsRequest,
    ) -> Result<GetSamplingTargetsResponse>;
}

impl<C: SamplingClient + ?Sized> SamplingClient for Arc<C> {
    async fn fetch_sampling_rules(&self) -> Result<GetSamplingRulesResponse> {
        (**self).fetch_sampling_rules().await
    }

    async fn fetch_sampling_targets(
        &self,
        request: &GetSamplingTargetsRequest,
    ) -> Result<GetSamplingTargetsResponse> {
        (**self).fetch_sampling_targets(request).await
    }
}

/// JSON over HTTP client of the collector
#[derive(Debug, Clone)]
pub struct HttpSamplingClient {
    rules_url: hyper::Uri,
    targets_url: hyper::Uri,
    timeout: Duration,
}

/// Appends `path` to the path of `endpoint`, dropping its query
fn endpoint_url(endpoint: &str, path: &str) -> Result<hyper::Uri, SamplerError> {
    let invalid = || SamplerError::InvalidEndpoint(endpoint.to_string());
    let url = hyper::Uri::from_maybe_shared(endpoint.to_string()).map_err(|_| invalid())?;
    if url.scheme_str() != Some("http") || url.authority().is_none() {
        return Err(invalid());
    }
    let path_and_query = format!("{}{}", url.path().trim_end_matches('/'), path);
    let mut parts = url.into_parts();
    parts.path_and_query = Some(path_and_query.parse().map_err(|_| invalid())?);
    hyper::Uri::from_parts(parts).map_err(|_| invalid())
}

impl HttpSamplingClient {
    /// Fails with [`SamplerError::InvalidEndpoint`] unless `endpoint` is an absolute http url
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, SamplerError> {
        Ok(Self {
            rules_url: endpoint_url(endpoint, GET_SAMPLING_RULES_PATH)?,
            targets_url: endpoint_url(endpoint, SAMPLING_TARGETS_PATH)?,
            timeout,
        })
    }

    pub fn rules_url(&self) -> &hyper::Uri {
        &self.rules_url
    }

    pub fn targets_url(&self) -> &hyper::Uri {
        &self.targets_url
    }

    async fn post<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        url: &hyper::Uri,
        body: &Req,
    ) -> Result<Resp> {
        tokio::time::timeout(self.timeout, self.send(url, body))
            .await
            .map_err(|_| anyhow::anyhow!("Request to {} timed out after {:?}", url, self.timeout))?
    }

    async fn send<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        url: &hyper::Uri,
        body: &Req,
    ) -> Result<Resp> {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(self.timeout));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        let json_body = serde_json::to_string(body)
            .map_err(|e| anyhow::anyhow!("Failed to serialize request: {}", e))?;

        let req = Request::builder()
            .method(Method::POST)
            .uri(url.clone())
            .header("content-type", "application/json")
            .body(Full::new(Bytes::from(json_body)))
            .map_err(|e| anyhow::anyhow!("Failed to build request: {}", e))?;

        let response = client
            .request(req)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to send request: {}", e))?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "Collector returned error status: {}",
                response.status()
            ));
        }

        let body_bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read response body: {}", e))?
            .to_bytes();

        serde_json::from_slice(&body_bytes)
            .map_err(|e| anyhow::anyhow!("Failed to parse response: {}", e))
    }
}

impl SamplingClient for HttpSamplingClient {
    async fn fetch_sampling_rules(&self) -> Result<GetSamplingRulesResponse> {
        self.post(&self.rules_url, &GetSamplingRulesRequest {})
            .await
    }

    async fn fetch_sampling_targets(
        &self,
        request: &GetSamplingTargetsRequest,
    ) -> Result<GetSamplingTargetsResponse> {
        self.post(&self.targets_url, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_urls() {
        let client = HttpSamplingClient::new("http://localhost:2000", Duration::from_secs(1))
            .unwrap();
        assert_eq!(
            client.rules_url().to_string(),
            "http://localhost:2000/GetSamplingRules"
        );
        assert_eq!(
            client.targets_url().to_string(),
            "http://localhost:2000/SamplingTargets"
        );

        let client =
            HttpSamplingClient::new("http://10.0.0.1:2000/proxy/", Duration::from_secs(1))
                .unwrap();
        assert_eq!(
            client.rules_url().to_string(),
            "http://10.0.0.1:2000/proxy/GetSamplingRules"
        );
    }

    #[test]
    fn test_invalid_endpoints() {
        for endpoint in ["", "localhost:2000", "not a url", "/GetSamplingRules", "https://x:1"] {
            assert_eq!(
                HttpSamplingClient::new(endpoint, Duration::from_secs(1)).unwrap_err(),
                SamplerError::InvalidEndpoint(endpoint.to_string()),
                "endpoint: {endpoint:?}"
            );
        }
    }

    #[test]
    fn test_rules_request_body_is_empty_object() {
        assert_eq!(
            serde_json::to_string(&GetSamplingRulesRequest {}).unwrap(),
            "{}"
        );
    }

    #[tokio::test]
    async fn test_unreachable_collector_is_an_error() {
        // port 9 (discard) is expected to refuse connections
        let client =
            HttpSamplingClient::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        assert!(client.fetch_sampling_rules().await.is_err());
    }
}
