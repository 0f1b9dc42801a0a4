// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Shared constants for the xray-sampling crate

/// Sampling rate limits
pub mod rate {
    /// Maximum sampling rate
    pub const MAX_SAMPLE_RATE: f64 = 1.0;
    /// Minimum sampling rate
    pub const MIN_SAMPLE_RATE: f64 = 0.0;
}

/// Numeric constants used in sampling algorithms
pub mod numeric {
    /// Knuth's multiplicative hash factor for deterministic sampling
    pub const KNUTH_FACTOR: u64 = 1_111_111_111_111_111_111;
    /// Maximum 64-bit unsigned integer value
    pub const MAX_UINT_64BITS: u64 = u64::MAX;
}

/// Rule defaults, mirroring what the collector assumes for missing fields
pub mod rule {
    /// Name of the catch-all rule
    pub const DEFAULT_RULE_NAME: &str = "Default";
    /// Priority of the catch-all rule, evaluated after every other rule
    pub const DEFAULT_RULE_PRIORITY: i64 = 10000;
    /// Reservoir of the locally synthesized catch-all rule
    pub const DEFAULT_RESERVOIR_SIZE: i64 = 1;
    /// Fixed rate of the locally synthesized catch-all rule
    pub const DEFAULT_FIXED_RATE: f64 = 0.05;
    /// Version of the rule format
    pub const DEFAULT_RULE_VERSION: i64 = 1;
    /// Pattern matching everything
    pub const MATCH_ALL: &str = "*";
    /// Rules are considered stale after this many seconds without a refresh
    pub const RULE_CACHE_TTL_SECS: u64 = 3600;
}

/// Collector polling
pub mod polling {
    use std::time::Duration;

    /// Local collector sidecar
    pub const DEFAULT_ENDPOINT: &str = "http://localhost:2000";
    pub const DEFAULT_RULES_POLLING_INTERVAL: Duration = Duration::from_secs(300);
    pub const DEFAULT_TARGET_POLLING_INTERVAL: Duration = Duration::from_secs(10);
    /// Upper bound of the random delay added to each rules poll
    pub const RULES_POLLING_JITTER: Duration = Duration::from_secs(5);
    /// Upper bound of the random delay added to each targets poll
    pub const TARGET_POLLING_JITTER: Duration = Duration::from_millis(100);
    /// lowest timeout with no failures
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(3);
    pub const GET_SAMPLING_RULES_PATH: &str = "/GetSamplingRules";
    pub const SAMPLING_TARGETS_PATH: &str = "/SamplingTargets";
    /// Number of hex characters in a client id
    pub const CLIENT_ID_LEN: usize = 24;
}

/// Request and resource attribute keys, old and current semantic conventions
pub mod attr {
    pub const HTTP_TARGET: &str = "http.target";
    pub const URL_PATH: &str = "url.path";
    pub const HTTP_URL: &str = "http.url";
    pub const URL_FULL: &str = "url.full";
    pub const HTTP_METHOD: &str = "http.method";
    pub const HTTP_REQUEST_METHOD: &str = "http.request.method";
    pub const HTTP_HOST: &str = "http.host";
    pub const SERVER_ADDRESS: &str = "server.address";
    pub const CLIENT_ADDRESS: &str = "client.address";
    pub const AWS_LAMBDA_INVOKED_ARN: &str = "aws.lambda.invoked_arn";

    pub const SERVICE_NAME: &str = "service.name";
    pub const CLOUD_PLATFORM: &str = "cloud.platform";
    pub const CLOUD_RESOURCE_ID: &str = "cloud.resource_id";
    pub const AWS_ECS_CONTAINER_ARN: &str = "aws.ecs.container.arn";
    pub const AWS_ECS_CLUSTER_ARN: &str = "aws.ecs.cluster.arn";
    pub const AWS_EKS_CLUSTER_ARN: &str = "aws.eks.cluster.arn";
}

/// `cloud.platform` values and their X-Ray service types
pub mod cloud_platform {
    pub const AWS_EC2: &str = "aws_ec2";
    pub const AWS_ECS: &str = "aws_ecs";
    pub const AWS_EKS: &str = "aws_eks";
    pub const AWS_ELASTIC_BEANSTALK: &str = "aws_elastic_beanstalk";
    pub const AWS_LAMBDA: &str = "aws_lambda";

    /// Maps a `cloud.platform` value to the service type the collector uses in rules
    pub fn service_type(platform: &str) -> Option<&'static str> {
        match platform {
            AWS_EC2 => Some("AWS::EC2::Instance"),
            AWS_ECS => Some("AWS::ECS::Container"),
            AWS_EKS => Some("AWS::EKS::Container"),
            AWS_ELASTIC_BEANSTALK => Some("AWS::ElasticBeanstalk::Environment"),
            AWS_LAMBDA => Some("AWS::Lambda::Function"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::cloud_platform;

    #[test]
    fn test_service_type_mapping() {
        assert_eq!(
            cloud_platform::service_type("aws_lambda"),
            Some("AWS::Lambda::Function")
        );
        assert_eq!(
            cloud_platform::service_type("aws_eks"),
            Some("AWS::EKS::Container")
        );
        assert_eq!(cloud_platform::service_type("gcp_compute_engine"), None);
    }
}
