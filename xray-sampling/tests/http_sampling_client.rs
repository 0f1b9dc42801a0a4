// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::{
    io::{BufRead, BufReader, Read, Write},
    net::{SocketAddr, TcpListener, TcpStream},
    sync::{Arc, Mutex},
    thread,
    time::{Duration, Instant},
};

use xray_sampling::{
    sampling_rule_config::{GetSamplingTargetsRequest, SamplingStatisticsDocument},
    Config, HttpSamplingClient, RemoteSampler, SamplerResource, SamplerState, SamplingClient,
};

const RULES_BODY: &str = r#"{
    "SamplingRuleRecords": [
        {
            "CreatedAt": 1.676038494E9,
            "ModifiedAt": 1.676038494E9,
            "SamplingRule": {
                "Attributes": {},
                "FixedRate": 0.05,
                "HTTPMethod": "*",
                "Host": "*",
                "Priority": 10000,
                "ReservoirSize": 1,
                "ResourceARN": "*",
                "RuleARN": "arn:aws:xray:us-east-1:999999999999:sampling-rule/Default",
                "RuleName": "Default",
                "ServiceName": "*",
                "ServiceType": "*",
                "URLPath": "*",
                "Version": 1
            }
        },
        {
            "CreatedAt": 1.67799933E9,
            "ModifiedAt": 1.67799933E9,
            "SamplingRule": {
                "Attributes": { "tier": "gold" },
                "FixedRate": 0.5,
                "HTTPMethod": "POST",
                "Host": "*",
                "Priority": 20,
                "ReservoirSize": 10,
                "ResourceARN": "*",
                "RuleARN": "arn:aws:xray:us-east-1:999999999999:sampling-rule/payments",
                "RuleName": "payments",
                "ServiceName": "shop",
                "ServiceType": "*",
                "URLPath": "/pay*",
                "Version": 1
            }
        }
    ]
}"#;

const TARGETS_BODY: &str = r#"{
    "LastRuleModification": 1.67799933E9,
    "SamplingTargetDocuments": [
        {
            "FixedRate": 0.1,
            "Interval": 10,
            "ReservoirQuota": 30,
            "ReservoirQuotaTTL": 1.707551387E9,
            "RuleName": "payments"
        }
    ],
    "UnprocessedStatistics": []
}"#;

/// Request seen by [`MiniCollector`]: path and body
type Recorded = (String, String);

/// Single threaded HTTP/1.1 collector answering every request of a path with a fixed
/// status and body
struct MiniCollector {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MiniCollector {
    fn start(routes: Vec<(&'static str, u16, &'static str)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = requests.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                serve(stream, &routes, &recorded);
            }
        });
        MiniCollector { addr, requests }
    }

    fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

fn serve(
    mut stream: TcpStream,
    routes: &[(&'static str, u16, &'static str)],
    recorded: &Mutex<Vec<Recorded>>,
) -> Option<()> {
    let mut reader = BufReader::new(stream.try_clone().ok()?);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).ok()?;
    let path = request_line.split_whitespace().nth(1)?.to_string();

    let mut content_length = 0;
    loop {
        let mut header = String::new();
        reader.read_line(&mut header).ok()?;
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().ok()?;
            }
        }
    }
    let mut body = vec![0; content_length];
    reader.read_exact(&mut body).ok()?;
    recorded
        .lock()
        .unwrap()
        .push((path.clone(), String::from_utf8_lossy(&body).into_owned()));

    let (status, response) = routes
        .iter()
        .find(|(route, _, _)| *route == path)
        .map(|(_, status, body)| (*status, *body))
        .unwrap_or((404, "{}"));
    let reply = format!(
        "HTTP/1.1 {status} Status\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{response}",
        response.len()
    );
    stream.write_all(reply.as_bytes()).ok()
}

fn client(collector: &MiniCollector) -> HttpSamplingClient {
    HttpSamplingClient::new(&collector.endpoint(), Duration::from_secs(2)).unwrap()
}

#[tokio::test]
async fn test_fetch_sampling_rules() {
    let collector = MiniCollector::start(vec![("/GetSamplingRules", 200, RULES_BODY)]);

    let response = client(&collector).fetch_sampling_rules().await.unwrap();

    let names: Vec<_> = response
        .rule_configs()
        .map(|rule| rule.rule_name.as_str())
        .collect();
    assert_eq!(names, ["Default", "payments"]);
    let payments = response.rule_configs().nth(1).unwrap();
    assert_eq!(payments.http_method, "POST");
    assert_eq!(payments.attributes.get("tier").map(String::as_str), Some("gold"));

    assert_eq!(
        collector.requests(),
        [("/GetSamplingRules".to_string(), "{}".to_string())]
    );
}

#[tokio::test]
async fn test_fetch_sampling_targets() {
    let collector = MiniCollector::start(vec![("/SamplingTargets", 200, TARGETS_BODY)]);
    let request = GetSamplingTargetsRequest {
        sampling_statistics_documents: vec![SamplingStatisticsDocument {
            client_id: "0123456789abcdef01234567".to_string(),
            rule_name: "payments".to_string(),
            request_count: 12,
            borrow_count: 1,
            sampled_count: 4,
            timestamp: 1_700_000_000.5,
        }],
    };

    let response = client(&collector)
        .fetch_sampling_targets(&request)
        .await
        .unwrap();

    assert_eq!(response.last_rule_modification, Some(1.67799933E9));
    let target = &response.sampling_target_documents[0];
    assert_eq!(target.rule_name, "payments");
    assert_eq!(target.reservoir_quota, Some(30));
    assert_eq!(target.interval, Some(10));

    let requests = collector.requests();
    assert_eq!(requests[0].0, "/SamplingTargets");
    let sent: serde_json::Value = serde_json::from_str(&requests[0].1).unwrap();
    assert_eq!(
        sent,
        serde_json::json!({
            "SamplingStatisticsDocuments": [{
                "ClientID": "0123456789abcdef01234567",
                "RuleName": "payments",
                "RequestCount": 12,
                "BorrowCount": 1,
                "SampledCount": 4,
                "Timestamp": 1_700_000_000.5
            }]
        })
    );
}

#[tokio::test]
async fn test_error_status_is_an_error() {
    let collector = MiniCollector::start(vec![("/GetSamplingRules", 500, "{}")]);

    let err = client(&collector).fetch_sampling_rules().await.unwrap_err();
    assert!(err.to_string().contains("500"), "{err}");
}

#[tokio::test]
async fn test_malformed_body_is_an_error() {
    let collector = MiniCollector::start(vec![("/GetSamplingRules", 200, "not json")]);

    let err = client(&collector).fetch_sampling_rules().await.unwrap_err();
    assert!(err.to_string().starts_with("Failed to parse response"), "{err}");
}

#[test]
fn test_remote_sampler_over_http() {
    let collector = MiniCollector::start(vec![
        ("/GetSamplingRules", 200, RULES_BODY),
        ("/SamplingTargets", 200, TARGETS_BODY),
    ]);
    let mut builder = Config::builder();
    builder
        .set_endpoint(collector.endpoint().into())
        .set_target_polling_interval(Duration::from_millis(50));
    let sampler =
        RemoteSampler::new(&builder.build(), SamplerResource::new().with_service_name("shop"))
            .unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while sampler.state() != SamplerState::Steady && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(sampler.state(), SamplerState::Steady);

    let result = sampler.should_sample(
        &7_u128,
        &[
            ("http.request.method", "POST"),
            ("url.path", "/pay/now"),
            ("tier", "gold"),
        ],
    );
    assert_eq!(result.rule_name(), Some("payments"));

    sampler.shutdown(Duration::from_secs(5)).unwrap();
}
