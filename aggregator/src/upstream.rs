use crate::metrics_defs::UPSTREAM_REQUEST_DURATION;
use http::StatusCode;
use serde_json::{Value, json};
use shared::histogram;
use std::time::{Duration, Instant};
use url::Url;

/// Query parameters forwarded from the inbound request, in order and with
/// repeated keys kept.
pub type QueryParams = Vec<(String, String)>;

/// First value sent for `key`.
pub fn query_value<'a>(params: &'a QueryParams, key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.as_str())
}

#[derive(Clone, Debug, PartialEq)]
pub struct UpstreamFailure {
    pub status: StatusCode,
    pub body: Value,
}

impl UpstreamFailure {
    /// Stand-in for an upstream that never produced a usable response.
    pub fn transport() -> Self {
        UpstreamFailure {
            status: StatusCode::BAD_GATEWAY,
            body: json!({ "error": "upstream error" }),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum UpstreamOutcome {
    Success(Value),
    Failure(UpstreamFailure),
}

/// Outbound GET client shared by all resolvers.
///
/// Never retries and never returns a transport error: anything that goes wrong
/// on the wire is folded into `UpstreamFailure::transport()`.
#[derive(Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
}

impl UpstreamClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(UpstreamClient { client })
    }

    pub async fn call(
        &self,
        url: &Url,
        token: Option<&str>,
        params: &QueryParams,
    ) -> UpstreamOutcome {
        let upstream = url.host_str().unwrap_or("unknown").to_string();

        let mut request = self.client.get(url.clone()).query(params);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let started = Instant::now();
        let result = request.send().await;
        let response = match result {
            Ok(response) => response,
            Err(err) => {
                record_duration(&upstream, started, "transport");
                tracing::error!(%upstream, error = %err, "upstream request failed");
                return UpstreamOutcome::Failure(UpstreamFailure::transport());
            }
        };

        let status = response.status();
        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(err) => {
                record_duration(&upstream, started, "transport");
                tracing::error!(%upstream, %status, error = %err, "could not read upstream body");
                return UpstreamOutcome::Failure(UpstreamFailure::transport());
            }
        };
        let outcome = if status.is_success() { "success" } else { "error" };
        record_duration(&upstream, started, outcome);

        let body = parse_body(&bytes);

        if status.is_success() {
            tracing::debug!(%upstream, %status, "upstream request succeeded");
            UpstreamOutcome::Success(body.unwrap_or(Value::Null))
        } else {
            tracing::warn!(%upstream, %status, "upstream returned an error status");
            UpstreamOutcome::Failure(UpstreamFailure {
                status,
                body: body.unwrap_or_else(|| UpstreamFailure::transport().body),
            })
        }
    }
}

fn record_duration(upstream: &str, started: Instant, outcome: &'static str) {
    histogram!(
        UPSTREAM_REQUEST_DURATION,
        "upstream" => upstream.to_string(),
        "outcome" => outcome
    )
    .record(started.elapsed().as_secs_f64());
}

/// JSON when it parses, otherwise the raw text as a JSON string. `None` for an
/// empty body.
fn parse_body(bytes: &[u8]) -> Option<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return None;
    }

    serde_json::from_slice(bytes)
        .ok()
        .or_else(|| Some(Value::String(String::from_utf8_lossy(bytes).into_owned())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::{MockUpstream, unreachable_url};
    use axum::Router;
    use axum::extract::{Query, RawQuery};
    use axum::http::HeaderMap;
    use axum::routing::get;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};
    use std::collections::HashMap;

    async fn echo(
        headers: HeaderMap,
        Query(params): Query<HashMap<String, String>>,
    ) -> axum::Json<Value> {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        axum::Json(json!({ "auth": auth, "params": params }))
    }

    async fn mock_upstream() -> MockUpstream {
        let router = Router::new()
            .route("/echo", get(echo))
            .route(
                "/limited",
                get(|| async {
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        axum::Json(json!({"error": "rate limited"})),
                    )
                }),
            )
            .route("/plain", get(|| async { "just text" }))
            .route(
                "/raw",
                get(|RawQuery(query): RawQuery| async move { query.unwrap_or_default() }),
            )
            .route("/teapot", get(|| async { StatusCode::IM_A_TEAPOT }))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    "late"
                }),
            );
        MockUpstream::spawn(router).await
    }

    #[tokio::test]
    async fn test_success_forwards_token_and_params() {
        let server = mock_upstream().await;
        let client = UpstreamClient::new(Duration::from_secs(5)).unwrap();

        let params = QueryParams::from([("league".to_string(), "nba".to_string())]);
        let outcome = client
            .call(&server.url("/echo"), Some("secret"), &params)
            .await;

        assert_eq!(
            outcome,
            UpstreamOutcome::Success(json!({
                "auth": "Bearer secret",
                "params": { "league": "nba" }
            }))
        );

        // No token, no header
        let outcome = client
            .call(&server.url("/echo"), None, &QueryParams::new())
            .await;
        assert_eq!(
            outcome,
            UpstreamOutcome::Success(json!({ "auth": null, "params": {} }))
        );
    }

    #[tokio::test]
    async fn test_error_status_is_passed_through() {
        let server = mock_upstream().await;
        let client = UpstreamClient::new(Duration::from_secs(5)).unwrap();

        let outcome = client
            .call(&server.url("/limited"), Some("secret"), &QueryParams::new())
            .await;
        assert_eq!(
            outcome,
            UpstreamOutcome::Failure(UpstreamFailure {
                status: StatusCode::SERVICE_UNAVAILABLE,
                body: json!({"error": "rate limited"}),
            })
        );

        // Error status with an empty body gets the generic error body
        let outcome = client
            .call(&server.url("/teapot"), None, &QueryParams::new())
            .await;
        assert_eq!(
            outcome,
            UpstreamOutcome::Failure(UpstreamFailure {
                status: StatusCode::IM_A_TEAPOT,
                body: json!({"error": "upstream error"}),
            })
        );
    }

    #[tokio::test]
    async fn test_text_body() {
        let server = mock_upstream().await;
        let client = UpstreamClient::new(Duration::from_secs(5)).unwrap();

        let outcome = client
            .call(&server.url("/plain"), None, &QueryParams::new())
            .await;
        assert_eq!(outcome, UpstreamOutcome::Success(json!("just text")));
    }

    #[tokio::test]
    async fn test_repeated_params_keep_order() {
        let server = mock_upstream().await;
        let client = UpstreamClient::new(Duration::from_secs(5)).unwrap();

        let params = QueryParams::from([
            ("tag".to_string(), "b".to_string()),
            ("league".to_string(), "nba".to_string()),
            ("tag".to_string(), "a".to_string()),
        ]);
        let outcome = client.call(&server.url("/raw"), None, &params).await;
        assert_eq!(
            outcome,
            UpstreamOutcome::Success(json!("tag=b&league=nba&tag=a"))
        );
        assert_eq!(query_value(&params, "tag"), Some("b"));
        assert_eq!(query_value(&params, "page"), None);
    }

    #[tokio::test]
    async fn test_transport_failures() {
        let client = UpstreamClient::new(Duration::from_millis(200)).unwrap();

        // Connection refused
        let url = unreachable_url().await;
        let outcome = client.call(&url, Some("secret"), &QueryParams::new()).await;
        assert_eq!(outcome, UpstreamOutcome::Failure(UpstreamFailure::transport()));

        // Timeout
        let server = mock_upstream().await;
        let outcome = client
            .call(&server.url("/slow"), None, &QueryParams::new())
            .await;
        assert_eq!(outcome, UpstreamOutcome::Failure(UpstreamFailure::transport()));
    }

    #[test]
    fn test_duration_recorded_on_transport_failure() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let url = rt.block_on(unreachable_url());
        let client = UpstreamClient::new(Duration::from_secs(5)).unwrap();

        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let outcome = metrics::with_local_recorder(&recorder, || {
            rt.block_on(client.call(&url, None, &QueryParams::new()))
        });
        assert_eq!(outcome, UpstreamOutcome::Failure(UpstreamFailure::transport()));

        let recorded: Vec<_> = snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .filter(|(key, ..)| key.key().name() == UPSTREAM_REQUEST_DURATION.name)
            .map(|(key, _, _, value)| {
                let labels: Vec<(String, String)> = key
                    .key()
                    .labels()
                    .map(|label| (label.key().to_string(), label.value().to_string()))
                    .collect();
                (labels, value)
            })
            .collect();

        assert_eq!(recorded.len(), 1);
        let (labels, value) = &recorded[0];
        assert!(labels.contains(&("outcome".to_string(), "transport".to_string())));
        assert!(matches!(value, DebugValue::Histogram(samples) if samples.len() == 1));
    }

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body(b""), None);
        assert_eq!(parse_body(b" \n"), None);
        assert_eq!(parse_body(b"[1,2]"), Some(json!([1, 2])));
        assert_eq!(parse_body(b"oops"), Some(json!("oops")));
    }
}
