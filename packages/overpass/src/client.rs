//! Resilient Overpass query execution.
//!
//! The public Overpass instance is shared and routinely throttles or times
//! out. [`OverpassClient::execute`] makes a bounded number of attempts with
//! a fixed cool-down between them and gives up with
//! [`OverpassError::RemoteService`] once the budget is spent.
//!
//! The wait is a `tokio::time::sleep`, so a concurrently running fetch
//! keeps making progress while this one cools down.
//!
//! The HTTP layer sits behind [`OverpassTransport`] so the retry loop can
//! be driven by scripted responses in tests.

use std::time::Duration;

use async_trait::async_trait;
use coverage_map_config::OverpassSettings;

use crate::progress::ProgressCallback;
use crate::{AttemptError, OverpassError};

/// User-Agent sent to the Overpass endpoint.
const USER_AGENT: &str = concat!("coverage-map/", env!("CARGO_PKG_VERSION"));

/// Extra client-side allowance on top of the server-side query timeout,
/// covering queueing and transfer time.
const TRANSFER_GRACE: Duration = Duration::from_secs(30);

/// Maximum length of the response body preview included in errors.
const BODY_PREVIEW_LEN: usize = 300;

/// Sends a single query and returns the decoded JSON payload.
#[async_trait]
pub trait OverpassTransport: Send + Sync {
    /// Performs one attempt.
    ///
    /// # Errors
    ///
    /// Returns [`AttemptError`] on any transport failure, non-2xx status,
    /// or undecodable body.
    async fn send(&self, query: &str) -> Result<serde_json::Value, AttemptError>;
}

/// [`OverpassTransport`] backed by `reqwest`: one form-encoded POST of
/// `data=<query>` per attempt.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpTransport {
    /// Builds a transport for the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`OverpassError::Client`] if the HTTP client cannot be built.
    pub fn new(settings: &OverpassSettings) -> Result<Self, OverpassError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(u64::from(settings.query_timeout_secs)) + TRANSFER_GRACE)
            .build()
            .map_err(OverpassError::Client)?;

        Ok(Self {
            client,
            url: settings.url.clone(),
        })
    }
}

#[async_trait]
impl OverpassTransport for HttpTransport {
    async fn send(&self, query: &str) -> Result<serde_json::Value, AttemptError> {
        let response = self
            .client
            .post(&self.url)
            .form(&[("data", query)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| AttemptError::Decode {
            message: format!(
                "{e} (received {} bytes, preview: {})",
                text.len(),
                truncate_for_log(&text, BODY_PREVIEW_LEN)
            ),
        })
    }
}

/// Executes queries with a fixed-delay retry policy.
pub struct OverpassClient<T = HttpTransport> {
    transport: T,
    max_attempts: u32,
    retry_delay: Duration,
}

impl OverpassClient<HttpTransport> {
    /// Builds a client talking HTTP to the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`OverpassError::Client`] if the HTTP client cannot be built.
    pub fn from_settings(settings: &OverpassSettings) -> Result<Self, OverpassError> {
        Ok(Self::new(HttpTransport::new(settings)?, settings))
    }
}

impl<T: OverpassTransport> OverpassClient<T> {
    /// Wraps a transport with the attempt budget and delay from `settings`.
    ///
    /// A budget of zero is treated as one attempt.
    #[must_use]
    pub fn new(transport: T, settings: &OverpassSettings) -> Self {
        Self {
            transport,
            max_attempts: settings.max_attempts.max(1),
            retry_delay: settings.retry_delay,
        }
    }

    /// Runs `query`, retrying failed attempts after a fixed delay.
    ///
    /// `label` identifies the fetch in log lines and progress messages.
    ///
    /// # Errors
    ///
    /// Returns [`OverpassError::RemoteService`] with the last observed
    /// failure once every attempt has failed.
    pub async fn execute(
        &self,
        query: &str,
        label: &str,
        progress: &dyn ProgressCallback,
    ) -> Result<serde_json::Value, OverpassError> {
        let max_attempts = self.max_attempts;
        let mut attempt = 1;

        loop {
            log::info!("{label}: querying Overpass (attempt {attempt}/{max_attempts})...");
            progress.set_message(format!("{label}: attempt {attempt}/{max_attempts}"));

            let result = match self.transport.send(query).await {
                Ok(payload) => check_remark(payload),
                Err(e) => Err(e),
            };

            match result {
                Ok(payload) => return Ok(payload),
                Err(e) if attempt < max_attempts => {
                    log::warn!(
                        "{label}: attempt {attempt}/{max_attempts} failed: {e}; \
                         retrying in {:?}...",
                        self.retry_delay
                    );
                    progress.set_message(format!(
                        "{label}: attempt {attempt} failed, waiting {}s before retry",
                        self.retry_delay.as_secs()
                    ));
                    tokio::time::sleep(self.retry_delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    log::error!("{label}: giving up after {attempt} attempt(s): {e}");
                    return Err(OverpassError::RemoteService {
                        attempts: attempt,
                        last: e,
                    });
                }
            }
        }
    }
}

/// Treats an Overpass `remark` containing a runtime error as a failure.
///
/// Overpass reports server-side timeouts with HTTP 200, an empty
/// `elements` array, and a `remark` field.
fn check_remark(payload: serde_json::Value) -> Result<serde_json::Value, AttemptError> {
    let runtime_error = payload
        .get("remark")
        .and_then(serde_json::Value::as_str)
        .filter(|remark| remark.contains("runtime error"));

    if let Some(remark) = runtime_error {
        return Err(AttemptError::Remark {
            remark: remark.to_string(),
        });
    }
    Ok(payload)
}

/// Truncates a string for logging, appending "..." if it exceeds `max_len`.
fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::progress::NullProgress;

    /// Replays a fixed sequence of attempt outcomes.
    struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<serde_json::Value, AttemptError>>>,
        calls: AtomicU32,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<Result<serde_json::Value, AttemptError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl OverpassTransport for ScriptedTransport {
        async fn send(&self, _query: &str) -> Result<serde_json::Value, AttemptError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("transport called more times than scripted")
        }
    }

    fn throttled() -> Result<serde_json::Value, AttemptError> {
        Err(AttemptError::Status {
            status: 429,
            reason: "Too Many Requests".to_string(),
        })
    }

    fn ok_payload() -> Result<serde_json::Value, AttemptError> {
        Ok(serde_json::json!({ "elements": [{ "type": "node", "id": 1 }] }))
    }

    fn settings(max_attempts: u32, retry_delay: Duration) -> OverpassSettings {
        OverpassSettings {
            max_attempts,
            retry_delay,
            ..OverpassSettings::default()
        }
    }

    #[tokio::test]
    async fn succeeds_on_first_attempt() {
        let client = OverpassClient::new(
            ScriptedTransport::new(vec![ok_payload()]),
            &settings(3, Duration::ZERO),
        );
        let payload = client.execute("q", "test", &NullProgress).await.unwrap();
        assert_eq!(payload["elements"][0]["id"], 1);
        assert_eq!(client.transport.calls(), 1);
    }

    #[tokio::test]
    async fn succeeds_after_failures_within_budget() {
        for n in 1..=4u32 {
            let mut script: Vec<_> = (1..n).map(|_| throttled()).collect();
            script.push(ok_payload());
            let client = OverpassClient::new(
                ScriptedTransport::new(script),
                &settings(4, Duration::ZERO),
            );

            let payload = client.execute("q", "test", &NullProgress).await.unwrap();
            assert_eq!(payload["elements"][0]["id"], 1);
            assert_eq!(client.transport.calls(), n, "expected exactly {n} attempts");
        }
    }

    #[tokio::test]
    async fn exhausting_budget_is_remote_service_error() {
        let client = OverpassClient::new(
            ScriptedTransport::new(vec![throttled(), throttled(), throttled()]),
            &settings(3, Duration::ZERO),
        );

        let err = client.execute("q", "test", &NullProgress).await.unwrap_err();
        assert_eq!(client.transport.calls(), 3);
        match err {
            OverpassError::RemoteService { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(matches!(last, AttemptError::Status { status: 429, .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn reports_last_observed_failure() {
        let client = OverpassClient::new(
            ScriptedTransport::new(vec![
                throttled(),
                Err(AttemptError::Status {
                    status: 504,
                    reason: "Gateway Timeout".to_string(),
                }),
            ]),
            &settings(2, Duration::ZERO),
        );

        let err = client.execute("q", "test", &NullProgress).await.unwrap_err();
        assert!(err.to_string().contains("504 Gateway Timeout"), "{err}");
    }

    #[tokio::test]
    async fn zero_budget_still_attempts_once() {
        let client = OverpassClient::new(
            ScriptedTransport::new(vec![throttled()]),
            &settings(0, Duration::ZERO),
        );
        let err = client.execute("q", "test", &NullProgress).await.unwrap_err();
        assert!(matches!(err, OverpassError::RemoteService { attempts: 1, .. }));
        assert_eq!(client.transport.calls(), 1);
    }

    #[tokio::test]
    async fn runtime_error_remark_is_retried() {
        let client = OverpassClient::new(
            ScriptedTransport::new(vec![
                Ok(serde_json::json!({
                    "elements": [],
                    "remark": "runtime error: Query timed out in \"query\" at line 3 after 61 seconds."
                })),
                ok_payload(),
            ]),
            &settings(3, Duration::ZERO),
        );

        let payload = client.execute("q", "test", &NullProgress).await.unwrap();
        assert_eq!(payload["elements"][0]["id"], 1);
        assert_eq!(client.transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_fixed_delay_between_attempts() {
        let client = OverpassClient::new(
            ScriptedTransport::new(vec![throttled(), throttled(), ok_payload()]),
            &settings(3, Duration::from_secs(30)),
        );

        let start = tokio::time::Instant::now();
        client.execute("q", "test", &NullProgress).await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_mins(1));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_wait_does_not_stall_concurrent_fetch() {
        let slow = OverpassClient::new(
            ScriptedTransport::new(vec![throttled(), ok_payload()]),
            &settings(2, Duration::from_secs(30)),
        );
        let fast = OverpassClient::new(
            ScriptedTransport::new(vec![ok_payload()]),
            &settings(2, Duration::from_secs(30)),
        );

        let start = tokio::time::Instant::now();
        let (slow_done, fast_done) = tokio::join!(
            async {
                slow.execute("q", "slow", &NullProgress).await.unwrap();
                start.elapsed()
            },
            async {
                fast.execute("q", "fast", &NullProgress).await.unwrap();
                start.elapsed()
            },
        );

        assert_eq!(fast_done, Duration::ZERO);
        assert_eq!(slow_done, Duration::from_secs(30));
    }

    #[test]
    fn truncates_long_bodies() {
        assert_eq!(truncate_for_log("abcdef", 3), "abc...");
        assert_eq!(truncate_for_log("abc", 3), "abc");
    }

    mod http {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;
        use tokio::task::JoinHandle;

        use super::*;

        /// Accepts one connection, answers it, and yields the raw request.
        async fn serve_once(
            status_line: &'static str,
            body: &'static str,
        ) -> (String, JoinHandle<String>) {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let url = format!("http://{}/api/interpreter", listener.local_addr().unwrap());

            let handle = tokio::spawn(async move {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut request = Vec::new();
                let mut chunk = [0u8; 1024];
                loop {
                    let n = socket.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&chunk[..n]);
                    if let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                        let headers = String::from_utf8_lossy(&request[..end]).to_lowercase();
                        let len = headers
                            .lines()
                            .find_map(|l| l.strip_prefix("content-length:"))
                            .and_then(|v| v.trim().parse::<usize>().ok())
                            .unwrap_or(0);
                        if request.len() >= end + 4 + len {
                            break;
                        }
                    }
                }

                let response = format!(
                    "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
                String::from_utf8_lossy(&request).into_owned()
            });

            (url, handle)
        }

        fn transport(url: String) -> HttpTransport {
            HttpTransport::new(&OverpassSettings {
                url,
                ..OverpassSettings::default()
            })
            .unwrap()
        }

        #[tokio::test]
        async fn posts_query_as_form_encoded_data() {
            let (url, server) = serve_once("200 OK", r#"{"elements":[]}"#).await;

            let payload = transport(url).send("[out:json];\nway(1);").await.unwrap();
            assert_eq!(payload["elements"], serde_json::json!([]));

            let request = server.await.unwrap();
            let lower = request.to_lowercase();
            assert!(request.starts_with("POST /api/interpreter "), "{request}");
            assert!(lower.contains("content-type: application/x-www-form-urlencoded"));
            assert!(lower.contains("user-agent: coverage-map/"));
            assert!(
                request.ends_with("data=%5Bout%3Ajson%5D%3B%0Away%281%29%3B"),
                "{request}"
            );
        }

        #[tokio::test]
        async fn non_success_status_is_status_error() {
            let (url, server) = serve_once("429 Too Many Requests", "rate limited").await;

            let err = transport(url).send("[out:json];").await.unwrap_err();
            server.await.unwrap();

            match err {
                AttemptError::Status { status, reason } => {
                    assert_eq!(status, 429);
                    assert_eq!(reason, "Too Many Requests");
                }
                other => panic!("expected status error, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn non_json_body_is_decode_error() {
            let (url, server) = serve_once("200 OK", "<html>server busy</html>").await;

            let err = transport(url).send("[out:json];").await.unwrap_err();
            server.await.unwrap();

            assert!(
                matches!(&err, AttemptError::Decode { message } if message.contains("server busy")),
                "{err:?}"
            );
        }
    }
}
