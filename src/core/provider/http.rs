// src/core/provider/http.rs

use crate::core::error::{Result, ScanError};
use crate::core::provider::credential::Credential;
use crate::core::provider::{ArmRequest, ArmTransport, Method};
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("quickreview/", env!("CARGO_PKG_VERSION"));

/// Bounded exponential backoff for transient provider failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(3),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: usize, error: &ScanError) -> Duration {
        if let ScanError::Throttled { retry_after: Some(after) } = error {
            return (*after).min(self.max_delay);
        }
        let exp = 1u32 << (attempt as u32).min(3);
        (self.base_delay * exp).min(self.max_delay)
    }
}

/// Live transport against the management endpoint using a bearer token.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    credential: Credential,
    retry: RetryPolicy,
}

impl HttpTransport {
    pub fn new(credential: Credential) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self { client, credential, retry: RetryPolicy::default() })
    }

    async fn send_once(&self, request: &ArmRequest) -> Result<Value> {
        let builder = match request.method {
            Method::Get => self.client.get(request.url.clone()),
            Method::Post => self.client.post(request.url.clone()),
        };
        let builder = builder.bearer_auth(self.credential.token());
        let builder = match &request.body {
            Some(body) => builder.json(body),
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            // Some endpoints answer 204 with an empty body.
            let bytes = response.bytes().await?;
            if bytes.is_empty() {
                return Ok(Value::Null);
            }
            return Ok(serde_json::from_slice(&bytes)?);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ScanError::Throttled { retry_after: retry_after(response.headers()) });
        }

        let text = response.text().await.unwrap_or_default();
        Err(ScanError::Api { status: status.as_u16(), message: error_message(&text) })
    }
}

#[async_trait]
impl ArmTransport for HttpTransport {
    async fn send(&self, request: ArmRequest) -> Result<Value> {
        let mut attempt = 0;
        loop {
            debug!(method = %request.method, url = %request.url, attempt, "Sending request.");
            match self.send_once(&request).await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_transient() && attempt + 1 < self.retry.max_attempts => {
                    let delay = self.retry.backoff(attempt, &e);
                    warn!(url = %request.url, error = %e, delay_ms = delay.as_millis() as u64, "Transient provider error, retrying.");
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Pulls `error.message` out of an ARM error envelope, falling back to the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            let error = v.get("error")?;
            let code = error.get("code").and_then(Value::as_str).unwrap_or_default();
            let message = error.get("message").and_then(Value::as_str)?;
            Some(if code.is_empty() { message.to_string() } else { format!("{code}: {message}") })
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn extracts_arm_error_message() {
        let body = r#"{"error":{"code":"AuthorizationFailed","message":"no access"}}"#;
        assert_eq!(error_message(body), "AuthorizationFailed: no access");
        assert_eq!(error_message("  gateway timeout "), "gateway timeout");
    }

    #[test]
    fn parses_retry_after_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(7)));
        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(retry_after(&headers), None);
    }

    #[test]
    fn backoff_is_capped() {
        let policy = RetryPolicy::default();
        let err = ScanError::Api { status: 503, message: String::new() };
        assert_eq!(policy.backoff(0, &err), Duration::from_millis(200));
        assert_eq!(policy.backoff(1, &err), Duration::from_millis(400));
        assert_eq!(policy.backoff(10, &err), Duration::from_millis(1600));

        let throttled = ScanError::Throttled { retry_after: Some(Duration::from_secs(30)) };
        assert_eq!(policy.backoff(0, &throttled), Duration::from_secs(3));
    }
}
