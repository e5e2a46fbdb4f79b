use chrono::Utc;
use governor::{Quota, RateLimiter};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::sync::Arc;

use super::retry::RetryPolicy;
use crate::auth::Signer;
use crate::config::ExchangeSettings;
use crate::error::Error;
use crate::Result;

/// Source of the `CB-ACCESS-TIMESTAMP` value, in unix seconds
type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

type ExchangeRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Messages of 400 responses that mean "valid order, refused by the book".
/// Everything else on a 400 is a malformed request.
const BUSINESS_REJECTIONS: &[&str] = &[
    "insufficient funds",
    "trading disabled",
    "trading is disabled",
    "cancel only",
    "post only",
    "limit only",
    "market orders are not allowed",
    "product not found",
    "size is too large",
    "funds is too large",
];

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// HTTP transport shared by the candle feed, account resolver and order
/// executor.
///
/// Cloneable; clones share the rate limiter and signer.
#[derive(Clone)]
pub struct ExchangeClient {
    client: Client,
    base_url: String,
    signer: Option<Arc<Signer>>,
    retry: RetryPolicy,
    rate_limiter: Arc<ExchangeRateLimiter>,
    clock: Clock,
}

impl ExchangeClient {
    /// Client for public endpoints only. Add credentials with [`Self::with_signer`].
    pub fn new(settings: &ExchangeSettings, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout())
            .user_agent(settings.user_agent.as_str())
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {}", e)))?;

        let per_second = NonZeroU32::new(settings.requests_per_second).ok_or_else(|| {
            Error::Configuration("exchange.requests_per_second must be at least 1".into())
        })?;
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_second(per_second)));

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            signer: None,
            retry,
            rate_limiter,
            clock: Arc::new(|| Utc::now().timestamp()),
        })
    }

    pub fn with_signer(mut self, signer: Signer) -> Self {
        self.signer = Some(Arc::new(signer));
        self
    }

    /// Replace the local clock used for request timestamps, e.g. with one
    /// corrected by the exchange's server time.
    pub fn with_clock(mut self, clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// GET an unauthenticated endpoint. `path` may carry a query string.
    pub async fn get_public<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(Method::GET, path, None, false).await
    }

    pub async fn get_signed<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(Method::GET, path, None, true).await
    }

    /// POST a JSON body to an authenticated endpoint.
    pub async fn post_signed<T: DeserializeOwned>(&self, path: &str, body: String) -> Result<T> {
        self.request(Method::POST, path, Some(body), true).await
    }

    /// Send with retry. Each attempt is signed with its own timestamp.
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
        signed: bool,
    ) -> Result<T> {
        let mut backoff = self.retry.backoff();
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.send_once(&method, path, body.as_deref(), signed).await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(%method, path, attempt, "Request succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = backoff.delay_for(&e);
                    tracing::warn!(
                        %method,
                        path,
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        error = %e,
                        "Retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        method: &Method,
        path: &str,
        body: Option<&str>,
        signed: bool,
    ) -> Result<T> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%method, url = %url, "Exchange request");

        let mut request = self.client.request(method.clone(), &url);

        if signed {
            let signer = self.signer.as_ref().ok_or_else(|| {
                Error::Configuration(format!("{} {} requires credentials", method, path))
            })?;
            let signed_request = signer.sign_request(
                method.as_str(),
                path,
                body.unwrap_or(""),
                (self.clock)(),
            )?;
            for (name, value) in signed_request.headers() {
                request = request.header(name, value);
            }
        }

        if let Some(body) = body {
            request = request
                .header(CONTENT_TYPE, "application/json")
                .body(body.to_string());
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let error = classify_failure(status, &text);
            tracing::debug!(%method, path, status = status.as_u16(), error = %error, "Exchange returned error");
            return Err(error);
        }

        serde_json::from_str(&text).map_err(|e| {
            Error::Parse(format!(
                "{} {}: {} (body: {})",
                method,
                path,
                e,
                truncate(&text, 200)
            ))
        })
    }
}

/// Map a non-2xx response onto the error taxonomy.
pub fn classify_failure(status: StatusCode, body: &str) -> Error {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| truncate(body.trim(), 200).to_string());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Auth {
            status: status.as_u16(),
            message,
        },
        StatusCode::TOO_MANY_REQUESTS => Error::RateLimited(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            let lower = message.to_lowercase();
            if BUSINESS_REJECTIONS.iter().any(|r| lower.contains(r)) {
                Error::ExchangeRejection(message)
            } else {
                Error::Validation(message)
            }
        }
        _ => Error::Exchange {
            status: status.as_u16(),
            message,
        },
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Retry policy for tests: fast and deterministic
#[cfg(test)]
pub(crate) fn test_retry_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: std::time::Duration::from_millis(1),
        max_delay: std::time::Duration::from_millis(5),
        jitter: 0.0,
    }
}

#[cfg(test)]
pub(crate) fn test_client(base_url: &str, max_attempts: u32) -> ExchangeClient {
    use crate::auth::Credentials;

    let settings = ExchangeSettings {
        base_url: base_url.to_string(),
        requests_per_second: 1000,
        ..ExchangeSettings::default()
    };
    let signer = Signer::new(Credentials::new(
        "test-key".into(),
        "c2VjcmV0".into(),
        "test-pass".into(),
    ))
    .unwrap();

    ExchangeClient::new(&settings, test_retry_policy(max_attempts))
        .unwrap()
        .with_signer(signer)
}
