//! Retrying HTTP executor
//!
//! Single GET entry point shared by page fetching and enrichment. Every
//! request first acquires a permit from the caller's [`RateGovernor`],
//! then runs through a bounded retry loop: transport failures and
//! retryable statuses (429, 500, 502, 503, 504) back off and retry, a 401 under
//! OAuth2 forces one token refresh and one replay, and any other 4xx
//! aborts immediately.

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

use crate::auth::AuthMethod;
use crate::error::{is_retryable_status, Error, Result};
use crate::http::RateGovernor;
use crate::types::{BackoffType, JsonValue, StringMap};

/// Retry and transport settings for [`HttpExecutor`]
#[derive(Debug, Clone)]
pub struct HttpExecutorConfig {
    /// Per-request timeout
    pub timeout: Duration,
    /// Retry attempts after the initial request
    pub max_retries: u32,
    /// Base delay fed into the backoff schedule
    pub backoff_base: Duration,
    /// Upper bound on any single backoff delay
    pub max_backoff: Duration,
    /// Shape of the backoff schedule
    pub backoff_type: BackoffType,
}

impl Default for HttpExecutorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            backoff_base: Duration::from_millis(500),
            max_backoff: Duration::from_secs(60),
            backoff_type: BackoffType::Exponential,
        }
    }
}

/// HTTP client wrapper with retry, backoff and auth handling
pub struct HttpExecutor {
    client: Client,
    config: HttpExecutorConfig,
    auth: AuthMethod,
}

impl HttpExecutor {
    pub fn new(config: HttpExecutorConfig, auth: AuthMethod) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(Error::Http)?;

        Ok(Self {
            client,
            config,
            auth,
        })
    }

    /// The auth method this executor signs requests with
    pub fn auth(&self) -> &AuthMethod {
        &self.auth
    }

    /// GET `url` with `params` as the query string and decode the JSON body.
    ///
    /// Acquires one governor permit per attempt, so retries are paced the
    /// same as fresh requests. Exhausting the retry budget surfaces the
    /// last underlying failure as the error source.
    pub async fn get(
        &self,
        url: &str,
        params: &StringMap,
        governor: &RateGovernor,
    ) -> Result<JsonValue> {
        let mut last_error: Option<Error> = None;

        for attempt in 0..=self.config.max_retries {
            governor.wait().await;

            let response = match self.send(url, params).await {
                Ok(response) => response,
                Err(err) => {
                    if err.is_authentication() {
                        return Err(err);
                    }
                    warn!(
                        url = %url,
                        attempt = attempt + 1,
                        error = %err,
                        "request failed, will retry"
                    );
                    last_error = Some(err);
                    if attempt < self.config.max_retries {
                        tokio::time::sleep(self.calculate_backoff(attempt)).await;
                    }
                    continue;
                }
            };

            // A 401 under OAuth2 means the token went stale server-side.
            // Force one refresh and replay once; a second 401 falls through
            // to the non-retryable branch below. A refresh rejection is
            // fatal, but a transport failure on the replay goes back into
            // the retry loop like any other network error.
            let response = if response.status() == StatusCode::UNAUTHORIZED {
                if let Some(store) = self.auth.token_store() {
                    warn!(url = %url, "received 401, refreshing access token and replaying");
                    store.refresh().await?;
                    match self.send(url, params).await {
                        Ok(replayed) => replayed,
                        Err(err) => {
                            warn!(
                                url = %url,
                                attempt = attempt + 1,
                                error = %err,
                                "replay after token refresh failed, will retry"
                            );
                            last_error = Some(err);
                            if attempt < self.config.max_retries {
                                tokio::time::sleep(self.calculate_backoff(attempt)).await;
                            }
                            continue;
                        }
                    }
                } else {
                    response
                }
            } else {
                response
            };

            let status = response.status();

            if status.is_success() {
                return response.json::<JsonValue>().await.map_err(Error::Http);
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = extract_retry_after(&response);
                last_error = Some(Error::RateLimited {
                    retry_after_seconds: retry_after.unwrap_or(0),
                });
                if attempt < self.config.max_retries {
                    let delay = retry_after
                        .map(Duration::from_secs)
                        .unwrap_or_else(|| self.calculate_backoff(attempt));
                    warn!(
                        url = %url,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                continue;
            }

            if is_retryable_status(status.as_u16()) {
                let body = response.text().await.unwrap_or_default();
                warn!(
                    url = %url,
                    status = status.as_u16(),
                    attempt = attempt + 1,
                    "retryable status"
                );
                last_error = Some(Error::http_status(status.as_u16(), body));
                if attempt < self.config.max_retries {
                    tokio::time::sleep(self.calculate_backoff(attempt)).await;
                }
                continue;
            }

            // Non-retryable client error, abort without consuming the budget
            let body = response.text().await.unwrap_or_default();
            return Err(Error::http_status(status.as_u16(), body));
        }

        let message = format!(
            "max retries ({}) exceeded for GET {}",
            self.config.max_retries, url
        );
        match last_error {
            Some(source) => Err(Error::extraction_caused_by(message, source)),
            None => Err(Error::extraction(message)),
        }
    }

    async fn send(&self, url: &str, params: &StringMap) -> Result<Response> {
        let mut request: RequestBuilder = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json");

        if !params.is_empty() {
            request = request.query(params);
        }

        request = self.auth.apply(request).await?;

        debug!(url = %url, "sending GET");
        request.send().await.map_err(|err| {
            if err.is_timeout() {
                Error::Timeout {
                    timeout_ms: self.config.timeout.as_millis() as u64,
                }
            } else {
                Error::Http(err)
            }
        })
    }

    /// Delay before retry number `attempt` (zero-based)
    fn calculate_backoff(&self, attempt: u32) -> Duration {
        let base = self.config.backoff_base;
        let delay = match self.config.backoff_type {
            BackoffType::Constant => base,
            BackoffType::Linear => base.saturating_mul(attempt + 1),
            BackoffType::Exponential => base.saturating_mul(2u32.saturating_pow(attempt)),
        };
        delay.min(self.config.max_backoff)
    }
}

impl std::fmt::Debug for HttpExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpExecutor")
            .field("config", &self.config)
            .field("auth", &self.auth)
            .finish()
    }
}

/// Parse a numeric `Retry-After` header, if present
fn extract_retry_after(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
}
