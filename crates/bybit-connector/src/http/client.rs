/*
[INPUT]:  HTTP configuration (base URL, timeouts, retry policy, credentials)
[OUTPUT]: Parsed JSON responses or structured request errors
[POS]:    HTTP layer - core client and request executor
[UPDATE]: When adding connection options or changing retry behavior
*/

use std::collections::HashSet;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::auth::Credentials;
use crate::http::routes::Route;
use crate::http::{BybitError, RequestSigner, Result};
use crate::types::{params, Market, Params};

/// Return codes that are retried automatically: timestamp drift (10002),
/// rate limit (10006) and transient matching-engine / position errors.
pub const RETRY_CODES: [i64; 6] = [10002, 10006, 30034, 30035, 130035, 130150];

const RATE_LIMIT_CODE: i64 = 10006;
const RATE_LIMIT_RESET_HEADER: &str = "X-Bapi-Limit-Reset-Timestamp";
const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("bybit-connector/", env!("CARGO_PKG_VERSION"));

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Milliseconds the exchange accepts between `timestamp` and receipt
    pub recv_window: u64,
    /// Total network attempts per call, including the first
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// Retry every non-zero return code, not only [`RETRY_CODES`]
    pub force_retry: bool,
    /// Return codes handed back as the raw body instead of an error
    pub ignore_codes: HashSet<i64>,
    /// Emit a debug event per request and outcome
    pub log_requests: bool,
    pub referral_id: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            recv_window: 5000,
            max_retries: 3,
            retry_delay: Duration::from_secs(3),
            force_retry: false,
            ignore_codes: HashSet::new(),
            log_requests: false,
            referral_id: None,
        }
    }
}

/// Main HTTP client for the Bybit REST API
#[derive(Debug, Clone)]
pub struct BybitClient {
    http_client: Client,
    base_url: Url,
    market: Market,
    config: ClientConfig,
    signer: Option<RequestSigner>,
}

enum Attempt {
    Done(Value),
    Retry { delay: Duration, error: BybitError },
    Fail(BybitError),
}

impl BybitClient {
    /// Create a mainnet client with default configuration
    pub fn new(market: Market) -> Result<Self> {
        Self::with_config(market, ClientConfig::default())
    }

    /// Create a testnet client with default configuration
    pub fn testnet(market: Market) -> Result<Self> {
        Self::with_config_and_base_url(market, ClientConfig::default(), market.rest_url(true))
    }

    /// Create a mainnet client with custom configuration
    pub fn with_config(market: Market, config: ClientConfig) -> Result<Self> {
        Self::with_config_and_base_url(market, config, market.rest_url(false))
    }

    /// Create a client against an explicit base URL
    pub fn with_config_and_base_url(
        market: Market,
        config: ClientConfig,
        base_url: &str,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(referral_id) = &config.referral_id {
            let value = HeaderValue::from_str(referral_id)
                .map_err(|e| BybitError::Config(format!("invalid referral id: {e}")))?;
            headers.insert(REFERER, value);
        }

        let http_client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;

        info!(%market, base_url, "initializing HTTP session");

        Ok(Self {
            http_client,
            base_url: Url::parse(base_url)?,
            market,
            config,
            signer: None,
        })
    }

    /// Set credentials for authenticated requests
    pub fn set_credentials(&mut self, credentials: Credentials) {
        self.signer = Some(RequestSigner::new(credentials));
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.set_credentials(credentials);
        self
    }

    pub fn has_credentials(&self) -> bool {
        self.signer.is_some()
    }

    pub fn market(&self) -> Market {
        self.market
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Call a route from the endpoint table
    pub(crate) async fn call(&self, route: &Route, params: Params) -> Result<Value> {
        let path = route.path(self.market).ok_or(BybitError::Unsupported {
            endpoint: route.name,
            market: self.market,
        })?;
        self.execute(route.verb.method(), path, params, route.private)
            .await
    }

    /// Execute a request with signing, retries and envelope parsing.
    ///
    /// Private calls get `api_key`, `timestamp`, `recv_window` and `sign`
    /// injected, re-signed on every attempt.
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        mut params: Params,
        private: bool,
    ) -> Result<Value> {
        let url = self.base_url.join(path)?;
        let signer = if private {
            Some(self.signer.as_ref().ok_or(BybitError::MissingCredentials)?)
        } else {
            None
        };
        params::normalize(&mut params);

        let max_attempts = self.config.max_retries.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;

            let mut request_params = params.clone();
            if let Some(signer) = signer {
                signer.sign_params(&mut request_params, timestamp_ms(), self.config.recv_window);
            }

            if self.config.log_requests {
                debug!(
                    %method,
                    path,
                    attempt,
                    params = %redacted(&request_params),
                    "request"
                );
            }

            let builder = self.build_request(&method, url.clone(), &request_params);
            let request = describe_request(&method, path, &params);
            match self.attempt(builder, &request).await {
                Attempt::Done(body) => {
                    if self.config.log_requests {
                        debug!(%method, path, attempt, "response ok");
                    }
                    return Ok(body);
                }
                Attempt::Fail(error) => return Err(error),
                Attempt::Retry { delay, error } => {
                    if attempt >= max_attempts {
                        warn!(%method, path, attempt, error = %error, "retries exhausted");
                        return Err(error);
                    }
                    warn!(
                        %method,
                        path,
                        attempt,
                        max_attempts,
                        ?delay,
                        error = %error,
                        "request failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn build_request(&self, method: &Method, url: Url, params: &Params) -> RequestBuilder {
        let builder = self.http_client.request(method.clone(), url);
        if *method == Method::GET {
            let mut pairs = params::sorted_pairs(params);
            if let Some(sign) = params.get("sign").and_then(Value::as_str) {
                pairs.push(("sign".to_string(), sign.to_string()));
            }
            builder.query(&pairs)
        } else {
            let body: Params = params
                .iter()
                .filter(|(_, value)| !value.is_null())
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            builder.json(&body)
        }
    }

    async fn attempt(&self, builder: RequestBuilder, request: &str) -> Attempt {
        let response = match builder.send().await {
            Ok(response) => response,
            Err(err) => return Attempt::Retry {
                delay: self.config.retry_delay,
                error: transport_error(err, request),
            },
        };

        let status = response.status();
        let reset_header = response
            .headers()
            .get(RATE_LIMIT_RESET_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<i64>().ok());

        let text = match response.text().await {
            Ok(text) => text,
            Err(err) => return Attempt::Retry {
                delay: self.config.retry_delay,
                error: transport_error(err, request),
            },
        };

        let body: Value = match serde_json::from_str(&text) {
            Ok(body) => body,
            Err(_) => return self.unparsable(status, &text, request),
        };

        let Some(code) = return_code(&body) else {
            if status.is_success() {
                return Attempt::Done(body);
            }
            return Attempt::Fail(BybitError::FailedRequest {
                message: format!("unexpected response: {}", truncate(&text)),
                status_code: Some(status.as_u16()),
                request: request.to_string(),
            });
        };

        if code == 0 {
            return Attempt::Done(body);
        }

        let message = return_message(&body);
        if self.config.ignore_codes.contains(&code) {
            debug!(code, message = %message, "ignored return code");
            return Attempt::Done(body);
        }

        let error = BybitError::InvalidRequest {
            code,
            message,
            request: request.to_string(),
        };

        if self.config.force_retry || RETRY_CODES.contains(&code) {
            let delay = if code == RATE_LIMIT_CODE {
                let reset_ms = body
                    .get("rate_limit_reset_ms")
                    .and_then(Value::as_i64)
                    .or(reset_header);
                rate_limit_delay(reset_ms, timestamp_ms(), self.config.retry_delay)
            } else {
                self.config.retry_delay
            };
            return Attempt::Retry { delay, error };
        }

        Attempt::Fail(error)
    }

    fn unparsable(&self, status: StatusCode, text: &str, request: &str) -> Attempt {
        let error = BybitError::FailedRequest {
            message: if status == StatusCode::FORBIDDEN {
                "access denied; the IP rate limit may have been breached".to_string()
            } else {
                format!("response is not JSON: {}", truncate(text))
            },
            status_code: Some(status.as_u16()),
            request: request.to_string(),
        };
        if status.is_server_error() {
            Attempt::Retry {
                delay: self.config.retry_delay,
                error,
            }
        } else {
            Attempt::Fail(error)
        }
    }
}

pub(crate) fn timestamp_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn return_code(body: &Value) -> Option<i64> {
    body.get("ret_code")
        .or_else(|| body.get("retCode"))
        .and_then(Value::as_i64)
}

fn return_message(body: &Value) -> String {
    body.get("ret_msg")
        .or_else(|| body.get("retMsg"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Wait until the reported reset time, never longer than the cap.
fn rate_limit_delay(reset_ms: Option<i64>, now_ms: i64, fallback: Duration) -> Duration {
    match reset_ms {
        Some(reset) if reset > now_ms => {
            Duration::from_millis((reset - now_ms) as u64).min(MAX_RATE_LIMIT_WAIT)
        }
        Some(_) => Duration::ZERO,
        None => fallback,
    }
}

fn transport_error(err: reqwest::Error, request: &str) -> BybitError {
    BybitError::FailedRequest {
        message: err.to_string(),
        status_code: err.status().map(|status| status.as_u16()),
        request: request.to_string(),
    }
}

fn describe_request(method: &Method, path: &str, params: &Params) -> String {
    format!("{method} {path}: {}", Value::Object(params.clone()))
}

/// Parameters for logging, without the signature.
fn redacted(params: &Params) -> Value {
    let mut copy = params.clone();
    copy.remove("sign");
    Value::Object(copy)
}

fn truncate(text: &str) -> String {
    const MAX: usize = 256;
    if text.len() <= MAX {
        return text.to_string();
    }
    let mut end = MAX;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
