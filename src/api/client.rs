//! Panel API client with bounded retry and page aggregation

use super::error::ApiError;
use super::models::Pagination;
use crate::config::ApiConfig;
use crate::utils::http::{HttpRequest, HttpTransport, Method, TransportError};
use crate::utils::sleeper::Sleeper;
use reqwest::Url;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Longest error body kept in an [`ApiError::HttpStatus`] detail
const MAX_DETAIL_LEN: usize = 300;

/// One logical request against the panel
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
    /// Follow `meta.pagination` and concatenate every page's `data`
    pub aggregate: bool,
    /// 4xx codes the caller considers worth retrying
    pub transient_statuses: Vec<u16>,
}

impl ApiRequest {
    fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: None,
            aggregate: false,
            transient_statuses: Vec::new(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>, body: Option<Value>) -> Self {
        let mut request = Self::new(Method::Post, url);
        request.body = body;
        request
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::Delete, url)
    }

    pub fn aggregate(mut self) -> Self {
        self.aggregate = true;
        self
    }

    pub fn retry_on_status(mut self, status: u16) -> Self {
        self.transient_statuses.push(status);
        self
    }
}

const DEFAULT_BACKOFF_FACTOR: f64 = 1.0;

/// Bounded exponential backoff
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Seconds; the wait after failed attempt `k` is `factor * 2^(k-1)`
    pub backoff_factor: f64,
}

impl RetryPolicy {
    /// A zero, negative or non-finite factor falls back to 1 second
    pub fn new(max_attempts: u32, backoff_factor: f64) -> Self {
        let backoff_factor = if backoff_factor.is_finite() && backoff_factor > 0.0 {
            backoff_factor
        } else {
            DEFAULT_BACKOFF_FACTOR
        };
        Self {
            max_attempts: max_attempts.max(1),
            backoff_factor,
        }
    }

    /// Delay to wait after `failed_attempt` (1-based) before the next one
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        let exp = failed_attempt.saturating_sub(1).min(31);
        let secs = self.backoff_factor * f64::from(1u32 << exp);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, DEFAULT_BACKOFF_FACTOR)
    }
}

/// Authenticated panel client.
///
/// Retries network failures and 5xx responses up to the policy's attempt
/// budget; 4xx responses are returned immediately unless the request lists
/// them as transient. Aggregated fetches either return every page or fail.
pub struct PagedApiClient {
    transport: Arc<dyn HttpTransport>,
    sleeper: Arc<dyn Sleeper>,
    retry: RetryPolicy,
}

impl PagedApiClient {
    pub fn new(transport: Arc<dyn HttpTransport>, sleeper: Arc<dyn Sleeper>, retry: RetryPolicy) -> Self {
        Self {
            transport,
            sleeper,
            retry,
        }
    }

    pub fn from_config(
        config: &ApiConfig,
        transport: Arc<dyn HttpTransport>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self::new(
            transport,
            sleeper,
            RetryPolicy::new(config.max_retries, config.retry_backoff_factor),
        )
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Execute a logical request, following pagination when requested
    pub fn request(&self, request: &ApiRequest) -> Result<Value, ApiError> {
        let first = self.execute(request, &request.url)?;

        if !request.aggregate {
            return Ok(first);
        }

        let pagination = match Pagination::from_envelope(&first) {
            Some(p) if p.total_pages > p.current_page => p,
            _ => return Ok(first),
        };

        let mut items = take_data(first)?.0;
        let mut last = Value::Null;

        for page in (pagination.current_page + 1)..=pagination.total_pages {
            let url = with_page(&request.url, page)?;
            debug!(url = %url, page, total_pages = pagination.total_pages, "Fetching next page");

            let (data, envelope) = take_data(self.execute(request, &url)?)?;
            items.extend(data);
            last = envelope;
        }

        if let Some(obj) = last.as_object_mut() {
            obj.insert("data".to_string(), Value::Array(items));
        }

        info!(
            url = %request.url,
            pages = pagination.total_pages - pagination.current_page + 1,
            "Aggregated paginated response"
        );

        Ok(last)
    }

    /// GET every page of a list endpoint
    pub fn get_all(&self, url: &str) -> Result<Value, ApiError> {
        self.request(&ApiRequest::get(url).aggregate())
    }

    /// Send one URL with retry
    fn execute(&self, request: &ApiRequest, url: &str) -> Result<Value, ApiError> {
        let http_request = HttpRequest {
            method: request.method,
            url: url.to_string(),
            body: request.body.clone(),
        };
        let max_attempts = self.retry.max_attempts;
        let mut last_status = None;

        for attempt in 1..=max_attempts {
            match self.transport.send(&http_request) {
                Ok(response) if response.is_success() => {
                    info!(
                        method = %request.method,
                        url,
                        attempt,
                        max_attempts,
                        status = response.status,
                        "API request succeeded"
                    );
                    return parse_body(&response.body);
                }
                Ok(response) => {
                    let detail = error_detail(&response.body);
                    let retryable = response.is_server_error()
                        || request.transient_statuses.contains(&response.status);

                    if !retryable {
                        error!(
                            method = %request.method,
                            url,
                            attempt,
                            max_attempts,
                            status = response.status,
                            detail = %detail,
                            "API request rejected"
                        );
                        return Err(ApiError::HttpStatus(response.status, detail));
                    }

                    warn!(
                        method = %request.method,
                        url,
                        attempt,
                        max_attempts,
                        status = response.status,
                        detail = %detail,
                        "API request failed with retryable status"
                    );
                    last_status = Some(response.status);
                }
                Err(TransportError::Other(cause)) => {
                    error!(
                        method = %request.method,
                        url,
                        attempt,
                        max_attempts,
                        error = %cause,
                        "API request failed"
                    );
                    return Err(ApiError::Network(cause));
                }
                Err(e) => {
                    warn!(
                        method = %request.method,
                        url,
                        attempt,
                        max_attempts,
                        error = %e,
                        "API request failed with network error"
                    );
                    last_status = None;
                }
            }

            if attempt < max_attempts {
                let delay = self.retry.delay_after(attempt);
                debug!(url, attempt, delay_ms = delay.as_millis() as u64, "Backing off before retry");
                self.sleeper.sleep(delay);
            }
        }

        error!(method = %request.method, url, max_attempts, ?last_status, "API request retries exhausted");

        Err(ApiError::RetriesExhausted {
            url: url.to_string(),
            last_status,
        })
    }
}

/// Split an envelope into its `data` items and the rest of the envelope
fn take_data(mut envelope: Value) -> Result<(Vec<Value>, Value), ApiError> {
    let data = envelope
        .as_object_mut()
        .and_then(|obj| obj.remove("data"))
        .ok_or_else(|| ApiError::MalformedResponse("paginated response without data".to_string()))?;

    match data {
        Value::Array(items) => Ok((items, envelope)),
        other => Err(ApiError::MalformedResponse(format!(
            "expected data array, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Inject or override the `page` query parameter
fn with_page(base: &str, page: u32) -> Result<String, ApiError> {
    let mut url = Url::parse(base).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", base, e)))?;

    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "page")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (k, v) in &retained {
            pairs.append_pair(k, v);
        }
        pairs.append_pair("page", &page.to_string());
    }

    Ok(url.to_string())
}

fn parse_body(body: &str) -> Result<Value, ApiError> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body).map_err(|e| ApiError::MalformedResponse(format!("invalid JSON: {}", e)))
}

/// `errors[0].detail` from the panel's error envelope, else the raw body
fn error_detail(body: &str) -> String {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("errors")?
                .get(0)?
                .get("detail")?
                .as_str()
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string());

    if detail.chars().count() > MAX_DETAIL_LEN {
        let truncated: String = detail.chars().take(MAX_DETAIL_LEN).collect();
        format!("{}...", truncated)
    } else {
        detail
    }
}
