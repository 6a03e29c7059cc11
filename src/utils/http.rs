//! HTTP transport abstraction for testability
//!
//! The API client talks to the panel exclusively through [`HttpTransport`],
//! so retry and pagination logic can be exercised against a scripted mock.

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// HTTP methods used against the panel API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// A single outgoing request
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
}

/// Raw response: status code and body text
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}

/// Failure below the HTTP layer: no status code was received
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    /// Connection reset, broken pipe or a body cut off mid-read
    #[error("connection interrupted: {0}")]
    Interrupted(String),

    /// The request could not be built or followed; not retried
    #[error("transport error: {0}")]
    Other(String),
}

/// Abstraction for HTTP execution, enabling mocking in tests
pub trait HttpTransport: Send + Sync {
    fn send(&self, request: &HttpRequest) -> std::result::Result<HttpResponse, TransportError>;
}

/// Blocking reqwest transport carrying the panel's bearer token
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new(api_key: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .context("API key contains characters not allowed in a header")?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::blocking::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn send(&self, request: &HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
        let builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
            Method::Delete => self.client.delete(&request.url),
        };
        let builder = match request.body {
            Some(ref body) => builder.json(body),
            None => builder,
        };

        debug!("Sending {} {}", request.method, request.url);

        let response = builder.send().map_err(classify_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.text().map_err(classify_reqwest_error)?;

        Ok(HttpResponse { status, body })
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else if err.is_builder() || err.is_redirect() {
        TransportError::Other(err.to_string())
    } else {
        TransportError::Interrupted(err.to_string())
    }
}

/// Scripted transport for testing
/// Available for use in external test crates
#[allow(dead_code)]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Reply produced for a matched request
    #[derive(Clone, Debug)]
    pub enum MockReply {
        Json { status: u16, body: Value },
        Text { status: u16, body: String },
        NetworkError(String),
        /// Fail below the HTTP layer with a specific error class
        Failure(TransportError),
    }

    impl MockReply {
        pub fn ok(body: Value) -> Self {
            MockReply::Json { status: 200, body }
        }

        pub fn no_content() -> Self {
            MockReply::Text {
                status: 204,
                body: String::new(),
            }
        }

        /// Panel-style error envelope with the given detail
        pub fn error(status: u16, detail: &str) -> Self {
            MockReply::Json {
                status,
                body: serde_json::json!({
                    "errors": [{ "code": "MockError", "status": status.to_string(), "detail": detail }]
                }),
            }
        }
    }

    struct Route {
        method: Method,
        url: String,
        replies: VecDeque<MockReply>,
        last: Option<MockReply>,
    }

    /// Mock transport that matches on method + exact URL.
    ///
    /// Replies registered for the same route are consumed in order; the last
    /// one repeats once the queue is drained. Unmatched requests get a 404.
    #[derive(Clone, Default)]
    pub struct MockTransport {
        routes: Arc<Mutex<Vec<Route>>>,
        /// Recorded requests, in send order
        pub calls: Arc<Mutex<Vec<HttpRequest>>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a reply for a route
        pub fn on(self, method: Method, url: &str, reply: MockReply) -> Self {
            self.push(method, url, reply);
            self
        }

        /// Queue a reply on an already shared transport
        pub fn push(&self, method: Method, url: &str, reply: MockReply) {
            let mut routes = self.routes.lock().unwrap();
            if let Some(route) = routes
                .iter_mut()
                .find(|r| r.method == method && r.url == url)
            {
                route.replies.push_back(reply);
                return;
            }
            routes.push(Route {
                method,
                url: url.to_string(),
                replies: VecDeque::from([reply]),
                last: None,
            });
        }

        pub fn get_calls(&self) -> Vec<HttpRequest> {
            self.calls.lock().unwrap().clone()
        }

        /// Number of requests sent with `method` to a URL starting with `prefix`
        pub fn count(&self, method: Method, prefix: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.method == method && c.url.starts_with(prefix))
                .count()
        }

        /// Number of requests sent with `method`, any URL
        pub fn count_method(&self, method: Method) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.method == method)
                .count()
        }

        fn next_reply(&self, request: &HttpRequest) -> Option<MockReply> {
            let mut routes = self.routes.lock().unwrap();
            let route = routes
                .iter_mut()
                .find(|r| r.method == request.method && r.url == request.url)?;
            if let Some(reply) = route.replies.pop_front() {
                route.last = Some(reply.clone());
                Some(reply)
            } else {
                route.last.clone()
            }
        }
    }

    impl HttpTransport for MockTransport {
        fn send(&self, request: &HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
            self.calls.lock().unwrap().push(request.clone());

            match self.next_reply(request) {
                Some(MockReply::Json { status, body }) => Ok(HttpResponse {
                    status,
                    body: body.to_string(),
                }),
                Some(MockReply::Text { status, body }) => Ok(HttpResponse { status, body }),
                Some(MockReply::NetworkError(cause)) => Err(TransportError::Connect(cause)),
                Some(MockReply::Failure(err)) => Err(err),
                None => Ok(HttpResponse {
                    status: 404,
                    body: format!("no mock route for {} {}", request.method, request.url),
                }),
            }
        }
    }
}
