/// Errors surfaced by the panel API client
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP {0}: {1}")]
    HttpStatus(u16, String),

    #[error("retries exhausted for {url} (last status: {})", status_label(.last_status))]
    RetriesExhausted { url: String, last_status: Option<u16> },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// Whether the client may retry the request that produced this error
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Network(_) => true,
            ApiError::HttpStatus(code, _) => (500..600).contains(code),
            _ => false,
        }
    }
}

fn status_label(status: &Option<u16>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "none".to_string(),
    }
}
