use thiserror::Error;

/// Ways a single resolution attempt can fail.
///
/// Every variant is retryable under the default policy; the resolver decides
/// per kind whether another attempt is worthwhile.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no taxonomy entry matches '{term}'")]
    NotFound { term: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{service} rate limit exceeded")]
    RateLimited { service: &'static str },

    #[error("malformed {service} response: {reason}")]
    MalformedResponse {
        service: &'static str,
        reason: String,
    },

    #[error("{service} returned HTTP {status}")]
    Http {
        service: &'static str,
        status: u16,
    },
}

impl ResolveError {
    pub fn malformed<S: Into<String>>(service: &'static str, reason: S) -> Self {
        ResolveError::MalformedResponse {
            service,
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ResolveError::NotFound { .. })
    }
}
