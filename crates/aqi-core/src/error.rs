use thiserror::Error;

/// Error taxonomy shared by every layer of the pipeline.
///
/// Provider errors are absorbed at the client boundary (converted to a
/// fallback or `None`); only [`AqiError::BadRequest`] and
/// [`AqiError::Internal`] are meant to reach the transport boundary.
#[derive(Debug, Error, Clone)]
pub enum AqiError {
    /// Invalid query. Never retried, never sent upstream.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Upstream deadline elapsed before a response arrived.
    #[error("upstream timeout")]
    Timeout,

    /// Non-2xx response or a payload that failed to parse.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Diagnostic marker attached to payloads produced by the deterministic
    /// mock fallback rather than a live upstream response.
    #[error("fallback mock used")]
    FallbackMock,

    /// No provider produced data and mocks are disabled by configuration.
    #[error("no data available")]
    Unavailable,

    /// Referenced entity (subscriber, forecast, etc.) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Programmer error or invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AqiError {
    pub fn is_fallback(&self) -> bool {
        matches!(self, AqiError::FallbackMock)
    }
}

pub type AqiResult<T> = Result<T, AqiError>;
