//! Error taxonomy for the fetch core.
//!
//! Transport and normalizer failures are internal; callers only ever see
//! [`FetchError`], which the orchestrator builds by classifying them.

use thiserror::Error;

/// Failure of a single HTTP round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Timeout, DNS failure, refused or reset connection.
    #[error("network error: {0}")]
    Network(String),

    #[error("upstream returned HTTP {0}")]
    Http(u16),

    /// 2xx response whose body was not JSON.
    #[error("could not decode response body: {0}")]
    Decode(String),
}

// reqwest's Display includes the request URL, which carries `appid`.
impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return TransportError::Http(status.as_u16());
        }
        let err = err.without_url();
        if err.is_decode() {
            return TransportError::Decode(err.to_string());
        }
        TransportError::Network(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("required field `{0}` is missing or malformed")]
    MissingField(&'static str),
}

/// Everything a fetch can fail with, as seen by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("weather provider returned HTTP {0}")]
    Upstream(u16),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("device location is unavailable")]
    LocationUnavailable,
}

/// Cloneable classification of a [`FetchError`], kept in `FetchState::Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidQuery,
    Network,
    Upstream(u16),
    MalformedResponse,
    Configuration,
    LocationUnavailable,
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidQuery(_) => ErrorKind::InvalidQuery,
            Self::Network(_) => ErrorKind::Network,
            Self::Upstream(status) => ErrorKind::Upstream(*status),
            Self::MalformedResponse(_) => ErrorKind::MalformedResponse,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::LocationUnavailable => ErrorKind::LocationUnavailable,
        }
    }

    /// Only connectivity failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// User-friendly message for display.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidQuery(reason) => format!("Invalid query: {reason}."),
            other => other.kind().user_message(),
        }
    }
}

impl ErrorKind {
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidQuery => {
                "Please enter a city name or coordinates within range.".to_string()
            }
            Self::Network => "Network error. Check your connection.".to_string(),
            Self::Upstream(404) => "City not found.".to_string(),
            Self::Upstream(401) => "Invalid API key. Run `weather configure`.".to_string(),
            Self::Upstream(429) => "Too many requests. Try again later.".to_string(),
            Self::Upstream(status) => format!("Weather service error (HTTP {status})."),
            Self::MalformedResponse => "The weather service sent an unexpected response.".to_string(),
            Self::Configuration => "Weather service is not configured.".to_string(),
            Self::LocationUnavailable => "Current location is unavailable.".to_string(),
        }
    }
}

impl From<TransportError> for FetchError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Network(msg) => FetchError::Network(msg),
            TransportError::Http(status) => FetchError::Upstream(status),
            TransportError::Decode(msg) => FetchError::MalformedResponse(msg),
        }
    }
}

impl From<NormalizeError> for FetchError {
    fn from(err: NormalizeError) -> Self {
        FetchError::MalformedResponse(err.to_string())
    }
}
