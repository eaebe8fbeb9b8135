use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),
    #[error("timeout")]
    Timeout,
    #[error("http {status}: {message}")]
    Status { status: u16, message: String },
    /// Failure status whose body carried no usable message (an HTML error
    /// page from a proxy, an empty body).
    #[error("http {status}: {reason}")]
    Http { status: u16, reason: String },
    #[error("{0}")]
    Rejected(String),
    #[error("json error: {0}")]
    Decode(String),
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

impl ApiError {
    /// Error for a non-2xx response. Only a message the backend put in a JSON
    /// body is kept as user-facing text.
    pub fn from_status(status: u16, message: Option<String>) -> Self {
        match message.filter(|m| !m.trim().is_empty()) {
            Some(message) => Self::Status { status, message },
            None => Self::Http {
                status,
                reason: reqwest::StatusCode::from_u16(status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("unexpected status")
                    .to_string(),
            },
        }
    }

    /// Message the backend itself supplied, if any. Transport and decode
    /// failures have none and fall back to the caller's generic text.
    pub fn user_message(&self) -> Option<&str> {
        match self {
            Self::Status { message, .. } | Self::Rejected(message) => {
                let t = message.trim();
                (!t.is_empty()).then_some(t)
            }
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } | Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub(crate) fn map_reqwest_error(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout
    } else if e.is_decode() {
        ApiError::Decode(e.to_string())
    } else {
        ApiError::Network(e.to_string())
    }
}
