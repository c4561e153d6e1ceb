//! Error types for the catalog data layer.

use thiserror::Error;

/// Outcome of a single request that did not produce data.
///
/// `Clone` because one in-flight result is handed to every de-duplicated
/// waiter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Decode(String),

    #[error("Request cancelled")]
    Cancelled,
}

impl ApiError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Cancelled)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Status { status: 404, .. })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            ApiError::Status {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            ApiError::Network(e.to_string())
        }
    }
}

/// Which presentation a failed query calls for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    Network,
    Http,
    Decode,
}

/// A failed query as seen by the view layer.
///
/// Cancellation never becomes a `QueryError`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub message: String,
    /// HTTP status for upstream failures
    pub status: Option<u16>,
}

impl QueryError {
    pub fn is_network(&self) -> bool {
        self.kind == QueryErrorKind::Network
    }

    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }

    /// Map a request outcome, `None` for cancellation
    pub fn from_api(error: ApiError) -> Option<Self> {
        let (kind, status) = match &error {
            ApiError::Cancelled => return None,
            ApiError::Network(_) => (QueryErrorKind::Network, None),
            ApiError::Status { status, .. } => (QueryErrorKind::Http, Some(*status)),
            ApiError::Decode(_) => (QueryErrorKind::Decode, None),
        };

        Some(Self {
            kind,
            message: error.to_string(),
            status,
        })
    }
}
