//! Client error types

use opsdeck_core::StoreError;
use std::sync::Arc;
use thiserror::Error;

/// Failure of a token refresh cycle.
///
/// Cloneable because every caller joined on an in-flight refresh observes
/// the same outcome.
#[derive(Debug, Clone, Error)]
pub enum RefreshError {
    /// No refresh token in storage; nothing was modified
    #[error("no refresh token available")]
    NoRefreshToken,

    /// The refresh endpoint rejected the request
    #[error("refresh endpoint returned {status}: {message}")]
    Rejected { status: u16, message: String },

    /// The refresh endpoint answered 2xx with an unusable body
    #[error("malformed refresh response: {0}")]
    MalformedResponse(String),

    /// Network-level failure while calling the refresh endpoint
    #[error("transport error during refresh: {0}")]
    Transport(Arc<reqwest::Error>),

    /// Token storage failed while reading or persisting the pair
    #[error("token storage error during refresh: {0}")]
    Storage(Arc<StoreError>),
}

/// Client error types
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or request error
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server returned an error status
    #[error("server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Authentication failed
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Resource not found
    #[error("resource not found: {0}")]
    NotFound(String),

    /// Bad request
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Forbidden
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Attempted an authenticated call with no stored access token
    #[error("no access token available")]
    NoAccessToken,

    /// The access token was rejected and could not be refreshed
    #[error("token refresh failed: {0}")]
    RefreshFailed(#[source] RefreshError),

    /// Token storage failure
    #[error("token storage error: {0}")]
    Storage(#[from] StoreError),

    /// The API answered 2xx but reported a failure in its envelope
    #[error("API error: {0}")]
    Api(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Create error from HTTP status code
    pub fn from_status(status: reqwest::StatusCode, message: String) -> Self {
        match status.as_u16() {
            400 => Self::BadRequest(message),
            401 => Self::AuthenticationFailed(message),
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            _ => Self::ServerError {
                status: status.as_u16(),
                message,
            },
        }
    }
}
