use serde::{Deserialize, Serialize};

/// Access/refresh token pair as returned by the auth endpoints.
///
/// Both values are opaque to the client; expiry is only ever discovered by
/// the API rejecting a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub token: String,
    pub refresh_token: String,
}

/// A user's role assignment, which the API returns either as a single
/// string or as a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Roles {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: Option<Roles>,
    #[serde(default)]
    pub verified: Option<bool>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Standard response envelope used by the console API.
///
/// Some endpoints omit the `success` flag entirely and just wrap their
/// payload in `data`; a missing flag is treated as success.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default = "default_success")]
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

const fn default_success() -> bool {
    true
}

impl<T> ApiEnvelope<T> {
    /// Unwrap the payload, failing closed when the envelope reports an error
    /// or carries no data.
    pub fn into_data(self) -> Result<T, String> {
        if !self.success {
            return Err(self
                .message
                .unwrap_or_else(|| "request was not successful".to_string()));
        }
        self.data
            .ok_or_else(|| "response is missing its data payload".to_string())
    }

    /// Check the success flag, keeping the payload optional. Used for
    /// endpoints that acknowledge with `success`/`message` only.
    pub fn ensure_success(self) -> Result<Option<T>, String> {
        if self.success {
            Ok(self.data)
        } else {
            Err(self
                .message
                .unwrap_or_else(|| "request was not successful".to_string()))
        }
    }
}
