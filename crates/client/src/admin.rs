//! Authenticated console API
//!
//! Every call here goes through the session coordinator's `send`, so an
//! expired access token is refreshed and the call retried transparently.

use crate::error::ClientError;
use crate::session::SessionCoordinator;
use opsdeck_core::{ApiEnvelope, Category, UserProfile};
use reqwest::Method;
use serde::{Deserialize, Serialize};

/// Fields accepted by the user create/update endpoint.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPayload {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub verified: bool,
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
struct ProfileData {
    #[serde(default)]
    user: Option<UserProfile>,
}

/// Admin API service for the users and categories screens.
#[derive(Debug, Clone)]
pub struct AdminApi {
    session: SessionCoordinator,
}

impl AdminApi {
    pub fn new(session: SessionCoordinator) -> Self {
        Self { session }
    }

    /// Fetch the signed-in user's profile and cache it alongside the
    /// tokens.
    pub async fn profile(&self) -> Result<UserProfile, ClientError> {
        let request = self.session.request(Method::GET, "/profile");
        let data: ProfileData = self.session.execute_enveloped(request).await?;
        let profile = data
            .user
            .ok_or_else(|| ClientError::Api("profile response is missing its user".to_string()))?;
        self.session.cache_profile(&profile).await?;
        Ok(profile)
    }

    /// List users, newest first, up to `limit`.
    pub async fn list_users(&self, limit: u32) -> Result<Vec<UserProfile>, ClientError> {
        let request = self
            .session
            .request(Method::GET, &format!("/admin/users?limit={limit}"));
        self.session.execute_enveloped(request).await
    }

    pub async fn get_user(&self, id: &str) -> Result<UserProfile, ClientError> {
        let request = self
            .session
            .request(Method::GET, &format!("/user/get-user/{id}"));
        self.session.execute_enveloped(request).await
    }

    /// Create a user. The endpoint treats the id segment `new` as creation.
    pub async fn create_user(&self, payload: &UserPayload) -> Result<UserProfile, ClientError> {
        let request = self
            .session
            .request(Method::PUT, "/user/update-user/new")
            .json(payload);
        self.session.execute_enveloped(request).await
    }

    pub async fn update_user(&self, id: &str, payload: &UserPayload) -> Result<(), ClientError> {
        let request = self
            .session
            .request(Method::PUT, &format!("/user/update-user/{id}"))
            .json(payload);
        self.acknowledge(request).await
    }

    pub async fn delete_users(&self, ids: &[String]) -> Result<(), ClientError> {
        let request = self
            .session
            .request(Method::POST, "/user/delete-user")
            .json(&serde_json::json!({ "ids": ids }));
        self.acknowledge(request).await
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>, ClientError> {
        let request = self.session.request(Method::GET, "/categories");
        self.session.execute_enveloped(request).await
    }

    pub async fn get_category(&self, id: &str) -> Result<Category, ClientError> {
        let request = self.session.request(Method::GET, &format!("/categories/{id}"));
        self.session.execute_enveloped(request).await
    }

    pub async fn delete_categories(&self, ids: &[String]) -> Result<(), ClientError> {
        let request = self
            .session
            .request(Method::POST, "/categories/delete-category")
            .json(&serde_json::json!({ "ids": ids }));
        self.acknowledge(request).await
    }

    async fn acknowledge(&self, request: reqwest::RequestBuilder) -> Result<(), ClientError> {
        let envelope: ApiEnvelope<serde_json::Value> = self.session.execute(request).await?;
        envelope
            .ensure_success()
            .map(|_| ())
            .map_err(ClientError::Api)
    }
}
