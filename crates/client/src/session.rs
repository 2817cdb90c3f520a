//! Session token coordinator
//!
//! Owns the stored access/refresh token pair and supplies a single entry
//! point for authenticated calls: [`SessionCoordinator::send`] either hands
//! back a response or a definitive error, transparently recovering from an
//! expired access token with one de-duplicated refresh and one retry.

use crate::error::{ClientError, RefreshError};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use opsdeck_core::store::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, TokenStore, USER_KEY};
use opsdeck_core::{ApiEnvelope, MemoryTokenStore, StoreError, TokenPair, UserProfile};
use reqwest::header::{self, HeaderValue};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

type SharedRefresh = Shared<BoxFuture<'static, Result<String, RefreshError>>>;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    refresh_token: String,
}

/// Coordinates the access/refresh token pair for one logical session.
///
/// Cheap to clone; clones share the same storage and in-flight refresh
/// state, so the at-most-one-concurrent-refresh invariant holds across all
/// handles.
#[derive(Clone)]
pub struct SessionCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    base_url: String,
    store: Arc<dyn TokenStore>,
    on_session_expired: Option<Box<dyn Fn() + Send + Sync>>,
    // Some(..) exactly while a refresh cycle is in flight; callers arriving
    // during that window join the shared future instead of starting another
    refresh: tokio::sync::Mutex<Option<SharedRefresh>>,
}

impl std::fmt::Debug for SessionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCoordinator")
            .field("base_url", &self.inner.base_url)
            .finish_non_exhaustive()
    }
}

impl SessionCoordinator {
    /// Create a new coordinator builder
    pub fn builder() -> SessionCoordinatorBuilder {
        SessionCoordinatorBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub(crate) fn transport(&self) -> &reqwest::Client {
        &self.inner.http
    }

    /// Read the current access token from storage; no side effects.
    pub async fn access_token(&self) -> Result<Option<String>, StoreError> {
        self.inner.store.get(ACCESS_TOKEN_KEY).await
    }

    /// Read the current refresh token from storage.
    pub async fn refresh_token(&self) -> Result<Option<String>, StoreError> {
        self.inner.store.get(REFRESH_TOKEN_KEY).await
    }

    /// Persist a new access token, overwriting any prior value.
    pub async fn set_access_token(&self, token: &str) -> Result<(), StoreError> {
        self.inner.store.set(ACCESS_TOKEN_KEY, token).await
    }

    /// Persist a new refresh token, overwriting any prior value.
    pub async fn set_refresh_token(&self, token: &str) -> Result<(), StoreError> {
        self.inner.store.set(REFRESH_TOKEN_KEY, token).await
    }

    /// True iff an access token is present. Does not validate it against
    /// the server.
    pub async fn is_authenticated(&self) -> bool {
        match self.access_token().await {
            Ok(token) => token.is_some(),
            Err(err) => {
                warn!(error = %err, "failed to read access token from storage");
                false
            }
        }
    }

    /// Remove both tokens and the cached profile. Idempotent.
    pub async fn clear_tokens(&self) -> Result<(), StoreError> {
        clear_store(self.inner.store.as_ref()).await
    }

    /// Persist the user profile alongside the tokens.
    pub async fn cache_profile(&self, profile: &UserProfile) -> Result<(), ClientError> {
        let raw = serde_json::to_string(profile)?;
        self.inner.store.set(USER_KEY, &raw).await?;
        Ok(())
    }

    /// Read the cached user profile, if one was stored.
    pub async fn cached_profile(&self) -> Result<Option<UserProfile>, ClientError> {
        let Some(raw) = self.inner.store.get(USER_KEY).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Exchange the stored refresh token for a new token pair.
    ///
    /// At most one refresh call is in flight at any time: callers that
    /// arrive while one is running join it and observe the exact same
    /// outcome. On success the rotated pair is persisted and the new access
    /// token returned; on failure all session state is cleared so the next
    /// attempt starts from scratch.
    pub async fn refresh_access_token(&self) -> Result<String, RefreshError> {
        let fut = {
            let mut slot = self.inner.refresh.lock().await;
            if let Some(in_flight) = slot.as_ref() {
                debug!("joining in-flight token refresh");
                in_flight.clone()
            } else {
                let refresh_token = self
                    .inner
                    .store
                    .get(REFRESH_TOKEN_KEY)
                    .await
                    .map_err(|err| RefreshError::Storage(Arc::new(err)))?
                    .ok_or(RefreshError::NoRefreshToken)?;
                let fut = perform_refresh(Arc::clone(&self.inner), refresh_token)
                    .boxed()
                    .shared();
                *slot = Some(fut.clone());
                fut
            }
        };

        let outcome = fut.clone().await;

        // Reset the slot so the next caller starts a fresh cycle. Guarded by
        // identity so a newer generation is never clobbered.
        let mut slot = self.inner.refresh.lock().await;
        if slot.as_ref().is_some_and(|current| fut.ptr_eq(current)) {
            *slot = None;
        }
        drop(slot);

        outcome
    }

    /// Create a request builder for a path under the base URL. No
    /// authorization is attached here; [`send`](Self::send) does that.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.inner.base_url, path);
        self.inner.http.request(method, url)
    }

    /// Issue an authenticated request.
    ///
    /// Attaches the stored access token as a bearer header (the caller's
    /// other headers are preserved, but the authorization header is always
    /// the coordinator's). A 401/403 answer triggers one refresh and one
    /// retry with the new token; that retried response is returned as-is,
    /// whatever its status. Any other status passes through untouched.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let token = self
            .access_token()
            .await?
            .ok_or(ClientError::NoAccessToken)?;

        let retry = request.try_clone();
        let response = dispatch(request, &token).await?;
        let status = response.status();
        if status != StatusCode::UNAUTHORIZED && status != StatusCode::FORBIDDEN {
            return Ok(response);
        }

        let Some(retry) = retry else {
            // streaming bodies cannot be replayed, hand the rejection back
            return Ok(response);
        };

        debug!(status = %status, "access token rejected, attempting refresh");
        match self.refresh_access_token().await {
            Ok(new_token) => Ok(dispatch(retry, &new_token).await?),
            Err(err) => {
                self.expire_session().await;
                Err(ClientError::RefreshFailed(err))
            }
        }
    }

    /// Issue an authenticated request and decode a 2xx JSON body, mapping
    /// error statuses onto [`ClientError`].
    pub async fn execute<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = self.send(request).await?;
        let status = response.status();

        if status.is_success() {
            Ok(response.json().await?)
        } else {
            let message = response.text().await.unwrap_or_else(|_| status.to_string());
            Err(ClientError::from_status(status, message))
        }
    }

    /// Issue an authenticated request against an enveloped endpoint and
    /// unwrap its `data` payload.
    pub async fn execute_enveloped<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        let envelope: ApiEnvelope<T> = self.execute(request).await?;
        envelope.into_data().map_err(ClientError::Api)
    }

    /// End the session: clear stored state and notify the host application.
    pub async fn logout(&self) {
        self.expire_session().await;
    }

    async fn expire_session(&self) {
        if let Err(err) = self.clear_tokens().await {
            error!(error = %err, "failed to clear session storage");
        }
        if let Some(hook) = &self.inner.on_session_expired {
            hook();
        }
    }
}

/// Build the request with the coordinator's bearer header and execute it.
async fn dispatch(request: RequestBuilder, token: &str) -> Result<Response, ClientError> {
    let bearer = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
        ClientError::Configuration("stored access token is not a valid header value".to_string())
    })?;
    let (client, request) = request.build_split();
    let mut request = request?;
    request.headers_mut().insert(header::AUTHORIZATION, bearer);
    Ok(client.execute(request).await?)
}

/// One refresh cycle: call the endpoint, persist the rotated pair on
/// success, clear the session on any failure. A failure to persist the
/// pair counts as a failed cycle, so a half-written pair is never left
/// behind.
async fn perform_refresh(inner: Arc<Inner>, refresh_token: String) -> Result<String, RefreshError> {
    let outcome = match call_refresh_endpoint(&inner, refresh_token).await {
        Ok(pair) => persist_pair(inner.store.as_ref(), &pair)
            .await
            .map(|()| pair.token)
            .map_err(|err| RefreshError::Storage(Arc::new(err))),
        Err(err) => Err(err),
    };

    match outcome {
        Ok(token) => {
            debug!("access token refreshed");
            Ok(token)
        }
        Err(err) => {
            warn!(error = %err, "token refresh failed, clearing stored session");
            if let Err(store_err) = clear_store(inner.store.as_ref()).await {
                error!(error = %store_err, "failed to clear session storage after refresh failure");
            }
            Err(err)
        }
    }
}

async fn persist_pair(store: &dyn TokenStore, pair: &TokenPair) -> Result<(), StoreError> {
    store.set(ACCESS_TOKEN_KEY, &pair.token).await?;
    store.set(REFRESH_TOKEN_KEY, &pair.refresh_token).await?;
    Ok(())
}

async fn call_refresh_endpoint(
    inner: &Inner,
    refresh_token: String,
) -> Result<TokenPair, RefreshError> {
    let url = format!("{}/auth/refresh-token", inner.base_url);
    let response = inner
        .http
        .post(url)
        .json(&RefreshRequest { refresh_token })
        .send()
        .await
        .map_err(|err| RefreshError::Transport(Arc::new(err)))?;

    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_else(|_| status.to_string());
        return Err(RefreshError::Rejected {
            status: status.as_u16(),
            message,
        });
    }

    let envelope: ApiEnvelope<TokenPair> = response
        .json()
        .await
        .map_err(|err| RefreshError::MalformedResponse(err.to_string()))?;
    envelope.into_data().map_err(RefreshError::MalformedResponse)
}

async fn clear_store(store: &dyn TokenStore) -> Result<(), StoreError> {
    store.remove(ACCESS_TOKEN_KEY).await?;
    store.remove(REFRESH_TOKEN_KEY).await?;
    store.remove(USER_KEY).await?;
    Ok(())
}

/// Builder for [`SessionCoordinator`]
#[derive(Default)]
pub struct SessionCoordinatorBuilder {
    base_url: Option<String>,
    store: Option<Arc<dyn TokenStore>>,
    http: Option<reqwest::Client>,
    user_agent: Option<String>,
    timeout: Option<Duration>,
    on_session_expired: Option<Box<dyn Fn() + Send + Sync>>,
}

impl SessionCoordinatorBuilder {
    /// Set the base URL (required)
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Inject the token store. Defaults to an in-memory store.
    pub fn store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Inject a preconfigured transport instead of building one
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http = Some(client);
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Called when the session is irrecoverably over (logout or failed
    /// refresh). The host application redirects to its sign-in entry point
    /// from here.
    pub fn on_session_expired<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_session_expired = Some(Box::new(hook));
        self
    }

    /// Build the coordinator
    pub fn build(self) -> Result<SessionCoordinator, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".to_string()))?;
        let base_url = base_url.trim_end_matches('/').to_string();

        let http = match self.http {
            Some(client) => client,
            None => {
                let mut builder = reqwest::ClientBuilder::new().user_agent(
                    self.user_agent
                        .unwrap_or_else(|| "opsdeck-client/0.1.0".to_string()),
                );
                if let Some(timeout) = self.timeout {
                    builder = builder.timeout(timeout);
                }
                builder.build()?
            }
        };

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryTokenStore::new()));

        Ok(SessionCoordinator {
            inner: Arc::new(Inner {
                http,
                base_url,
                store,
                on_session_expired: self.on_session_expired,
                refresh: tokio::sync::Mutex::new(None),
            }),
        })
    }
}
