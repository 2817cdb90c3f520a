//! Public authentication flows
//!
//! Sign-in, sign-up, verification and password-reset calls. None of these
//! attach an access token; on success the resulting token pair is written
//! through the session coordinator so there is exactly one source of truth
//! for session state.

use crate::error::ClientError;
use crate::session::SessionCoordinator;
use opsdeck_core::{ApiEnvelope, UserProfile};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use tracing::debug;

/// Details for a new account registration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    pub name: String,
    /// Email address or phone number
    pub identifier: String,
    pub password: String,
    pub role: String,
}

/// Pending verification step handed back by sign-in/sign-up when the
/// account is not yet verified. Nothing is persisted in that case.
#[derive(Debug, Clone)]
pub struct VerificationChallenge {
    /// Delivery method, `email` or `sms`
    pub method: String,
    pub verification_token: Option<String>,
    pub phone: Option<String>,
    pub user: Option<UserProfile>,
}

/// Outcome of a credential sign-in or sign-up.
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    /// Tokens were issued and persisted
    Authenticated { user: Option<UserProfile> },
    /// The account must complete a verification step first
    VerificationRequired(VerificationChallenge),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthData {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    verification_required: bool,
    #[serde(default)]
    verification_method: Option<String>,
    #[serde(default)]
    verification_token: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    user: Option<UserProfile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResendData {
    #[serde(default)]
    verification_token: Option<String>,
    #[serde(default)]
    otp: Option<String>,
    #[serde(default)]
    reset_method: Option<String>,
}

/// Error body shape used by the API for non-2xx answers.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Authentication API service
#[derive(Debug, Clone)]
pub struct AuthApi {
    session: SessionCoordinator,
}

impl AuthApi {
    /// Create a new auth API service sharing the coordinator's transport
    /// and storage.
    pub fn new(session: SessionCoordinator) -> Self {
        Self { session }
    }

    /// Sign in with credentials.
    ///
    /// When the account is verified the returned token pair is persisted
    /// and the outcome is [`LoginOutcome::Authenticated`]; otherwise the
    /// verification challenge is surfaced and nothing is stored.
    pub async fn login(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<LoginOutcome, ClientError> {
        let data: AuthData = self
            .post_public(
                "/auth/login",
                &serde_json::json!({ "identifier": identifier, "password": password }),
            )
            .await?;
        if data.verification_required {
            return Ok(LoginOutcome::VerificationRequired(challenge(data)?));
        }
        self.persist(data).await
    }

    /// Register a new account. Tokens are persisted when issued; accounts
    /// created with a verification method pending surface the challenge.
    pub async fn register(&self, account: &NewAccount) -> Result<LoginOutcome, ClientError> {
        let data: AuthData = self.post_public("/auth/register", account).await?;
        if data.verification_method.is_some() {
            // tokens may still be issued for the unverified account
            self.store_tokens(&data).await?;
            return Ok(LoginOutcome::VerificationRequired(challenge(data)?));
        }
        self.persist(data).await
    }

    /// Confirm an email verification token (from the emailed link or a
    /// pending challenge).
    pub async fn verify_email(&self, token: &str) -> Result<(), ClientError> {
        self.post_ack("/auth/verify", &serde_json::json!({ "token": token }))
            .await
    }

    /// Confirm a one-time code delivered over SMS.
    pub async fn verify_otp(&self, phone: &str, otp: &str) -> Result<(), ClientError> {
        self.post_ack(
            "/auth/verify-otp",
            &serde_json::json!({ "phone": phone, "otp": otp }),
        )
        .await
    }

    /// Request a fresh SMS code. Returns the code when the API echoes it
    /// back (test environments do).
    pub async fn send_otp(&self, phone: &str) -> Result<Option<String>, ClientError> {
        let data: ResendData = self
            .post_flat("/auth/send-otp", &serde_json::json!({ "phone": phone }))
            .await?;
        Ok(data.otp)
    }

    /// Re-send the verification email. Returns the fresh verification
    /// token when the API includes one.
    pub async fn resend_email_verification(
        &self,
        email: &str,
    ) -> Result<Option<String>, ClientError> {
        let data: ResendData = self
            .post_flat(
                "/auth/resend-email-verification",
                &serde_json::json!({ "email": email }),
            )
            .await?;
        Ok(data.verification_token)
    }

    /// Start a password reset. Returns the delivery method used.
    pub async fn forgot_password(&self, identifier: &str) -> Result<String, ClientError> {
        let data: ResendData = self
            .post_flat(
                "/auth/forgot-password",
                &serde_json::json!({ "identifier": identifier }),
            )
            .await?;
        Ok(data.reset_method.unwrap_or_else(|| "email".to_string()))
    }

    /// End the session and notify the host application.
    pub async fn logout(&self) {
        self.session.logout().await;
    }

    async fn persist(&self, data: AuthData) -> Result<LoginOutcome, ClientError> {
        if data.token.is_none() {
            return Err(ClientError::Api(
                "auth response is missing its token".to_string(),
            ));
        }
        self.store_tokens(&data).await?;
        debug!("credentials accepted, session tokens stored");
        Ok(LoginOutcome::Authenticated { user: data.user })
    }

    async fn store_tokens(&self, data: &AuthData) -> Result<(), ClientError> {
        if let Some(token) = &data.token {
            self.session.set_access_token(token).await?;
        }
        if let Some(refresh_token) = &data.refresh_token {
            self.session.set_refresh_token(refresh_token).await?;
        }
        Ok(())
    }

    /// POST to an enveloped endpoint and unwrap `data`.
    async fn post_public<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let envelope: ApiEnvelope<T> = self.post_raw(path, body).await?;
        envelope.into_data().map_err(ClientError::Api)
    }

    /// POST to an endpoint that only acknowledges via `success`/`message`.
    async fn post_ack<B>(&self, path: &str, body: &B) -> Result<(), ClientError>
    where
        B: Serialize + ?Sized,
    {
        let envelope: ApiEnvelope<serde_json::Value> = self.post_raw(path, body).await?;
        envelope
            .ensure_success()
            .map(|_| ())
            .map_err(ClientError::Api)
    }

    /// POST to an endpoint that answers with a flat (non-enveloped) body.
    async fn post_flat<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.post_raw(path, body).await
    }

    async fn post_raw<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.session.base_url(), path);
        let response = self
            .session
            .transport()
            .post(url)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_else(|_| status.to_string());
            let message = serde_json::from_str::<ErrorBody>(&raw)
                .ok()
                .and_then(|body| body.message)
                .unwrap_or(raw);
            return Err(ClientError::from_status(status, message));
        }

        Ok(response.json().await?)
    }
}

fn challenge(data: AuthData) -> Result<VerificationChallenge, ClientError> {
    let method = data.verification_method.ok_or_else(|| {
        ClientError::Api("auth response is missing its verification method".to_string())
    })?;
    let phone = data
        .phone
        .or_else(|| data.user.as_ref().and_then(|user| user.phone.clone()));
    Ok(VerificationChallenge {
        method,
        verification_token: data.verification_token,
        phone,
        user: data.user,
    })
}
