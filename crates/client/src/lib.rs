//! Opsdeck console API client
//!
//! The centerpiece is the [`SessionCoordinator`]: it owns the stored
//! access/refresh token pair, attaches the bearer header to every
//! authenticated call, and recovers from an expired access token with a
//! single de-duplicated refresh followed by exactly one retry. The
//! [`AuthApi`] and [`AdminApi`] services are thin typed surfaces over the
//! console's endpoints, all routed through the same coordinator.

pub mod admin;
pub mod auth;
pub mod error;
pub mod session;

pub use admin::{AdminApi, UserPayload};
pub use auth::{AuthApi, LoginOutcome, NewAccount, VerificationChallenge};
pub use error::{ClientError, RefreshError};
pub use session::{SessionCoordinator, SessionCoordinatorBuilder};
