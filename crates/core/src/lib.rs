//! Opsdeck core types and token storage

pub mod error;
pub mod store;
pub mod types;

pub use error::StoreError;
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use types::{ApiEnvelope, Category, Roles, TokenPair, UserProfile};
