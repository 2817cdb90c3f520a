//! Durable key-value storage for session state
//!
//! The console keeps its session under three well-known keys: the access
//! token, the refresh token, and the cached user profile. Anything that
//! writes these keys outside the session coordinator (the sign-in flow does)
//! is an accepted alternate entry point into the same state.

use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;

/// Storage key for the short-lived access token.
pub const ACCESS_TOKEN_KEY: &str = "token";
/// Storage key for the long-lived refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
/// Storage key for the cached user profile, cleared alongside the tokens.
pub const USER_KEY: &str = "user";

/// Key-value backend for session state.
///
/// Implementations must tolerate concurrent callers; the coordinator is the
/// only writer of the token keys during refresh, but readers may be anywhere.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    entries: std::sync::Mutex<HashMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().expect("token store mutex poisoned");
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().expect("token store mutex poisoned");
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().expect("token store mutex poisoned");
        entries.remove(key);
        Ok(())
    }
}

/// File-backed store: a single JSON document holding all keys, so the
/// session survives process restarts.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    // serializes read-modify-write cycles on the backing file
    lock: tokio::sync::Mutex<()>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    async fn load(&self) -> Result<HashMap<String, String>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(err) => Err(err.into()),
        }
    }

    async fn save(&self, entries: &HashMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(entries)?;
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        entries.insert(key.to_string(), value.to_string());
        self.save(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        if entries.remove(key).is_some() {
            self.save(&entries).await?;
        }
        Ok(())
    }
}

// Mock implementation for testing
#[cfg(any(test, feature = "mocks"))]
pub mod mock {
    use super::*;
    use mockall::mock;

    mock! {
        pub TokenStore {}

        #[async_trait]
        impl TokenStore for TokenStore {
            async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
            async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
            async fn remove(&self, key: &str) -> Result<(), StoreError>;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_round_trips() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.get(ACCESS_TOKEN_KEY).await.unwrap(), None);

        store.set(ACCESS_TOKEN_KEY, "A1").await.unwrap();
        assert_eq!(
            store.get(ACCESS_TOKEN_KEY).await.unwrap(),
            Some("A1".to_string())
        );

        store.set(ACCESS_TOKEN_KEY, "A2").await.unwrap();
        assert_eq!(
            store.get(ACCESS_TOKEN_KEY).await.unwrap(),
            Some("A2".to_string())
        );

        store.remove(ACCESS_TOKEN_KEY).await.unwrap();
        assert_eq!(store.get(ACCESS_TOKEN_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_store_remove_is_idempotent() {
        let store = MemoryTokenStore::new();
        store.set(REFRESH_TOKEN_KEY, "R1").await.unwrap();
        store.remove(REFRESH_TOKEN_KEY).await.unwrap();
        store.remove(REFRESH_TOKEN_KEY).await.unwrap();
        assert_eq!(store.get(REFRESH_TOKEN_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = FileTokenStore::new(&path);
        store.set(ACCESS_TOKEN_KEY, "A1").await.unwrap();
        store.set(REFRESH_TOKEN_KEY, "R1").await.unwrap();

        let reopened = FileTokenStore::new(&path);
        assert_eq!(
            reopened.get(ACCESS_TOKEN_KEY).await.unwrap(),
            Some("A1".to_string())
        );
        assert_eq!(
            reopened.get(REFRESH_TOKEN_KEY).await.unwrap(),
            Some("R1".to_string())
        );
    }

    #[tokio::test]
    async fn file_store_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("session.json");

        let store = FileTokenStore::new(&path);
        store.set(USER_KEY, "{}").await.unwrap();
        assert_eq!(store.get(USER_KEY).await.unwrap(), Some("{}".to_string()));
    }

    #[tokio::test]
    async fn file_store_missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("absent.json"));
        assert_eq!(store.get(ACCESS_TOKEN_KEY).await.unwrap(), None);
        // removing from an absent file must not create it
        store.remove(ACCESS_TOKEN_KEY).await.unwrap();
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn mock_store_reports_configured_values() {
        use mock::MockTokenStore;

        let mut store = MockTokenStore::new();
        store
            .expect_get()
            .withf(|key| key == ACCESS_TOKEN_KEY)
            .returning(|_| Ok(Some("A1".to_string())));

        assert_eq!(
            store.get(ACCESS_TOKEN_KEY).await.unwrap(),
            Some("A1".to_string())
        );
    }
}
