//! Read-through session cache in front of the user directory.
//!
//! Snapshots are keyed by email and never authoritative: every write follows
//! a directory read, and every identity mutation invalidates the key. Cache
//! failures and timeouts degrade to misses.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Cache as CacheConfig;
use crate::domain::{EmailAddress, Identity};
use crate::error::Result;
use crate::ports::CachePort;

const KEY_PREFIX: &str = "session:";

/// Key of a snapshot in the shared store.
fn cache_key(email: &EmailAddress) -> String {
    format!("{KEY_PREFIX}{email}")
}

/// Cache of identity snapshots with a fixed TTL.
#[derive(Clone)]
pub struct SessionCache {
    port: Arc<dyn CachePort>,
    ttl: u64,
    timeout: Duration,
}

impl SessionCache {
    /// Create a new [`SessionCache`].
    pub fn new(port: Arc<dyn CachePort>, config: &CacheConfig) -> Self {
        Self {
            port,
            ttl: config.ttl,
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    /// Run a cache call, turning timeouts and errors into `None`.
    async fn guarded<T>(
        &self,
        op: &'static str,
        key: &EmailAddress,
        call: impl Future<Output = Result<T>>,
    ) -> Option<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(err)) => {
                tracing::warn!(%err, op, %key, "session cache call failed");
                None
            },
            Err(_) => {
                tracing::warn!(op, %key, "session cache call timed out");
                None
            },
        }
    }

    /// Get the cached snapshot of an identity.
    pub async fn get(&self, key: &EmailAddress) -> Option<Identity> {
        let bytes = self
            .guarded("get", key, self.port.get(&cache_key(key)))
            .await
            .flatten()?;

        match serde_json::from_slice::<Identity>(&bytes) {
            Ok(identity) if &identity.email == key => Some(identity),
            Ok(_) => {
                tracing::warn!(%key, "cached snapshot belongs to another identity");
                None
            },
            Err(err) => {
                tracing::warn!(%err, %key, "cached snapshot is unreadable");
                None
            },
        }
    }

    /// Store a snapshot for the configured TTL.
    pub async fn put(&self, key: &EmailAddress, identity: &Identity) {
        self.put_with_ttl(key, identity, self.ttl).await
    }

    pub async fn put_with_ttl(
        &self,
        key: &EmailAddress,
        identity: &Identity,
        ttl: u64,
    ) {
        let bytes = match serde_json::to_vec(identity) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(%err, %key, "cannot serialize snapshot");
                return;
            },
        };

        let slot = cache_key(key);
        let write = async {
            self.port.set(&slot, bytes).await?;
            self.port.expire(&slot, ttl).await
        };

        if self.guarded("put", key, write).await.is_none() {
            // A half-written key without expiry must not survive.
            self.invalidate(key).await;
        }
    }

    /// Drop the snapshot of an identity.
    pub async fn invalidate(&self, key: &EmailAddress) {
        self.guarded("invalidate", key, self.port.delete(&cache_key(key)))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryCache;
    use crate::domain::PasswordHash;
    use crate::error::AuthError;
    use async_trait::async_trait;

    fn identity(email: &str) -> Identity {
        Identity::new(
            EmailAddress::parse(email).unwrap(),
            PasswordHash::parse(
                "$argon2id$v=19$m=1024,t=1,p=1$c29tZXNhbHQ$aGFzaGhhc2hoYXNo",
            )
            .unwrap(),
        )
    }

    /// Cache that never answers.
    struct StalledCache;

    #[async_trait]
    impl CachePort for StalledCache {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            std::future::pending().await
        }

        async fn set(&self, _key: &str, _value: Vec<u8>) -> Result<()> {
            std::future::pending().await
        }

        async fn expire(&self, _key: &str, _seconds: u64) -> Result<()> {
            std::future::pending().await
        }

        async fn delete(&self, _key: &str) -> Result<()> {
            std::future::pending().await
        }
    }

    /// Cache that always fails.
    struct BrokenCache;

    #[async_trait]
    impl CachePort for BrokenCache {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            Err(AuthError::internal(std::io::Error::other("down")))
        }

        async fn set(&self, _key: &str, _value: Vec<u8>) -> Result<()> {
            Err(AuthError::internal(std::io::Error::other("down")))
        }

        async fn expire(&self, _key: &str, _seconds: u64) -> Result<()> {
            Err(AuthError::internal(std::io::Error::other("down")))
        }

        async fn delete(&self, _key: &str) -> Result<()> {
            Err(AuthError::internal(std::io::Error::other("down")))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_get_and_expire() {
        let cache =
            SessionCache::new(Arc::new(MemoryCache::new()), &CacheConfig::default());
        let identity = identity("a@x.com");

        assert!(cache.get(&identity.email).await.is_none());

        cache.put(&identity.email, &identity).await;
        assert_eq!(cache.get(&identity.email).await, Some(identity.clone()));

        tokio::time::advance(Duration::from_secs(300)).await;
        assert!(cache.get(&identity.email).await.is_none());
    }

    #[tokio::test]
    async fn test_snapshots_are_namespaced() {
        let port = Arc::new(MemoryCache::new());
        let cache = SessionCache::new(port.clone(), &CacheConfig::default());
        let identity = identity("a@x.com");

        port.set("a@x.com", b"unrelated".to_vec()).await.unwrap();
        cache.put(&identity.email, &identity).await;

        assert!(port.get("session:a@x.com").await.unwrap().is_some());
        assert_eq!(
            port.get("a@x.com").await.unwrap().as_deref(),
            Some(&b"unrelated"[..])
        );

        cache.invalidate(&identity.email).await;
        assert!(port.get("session:a@x.com").await.unwrap().is_none());
        assert!(port.get("a@x.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_invalidate() {
        let cache =
            SessionCache::new(Arc::new(MemoryCache::new()), &CacheConfig::default());
        let identity = identity("a@x.com");

        cache.put(&identity.email, &identity).await;
        cache.invalidate(&identity.email).await;
        assert!(cache.get(&identity.email).await.is_none());
    }

    #[tokio::test]
    async fn test_foreign_snapshot_is_ignored() {
        let port = Arc::new(MemoryCache::new());
        let cache = SessionCache::new(port.clone(), &CacheConfig::default());
        let other = identity("b@x.com");

        port.set("session:a@x.com", serde_json::to_vec(&other).unwrap())
            .await
            .unwrap();
        assert!(
            cache
                .get(&EmailAddress::parse("a@x.com").unwrap())
                .await
                .is_none()
        );

        port.set("session:a@x.com", b"garbage".to_vec())
            .await
            .unwrap();
        assert!(
            cache
                .get(&EmailAddress::parse("a@x.com").unwrap())
                .await
                .is_none()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_cache_is_a_miss() {
        let cache = SessionCache::new(Arc::new(StalledCache), &CacheConfig::default());
        let identity = identity("a@x.com");

        cache.put(&identity.email, &identity).await;
        assert!(cache.get(&identity.email).await.is_none());
        cache.invalidate(&identity.email).await;
    }

    #[tokio::test]
    async fn test_broken_cache_is_a_miss() {
        let cache = SessionCache::new(Arc::new(BrokenCache), &CacheConfig::default());
        let identity = identity("a@x.com");

        cache.put(&identity.email, &identity).await;
        assert!(cache.get(&identity.email).await.is_none());
    }
}
