//! In-process adapters.
//!
//! Useful for development and tests. Each identity lives behind one dashmap
//! shard lock, so per-row read-modify-write operations are atomic.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::{Duration, Instant};
use uuid::Uuid;

use crate::domain::{EmailAddress, Identity, PasswordHash};
use crate::error::{AuthError, Result};
use crate::ports::{CachePort, UserDirectory};

/// User directory kept in memory.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    users: DashMap<Uuid, Identity>,
    emails: DashMap<EmailAddress, Uuid>,
}

impl MemoryDirectory {
    /// Create a new [`MemoryDirectory`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an already built identity, e.g. to seed an administrator.
    pub fn insert(&self, identity: Identity) -> Result<()> {
        match self.emails.entry(identity.email.clone()) {
            Entry::Occupied(_) => Err(AuthError::Conflict),
            Entry::Vacant(entry) => {
                entry.insert(identity.id);
                self.users.insert(identity.id, identity);
                Ok(())
            },
        }
    }

    /// Apply `update` to one identity under its row lock.
    ///
    /// Like an SQL `UPDATE`, an unknown id is not an error.
    fn update(&self, id: Uuid, update: impl FnOnce(&mut Identity)) {
        match self.users.get_mut(&id) {
            Some(mut identity) => {
                update(identity.value_mut());
                identity.updated_at = Utc::now();
            },
            None => tracing::debug!(%id, "update on unknown identity"),
        }
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn create_user(
        &self,
        email: &EmailAddress,
        password_hash: &PasswordHash,
    ) -> Result<Identity> {
        let identity = Identity::new(email.clone(), password_hash.clone());
        self.insert(identity.clone())?;
        Ok(identity)
    }

    async fn get_by_email(
        &self,
        email: &EmailAddress,
    ) -> Result<Option<Identity>> {
        let Some(id) = self.emails.get(email).map(|id| *id.value()) else {
            return Ok(None);
        };

        Ok(self.users.get(&id).map(|identity| identity.value().clone()))
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Identity>> {
        Ok(self.users.get(&id).map(|identity| identity.value().clone()))
    }

    async fn set_refresh_token(
        &self,
        id: Uuid,
        token: Option<&str>,
    ) -> Result<()> {
        self.update(id, |identity| {
            identity.refresh_token = token.map(str::to_owned)
        });
        Ok(())
    }

    async fn swap_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        replacement: Option<&str>,
    ) -> Result<bool> {
        let Some(mut identity) = self.users.get_mut(&id) else {
            return Ok(false);
        };

        if identity.refresh_token.as_deref() != Some(expected) {
            return Ok(false);
        }

        identity.refresh_token = replacement.map(str::to_owned);
        identity.updated_at = Utc::now();
        Ok(true)
    }

    async fn set_confirmed(&self, id: Uuid) -> Result<()> {
        self.update(id, |identity| identity.is_confirmed = true);
        Ok(())
    }

    async fn set_password(&self, id: Uuid, hash: &PasswordHash) -> Result<()> {
        self.update(id, |identity| identity.password_hash = hash.clone());
        Ok(())
    }

    async fn set_avatar(&self, id: Uuid, url: &str) -> Result<()> {
        self.update(id, |identity| identity.avatar = Some(url.to_owned()));
        Ok(())
    }
}

#[derive(Debug)]
struct CacheEntry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Key-value cache kept in memory with lazy expiration.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCache {
    /// Create a new [`MemoryCache`].
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CachePort for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                return Ok(Some(entry.value.clone()));
            },
            Some(_) => true,
            None => false,
        };

        // The read guard is released before removing.
        if expired {
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        }

        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.entries.insert(
            key.to_owned(),
            CacheEntry {
                value,
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<()> {
        if let Some(mut entry) = self.entries.get_mut(key) {
            // Out of range means never.
            entry.expires_at =
                Instant::now().checked_add(Duration::from_secs(seconds));
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash() -> PasswordHash {
        PasswordHash::parse(
            "$argon2id$v=19$m=1024,t=1,p=1$c29tZXNhbHQ$aGFzaGhhc2hoYXNo",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_email_is_unique() {
        let directory = MemoryDirectory::new();
        let email = EmailAddress::parse("a@x.com").unwrap();

        let identity = directory.create_user(&email, &hash()).await.unwrap();
        assert!(!identity.is_confirmed);

        let err = directory.create_user(&email, &hash()).await.unwrap_err();
        assert!(matches!(err, AuthError::Conflict));

        let found = directory.get_by_email(&email).await.unwrap().unwrap();
        assert_eq!(found.id, identity.id);
        assert_eq!(
            directory.get_by_id(identity.id).await.unwrap().unwrap().email,
            email
        );
    }

    #[tokio::test]
    async fn test_swap_refresh_token() {
        let directory = MemoryDirectory::new();
        let email = EmailAddress::parse("a@x.com").unwrap();
        let identity = directory.create_user(&email, &hash()).await.unwrap();

        assert!(
            !directory
                .swap_refresh_token(identity.id, "rt0", Some("rt1"))
                .await
                .unwrap()
        );

        directory
            .set_refresh_token(identity.id, Some("rt0"))
            .await
            .unwrap();
        assert!(
            directory
                .swap_refresh_token(identity.id, "rt0", Some("rt1"))
                .await
                .unwrap()
        );
        assert!(
            !directory
                .swap_refresh_token(identity.id, "rt0", Some("rt2"))
                .await
                .unwrap()
        );

        let stored = directory.get_by_id(identity.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token.as_deref(), Some("rt1"));
    }

    #[tokio::test]
    async fn test_mutators() {
        let directory = MemoryDirectory::new();
        let email = EmailAddress::parse("a@x.com").unwrap();
        let identity = directory.create_user(&email, &hash()).await.unwrap();

        directory.set_confirmed(identity.id).await.unwrap();
        directory
            .set_avatar(identity.id, "https://cdn.x.com/a.png")
            .await
            .unwrap();

        let stored = directory.get_by_id(identity.id).await.unwrap().unwrap();
        assert!(stored.is_confirmed);
        assert_eq!(stored.avatar.as_deref(), Some("https://cdn.x.com/a.png"));

        // Unknown rows are ignored.
        directory.set_confirmed(Uuid::new_v4()).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_expiration() {
        let cache = MemoryCache::new();

        cache.set("a@x.com", b"snapshot".to_vec()).await.unwrap();
        cache.expire("a@x.com", 300).await.unwrap();
        assert_eq!(
            cache.get("a@x.com").await.unwrap().as_deref(),
            Some(&b"snapshot"[..])
        );

        tokio::time::advance(Duration::from_secs(300)).await;
        assert!(cache.get("a@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cache_huge_ttl_never_expires() {
        let cache = MemoryCache::new();

        cache.set("key", vec![1]).await.unwrap();
        cache.expire("key", u64::MAX).await.unwrap();
        assert!(cache.get("key").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_cache_delete() {
        let cache = MemoryCache::new();

        cache.set("key", vec![1, 2, 3]).await.unwrap();
        cache.delete("key").await.unwrap();
        assert!(cache.get("key").await.unwrap().is_none());
    }
}
