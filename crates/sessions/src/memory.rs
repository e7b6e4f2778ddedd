//! In-memory store used by tests and the interactive console.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
};

use {
    anyhow::Result,
    async_trait::async_trait,
    einoah_common::{GuildEntity, UserEntity},
    tracing::debug,
};

use crate::{
    Error,
    records::{CategoryRecord, GuildIdentityRecord, IdentityRecord},
    store::{Persistence, Session},
};

#[derive(Debug, Default)]
struct Tables {
    /// Keyed by platform user id.
    identities: HashMap<String, IdentityRecord>,
    /// Keyed by (guild id, platform user id).
    guild_identities: HashMap<(String, String), GuildIdentityRecord>,
    categories: HashMap<String, CategoryRecord>,
}

impl Tables {
    fn merge(&mut self, other: Tables) {
        self.identities.extend(other.identities);
        self.guild_identities.extend(other.guild_identities);
        self.categories.extend(other.categories);
    }
}

#[derive(Debug, Default)]
struct Shared {
    tables: Mutex<Tables>,
    next_id: AtomicU64,
    lookups: AtomicUsize,
    flushes: AtomicUsize,
    unavailable: AtomicBool,
}

/// Hash-map backed [`Persistence`].
///
/// Records created by a session only become visible to other sessions after
/// that session is flushed.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent lookup fail.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.shared.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of get-or-create lookups served across all sessions.
    pub fn lookup_count(&self) -> usize {
        self.shared.lookups.load(Ordering::SeqCst)
    }

    pub fn flush_count(&self) -> usize {
        self.shared.flushes.load(Ordering::SeqCst)
    }

    pub fn identity(&self, user_id: &str) -> Option<IdentityRecord> {
        self.tables().identities.get(user_id).cloned()
    }

    pub fn category(&self, id: &str) -> Option<CategoryRecord> {
        self.tables().categories.get(id).cloned()
    }

    pub fn insert_category(&self, category: CategoryRecord) {
        self.tables()
            .categories
            .insert(category.id.clone(), category);
    }

    fn tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.shared
            .tables
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn allocate_id(&self) -> u64 {
        self.shared.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl Persistence for MemoryStore {
    fn fork(&self) -> Arc<dyn Session> {
        Arc::new(MemorySession::new(self.clone()))
    }
}

/// A unit of work against a [`MemoryStore`].
#[derive(Debug)]
pub struct MemorySession {
    store: MemoryStore,
    pending: Mutex<Tables>,
}

impl MemorySession {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            store,
            pending: Mutex::new(Tables::default()),
        }
    }

    fn begin_lookup(&self) -> Result<()> {
        self.store.shared.lookups.fetch_add(1, Ordering::SeqCst);
        if self.store.shared.unavailable.load(Ordering::SeqCst) {
            return Err(Error::unavailable("memory store switched off").into());
        }
        Ok(())
    }

    fn pending(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn identity_for(&self, user: &UserEntity) -> IdentityRecord {
        if let Some(found) = self.pending().identities.get(&user.id) {
            return found.clone();
        }
        if let Some(found) = self.store.identity(&user.id) {
            return found;
        }
        let created = IdentityRecord {
            id: self.store.allocate_id(),
            user_id: user.id.clone(),
            username: user.username.clone(),
        };
        debug!(user_id = %user.id, "creating identity record");
        self.pending()
            .identities
            .insert(user.id.clone(), created.clone());
        created
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn get_or_create_identity(&self, user: &UserEntity) -> Result<IdentityRecord> {
        self.begin_lookup()?;
        Ok(self.identity_for(user))
    }

    async fn get_or_create_guild_identity(
        &self,
        user: &UserEntity,
        guild: &GuildEntity,
    ) -> Result<GuildIdentityRecord> {
        self.begin_lookup()?;
        let key = (guild.id.clone(), user.id.clone());
        if let Some(found) = self.pending().guild_identities.get(&key) {
            return Ok(found.clone());
        }
        if let Some(found) = self.store.tables().guild_identities.get(&key) {
            return Ok(found.clone());
        }

        let created = GuildIdentityRecord {
            id: self.store.allocate_id(),
            guild_id: guild.id.clone(),
            user: self.identity_for(user),
            temp_channel: None,
        };
        debug!(user_id = %user.id, guild_id = %guild.id, "creating guild identity record");
        self.pending().guild_identities.insert(key, created.clone());
        Ok(created)
    }

    async fn get_or_create_category(&self, parent_id: &str) -> Result<CategoryRecord> {
        self.begin_lookup()?;
        if let Some(found) = self.pending().categories.get(parent_id) {
            return Ok(found.clone());
        }
        if let Some(found) = self.store.category(parent_id) {
            return Ok(found);
        }
        let created = CategoryRecord::new(parent_id);
        self.pending()
            .categories
            .insert(parent_id.to_string(), created.clone());
        Ok(created)
    }

    async fn save_category(&self, category: CategoryRecord) -> Result<()> {
        self.pending()
            .categories
            .insert(category.id.clone(), category);
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        let staged = std::mem::take(&mut *self.pending());
        self.store.tables().merge(staged);
        self.store.shared.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> UserEntity {
        UserEntity::new("1", "alice")
    }

    #[tokio::test]
    async fn identity_is_created_once_per_session() {
        let store = MemoryStore::new();
        let session = store.fork();

        let first = session.get_or_create_identity(&alice()).await.unwrap();
        let second = session.get_or_create_identity(&alice()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.lookup_count(), 2);
    }

    #[tokio::test]
    async fn records_become_visible_after_flush() {
        let store = MemoryStore::new();
        let session = store.fork();
        let created = session.get_or_create_identity(&alice()).await.unwrap();
        assert!(store.identity("1").is_none());

        session.flush().await.unwrap();
        assert_eq!(store.identity("1"), Some(created.clone()));
        assert_eq!(store.flush_count(), 1);

        let other = store.fork();
        assert_eq!(other.get_or_create_identity(&alice()).await.unwrap(), created);
    }

    #[tokio::test]
    async fn guild_identity_embeds_identity() {
        let store = MemoryStore::new();
        let session = store.fork();
        let guild = GuildEntity::new("g1", "guild");

        let member = session
            .get_or_create_guild_identity(&alice(), &guild)
            .await
            .unwrap();
        let bare = session.get_or_create_identity(&alice()).await.unwrap();
        assert_eq!(member.user, bare);
        assert_eq!(member.guild_id, "g1");
        assert_ne!(member.id, bare.id);
    }

    #[tokio::test]
    async fn categories_default_to_lobby_and_can_be_saved() {
        let store = MemoryStore::new();
        let session = store.fork();

        let mut category = session.get_or_create_category("5").await.unwrap();
        assert!(category.is_lobby_category);

        category.is_lobby_category = false;
        session.save_category(category).await.unwrap();
        session.flush().await.unwrap();
        assert!(!store.category("5").unwrap().is_lobby_category);
    }

    #[tokio::test]
    async fn unavailable_store_fails_lookups() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        let session = store.fork();
        let err = session.get_or_create_category("5").await.unwrap_err();
        assert!(err.to_string().contains("unavailable"));
    }
}
