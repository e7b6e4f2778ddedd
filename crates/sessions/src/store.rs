use std::sync::Arc;

use {
    anyhow::Result,
    async_trait::async_trait,
    einoah_common::{GuildEntity, UserEntity},
};

use crate::records::{CategoryRecord, GuildIdentityRecord, IdentityRecord};

/// Root of the persistence layer; hands out one session per message.
pub trait Persistence: Send + Sync {
    fn fork(&self) -> Arc<dyn Session>;
}

/// Unit of work for a single message.
///
/// A session is never shared between concurrently handled messages.
#[async_trait]
pub trait Session: Send + Sync {
    async fn get_or_create_identity(&self, user: &UserEntity) -> Result<IdentityRecord>;

    async fn get_or_create_guild_identity(
        &self,
        user: &UserEntity,
        guild: &GuildEntity,
    ) -> Result<GuildIdentityRecord>;

    /// `parent_id` is the platform id of the channel's category.
    async fn get_or_create_category(&self, parent_id: &str) -> Result<CategoryRecord>;

    async fn save_category(&self, category: CategoryRecord) -> Result<()>;

    /// Write pending changes back to the store.
    async fn flush(&self) -> Result<()>;
}
