use {
    anyhow::Result,
    async_trait::async_trait,
    einoah_common::{ChannelEntity, Reply, RoleEntity, UserEntity},
};

use crate::LookupError;

/// Fetch platform entities by id.
///
/// Implementations may be called concurrently for many ids of one message.
#[async_trait]
pub trait Platform: Send + Sync {
    async fn fetch_user(&self, id: &str) -> std::result::Result<UserEntity, LookupError>;

    /// Roles only exist inside a guild.
    async fn fetch_role(
        &self,
        id: &str,
        guild_id: &str,
    ) -> std::result::Result<RoleEntity, LookupError>;

    async fn fetch_channel(&self, id: &str) -> std::result::Result<ChannelEntity, LookupError>;
}

/// Send messages back to the platform.
///
/// Splitting long text and rendering rich payloads is the transport's job.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_reply(&self, channel_id: &str, reply: &Reply) -> Result<()>;

    /// Direct message to a user.
    async fn send_direct(&self, user_id: &str, text: &str) -> Result<()>;

    /// Send a "typing" indicator. No-op by default.
    async fn send_typing(&self, _channel_id: &str) -> Result<()> {
        Ok(())
    }

    /// Whether the bot may post in `channel`.
    async fn can_send(&self, _channel: &ChannelEntity) -> bool {
        true
    }
}
