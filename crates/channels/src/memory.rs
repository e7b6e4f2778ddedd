//! In-memory platform used by tests and the interactive console.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Mutex, RwLock,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use {
    anyhow::Result,
    async_trait::async_trait,
    einoah_common::{ChannelEntity, Reply, RoleEntity, UserEntity},
    tracing::debug,
};

use crate::{Error, LookupError, Platform, Transport};

/// Something the bot sent through [`MemoryPlatform`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentMessage {
    Reply { channel_id: String, reply: Reply },
    Direct { user_id: String, text: String },
    Typing { channel_id: String },
}

#[derive(Debug, thiserror::Error)]
#[error("simulated outage for id {0}")]
struct SimulatedOutage(String);

/// A platform backed by hash maps.
///
/// Ids registered with [`MemoryPlatform::with_broken_id`] fail with a
/// transport error instead of `NotFound`, and every lookup is counted.
#[derive(Default)]
pub struct MemoryPlatform {
    users: RwLock<HashMap<String, UserEntity>>,
    roles: RwLock<HashMap<(String, String), RoleEntity>>,
    channels: RwLock<HashMap<String, ChannelEntity>>,
    broken_ids: HashSet<String>,
    muted_channels: HashSet<String>,
    latency: Option<Duration>,
    lookups: AtomicUsize,
    sent: Mutex<Vec<SentMessage>>,
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_user(self, user: UserEntity) -> Self {
        self.insert_user(user);
        self
    }

    #[must_use]
    pub fn with_role(self, role: RoleEntity) -> Self {
        self.roles
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert((role.guild_id.clone(), role.id.clone()), role);
        self
    }

    #[must_use]
    pub fn with_channel(self, channel: ChannelEntity) -> Self {
        self.channels
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(channel.id.clone(), channel);
        self
    }

    /// Lookups of `id` fail with a transport error.
    #[must_use]
    pub fn with_broken_id(mut self, id: impl Into<String>) -> Self {
        self.broken_ids.insert(id.into());
        self
    }

    /// The bot may not post in `channel_id`.
    #[must_use]
    pub fn with_muted_channel(mut self, channel_id: impl Into<String>) -> Self {
        self.muted_channels.insert(channel_id.into());
        self
    }

    /// Every lookup sleeps for `latency` before answering.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn insert_user(&self, user: UserEntity) {
        self.users
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(user.id.clone(), user);
    }

    /// Number of fetch-by-id lookups served so far.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn take_sent(&self) -> Vec<SentMessage> {
        std::mem::take(&mut *self.sent.lock().unwrap_or_else(|e| e.into_inner()))
    }

    async fn begin_lookup(&self, id: &str) -> std::result::Result<(), LookupError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.broken_ids.contains(id) {
            return Err(LookupError::transport(SimulatedOutage(id.to_string())));
        }
        Ok(())
    }

    fn record(&self, message: SentMessage) {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message);
    }

    fn has_channel(&self, id: &str) -> bool {
        self.channels
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(id)
    }
}

#[async_trait]
impl Platform for MemoryPlatform {
    async fn fetch_user(&self, id: &str) -> std::result::Result<UserEntity, LookupError> {
        self.begin_lookup(id).await?;
        self.users
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
            .ok_or(LookupError::NotFound)
    }

    async fn fetch_role(
        &self,
        id: &str,
        guild_id: &str,
    ) -> std::result::Result<RoleEntity, LookupError> {
        self.begin_lookup(id).await?;
        self.roles
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(guild_id.to_string(), id.to_string()))
            .cloned()
            .ok_or(LookupError::NotFound)
    }

    async fn fetch_channel(&self, id: &str) -> std::result::Result<ChannelEntity, LookupError> {
        self.begin_lookup(id).await?;
        self.channels
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
            .ok_or(LookupError::NotFound)
    }
}

#[async_trait]
impl Transport for MemoryPlatform {
    async fn send_reply(&self, channel_id: &str, reply: &Reply) -> Result<()> {
        if !self.has_channel(channel_id) {
            return Err(Error::unknown_destination(channel_id).into());
        }
        if self.muted_channels.contains(channel_id) {
            return Err(Error::forbidden(channel_id).into());
        }
        if matches!(reply, Reply::Text(text) if text.is_empty()) {
            return Err(Error::invalid_input("empty reply").into());
        }
        debug!(channel_id, "memory transport reply");
        self.record(SentMessage::Reply {
            channel_id: channel_id.to_string(),
            reply: reply.clone(),
        });
        Ok(())
    }

    async fn send_direct(&self, user_id: &str, text: &str) -> Result<()> {
        let known = self
            .users
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(user_id);
        if !known {
            return Err(Error::unknown_destination(user_id).into());
        }
        self.record(SentMessage::Direct {
            user_id: user_id.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_typing(&self, channel_id: &str) -> Result<()> {
        self.record(SentMessage::Typing {
            channel_id: channel_id.to_string(),
        });
        Ok(())
    }

    async fn can_send(&self, channel: &ChannelEntity) -> bool {
        !self.muted_channels.contains(&channel.id)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn platform() -> MemoryPlatform {
        MemoryPlatform::new()
            .with_user(UserEntity::new("1", "alice"))
            .with_role(RoleEntity::new("7", "g1", "mods"))
            .with_channel(ChannelEntity::text("10", "g1"))
            .with_broken_id("666")
    }

    #[tokio::test]
    async fn fetch_known_and_unknown() {
        let p = platform();
        assert_eq!(p.fetch_user("1").await.unwrap().username, "alice");
        assert!(p.fetch_user("2").await.unwrap_err().is_not_found());
        assert_eq!(p.lookup_count(), 2);
    }

    #[tokio::test]
    async fn roles_are_guild_scoped() {
        let p = platform();
        assert!(p.fetch_role("7", "g1").await.is_ok());
        assert!(p.fetch_role("7", "g2").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn broken_ids_fail_with_transport_error() {
        let p = platform();
        let err = p.fetch_user("666").await.unwrap_err();
        assert!(matches!(err, LookupError::Transport(_)));
    }

    #[tokio::test]
    async fn muted_channel_refuses_replies() {
        let p = platform().with_muted_channel("10");
        assert!(!p.can_send(&ChannelEntity::text("10", "g1")).await);
        assert!(p.send_reply("10", &Reply::from("hi")).await.is_err());
        assert!(p.sent().is_empty());
    }

    #[tokio::test]
    async fn records_sent_messages() {
        let p = platform();
        p.send_typing("10").await.unwrap();
        p.send_reply("10", &Reply::from("hi")).await.unwrap();
        p.send_direct("1", "psst").await.unwrap();
        assert!(p.send_direct("404", "psst").await.is_err());

        let sent = p.take_sent();
        assert_eq!(sent.len(), 3);
        assert_eq!(
            sent[2],
            SentMessage::Direct {
                user_id: "1".into(),
                text: "psst".into()
            }
        );
        assert!(p.sent().is_empty());
    }
}
