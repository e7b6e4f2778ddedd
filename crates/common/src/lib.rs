//! Shared platform entity types and reply payloads used across all einoah crates.

pub mod types;

pub use types::{
    ChannelEntity, ChannelKind, GuildEntity, PlatformMessage, Reply, RichField, RichReply,
    RoleEntity, UserEntity,
};
