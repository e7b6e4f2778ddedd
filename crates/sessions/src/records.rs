use serde::{Deserialize, Serialize};

/// A platform user known to the bot, independent of any guild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub id: u64,
    /// Platform user id.
    pub user_id: String,
    pub username: String,
}

/// A user's membership record in one guild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildIdentityRecord {
    pub id: u64,
    pub guild_id: String,
    pub user: IdentityRecord,
    /// Voice lobby currently owned by this member.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_channel: Option<String>,
}

/// Policy for a channel category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRecord {
    /// Platform id of the category channel.
    pub id: String,
    /// Whether lobby sub-channels may be created under this category.
    pub is_lobby_category: bool,
}

impl CategoryRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_lobby_category: true,
        }
    }
}
