use serde::{Deserialize, Serialize};

/// A platform user as returned by the chat transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntity {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub bot: bool,
}

impl UserEntity {
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            bot: false,
        }
    }

    /// Raw mention form as it appears in message text.
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}

/// A role inside one guild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleEntity {
    pub id: String,
    pub guild_id: String,
    pub name: String,
}

impl RoleEntity {
    pub fn new(
        id: impl Into<String>,
        guild_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            guild_id: guild_id.into(),
            name: name.into(),
        }
    }

    pub fn mention(&self) -> String {
        format!("<@&{}>", self.id)
    }
}

/// Kind of channel a message was posted in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    #[default]
    Text,
    News,
    Voice,
    Category,
    Dm,
    Other,
}

impl ChannelKind {
    /// Text-like guild channels are the only kinds that sit under a category.
    pub fn is_container_scoped(self) -> bool {
        matches!(self, Self::Text | Self::News)
    }
}

/// A channel on the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelEntity {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub kind: ChannelKind,
    /// Id of the category this channel is nested in.
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub guild_id: Option<String>,
}

impl ChannelEntity {
    pub fn text(id: impl Into<String>, guild_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            kind: ChannelKind::Text,
            parent_id: None,
            guild_id: Some(guild_id.into()),
        }
    }

    pub fn dm(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            kind: ChannelKind::Dm,
            parent_id: None,
            guild_id: None,
        }
    }

    #[must_use]
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn mention(&self) -> String {
        format!("<#{}>", self.id)
    }
}

/// A guild (server).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildEntity {
    pub id: String,
    pub name: String,
}

impl GuildEntity {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// An inbound message handed over by the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformMessage {
    pub id: String,
    pub content: String,
    pub author: UserEntity,
    /// Whether the author holds administrator permissions in the guild.
    #[serde(default)]
    pub author_is_admin: bool,
    pub channel: ChannelEntity,
    #[serde(default)]
    pub guild: Option<GuildEntity>,
}

impl PlatformMessage {
    pub fn guild_id(&self) -> Option<&str> {
        self.guild.as_ref().map(|g| g.id.as_str())
    }
}

/// One field of a rich reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RichField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

/// Structured reply rendered by the transport (an embed on most platforms).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RichReply {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<RichField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
}

impl RichReply {
    #[must_use]
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(RichField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }

    #[must_use]
    pub fn color(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }
}

/// Outbound payload produced by a command handler.
///
/// The transport is responsible for splitting long text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum Reply {
    Text(String),
    Rich(RichReply),
}

impl Reply {
    /// Plain-text rendering, used by transports without rich support.
    pub fn to_plain_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Rich(rich) => {
                let mut lines = Vec::new();
                if let Some(title) = &rich.title {
                    lines.push(format!("**{title}**"));
                }
                if let Some(description) = &rich.description {
                    lines.push(description.clone());
                }
                for field in &rich.fields {
                    lines.push(format!("{}: {}", field.name, field.value));
                }
                if let Some(footer) = &rich.footer {
                    lines.push(footer.clone());
                }
                lines.join("\n")
            },
        }
    }
}

impl From<String> for Reply {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Reply {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<RichReply> for Reply {
    fn from(rich: RichReply) -> Self {
        Self::Rich(rich)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mention_forms() {
        assert_eq!(UserEntity::new("42", "alice").mention(), "<@42>");
        assert_eq!(RoleEntity::new("7", "1", "mods").mention(), "<@&7>");
        assert_eq!(ChannelEntity::dm("9").mention(), "<#9>");
    }

    #[test]
    fn only_text_and_news_are_container_scoped() {
        assert!(ChannelKind::Text.is_container_scoped());
        assert!(ChannelKind::News.is_container_scoped());
        assert!(!ChannelKind::Dm.is_container_scoped());
        assert!(!ChannelKind::Voice.is_container_scoped());
    }

    #[test]
    fn rich_reply_plain_text() {
        let reply: Reply = RichReply::titled("Stats")
            .description("weekly")
            .field("messages", "12", true)
            .into();
        assert_eq!(reply.to_plain_text(), "**Stats**\nweekly\nmessages: 12");
    }

    #[test]
    fn reply_serializes_tagged() {
        let json = serde_json::to_value(Reply::from("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "text", "body": "hi"}));
    }

    #[test]
    fn message_deserializes_with_defaults() {
        let msg: PlatformMessage = serde_json::from_str(
            r#"{
                "id": "1",
                "content": "ei ping",
                "author": {"id": "2", "username": "bob"},
                "channel": {"id": "3"}
            }"#,
        )
        .unwrap();
        assert_eq!(msg.channel.kind, ChannelKind::Text);
        assert!(!msg.author_is_admin);
        assert!(msg.guild_id().is_none());
    }
}
