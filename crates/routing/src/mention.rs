//! Resolve positional tokens into literal text and platform entities.
//!
//! A token may carry several mention markers glued to literal text
//! (`a<@123>b`); every marker becomes its own value and the text between
//! markers is kept verbatim. All lookups for one message run concurrently
//! and the message fails as a whole if any of them fails.

use std::{fmt, sync::LazyLock};

use {
    einoah_channels::{LookupError, Platform},
    einoah_common::{ChannelEntity, RoleEntity, UserEntity},
    futures::future::{self, BoxFuture, FutureExt},
    regex::Regex,
    tracing::debug,
};

#[cfg(feature = "metrics")]
use einoah_metrics::{counter, labels, mentions as mention_metrics};

use crate::{Error, Result};

/// `<@id>` / `<@!id>` (user, nickname form), `<@&id>` (role), `<#id>` (channel).
#[allow(clippy::expect_used)]
static MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<@!?(?P<user>[0-9]+)>|<@&(?P<role>[0-9]+)>|<#(?P<channel>[0-9]+)>")
        .expect("mention pattern compiles")
});

/// Runtime type of a resolved entity; also the kind of a mention marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    User,
    Role,
    Channel,
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::User => "user",
            Self::Role => "role",
            Self::Channel => "channel",
        })
    }
}

/// One positional value after mention resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedValue {
    Literal(String),
    User(UserEntity),
    Role(RoleEntity),
    Channel(ChannelEntity),
}

impl ResolvedValue {
    /// `None` for literal text.
    pub fn type_tag(&self) -> Option<TypeTag> {
        match self {
            Self::Literal(_) => None,
            Self::User(_) => Some(TypeTag::User),
            Self::Role(_) => Some(TypeTag::Role),
            Self::Channel(_) => Some(TypeTag::Channel),
        }
    }

    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Self::Literal(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_user(&self) -> Option<&UserEntity> {
        match self {
            Self::User(user) => Some(user),
            _ => None,
        }
    }

    pub fn as_role(&self) -> Option<&RoleEntity> {
        match self {
            Self::Role(role) => Some(role),
            _ => None,
        }
    }

    pub fn as_channel(&self) -> Option<&ChannelEntity> {
        match self {
            Self::Channel(channel) => Some(channel),
            _ => None,
        }
    }
}

impl fmt::Display for ResolvedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(text) => f.write_str(text),
            Self::User(user) => write!(f, "@{}", user.username),
            Self::Role(role) => write!(f, "@{}", role.name),
            Self::Channel(channel) => match &channel.name {
                Some(name) => write!(f, "#{name}"),
                None => write!(f, "#{}", channel.id),
            },
        }
    }
}

/// A piece of one token, before any lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Literal(&'a str),
    Marker { kind: TypeTag, id: &'a str },
}

/// Split a token into literal runs and mention markers.
///
/// Role markers are only meaningful inside a guild; elsewhere they stay part
/// of the surrounding literal text.
fn split_segments(token: &str, in_guild: bool) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut literal_start = 0;

    for caps in MARKER.captures_iter(token) {
        let (kind, id) = if let Some(id) = caps.name("user") {
            (TypeTag::User, id)
        } else if let Some(id) = caps.name("role") {
            if !in_guild {
                continue;
            }
            (TypeTag::Role, id)
        } else if let Some(id) = caps.name("channel") {
            (TypeTag::Channel, id)
        } else {
            continue;
        };

        let Some(whole) = caps.get(0) else {
            continue;
        };
        if whole.start() > literal_start {
            segments.push(Segment::Literal(&token[literal_start..whole.start()]));
        }
        segments.push(Segment::Marker {
            kind,
            id: id.as_str(),
        });
        literal_start = whole.end();
    }

    if literal_start < token.len() {
        segments.push(Segment::Literal(&token[literal_start..]));
    }
    segments
}

/// Start resolving one positional token.
///
/// Returns one pending value per segment of the token, in order. Nothing is
/// looked up until the futures are polled.
pub fn resolve_token<'a>(
    token: &'a str,
    platform: &'a dyn Platform,
    guild_id: Option<&'a str>,
) -> Vec<BoxFuture<'a, Result<ResolvedValue>>> {
    split_segments(token, guild_id.is_some())
        .into_iter()
        .map(|segment| match segment {
            Segment::Literal(text) => {
                future::ready(Ok(ResolvedValue::Literal(text.to_string()))).boxed()
            },
            Segment::Marker { kind, id } => lookup(kind, id, platform, guild_id).boxed(),
        })
        .collect()
}

async fn lookup(
    kind: TypeTag,
    id: &str,
    platform: &dyn Platform,
    guild_id: Option<&str>,
) -> Result<ResolvedValue> {
    #[cfg(feature = "metrics")]
    counter!(mention_metrics::LOOKUPS_TOTAL, labels::KIND => kind.to_string()).increment(1);

    let found = match (kind, guild_id) {
        (TypeTag::User, _) => platform.fetch_user(id).await.map(ResolvedValue::User),
        (TypeTag::Role, Some(guild_id)) => platform
            .fetch_role(id, guild_id)
            .await
            .map(ResolvedValue::Role),
        (TypeTag::Role, None) => Err(LookupError::NotFound),
        (TypeTag::Channel, _) => platform.fetch_channel(id).await.map(ResolvedValue::Channel),
    };

    found.map_err(|err| {
        debug!(%kind, id, error = %err, "mention lookup failed");
        #[cfg(feature = "metrics")]
        counter!(mention_metrics::LOOKUP_FAILURES_TOTAL, labels::KIND => kind.to_string())
            .increment(1);
        classify(kind, id, err)
    })
}

fn classify(kind: TypeTag, id: &str, err: LookupError) -> Error {
    match err {
        LookupError::NotFound => Error::InvalidMention {
            kind,
            id: id.to_string(),
        },
        LookupError::Transport(source) => Error::UnknownResolution {
            kind,
            id: id.to_string(),
            source,
        },
    }
}

/// Resolve every positional token of a message.
///
/// All lookups are issued at once and awaited together. If any fail, the
/// first failure in token order is returned and the other results are
/// dropped. Empty literal runs are filtered out.
pub async fn resolve_all(
    tokens: &[String],
    platform: &dyn Platform,
    guild_id: Option<&str>,
) -> Result<Vec<ResolvedValue>> {
    let pending: Vec<_> = tokens
        .iter()
        .flat_map(|token| resolve_token(token, platform, guild_id))
        .collect();

    debug!(tokens = tokens.len(), pending = pending.len(), "resolving positional tokens");

    let settled = future::join_all(pending).await;
    let resolved = settled.into_iter().collect::<Result<Vec<_>>>()?;

    Ok(resolved
        .into_iter()
        .filter(|value| !matches!(value, ResolvedValue::Literal(text) if text.is_empty()))
        .collect())
}
