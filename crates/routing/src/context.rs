//! Per-invocation context handed to route handlers.
//!
//! Identity and category records are loaded on first access and cached for
//! the rest of the invocation, failures included. Concurrent accessors share
//! one lookup.

use std::{
    error::Error as StdError,
    fmt,
    future::Future,
    sync::{Arc, Mutex},
};

use {
    einoah_common::{ChannelEntity, GuildEntity, PlatformMessage, UserEntity},
    einoah_sessions::{CategoryRecord, GuildIdentityRecord, IdentityRecord, Session},
    tokio::sync::OnceCell,
    tracing::debug,
};

use crate::{Error, ResolvedValue, Result};

/// Flag names of one message, deduplicated, in first-appearance order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flags(Vec<String>);

impl Flags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the flag was already present.
    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }
        self.0.push(name);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|f| f == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for Flags {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut flags = Self::new();
        for name in iter {
            flags.insert(name);
        }
        flags
    }
}

/// The two mutually exclusive ways of looking at the author.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityView {
    /// The author's record inside the message's guild.
    Guild,
    /// The author's record independent of any guild.
    Bare,
}

impl fmt::Display for IdentityView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Guild => "guild-scoped",
            Self::Bare => "bare",
        })
    }
}

/// Result of [`InvocationContext::identity`].
#[derive(Debug, Clone)]
pub enum Identity {
    Guild(Arc<GuildIdentityRecord>),
    Bare(Arc<IdentityRecord>),
}

impl Identity {
    pub fn view(&self) -> IdentityView {
        match self {
            Self::Guild(_) => IdentityView::Guild,
            Self::Bare(_) => IdentityView::Bare,
        }
    }

    /// The bare record; embedded in the guild record for the guild view.
    pub fn user(&self) -> &IdentityRecord {
        match self {
            Self::Guild(record) => &record.user,
            Self::Bare(record) => record,
        }
    }
}

/// A settled lookup. Failures are kept so later accessors see the same error
/// instead of hitting the store again.
type Settled<T> = std::result::Result<Arc<T>, Arc<dyn StdError + Send + Sync>>;

async fn settle<T, E, F>(cell: &OnceCell<Settled<T>>, context: &str, lookup: F) -> Result<Arc<T>>
where
    E: Into<Box<dyn StdError + Send + Sync>>,
    F: Future<Output = std::result::Result<T, E>>,
{
    let settled = cell
        .get_or_init(|| async {
            lookup
                .await
                .map(Arc::new)
                .map_err(|e| Arc::<dyn StdError + Send + Sync>::from(e.into()))
        })
        .await;
    match settled {
        Ok(record) => Ok(Arc::clone(record)),
        Err(source) => Err(Error::Persistence {
            context: context.to_string(),
            source: Arc::clone(source),
        }),
    }
}

/// Everything a handler gets to see about one invocation.
pub struct InvocationContext {
    message: Arc<PlatformMessage>,
    absolute_params: Arc<[ResolvedValue]>,
    params: Vec<ResolvedValue>,
    flags: Flags,
    route_path: Vec<String>,
    route_args: Vec<ResolvedValue>,
    session: Arc<dyn Session>,

    view: Mutex<Option<IdentityView>>,
    guild_identity: OnceCell<Settled<GuildIdentityRecord>>,
    bare_identity: OnceCell<Settled<IdentityRecord>>,
    category: OnceCell<Settled<CategoryRecord>>,
}

impl fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationContext")
            .field("message_id", &self.message.id)
            .field("params", &self.params)
            .field("flags", &self.flags)
            .field("route_path", &self.route_path)
            .field("view", &self.committed_view())
            .finish_non_exhaustive()
    }
}

impl InvocationContext {
    /// `params` is the full resolved positional list of the message.
    pub fn new(
        message: Arc<PlatformMessage>,
        params: Vec<ResolvedValue>,
        flags: Flags,
        session: Arc<dyn Session>,
    ) -> Self {
        Self {
            message,
            absolute_params: params.clone().into(),
            params,
            flags,
            route_path: Vec::new(),
            route_args: Vec::new(),
            session,
            view: Mutex::new(None),
            guild_identity: OnceCell::new(),
            bare_identity: OnceCell::new(),
            category: OnceCell::new(),
        }
    }

    pub fn message(&self) -> &PlatformMessage {
        &self.message
    }

    pub fn author(&self) -> &UserEntity {
        &self.message.author
    }

    pub fn channel(&self) -> &ChannelEntity {
        &self.message.channel
    }

    pub fn guild(&self) -> Option<&GuildEntity> {
        self.message.guild.as_ref()
    }

    /// Every resolved positional value, untouched by routing.
    pub fn absolute_params(&self) -> &[ResolvedValue] {
        &self.absolute_params
    }

    /// Positional values routing has not consumed.
    pub fn params(&self) -> &[ResolvedValue] {
        &self.params
    }

    pub fn flags(&self) -> &Flags {
        &self.flags
    }

    pub fn has_flag(&self, name: &str) -> bool {
        self.flags.contains(name)
    }

    /// Literal keys matched on the way to the handler.
    pub fn route_path(&self) -> &[String] {
        &self.route_path
    }

    /// Values consumed by type-tag entries on the way to the handler.
    pub fn route_args(&self) -> &[ResolvedValue] {
        &self.route_args
    }

    /// Value consumed by the innermost type-tag entry.
    pub fn route_argument(&self) -> Option<&ResolvedValue> {
        self.route_args.last()
    }

    pub fn session(&self) -> &Arc<dyn Session> {
        &self.session
    }

    pub(crate) fn enter_route(
        &mut self,
        params: Vec<ResolvedValue>,
        route_path: Vec<String>,
        route_args: Vec<ResolvedValue>,
    ) {
        self.params = params;
        self.route_path = route_path;
        self.route_args = route_args;
    }

    pub(crate) fn absolute(&self) -> Arc<[ResolvedValue]> {
        Arc::clone(&self.absolute_params)
    }

    /// The identity view fixed by the first identity access, if any.
    pub fn committed_view(&self) -> Option<IdentityView> {
        *self.view.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_view(&self, requested: IdentityView) -> Result<()> {
        match self.committed_view() {
            Some(committed) if committed != requested => Err(Error::MixedIdentityAccess {
                committed,
                requested,
            }),
            _ => Ok(()),
        }
    }

    /// Fix the view. Only called once a lookup for `requested` succeeded.
    fn commit(&self, requested: IdentityView) -> Result<()> {
        let mut view = self.view.lock().unwrap_or_else(|e| e.into_inner());
        match *view {
            Some(committed) if committed != requested => Err(Error::MixedIdentityAccess {
                committed,
                requested,
            }),
            Some(_) => Ok(()),
            None => {
                *view = Some(requested);
                Ok(())
            },
        }
    }

    /// The author's guild-scoped record.
    ///
    /// `None` outside a guild, without a lookup and without fixing the view.
    /// Fails with [`Error::MixedIdentityAccess`] once the bare view is fixed.
    /// A failed lookup leaves the view open.
    pub async fn guild_identity(&self) -> Result<Option<Arc<GuildIdentityRecord>>> {
        let Some(guild) = self.message.guild.as_ref() else {
            return Ok(None);
        };
        self.check_view(IdentityView::Guild)?;

        let record = settle(&self.guild_identity, "loading guild identity", async {
            debug!(user_id = %self.message.author.id, guild_id = %guild.id, "loading guild identity");
            self.session
                .get_or_create_guild_identity(&self.message.author, guild)
                .await
        })
        .await?;
        self.commit(IdentityView::Guild)?;
        Ok(Some(record))
    }

    /// The author's record independent of any guild.
    ///
    /// Fails with [`Error::MixedIdentityAccess`] once the guild view is fixed.
    pub async fn user_identity(&self) -> Result<Arc<IdentityRecord>> {
        self.check_view(IdentityView::Bare)?;

        let record = settle(&self.bare_identity, "loading identity", async {
            debug!(user_id = %self.message.author.id, "loading identity");
            self.session
                .get_or_create_identity(&self.message.author)
                .await
        })
        .await?;
        self.commit(IdentityView::Bare)?;
        Ok(record)
    }

    /// Whichever identity view applies.
    ///
    /// Follows the view already fixed; otherwise picks the guild view inside
    /// a guild and the bare view elsewhere.
    pub async fn identity(&self) -> Result<Identity> {
        let view = self.committed_view().unwrap_or(if self.message.guild.is_some() {
            IdentityView::Guild
        } else {
            IdentityView::Bare
        });

        if view == IdentityView::Guild
            && let Some(record) = self.guild_identity().await?
        {
            return Ok(Identity::Guild(record));
        }
        self.user_identity().await.map(Identity::Bare)
    }

    /// Category record of the channel's parent.
    ///
    /// `None` without a lookup when the channel has no parent or is not a
    /// kind that lives under a category.
    pub async fn category(&self) -> Result<Option<Arc<CategoryRecord>>> {
        let channel = &self.message.channel;
        let parent_id = match channel.parent_id.as_deref() {
            Some(parent_id) if channel.kind.is_container_scoped() => parent_id,
            _ => return Ok(None),
        };

        let record = settle(&self.category, "loading category", async {
            debug!(channel_id = %channel.id, parent_id, "loading category");
            self.session.get_or_create_category(parent_id).await
        })
        .await?;
        Ok(Some(record))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        einoah_common::ChannelKind,
        einoah_sessions::{MemoryStore, Persistence},
    };

    fn guild_message() -> PlatformMessage {
        PlatformMessage {
            id: "m1".into(),
            content: "ei whoami".into(),
            author: UserEntity::new("100", "alice"),
            author_is_admin: false,
            channel: ChannelEntity::text("10", "1").with_parent("5"),
            guild: Some(GuildEntity::new("1", "guild")),
        }
    }

    fn dm_message() -> PlatformMessage {
        PlatformMessage {
            channel: ChannelEntity::dm("20"),
            guild: None,
            ..guild_message()
        }
    }

    fn context(store: &MemoryStore, message: PlatformMessage) -> InvocationContext {
        InvocationContext::new(Arc::new(message), Vec::new(), Flags::new(), store.fork())
    }

    #[test]
    fn flags_are_deduplicated_in_order() {
        let flags: Flags = ["b", "a", "b"].into_iter().collect();
        assert_eq!(flags.iter().collect::<Vec<_>>(), ["b", "a"]);
        assert!(flags.contains("a"));
        assert!(!flags.contains("c"));
        assert_eq!(flags.len(), 2);
    }

    #[tokio::test]
    async fn identity_is_cached() {
        let store = MemoryStore::new();
        let ctx = context(&store, guild_message());

        let first = ctx.identity().await.unwrap();
        let second = ctx.identity().await.unwrap();
        match (first, second) {
            (Identity::Guild(a), Identity::Guild(b)) => assert!(Arc::ptr_eq(&a, &b)),
            other => panic!("expected guild identities, got {other:?}"),
        }
        assert_eq!(store.lookup_count(), 1);
        assert_eq!(ctx.committed_view(), Some(IdentityView::Guild));
    }

    #[tokio::test]
    async fn concurrent_access_shares_one_lookup() {
        let store = MemoryStore::new();
        let ctx = context(&store, guild_message());

        let (a, b, c) = tokio::join!(ctx.identity(), ctx.guild_identity(), ctx.identity());
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(store.lookup_count(), 1);
    }

    #[tokio::test]
    async fn dm_identity_is_bare() {
        let store = MemoryStore::new();
        let ctx = context(&store, dm_message());

        assert!(ctx.guild_identity().await.unwrap().is_none());
        assert_eq!(store.lookup_count(), 0);
        assert_eq!(ctx.committed_view(), None);

        let identity = ctx.identity().await.unwrap();
        assert_eq!(identity.view(), IdentityView::Bare);
        assert_eq!(identity.user().user_id, "100");
        let again = ctx.user_identity().await.unwrap();
        assert!(matches!(identity, Identity::Bare(ref a) if Arc::ptr_eq(a, &again)));
        assert_eq!(store.lookup_count(), 1);
    }

    #[tokio::test]
    async fn guild_after_bare_is_rejected() {
        let store = MemoryStore::new();
        let ctx = context(&store, guild_message());

        ctx.user_identity().await.unwrap();
        let err = ctx.guild_identity().await.unwrap_err();
        assert!(matches!(err, Error::MixedIdentityAccess {
            committed: IdentityView::Bare,
            requested: IdentityView::Guild,
        }));
        // identity() follows the committed view
        assert_eq!(ctx.identity().await.unwrap().view(), IdentityView::Bare);
    }

    #[tokio::test]
    async fn bare_after_guild_is_rejected() {
        let store = MemoryStore::new();
        let ctx = context(&store, guild_message());

        ctx.identity().await.unwrap();
        let err = ctx.user_identity().await.unwrap_err();
        assert!(matches!(err, Error::MixedIdentityAccess {
            committed: IdentityView::Guild,
            requested: IdentityView::Bare,
        }));
        assert!(err.is_contract_violation());
    }

    #[tokio::test]
    async fn category_is_cached() {
        let store = MemoryStore::new();
        let ctx = context(&store, guild_message());

        let first = ctx.category().await.unwrap().unwrap();
        let second = ctx.category().await.unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.id, "5");
        assert_eq!(store.lookup_count(), 1);
    }

    #[tokio::test]
    async fn category_without_parent_needs_no_lookup() {
        let store = MemoryStore::new();

        let ctx = context(&store, dm_message());
        assert!(ctx.category().await.unwrap().is_none());

        let mut voice = guild_message();
        voice.channel.kind = ChannelKind::Voice;
        let ctx = context(&store, voice);
        assert!(ctx.category().await.unwrap().is_none());

        let mut orphan = guild_message();
        orphan.channel.parent_id = None;
        let ctx = context(&store, orphan);
        assert!(ctx.category().await.unwrap().is_none());

        assert_eq!(store.lookup_count(), 0);
    }

    #[tokio::test]
    async fn persistence_failure_is_reported() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        let ctx = context(&store, guild_message());

        let err = ctx.category().await.unwrap_err();
        assert!(matches!(err, Error::Persistence { .. }));
        assert_eq!(err.name(), "PersistenceError");
    }

    #[tokio::test]
    async fn failed_lookups_are_not_retried() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        let ctx = context(&store, guild_message());

        let first = ctx.category().await.unwrap_err();
        let second = ctx.category().await.unwrap_err();
        assert_eq!(first.to_string(), "loading category");
        assert_eq!(
            StdError::source(&second).unwrap().to_string(),
            "store unavailable: memory store switched off"
        );
        assert!(ctx.guild_identity().await.is_err());
        assert!(ctx.guild_identity().await.is_err());
        assert_eq!(store.lookup_count(), 2);

        // the cached failure sticks even once the store is back
        store.set_unavailable(false);
        assert!(ctx.category().await.is_err());
        assert_eq!(store.lookup_count(), 2);
    }

    #[tokio::test]
    async fn concurrent_failures_share_one_lookup() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        let ctx = context(&store, guild_message());

        let (a, b, c) = tokio::join!(ctx.category(), ctx.category(), ctx.category());
        assert!(a.is_err() && b.is_err() && c.is_err());
        assert_eq!(store.lookup_count(), 1);
    }

    #[tokio::test]
    async fn failed_lookup_leaves_view_open() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        let ctx = context(&store, guild_message());

        let err = ctx.guild_identity().await.unwrap_err();
        assert!(matches!(err, Error::Persistence { .. }));
        assert_eq!(ctx.committed_view(), None);

        store.set_unavailable(false);
        let record = ctx.user_identity().await.unwrap();
        assert_eq!(record.user_id, "100");
        assert_eq!(ctx.committed_view(), Some(IdentityView::Bare));
    }

    #[test]
    fn absolute_params_survive_routing() {
        let store = MemoryStore::new();
        let params = vec![
            ResolvedValue::Literal("lobby".into()),
            ResolvedValue::User(UserEntity::new("2", "bob")),
        ];
        let mut ctx = InvocationContext::new(
            Arc::new(guild_message()),
            params.clone(),
            Flags::new(),
            store.fork(),
        );
        ctx.enter_route(params[1..].to_vec(), vec!["lobby".into()], Vec::new());
        assert_eq!(ctx.params(), &params[1..]);
        assert_eq!(ctx.absolute_params(), params.as_slice());
        assert_eq!(ctx.route_path(), ["lobby"]);
        assert!(ctx.route_argument().is_none());
    }
}
