//! Route tree: literal, type-tag and wildcard keys mapping to handlers or
//! nested tables.

use std::{collections::HashMap, fmt, sync::Arc};

use crate::{Error, InitHook, ResolvedValue, Result, RouteHandler, TypeTag};

/// Discriminator a route table matches against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RouteKey {
    /// Exact, case-sensitive match on a literal positional value.
    Literal(String),
    /// Match on the runtime type of a resolved value.
    Type(TypeTag),
    /// Taken when nothing else matches, including when no value remains.
    Wildcard,
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(text) => write!(f, "\"{text}\""),
            Self::Type(tag) => write!(f, "<{tag}>"),
            Self::Wildcard => f.write_str("*"),
        }
    }
}

impl From<&str> for RouteKey {
    fn from(text: &str) -> Self {
        Self::Literal(text.to_string())
    }
}

impl From<String> for RouteKey {
    fn from(text: String) -> Self {
        Self::Literal(text)
    }
}

impl From<TypeTag> for RouteKey {
    fn from(tag: TypeTag) -> Self {
        Self::Type(tag)
    }
}

/// What a key leads to.
#[derive(Clone)]
pub enum RouteNode {
    Handler(Arc<dyn RouteHandler>),
    Table(RouteTable),
}

impl RouteNode {
    pub fn handler(handler: impl RouteHandler + 'static) -> Self {
        Self::Handler(Arc::new(handler))
    }
}

impl fmt::Debug for RouteNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handler(_) => f.write_str("Handler"),
            Self::Table(table) => f.debug_tuple("Table").field(table).finish(),
        }
    }
}

impl From<RouteTable> for RouteNode {
    fn from(table: RouteTable) -> Self {
        Self::Table(table)
    }
}

impl From<Arc<dyn RouteHandler>> for RouteNode {
    fn from(handler: Arc<dyn RouteHandler>) -> Self {
        Self::Handler(handler)
    }
}

/// Which entry of a table the next positional value selects.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Selection<'a> {
    /// Literal or type-tag entry; the first value is consumed.
    Consume(&'a RouteNode),
    /// Wildcard entry; nothing is consumed.
    Wildcard(&'a RouteNode),
    NoMatch,
}

/// One level of the route tree.
///
/// Holds at most one entry per literal, per type tag, and one wildcard.
#[derive(Clone, Default)]
pub struct RouteTable {
    literals: HashMap<String, RouteNode>,
    types: HashMap<TypeTag, RouteNode>,
    wildcard: Option<Box<RouteNode>>,
    init: Option<Arc<dyn InitHook>>,
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTable")
            .field("literals", &self.literal_keys())
            .field("types", &self.types.keys().collect::<Vec<_>>())
            .field("wildcard", &self.wildcard.is_some())
            .field("init", &self.init.is_some())
            .finish()
    }
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry. Fails if an entry for `key` already exists.
    pub fn register(&mut self, key: impl Into<RouteKey>, node: impl Into<RouteNode>) -> Result<()> {
        let key = key.into();
        let node = node.into();
        let taken = match &key {
            RouteKey::Literal(text) => self.literals.contains_key(text),
            RouteKey::Type(tag) => self.types.contains_key(tag),
            RouteKey::Wildcard => self.wildcard.is_some(),
        };
        if taken {
            return Err(Error::DuplicateRouteKey { key });
        }

        match key {
            RouteKey::Literal(text) => {
                self.literals.insert(text, node);
            },
            RouteKey::Type(tag) => {
                self.types.insert(tag, node);
            },
            RouteKey::Wildcard => self.wildcard = Some(Box::new(node)),
        }
        Ok(())
    }

    /// Builder form of [`RouteTable::register`].
    pub fn route(mut self, key: impl Into<RouteKey>, node: impl Into<RouteNode>) -> Result<Self> {
        self.register(key, node)?;
        Ok(self)
    }

    /// Attach a startup hook; replaces any previous one.
    #[must_use]
    pub fn with_init(mut self, hook: Arc<dyn InitHook>) -> Self {
        self.init = Some(hook);
        self
    }

    /// Registered literal keys, sorted.
    pub fn literal_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.literals.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// All entries: literals sorted, then type tags, then the wildcard.
    pub fn entries(&self) -> Vec<(RouteKey, &RouteNode)> {
        let mut types: Vec<_> = self.types.iter().collect();
        types.sort_by_key(|(tag, _)| tag.to_string());

        self.literal_keys()
            .into_iter()
            .filter_map(|key| {
                self.literals
                    .get(key)
                    .map(|node| (RouteKey::from(key), node))
            })
            .chain(types.into_iter().map(|(tag, node)| (RouteKey::Type(*tag), node)))
            .chain(
                self.wildcard
                    .as_deref()
                    .map(|node| (RouteKey::Wildcard, node)),
            )
            .collect()
    }

    pub fn has_wildcard(&self) -> bool {
        self.wildcard.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty() && self.types.is_empty() && self.wildcard.is_none()
    }

    /// Every init hook in this table and its descendants, parents first.
    pub fn init_hooks(&self) -> Vec<Arc<dyn InitHook>> {
        let mut hooks = Vec::new();
        self.collect_init_hooks(&mut hooks);
        hooks
    }

    fn collect_init_hooks(&self, hooks: &mut Vec<Arc<dyn InitHook>>) {
        if let Some(hook) = &self.init {
            hooks.push(Arc::clone(hook));
        }
        let children = self
            .literal_keys()
            .into_iter()
            .filter_map(|key| self.literals.get(key))
            .chain(self.types.values())
            .chain(self.wildcard.as_deref());
        for child in children {
            if let RouteNode::Table(table) = child {
                table.collect_init_hooks(hooks);
            }
        }
    }

    /// Pick the entry for the head of `positional`.
    ///
    /// Literal entries win over type-tag entries, which win over the
    /// wildcard. An empty list only matches the wildcard.
    pub(crate) fn select(&self, positional: &[ResolvedValue]) -> Selection<'_> {
        let Some(first) = positional.first() else {
            return self.wildcard_selection();
        };

        if let ResolvedValue::Literal(text) = first
            && let Some(node) = self.literals.get(text)
        {
            return Selection::Consume(node);
        }

        if let Some(tag) = first.type_tag()
            && let Some(node) = self.types.get(&tag)
        {
            return Selection::Consume(node);
        }

        self.wildcard_selection()
    }

    fn wildcard_selection(&self) -> Selection<'_> {
        match self.wildcard.as_deref() {
            Some(node) => Selection::Wildcard(node),
            None => Selection::NoMatch,
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{HandlerResult, InvocationContext},
        async_trait::async_trait,
        einoah_channels::Platform,
        einoah_common::{RoleEntity, UserEntity},
        einoah_sessions::Persistence,
    };

    struct Noop;

    #[async_trait]
    impl RouteHandler for Noop {
        async fn handle(&self, _ctx: &InvocationContext) -> HandlerResult {
            Ok(None)
        }
    }

    struct NoopInit;

    #[async_trait]
    impl InitHook for NoopInit {
        async fn init(
            &self,
            _platform: Arc<dyn Platform>,
            _persistence: Arc<dyn Persistence>,
        ) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn lit(text: &str) -> ResolvedValue {
        ResolvedValue::Literal(text.into())
    }

    fn role() -> ResolvedValue {
        ResolvedValue::Role(RoleEntity::new("7", "g1", "mods"))
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let mut table = RouteTable::new();
        table.register("ping", RouteNode::handler(Noop)).unwrap();
        table.register(TypeTag::User, RouteNode::handler(Noop)).unwrap();
        table.register(RouteKey::Wildcard, RouteNode::handler(Noop)).unwrap();

        for key in [
            RouteKey::from("ping"),
            RouteKey::from(TypeTag::User),
            RouteKey::Wildcard,
        ] {
            let err = table.register(key.clone(), RouteNode::handler(Noop)).unwrap_err();
            assert!(matches!(err, Error::DuplicateRouteKey { key: ref k } if *k == key));
        }

        // different case is a different literal
        table.register("Ping", RouteNode::handler(Noop)).unwrap();
        assert_eq!(table.literal_keys(), ["Ping", "ping"]);
    }

    #[test]
    fn literal_beats_type_tag() {
        let table = RouteTable::new()
            .route("7", RouteNode::handler(Noop))
            .unwrap()
            .route(TypeTag::Role, RouteNode::Table(RouteTable::new()))
            .unwrap();
        assert!(matches!(
            table.select(&[lit("7")]),
            Selection::Consume(RouteNode::Handler(_))
        ));
        assert!(matches!(
            table.select(&[role()]),
            Selection::Consume(RouteNode::Table(_))
        ));
    }

    #[test]
    fn wildcard_is_the_fallback() {
        let table = RouteTable::new()
            .route("ping", RouteNode::handler(Noop))
            .unwrap()
            .route(RouteKey::Wildcard, RouteNode::handler(Noop))
            .unwrap();
        assert!(matches!(table.select(&[]), Selection::Wildcard(_)));
        assert!(matches!(table.select(&[lit("pong")]), Selection::Wildcard(_)));
        assert!(matches!(
            table.select(&[ResolvedValue::User(UserEntity::new("1", "a"))]),
            Selection::Wildcard(_)
        ));
    }

    #[test]
    fn no_wildcard_means_no_match() {
        let table = RouteTable::new()
            .route("ping", RouteNode::handler(Noop))
            .unwrap();
        assert!(matches!(table.select(&[]), Selection::NoMatch));
        assert!(matches!(table.select(&[lit("PING")]), Selection::NoMatch));
        assert!(matches!(table.select(&[role()]), Selection::NoMatch));
    }

    #[test]
    fn init_hooks_are_collected_from_the_whole_tree() {
        let inner = RouteTable::new()
            .with_init(Arc::new(NoopInit))
            .route("create", RouteNode::handler(Noop))
            .unwrap();
        let deeper = RouteTable::new().with_init(Arc::new(NoopInit));
        let root = RouteTable::new()
            .with_init(Arc::new(NoopInit))
            .route("lobby", inner)
            .unwrap()
            .route(RouteKey::Wildcard, deeper)
            .unwrap();
        assert_eq!(root.init_hooks().len(), 3);
        let keys: Vec<String> = root.entries().iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, ["\"lobby\"", "*"]);
        assert!(!root.is_empty());
        assert!(root.has_wildcard());
    }
}
