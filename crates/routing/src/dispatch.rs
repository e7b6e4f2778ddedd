//! Walk a [`RouteTable`] with resolved positional values and run the handler
//! it leads to.

use {einoah_common::Reply, tracing::debug};

#[cfg(feature = "metrics")]
use einoah_metrics::{counter, dispatch as dispatch_metrics, labels};

use crate::{
    Error, InvocationContext, ResolvedValue, Result, RouteNode, RouteTable, table::Selection,
};

/// Outcome of a dispatch that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    /// A handler ran and returned this reply.
    Handled(Option<Reply>),
    /// No entry matched; no handler ran.
    NoMatch,
}

impl Dispatched {
    pub fn is_handled(&self) -> bool {
        matches!(self, Self::Handled(_))
    }
}

impl RouteTable {
    /// Route `positional` through this table and invoke the matched handler.
    ///
    /// Literal and type-tag matches consume one value and descend; a wildcard
    /// consumes nothing. The handler sees the unconsumed values as
    /// [`InvocationContext::params`]. Handler failures come back as
    /// [`Error::Handler`] with the original error inside.
    pub async fn dispatch(
        &self,
        positional: &[ResolvedValue],
        ctx: &mut InvocationContext,
    ) -> Result<Dispatched> {
        let mut table = self;
        let mut remaining = positional;
        let mut route_path = Vec::new();
        let mut route_args = Vec::new();

        let handler = loop {
            let node = match table.select(remaining) {
                Selection::Consume(node) => {
                    if let Some((head, rest)) = remaining.split_first() {
                        match head {
                            ResolvedValue::Literal(text) => route_path.push(text.clone()),
                            value => route_args.push(value.clone()),
                        }
                        remaining = rest;
                    }
                    node
                },
                Selection::Wildcard(node) => node,
                Selection::NoMatch => {
                    debug!(
                        message_id = %ctx.message().id,
                        route = %route_path.join(" "),
                        remaining = remaining.len(),
                        "no route matched"
                    );
                    #[cfg(feature = "metrics")]
                    counter!(dispatch_metrics::TOTAL, labels::OUTCOME => "no_match").increment(1);
                    return Ok(Dispatched::NoMatch);
                },
            };

            match node {
                RouteNode::Table(next) => table = next,
                RouteNode::Handler(handler) => break handler,
            }
        };

        debug!(
            message_id = %ctx.message().id,
            route = %route_path.join(" "),
            params = remaining.len(),
            flags = ctx.flags().len(),
            "invoking handler"
        );
        ctx.enter_route(remaining.to_vec(), route_path, route_args);

        let result = handler.handle(ctx).await;

        #[cfg(feature = "metrics")]
        counter!(
            dispatch_metrics::TOTAL,
            labels::OUTCOME => if result.is_ok() { "handled" } else { "failed" }
        )
        .increment(1);

        result.map(Dispatched::Handled).map_err(Error::Handler)
    }

    /// Dispatch the context's full resolved positional list.
    pub async fn dispatch_context(&self, ctx: &mut InvocationContext) -> Result<Dispatched> {
        let positional = ctx.absolute();
        self.dispatch(&positional, ctx).await
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{Flags, HandlerResult, RouteHandler, RouteKey, TypeTag, handler_fn},
        async_trait::async_trait,
        einoah_common::{ChannelEntity, GuildEntity, PlatformMessage, RoleEntity, UserEntity},
        einoah_sessions::{MemoryStore, Persistence},
        futures::FutureExt,
        std::sync::{
            Arc, Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    /// Records what it was invoked with.
    #[derive(Default)]
    struct Spy {
        calls: AtomicUsize,
        seen: Mutex<Vec<(Vec<ResolvedValue>, Vec<String>, Option<ResolvedValue>)>>,
    }

    impl Spy {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn last(&self) -> (Vec<ResolvedValue>, Vec<String>, Option<ResolvedValue>) {
            self.seen.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl RouteHandler for Spy {
        async fn handle(&self, ctx: &InvocationContext) -> HandlerResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push((
                ctx.params().to_vec(),
                ctx.route_path().to_vec(),
                ctx.route_argument().cloned(),
            ));
            Ok(Some(Reply::from("ok")))
        }
    }

    fn lit(text: &str) -> ResolvedValue {
        ResolvedValue::Literal(text.into())
    }

    fn alice() -> ResolvedValue {
        ResolvedValue::User(UserEntity::new("1", "alice"))
    }

    fn role() -> ResolvedValue {
        ResolvedValue::Role(RoleEntity::new("7", "g1", "mods"))
    }

    fn context(params: Vec<ResolvedValue>) -> InvocationContext {
        let message = PlatformMessage {
            id: "m1".into(),
            content: String::new(),
            author: UserEntity::new("100", "bob"),
            author_is_admin: false,
            channel: ChannelEntity::text("10", "g1"),
            guild: Some(GuildEntity::new("g1", "guild")),
        };
        InvocationContext::new(
            Arc::new(message),
            params,
            Flags::new(),
            MemoryStore::new().fork(),
        )
    }

    async fn run(table: &RouteTable, params: Vec<ResolvedValue>) -> Result<Dispatched> {
        let mut ctx = context(params);
        table.dispatch_context(&mut ctx).await
    }

    #[tokio::test]
    async fn nested_literals_consume_and_leave_the_rest() {
        let spy = Arc::new(Spy::default());
        let lobby = RouteTable::new()
            .route("create", RouteNode::Handler(spy.clone()))
            .unwrap();
        let root = RouteTable::new().route("lobby", lobby).unwrap();

        let out = run(&root, vec![lit("lobby"), lit("create"), alice()])
            .await
            .unwrap();
        assert_eq!(out, Dispatched::Handled(Some(Reply::from("ok"))));
        assert_eq!(spy.calls(), 1);
        let (params, path, arg) = spy.last();
        assert_eq!(params, vec![alice()]);
        assert_eq!(path, ["lobby", "create"]);
        assert!(arg.is_none());
    }

    #[tokio::test]
    async fn type_match_exposes_route_argument() {
        let spy = Arc::new(Spy::default());
        let by_user = RouteTable::new()
            .route(TypeTag::User, RouteNode::Handler(spy.clone()))
            .unwrap();
        let root = RouteTable::new().route("whois", by_user).unwrap();

        run(&root, vec![lit("whois"), alice(), lit("extra")])
            .await
            .unwrap();
        let (params, path, arg) = spy.last();
        assert_eq!(params, vec![lit("extra")]);
        assert_eq!(path, ["whois"]);
        assert_eq!(arg, Some(alice()));
    }

    #[tokio::test]
    async fn literal_entry_wins_over_role_entry() {
        let literal = Arc::new(Spy::default());
        let by_role = Arc::new(Spy::default());
        let root = RouteTable::new()
            .route("7", RouteNode::Handler(literal.clone()))
            .unwrap()
            .route(TypeTag::Role, RouteNode::Handler(by_role.clone()))
            .unwrap();

        run(&root, vec![lit("7")]).await.unwrap();
        assert_eq!((literal.calls(), by_role.calls()), (1, 0));

        run(&root, vec![role()]).await.unwrap();
        assert_eq!((literal.calls(), by_role.calls()), (1, 1));
    }

    #[tokio::test]
    async fn wildcard_does_not_consume() {
        let spy = Arc::new(Spy::default());
        let root = RouteTable::new()
            .route("ping", RouteNode::handler(Spy::default()))
            .unwrap()
            .route(RouteKey::Wildcard, RouteNode::Handler(spy.clone()))
            .unwrap();

        run(&root, vec![lit("pong"), alice()]).await.unwrap();
        let (params, path, _) = spy.last();
        assert_eq!(params, vec![lit("pong"), alice()]);
        assert!(path.is_empty());

        run(&root, Vec::new()).await.unwrap();
        assert!(spy.last().0.is_empty());
        assert_eq!(spy.calls(), 2);
    }

    #[tokio::test]
    async fn wildcard_sub_table_recurses_on_the_same_list() {
        let spy = Arc::new(Spy::default());
        let fallback = RouteTable::new()
            .route(TypeTag::User, RouteNode::Handler(spy.clone()))
            .unwrap();
        let root = RouteTable::new()
            .route(RouteKey::Wildcard, fallback)
            .unwrap();

        run(&root, vec![alice()]).await.unwrap();
        assert_eq!(spy.last().2, Some(alice()));
        assert_eq!(
            run(&root, vec![lit("x")]).await.unwrap(),
            Dispatched::NoMatch
        );
    }

    #[tokio::test]
    async fn unknown_route_is_not_an_error() {
        let spy = Arc::new(Spy::default());
        let root = RouteTable::new()
            .route("lobby", RouteNode::Handler(spy.clone()))
            .unwrap();

        let out = run(&root, vec![lit("unknownroute")]).await.unwrap();
        assert_eq!(out, Dispatched::NoMatch);
        assert!(!out.is_handled());
        assert_eq!(spy.calls(), 0);
    }

    #[tokio::test]
    async fn sub_table_miss_does_not_backtrack() {
        let spy = Arc::new(Spy::default());
        let lobby = RouteTable::new()
            .route("create", RouteNode::handler(Spy::default()))
            .unwrap();
        let root = RouteTable::new()
            .route("lobby", lobby)
            .unwrap()
            .route(RouteKey::Wildcard, RouteNode::Handler(spy.clone()))
            .unwrap();

        let out = run(&root, vec![lit("lobby"), lit("delete")]).await.unwrap();
        assert_eq!(out, Dispatched::NoMatch);
        assert_eq!(spy.calls(), 0);
    }

    #[tokio::test]
    async fn handler_errors_pass_through_untouched() {
        #[derive(Debug, thiserror::Error)]
        #[error("quota exceeded for {0}")]
        struct QuotaExceeded(String);

        let failing = handler_fn(|_ctx| {
            async { Err(QuotaExceeded("alice".into()).into()) }.boxed()
        });
        let root = RouteTable::new().route("quote", failing).unwrap();

        let err = run(&root, vec![lit("quote")]).await.unwrap_err();
        let Error::Handler(inner) = &err else {
            panic!("expected handler error, got {err:?}");
        };
        assert_eq!(
            inner.downcast_ref::<QuotaExceeded>().unwrap().to_string(),
            "quota exceeded for alice"
        );
        assert_eq!(err.name(), "HandlerError");
    }

    #[tokio::test]
    async fn absolute_params_are_kept_at_every_depth() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = {
            let seen = Arc::clone(&seen);
            handler_fn(move |ctx| {
                seen.lock().unwrap().push(ctx.absolute_params().len());
                async { Ok(None) }.boxed()
            })
        };
        let root = RouteTable::new()
            .route(
                "a",
                RouteTable::new()
                    .route(TypeTag::User, recorder)
                    .unwrap(),
            )
            .unwrap();

        let out = run(&root, vec![lit("a"), alice(), role()]).await.unwrap();
        assert_eq!(out, Dispatched::Handled(None));
        assert_eq!(*seen.lock().unwrap(), vec![3]);
    }
}
