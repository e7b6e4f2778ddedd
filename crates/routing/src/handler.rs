use std::sync::Arc;

use {
    async_trait::async_trait,
    einoah_channels::Platform,
    einoah_common::Reply,
    einoah_sessions::Persistence,
    futures::future::BoxFuture,
};

use crate::InvocationContext;

/// What a handler hands back: an optional reply, or an opaque failure.
pub type HandlerResult = anyhow::Result<Option<Reply>>;

/// Terminal node of a route tree.
#[async_trait]
pub trait RouteHandler: Send + Sync {
    async fn handle(&self, ctx: &InvocationContext) -> HandlerResult;
}

/// Runs once at startup for the table it is attached to.
#[async_trait]
pub trait InitHook: Send + Sync {
    async fn init(
        &self,
        platform: Arc<dyn Platform>,
        persistence: Arc<dyn Persistence>,
    ) -> anyhow::Result<()>;
}

/// Adapter turning a closure into a [`RouteHandler`].
pub struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<F> RouteHandler for FnHandler<F>
where
    F: for<'a> Fn(&'a InvocationContext) -> BoxFuture<'a, HandlerResult> + Send + Sync,
{
    async fn handle(&self, ctx: &InvocationContext) -> HandlerResult {
        (self.f)(ctx).await
    }
}

/// Wrap a closure returning a boxed future as a shareable handler.
///
/// ```ignore
/// let ping = handler_fn(|_ctx| Box::pin(async { Ok(Some("pong".into())) }));
/// ```
pub fn handler_fn<F>(f: F) -> Arc<dyn RouteHandler>
where
    F: for<'a> Fn(&'a InvocationContext) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
{
    Arc::new(FnHandler { f })
}
