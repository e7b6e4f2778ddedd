use std::sync::Arc;

use {
    einoah_channels::{
        ChannelErrorSink, ErrorReport, ErrorSink, Platform, ReportDestination, ReportKind,
        Transport,
    },
    einoah_common::{PlatformMessage, Reply},
    einoah_config::{AddressConfig, EiNoahConfig, Environment, ErrorsConfig},
    einoah_routing::{AddressMatcher, Audience, CommandParser, Dispatched, RouteTable},
    einoah_sessions::{Persistence, Session},
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use einoah_metrics::{counter, histogram, labels, messages as message_metrics};

use crate::{Error, Result};

/// What [`Bot::on_message`] did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Not addressed to the bot, or sent by the bot itself.
    Ignored,
    /// The bot may not post in the channel; the author got a direct message.
    Gated,
    /// A handler ran.
    Handled,
    /// No route matched.
    NoMatch,
    Failed(Audience),
}

/// Build the address matcher described by `config`.
pub fn address_matcher(config: &AddressConfig) -> AddressMatcher {
    let matcher = AddressMatcher::new(&config.keywords).with_followers(&config.followers);
    match &config.bot_user_id {
        Some(id) => matcher.with_bot_user_id(id),
        None => matcher,
    }
}

fn report_destination(config: &ErrorsConfig) -> ReportDestination {
    match (config.environment, &config.error_channel) {
        (Environment::Development, _) => ReportDestination::Origin,
        (Environment::Production, Some(channel_id)) => ReportDestination::Channel(channel_id.clone()),
        (Environment::Production, None) => ReportDestination::LogOnly,
    }
}

/// Handles inbound messages end to end.
///
/// The route table is frozen once the bot is built and shared by every
/// message in flight.
pub struct Bot {
    config: EiNoahConfig,
    parser: CommandParser,
    routes: Arc<RouteTable>,
    platform: Arc<dyn Platform>,
    transport: Arc<dyn Transport>,
    persistence: Arc<dyn Persistence>,
    errors: Arc<dyn ErrorSink>,
}

impl Bot {
    pub fn new(
        config: EiNoahConfig,
        routes: RouteTable,
        platform: Arc<dyn Platform>,
        transport: Arc<dyn Transport>,
        persistence: Arc<dyn Persistence>,
    ) -> Self {
        let errors = Arc::new(ChannelErrorSink::new(
            Arc::clone(&transport),
            report_destination(&config.errors),
        ));
        Self {
            parser: CommandParser::new(address_matcher(&config.address), Arc::clone(&platform)),
            config,
            routes: Arc::new(routes),
            platform,
            transport,
            persistence,
            errors,
        }
    }

    /// Replace the channel-backed error sink.
    #[must_use]
    pub fn with_error_sink(mut self, errors: Arc<dyn ErrorSink>) -> Self {
        self.errors = errors;
        self
    }

    pub fn config(&self) -> &EiNoahConfig {
        &self.config
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Run every init hook in the route tree. Call once before serving.
    pub async fn initialize(&self) -> Result<()> {
        let hooks = self.routes.init_hooks();
        debug!(hooks = hooks.len(), "running route init hooks");
        for hook in hooks {
            hook.init(Arc::clone(&self.platform), Arc::clone(&self.persistence))
                .await
                .map_err(|e| Error::Init { source: e.into() })?;
        }
        Ok(())
    }

    /// Whether the message starts with an address token and was not sent by
    /// the bot itself.
    pub fn is_addressed(&self, message: &PlatformMessage) -> bool {
        if self.config.address.bot_user_id.as_deref() == Some(message.author.id.as_str()) {
            return false;
        }
        self.parser.address().addresses(&message.content)
    }

    /// Parse and dispatch one message in its own persistence session.
    ///
    /// The session is flushed whatever the outcome. A configured time budget
    /// covers parsing and dispatch but not the flush. A flush failure after a
    /// successful dispatch goes to the error sink and the dispatch result is
    /// still returned, so the reply is not lost.
    pub async fn handle_message(&self, message: PlatformMessage) -> Result<Dispatched> {
        let message = Arc::new(message);
        let session = self.persistence.fork();

        let result = match self.config.dispatch.timeout() {
            Some(after) => tokio::time::timeout(after, self.run(message.clone(), session.clone()))
                .await
                .unwrap_or_else(|_| {
                    warn!(message_id = %message.id, ?after, "message handling timed out");
                    #[cfg(feature = "metrics")]
                    counter!(message_metrics::TIMEOUTS_TOTAL).increment(1);
                    Err(Error::Timeout { after })
                }),
            None => self.run(message.clone(), session.clone()).await,
        };

        match (result, session.flush().await) {
            (result, Ok(())) => result,
            (Ok(dispatched), Err(e)) => {
                let err = Error::Flush { source: e.into() };
                warn!(message_id = %message.id, error = %err, "session flush failed");
                self.report_failure(&message.channel.id, &err).await;
                Ok(dispatched)
            },
            (Err(err), Err(e)) => {
                warn!(message_id = %message.id, error = %e, "session flush failed");
                Err(err)
            },
        }
    }

    async fn run(
        &self,
        message: Arc<PlatformMessage>,
        session: Arc<dyn Session>,
    ) -> Result<Dispatched> {
        let mut ctx = self.parser.parse(message, session).await?;
        Ok(self.routes.dispatch_context(&mut ctx).await?)
    }

    /// Entry point for the transport: filter, gate, handle, reply.
    pub async fn on_message(&self, message: PlatformMessage) -> MessageOutcome {
        if !self.is_addressed(&message) {
            return MessageOutcome::Ignored;
        }

        #[cfg(feature = "metrics")]
        let start = std::time::Instant::now();
        #[cfg(feature = "metrics")]
        counter!(message_metrics::RECEIVED_TOTAL).increment(1);

        info!(
            message_id = %message.id,
            channel_id = %message.channel.id,
            author = %message.author.username,
            "incoming command: {}",
            message.content
        );

        if !self.transport.can_send(&message.channel).await {
            let replies = &self.config.replies;
            let text = if message.author_is_admin {
                &replies.cannot_send_admin
            } else {
                &replies.cannot_send
            };
            if let Err(e) = self.transport.send_direct(&message.author.id, text).await {
                debug!(user_id = %message.author.id, error = %e, "could not notify author");
            }
            return MessageOutcome::Gated;
        }

        let channel_id = message.channel.id.clone();
        if let Err(e) = self.transport.send_typing(&channel_id).await {
            debug!(%channel_id, error = %e, "typing indicator failed");
        }

        let outcome = match self.handle_message(message).await {
            Ok(Dispatched::Handled(reply)) => {
                if let Some(reply) = reply {
                    self.deliver(&channel_id, &reply).await;
                }
                MessageOutcome::Handled
            },
            Ok(Dispatched::NoMatch) => {
                if let Some(text) = &self.config.replies.unknown_command {
                    self.deliver(&channel_id, &Reply::from(text.as_str())).await;
                }
                MessageOutcome::NoMatch
            },
            Err(err) => {
                let audience = err.audience();
                self.surface(&channel_id, err).await;
                MessageOutcome::Failed(audience)
            },
        };

        #[cfg(feature = "metrics")]
        histogram!(message_metrics::PROCESSING_DURATION_SECONDS)
            .record(start.elapsed().as_secs_f64());

        outcome
    }

    /// Post a report that did not come from a message, such as a panicked
    /// handler task.
    pub async fn report(&self, report: ErrorReport) {
        self.errors.report(report).await;
    }

    async fn deliver(&self, channel_id: &str, reply: &Reply) {
        if let Err(e) = self.transport.send_reply(channel_id, reply).await {
            warn!(channel_id, error = %e, "failed to deliver reply");
        }
    }

    async fn report_failure(&self, channel_id: &str, err: &Error) {
        let report =
            ErrorReport::from_error(ReportKind::Handled, err.name(), err).with_origin(channel_id);
        self.errors.report(report).await;
    }

    async fn surface(&self, channel_id: &str, err: Error) {
        let audience = err.audience();

        #[cfg(feature = "metrics")]
        counter!(message_metrics::ERRORS_TOTAL, labels::AUDIENCE => audience.as_str())
            .increment(1);

        match audience {
            Audience::User => {
                info!(channel_id, error = %err, "rejected command");
                self.deliver(channel_id, &Reply::Text(err.to_string())).await;
            },
            Audience::Operator => {
                self.report_failure(channel_id, &err).await;
                if self.config.errors.environment == Environment::Production {
                    let notice = Reply::from(self.config.errors.user_notice.as_str());
                    self.deliver(channel_id, &notice).await;
                }
            },
        }
    }
}
