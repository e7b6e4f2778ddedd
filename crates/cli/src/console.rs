//! Interactive console: stdin lines become messages from the configured
//! console user, replies are printed to stdout.

use std::{
    io::Write,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use {
    anyhow::Result,
    async_trait::async_trait,
    einoah_bot::{Bot, MessageOutcome},
    einoah_channels::{
        Error as ChannelError, ErrorReport, MemoryPlatform, ReportKind, Transport,
    },
    einoah_common::{
        ChannelEntity, ChannelKind, GuildEntity, PlatformMessage, Reply, RoleEntity, UserEntity,
    },
    einoah_config::ConsoleConfig,
    einoah_metrics::MetricsHandle,
    einoah_routing::Audience,
    tokio::{
        io::{AsyncBufRead, AsyncBufReadExt, BufReader},
        task::JoinSet,
    },
    tracing::{debug, warn},
};

/// Writes everything the bot sends to stdout.
#[derive(Debug, Default)]
pub struct ConsoleTransport;

impl ConsoleTransport {
    fn print(&self, prefix: &str, text: &str) -> Result<()> {
        let mut out = std::io::stdout().lock();
        for line in text.lines() {
            writeln!(out, "{prefix} {line}").map_err(|e| ChannelError::external("stdout", e))?;
        }
        out.flush().map_err(|e| ChannelError::external("stdout", e))?;
        Ok(())
    }
}

#[async_trait]
impl Transport for ConsoleTransport {
    async fn send_reply(&self, channel_id: &str, reply: &Reply) -> Result<()> {
        let text = reply.to_plain_text();
        if text.is_empty() {
            return Err(ChannelError::invalid_input("empty reply").into());
        }
        self.print(&format!("[#{channel_id}]"), &text)
    }

    async fn send_direct(&self, user_id: &str, text: &str) -> Result<()> {
        self.print(&format!("[dm @{user_id}]"), text)
    }
}

/// Platform holding the console user, guild members, roles and channels.
pub fn seed_platform(config: &ConsoleConfig) -> MemoryPlatform {
    let mut platform = MemoryPlatform::new()
        .with_user(console_user(config))
        .with_channel(console_channel(config));

    if let Some(category_id) = &config.category_id {
        let mut category = ChannelEntity::text(category_id, &config.guild_id).with_name("lobbies");
        category.kind = ChannelKind::Category;
        platform = platform.with_channel(category);
    }
    for member in &config.members {
        platform = platform.with_user(UserEntity::new(&member.id, &member.username));
    }
    for role in &config.roles {
        platform = platform.with_role(RoleEntity::new(&role.id, &config.guild_id, &role.name));
    }
    platform
}

fn console_user(config: &ConsoleConfig) -> UserEntity {
    UserEntity::new(&config.user_id, &config.username)
}

fn console_channel(config: &ConsoleConfig) -> ChannelEntity {
    let channel = ChannelEntity::text(&config.channel_id, &config.guild_id).with_name("console");
    match &config.category_id {
        Some(category_id) => channel.with_parent(category_id),
        None => channel,
    }
}

/// Builds messages as if typed by the console user.
pub struct MessageFactory {
    config: ConsoleConfig,
    next_id: AtomicU64,
}

impl MessageFactory {
    pub fn new(config: ConsoleConfig) -> Self {
        Self {
            config,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn message(&self, content: &str) -> PlatformMessage {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        PlatformMessage {
            id: id.to_string(),
            content: content.to_string(),
            author: console_user(&self.config),
            author_is_admin: self.config.admin,
            channel: console_channel(&self.config),
            guild: Some(GuildEntity::new(&self.config.guild_id, &self.config.guild_name)),
        }
    }
}

/// Handle one message on its own task so a panicking handler is reported
/// instead of taking the console down.
pub async fn dispatch_one(bot: &Arc<Bot>, message: PlatformMessage) -> MessageOutcome {
    let channel_id = message.channel.id.clone();
    let task = tokio::spawn({
        let bot = Arc::clone(bot);
        async move { bot.on_message(message).await }
    });

    match task.await {
        Ok(outcome) => outcome,
        Err(e) => {
            let report = ErrorReport::new(ReportKind::Uncaught, "Panic", e.to_string())
                .with_origin(channel_id);
            bot.report(report).await;
            MessageOutcome::Failed(Audience::Operator)
        },
    }
}

/// Console line that prints the metrics snapshot instead of sending a message.
pub const METRICS_COMMAND: &str = "/metrics";

/// Feed `input` to the bot one line at a time until EOF.
///
/// Each message runs on its own task so a slow handler does not hold up the
/// lines after it. Returns once every message in flight has finished, with
/// the number of messages dispatched.
pub async fn serve<R>(
    bot: Arc<Bot>,
    factory: &MessageFactory,
    input: R,
    metrics: &MetricsHandle,
) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut in_flight = JoinSet::new();
    let mut dispatched = 0;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == METRICS_COMMAND {
            print!("{}", metrics.render());
            continue;
        }

        let message = factory.message(line);
        let bot = Arc::clone(&bot);
        in_flight.spawn(async move {
            match dispatch_one(&bot, message).await {
                MessageOutcome::Ignored => {
                    eprintln!("(not addressed, start with `ei`)");
                },
                outcome => debug!(?outcome, "console message done"),
            }
        });
        dispatched += 1;

        while in_flight.try_join_next().is_some() {}
    }

    debug!(remaining = in_flight.len(), "input closed, waiting for messages in flight");
    while in_flight.join_next().await.is_some() {}
    Ok(dispatched)
}

/// Read stdin until EOF, one message per line.
pub async fn run(bot: Arc<Bot>, factory: MessageFactory, metrics: MetricsHandle) -> Result<()> {
    eprintln!("einoah console, type `ei help` (ctrl-d to quit)");
    serve(bot, &factory, BufReader::new(tokio::io::stdin()), &metrics).await?;
    warn!("stdin closed, console stopping");
    Ok(())
}
