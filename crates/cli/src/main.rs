mod config_commands;
mod console;
mod routes;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use {
    anyhow::Context as _,
    clap::{Parser, Subcommand},
    einoah_bot::Bot,
    einoah_config::EiNoahConfig,
    einoah_metrics::{MetricsHandle, MetricsRecorderConfig},
    einoah_routing::{RouteNode, RouteTable},
    einoah_sessions::MemoryStore,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use crate::console::{ConsoleTransport, MessageFactory};

#[derive(Parser)]
#[command(name = "einoah", about = "EiNoah: command-driven chat bot")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file to load instead of searching the standard locations.
    #[arg(long, global = true, env = "EINOAH_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Read commands from stdin (default when no subcommand is provided).
    Console,
    /// Handle a single message and exit.
    Send {
        /// Message text, e.g. "ei lobby create <@2>".
        message: String,

        /// Print the metrics snapshot after handling.
        #[arg(long, default_value_t = false)]
        metrics: bool,
    },
    /// Print the route tree.
    Routes,
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Install the metrics recorder when built with the `metrics` feature.
fn init_metrics() -> anyhow::Result<MetricsHandle> {
    einoah_metrics::init_metrics(MetricsRecorderConfig {
        enabled: cfg!(feature = "metrics"),
        global_labels: vec![("service".into(), "einoah".into())],
    })
}

/// Load the config at `path`, or discover it, then apply `EINOAH_*` overrides.
pub(crate) fn load(path: Option<&Path>) -> anyhow::Result<EiNoahConfig> {
    let config = match path {
        Some(path) => einoah_config::load_config(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => einoah_config::discover_and_load(),
    };
    Ok(einoah_config::apply_env_overrides(config))
}

async fn start_bot(config: EiNoahConfig) -> anyhow::Result<(Arc<Bot>, MessageFactory)> {
    let platform = Arc::new(console::seed_platform(&config.console));
    let factory = MessageFactory::new(config.console.clone());
    let bot = Bot::new(
        config,
        routes::build()?,
        platform,
        Arc::new(ConsoleTransport),
        Arc::new(MemoryStore::new()),
    );
    bot.initialize().await?;
    Ok((Arc::new(bot), factory))
}

fn print_routes(table: &RouteTable, depth: usize) {
    for (key, node) in table.entries() {
        println!("{:indent$}{key}", "", indent = depth * 2);
        if let RouteNode::Table(child) = node {
            print_routes(child, depth + 1);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "einoah starting");

    match cli.command {
        None | Some(Commands::Console) => {
            let metrics = init_metrics()?;
            let (bot, factory) = start_bot(load(cli.config.as_deref())?).await?;
            console::run(bot, factory, metrics).await
        },
        Some(Commands::Send {
            message,
            metrics: show_metrics,
        }) => {
            let metrics = init_metrics()?;
            let (bot, factory) = start_bot(load(cli.config.as_deref())?).await?;
            let outcome = console::dispatch_one(&bot, factory.message(&message)).await;
            info!(?outcome, "message handled");
            if show_metrics {
                print!("{}", metrics.render());
            }
            Ok(())
        },
        Some(Commands::Routes) => {
            print_routes(&routes::build()?, 0);
            Ok(())
        },
        Some(Commands::Config { action }) => config_commands::handle_config(action, cli.config),
    }
}
