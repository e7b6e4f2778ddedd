use std::path::PathBuf;

use {
    anyhow::Result,
    clap::Subcommand,
    einoah_config::{EiNoahConfig, Environment},
};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Load the configuration file and report problems.
    Check,
    /// Print the effective configuration as TOML.
    Show,
}

pub fn handle_config(action: ConfigAction, path: Option<PathBuf>) -> Result<()> {
    match action {
        ConfigAction::Check => check(path),
        ConfigAction::Show => {
            let config = crate::load(path.as_deref())?;
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        },
    }
}

fn check(path: Option<PathBuf>) -> Result<()> {
    match &path {
        Some(path) => eprintln!("Checking {}", path.display()),
        None => eprintln!("No config path given; checking discovered config or defaults."),
    }

    let config = crate::load(path.as_deref())?;
    let warnings = lint(&config);
    for warning in &warnings {
        eprintln!("  warning: {warning}");
    }

    if warnings.is_empty() {
        eprintln!("No issues found.");
    } else {
        eprintln!("{} warning(s)", warnings.len());
    }
    Ok(())
}

/// Settings that load fine but will not behave as intended.
fn lint(config: &EiNoahConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.address.keywords.is_empty() && config.address.bot_user_id.is_none() {
        warnings.push("no address keywords and no bot_user_id: nothing will be handled".into());
    }
    if config.address.keywords.iter().any(|k| k.split_whitespace().count() != 1) {
        warnings.push("address keywords must be single words".into());
    }
    if config.errors.environment == Environment::Production
        && config.errors.error_channel.is_none()
    {
        warnings.push("production without errors.error_channel: reports are only logged".into());
    }
    if config.dispatch.timeout_secs == Some(0) {
        warnings.push("dispatch.timeout_secs = 0 fails every message".into());
    }
    warnings
}
