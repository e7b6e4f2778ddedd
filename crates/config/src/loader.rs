use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{
    Error, Result,
    env_subst::substitute_env,
    schema::{EiNoahConfig, Environment},
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["einoah.toml", "einoah.yaml", "einoah.yml", "einoah.json"];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<EiNoahConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&substitute_env(&raw), path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./einoah.{toml,yaml,yml,json}`
/// 2. `~/.config/einoah/einoah.{toml,yaml,yml,json}`
///
/// Returns `EiNoahConfig::default()` if no config file is found or it fails
/// to load.
pub fn discover_and_load() -> EiNoahConfig {
    let Some(path) = find_config_file() else {
        debug!("no config file found, using defaults");
        return EiNoahConfig::default();
    };

    debug!(path = %path.display(), "loading config");
    match load_config(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            EiNoahConfig::default()
        },
    }
}

/// Returns the user-global config directory (`~/.config/einoah/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "einoah").map(|d| d.config_dir().to_path_buf())
}

/// Apply `EINOAH_*` environment variables on top of a loaded config.
pub fn apply_env_overrides(config: EiNoahConfig) -> EiNoahConfig {
    apply_env_overrides_with(config, |name| std::env::var(name).ok())
}

fn apply_env_overrides_with(
    mut config: EiNoahConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> EiNoahConfig {
    if let Some(channel) = lookup("EINOAH_ERROR_CHANNEL").filter(|c| !c.is_empty()) {
        config.errors.error_channel = Some(channel);
    }
    if let Some(raw) = lookup("EINOAH_ENVIRONMENT") {
        match raw.parse::<Environment>() {
            Ok(env) => config.errors.environment = env,
            Err(e) => warn!(error = %e, "ignoring EINOAH_ENVIRONMENT"),
        }
    }
    if let Some(id) = lookup("EINOAH_BOT_USER_ID").filter(|id| !id.is_empty()) {
        config.address.bot_user_id = Some(id);
    }
    config
}

fn find_config_file() -> Option<PathBuf> {
    let local = CONFIG_FILENAMES.iter().map(PathBuf::from);
    let global = config_dir()
        .into_iter()
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)));
    local.chain(global).find(|p| p.exists())
}

fn parse_config(raw: &str, path: &Path) -> Result<EiNoahConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => toml::from_str(raw).map_err(|e| Error::parse(path, e)),
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| Error::parse(path, e)),
        "json" => serde_json::from_str(raw).map_err(|e| Error::parse(path, e)),
        _ => Err(Error::UnsupportedFormat {
            extension: ext.to_string(),
        }),
    }
}
