//! Configuration loading and env substitution.
//!
//! Config files: `einoah.toml`, `einoah.yaml` or `einoah.json`,
//! searched in `./` then `~/.config/einoah/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;

pub use {
    error::{Error, Result},
    loader::{apply_env_overrides, config_dir, discover_and_load, load_config},
    schema::{
        AddressConfig, ConsoleConfig, ConsoleMember, ConsoleRole, DispatchConfig, EiNoahConfig,
        Environment, ErrorsConfig, RepliesConfig,
    },
};
