//! Configuration loading, env substitution, environment overrides and
//! validation.
//!
//! Config files: `otis.toml`, `otis.yaml` or `otis.json`, searched in `./`
//! then `~/.config/otis/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{apply_env_overrides, apply_process_env, config_dir, discover_and_load, load_config},
    schema::{DiscordConfig, OpenAiConfig, OtisConfig, ReferencesConfig, TicketsConfig},
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
