use std::path::{Path, PathBuf};

use {
    otis_common::types::parse_id_list,
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{
    env_subst::substitute_env,
    error::{Context, Error, Result},
    schema::OtisConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["otis.toml", "otis.yaml", "otis.yml", "otis.json"];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<OtisConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./otis.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/otis/otis.{toml,yaml,yml,json}` (user-global)
///
/// Returns `OtisConfig::default()` if no config file is found or it fails to
/// parse; environment overrides are applied separately.
pub fn discover_and_load() -> OtisConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    OtisConfig::default()
}

fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let config_dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| config_dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/otis/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "otis").map(|d| d.config_dir().to_path_buf())
}

/// Apply overrides from the process environment.
pub fn apply_process_env(config: &mut OtisConfig) -> Result<()> {
    apply_env_overrides(config, |name| std::env::var(name).ok())
}

/// Apply the bot's well-known environment variables on top of file config.
///
/// `DISCORD_BOT_TOKEN`, `OPENAI_API_KEY` and `OPENAI_MODEL` replace their
/// fields; `TICKET_CATEGORY_IDS` and `AI_CONTROL_ROLES` are comma-separated id
/// lists that replace the configured sets. Empty values are ignored.
pub fn apply_env_overrides(
    config: &mut OtisConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(token) = get("DISCORD_BOT_TOKEN") {
        config.discord.token = Secret::new(token);
    }
    if let Some(key) = get("OPENAI_API_KEY") {
        config.openai.api_key = Secret::new(key);
    }
    if let Some(model) = get("OPENAI_MODEL") {
        config.openai.model = model.trim().to_string();
    }
    if let Some(raw) = get("TICKET_CATEGORY_IDS") {
        config.tickets.category_ids =
            parse_id_list(&raw).map_err(|source| Error::InvalidEnv {
                name: "TICKET_CATEGORY_IDS",
                source,
            })?;
    }
    if let Some(raw) = get("AI_CONTROL_ROLES") {
        config.tickets.control_role_ids =
            parse_id_list(&raw).map_err(|source| Error::InvalidEnv {
                name: "AI_CONTROL_ROLES",
                source,
            })?;
    }
    Ok(())
}

fn parse_config(raw: &str, path: &Path) -> Result<OtisConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => Err(Error::UnsupportedFormat {
            extension: ext.to_string(),
        }),
    }
}
