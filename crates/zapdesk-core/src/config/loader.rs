//! Config loader: reads `~/.zapdesk/config.json` and merges env vars.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `~/.zapdesk/config.json`
//! 3. Environment variables `ZAPDESK_<SECTION>__<FIELD>` (override JSON)

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::schema::Config;

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    crate::utils::get_data_path().join("config.json")
}

/// Load configuration from the default path + env vars.
///
/// Falls back to `Config::default()` if the file doesn't exist or can't be parsed.
pub fn load_config(path: Option<&Path>) -> Config {
    let config_path = path
        .map(PathBuf::from)
        .unwrap_or_else(get_config_path);

    load_config_from_path(&config_path)
}

/// Load config from a specific file path.
fn load_config_from_path(path: &Path) -> Config {
    if !path.exists() {
        info!("No config file found at {}, using defaults", path.display());
        return apply_env_overrides(Config::default());
    }

    debug!("Loading config from {}", path.display());

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file {}: {}", path.display(), e);
            return apply_env_overrides(Config::default());
        }
    };

    let config: Config = match serde_json::from_str(&content) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to parse config JSON: {}", e);
            return apply_env_overrides(Config::default());
        }
    };

    apply_env_overrides(config)
}

/// Save configuration to disk (pretty-printed JSON with camelCase keys).
pub fn save_config(config: &Config, path: Option<&Path>) -> std::io::Result<()> {
    let config_path = path
        .map(PathBuf::from)
        .unwrap_or_else(get_config_path);

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(config).map_err(std::io::Error::other)?;

    std::fs::write(&config_path, json)?;
    debug!("Config saved to {}", config_path.display());
    Ok(())
}

/// Apply environment variable overrides on top of a loaded config.
///
/// Env var format: `ZAPDESK_<SECTION>__<FIELD>` (double underscore as delimiter).
///
/// Supported overrides:
/// - `ZAPDESK_WHATSAPP__BRIDGE_URL` → `whatsapp.bridge_url`
/// - `ZAPDESK_WHATSAPP__AUTH_DIR` → `whatsapp.auth_dir`
/// - `ZAPDESK_WHATSAPP__DEFAULT_COUNTRY_CODE` → `whatsapp.default_country_code`
/// - `ZAPDESK_GATEWAY__HOST` → `gateway.host`
/// - `ZAPDESK_GATEWAY__PORT` → `gateway.port`
fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(val) = std::env::var("ZAPDESK_WHATSAPP__BRIDGE_URL") {
        config.whatsapp.bridge_url = val;
    }
    if let Ok(val) = std::env::var("ZAPDESK_WHATSAPP__AUTH_DIR") {
        config.whatsapp.auth_dir = val;
    }
    if let Ok(val) = std::env::var("ZAPDESK_WHATSAPP__DEFAULT_COUNTRY_CODE") {
        let digits: String = val.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            warn!(value = %val, "ignoring country code override without digits");
        } else {
            config.whatsapp.default_country_code = digits;
        }
    }

    if let Ok(val) = std::env::var("ZAPDESK_GATEWAY__HOST") {
        config.gateway.host = val;
    }
    if let Ok(val) = std::env::var("ZAPDESK_GATEWAY__PORT") {
        if let Ok(p) = val.parse::<u16>() {
            config.gateway.port = p;
        }
    }

    config
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
