//! Config loader: reads `~/.tertulia/config.json` and merges env vars.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `~/.tertulia/config.json`
//! 3. Conventional deployment variables (`OPENROUTER_API_KEY`, `SUPABASE_URL`, `PORT`, …)
//! 4. Namespaced variables `TERTULIA_<SECTION>__<FIELD>` (highest)

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::schema::{Config, ProviderConfig};

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    crate::utils::get_data_path().join("config.json")
}

/// Load configuration from the default path + env vars.
///
/// Falls back to `Config::default()` if the file doesn't exist or can't be parsed.
pub fn load_config(path: Option<&Path>) -> Config {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

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
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(config)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    std::fs::write(&config_path, json)?;
    debug!("Config saved to {}", config_path.display());
    Ok(())
}

/// Read an env var, treating empty values as unset.
fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Apply environment variable overrides on top of a loaded config.
///
/// Conventional names used by hosting platforms are read first, then the
/// namespaced `TERTULIA_<SECTION>__<FIELD>` form (double underscore as
/// delimiter) so it can override them:
/// - `OPENROUTER_API_KEY` / `TERTULIA_PROVIDERS__OPENROUTER__API_KEY`
/// - `GROQ_API_KEY` / `TERTULIA_PROVIDERS__GROQ__API_KEY`
/// - `GEMINI_API_KEY` / `TERTULIA_PROVIDERS__GEMINI__API_KEY`
/// - `SUPABASE_URL` / `TERTULIA_DATABASE__URL`
/// - `SUPABASE_KEY` / `TERTULIA_DATABASE__KEY`
/// - `TERTULIA_DATABASE__IMAGES_BUCKET`
/// - `PORT` / `TERTULIA_GATEWAY__PORT`
/// - `TERTULIA_GATEWAY__HOST`
/// - `TERTULIA_GATEWAY__ALLOWED_ORIGINS` (comma-separated)
/// - `TERTULIA_GATEWAY__REQUEST_TIMEOUT_SECS`
fn apply_env_overrides(mut config: Config) -> Config {
    // Providers
    apply_provider_env(&mut config.providers.openrouter, "OPENROUTER");
    apply_provider_env(&mut config.providers.groq, "GROQ");
    apply_provider_env(&mut config.providers.gemini, "GEMINI");

    // Database
    for name in ["SUPABASE_URL", "TERTULIA_DATABASE__URL"] {
        if let Some(val) = env_value(name) {
            config.database.url = val;
        }
    }
    for name in ["SUPABASE_KEY", "TERTULIA_DATABASE__KEY"] {
        if let Some(val) = env_value(name) {
            config.database.key = val;
        }
    }
    if let Some(val) = env_value("TERTULIA_DATABASE__IMAGES_BUCKET") {
        config.database.images_bucket = val;
    }

    // Gateway
    if let Some(val) = env_value("TERTULIA_GATEWAY__HOST") {
        config.gateway.host = val;
    }
    for name in ["PORT", "TERTULIA_GATEWAY__PORT"] {
        if let Some(val) = env_value(name) {
            match val.parse::<u16>() {
                Ok(p) => config.gateway.port = p,
                Err(_) => warn!("Ignoring invalid port in {}: {}", name, val),
            }
        }
    }
    if let Some(val) = env_value("TERTULIA_GATEWAY__ALLOWED_ORIGINS") {
        config.gateway.allowed_origins = val
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(String::from)
            .collect();
    }
    if let Some(val) = env_value("TERTULIA_GATEWAY__REQUEST_TIMEOUT_SECS") {
        if let Ok(secs) = val.parse::<u64>() {
            config.gateway.request_timeout_secs = secs;
        }
    }

    config
}

/// Apply env var overrides for a single provider.
fn apply_provider_env(provider: &mut ProviderConfig, name: &str) {
    if let Some(val) = env_value(&format!("{name}_API_KEY")) {
        provider.api_key = val;
    }
    if let Some(val) = env_value(&format!("TERTULIA_PROVIDERS__{name}__API_KEY")) {
        provider.api_key = val;
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
