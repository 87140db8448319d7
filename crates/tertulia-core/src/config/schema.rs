//! Configuration schema.
//!
//! Hierarchy: `Config` → `ProvidersConfig`, `DatabaseConfig`, `GatewayConfig`.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case.
//! We use `#[serde(rename_all = "camelCase")]` to handle the conversion.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────

/// Root configuration: loaded from `~/.tertulia/config.json` + env vars.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub providers: ProvidersConfig,
    pub database: DatabaseConfig,
    pub gateway: GatewayConfig,
}

// ─────────────────────────────────────────────
// Providers
// ─────────────────────────────────────────────

/// Credential for one provider family.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderConfig {
    /// API key for authentication. Empty means "not configured".
    #[serde(default)]
    pub api_key: String,
}

impl ProviderConfig {
    /// Whether this provider has a configured API key.
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

/// Process-wide provider credentials.
///
/// Only three families carry an environment credential; models pointing at
/// any other endpoint either store their own key or borrow the OpenRouter one.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openrouter: ProviderConfig,
    #[serde(default)]
    pub groq: ProviderConfig,
    #[serde(default)]
    pub gemini: ProviderConfig,
}

impl ProvidersConfig {
    /// Get a provider config by name (e.g. `"groq"`).
    pub fn get_by_name(&self, name: &str) -> Option<&ProviderConfig> {
        match name {
            "openrouter" => Some(&self.openrouter),
            "groq" => Some(&self.groq),
            "gemini" => Some(&self.gemini),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────
// Database
// ─────────────────────────────────────────────

/// Hosted database + object storage connection.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseConfig {
    /// Project base URL (e.g. `https://xyz.supabase.co`).
    pub url: String,
    /// Service or anon key sent as `apikey` + bearer token.
    pub key: String,
    /// Storage bucket that holds character images.
    pub images_bucket: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            key: String::new(),
            images_bucket: "personajes".to_string(),
        }
    }
}

impl DatabaseConfig {
    /// Whether both URL and key are present.
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty() && !self.key.trim().is_empty()
    }
}

// ─────────────────────────────────────────────
// Gateway
// ─────────────────────────────────────────────

/// HTTP gateway settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Browser origins allowed to call the API.
    pub allowed_origins: Vec<String>,
    /// Upper bound for each outbound call (store lookup, provider request).
    pub request_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:5173".to_string(),
            ],
            request_timeout_secs: 30,
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
