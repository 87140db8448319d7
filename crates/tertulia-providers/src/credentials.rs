//! Process-wide provider credentials.
//!
//! Built once at startup from [`ProvidersConfig`] and read-only afterwards.
//! Only OpenRouter, Groq and Gemini have an environment credential. When the
//! detected provider has none, the OpenRouter credential is used instead,
//! even for endpoints that are not OpenRouter.

use tertulia_core::config::schema::ProvidersConfig;
use tertulia_core::types::ModelConfig;
use tertulia_core::utils::mask_secret;

use crate::registry::ProviderKind;

#[derive(Clone, Default)]
pub struct EnvCredentials {
    openrouter: Option<String>,
    groq: Option<String>,
    gemini: Option<String>,
}

impl std::fmt::Debug for EnvCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let masked = |k: &Option<String>| k.as_deref().map(mask_secret);
        f.debug_struct("EnvCredentials")
            .field("openrouter", &masked(&self.openrouter))
            .field("groq", &masked(&self.groq))
            .field("gemini", &masked(&self.gemini))
            .finish()
    }
}

fn non_blank(key: &str) -> Option<String> {
    let key = key.trim();
    (!key.is_empty()).then(|| key.to_string())
}

impl EnvCredentials {
    pub fn from_config(providers: &ProvidersConfig) -> Self {
        EnvCredentials {
            openrouter: non_blank(&providers.openrouter.api_key),
            groq: non_blank(&providers.groq.api_key),
            gemini: non_blank(&providers.gemini.api_key),
        }
    }

    /// Set (or clear, with a blank key) the credential for one kind.
    ///
    /// Kinds without an environment slot are ignored.
    pub fn with(mut self, kind: ProviderKind, key: &str) -> Self {
        let key = non_blank(key);
        match kind {
            ProviderKind::OpenRouter => self.openrouter = key,
            ProviderKind::Groq => self.groq = key,
            ProviderKind::Gemini => self.gemini = key,
            ProviderKind::Anthropic | ProviderKind::OpenAiCompatible => {}
        }
        self
    }

    /// The credential configured for exactly this kind.
    pub fn get(&self, kind: ProviderKind) -> Option<&str> {
        match kind {
            ProviderKind::OpenRouter => self.openrouter.as_deref(),
            ProviderKind::Groq => self.groq.as_deref(),
            ProviderKind::Gemini => self.gemini.as_deref(),
            ProviderKind::Anthropic | ProviderKind::OpenAiCompatible => None,
        }
    }

    /// The credential to use for `kind`, falling back to OpenRouter's.
    pub fn for_kind(&self, kind: ProviderKind) -> Option<&str> {
        self.get(kind).or(self.openrouter.as_deref())
    }

    /// Whether any environment credential is configured.
    pub fn is_empty(&self) -> bool {
        self.openrouter.is_none() && self.groq.is_none() && self.gemini.is_none()
    }
}

/// Pick the credential for a model: its stored key if non-blank, otherwise
/// the environment credential for `kind`.
pub fn resolve_credential<'a>(
    model: &'a ModelConfig,
    kind: ProviderKind,
    env: &'a EnvCredentials,
) -> Option<&'a str> {
    if model.has_api_key() {
        return Some(model.api_key.trim());
    }
    env.for_kind(kind)
}
