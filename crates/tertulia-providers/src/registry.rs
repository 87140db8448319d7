//! Provider registry: which wire protocol an endpoint URL speaks.
//!
//! Detection is an ordered list of `(URL fragment → kind)` rules matched
//! case-insensitively anywhere in the URL. First match wins; anything else is
//! treated as an OpenAI-compatible `/chat/completions` endpoint.

// ─────────────────────────────────────────────
// ProviderKind
// ─────────────────────────────────────────────

/// The chat-completion wire protocol of an endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Gemini,
    Anthropic,
    Groq,
    OpenRouter,
    OpenAiCompatible,
}

impl ProviderKind {
    /// Stable lowercase identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Groq => "groq",
            ProviderKind::OpenRouter => "openrouter",
            ProviderKind::OpenAiCompatible => "openai-compatible",
        }
    }

    /// Human-readable name for logs and error messages.
    pub fn display_name(self) -> &'static str {
        spec(self).display_name
    }

    /// Message used when a failing provider response carries no error text.
    pub fn default_error(self) -> &'static str {
        spec(self).default_error
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────
// ProviderSpec: static metadata for one provider
// ─────────────────────────────────────────────

/// Static specification describing one provider protocol.
#[derive(Clone, Debug)]
pub struct ProviderSpec {
    pub kind: ProviderKind,
    /// Lowercase host fragment that identifies this provider in an endpoint URL.
    pub url_fragment: &'static str,
    /// Human-readable name for logs. E.g. `"OpenRouter"`.
    pub display_name: &'static str,
    /// Fallback error message for failing responses without an `error.message`.
    pub default_error: &'static str,
}

/// Detection rules in matching priority order.
pub static PROVIDERS: &[ProviderSpec] = &[
    ProviderSpec {
        kind: ProviderKind::Gemini,
        url_fragment: "generativelanguage.googleapis.com",
        display_name: "Gemini",
        default_error: "Error en la API de Gemini",
    },
    ProviderSpec {
        kind: ProviderKind::Anthropic,
        url_fragment: "api.anthropic.com",
        display_name: "Anthropic",
        default_error: "Error en la API de Anthropic",
    },
    ProviderSpec {
        kind: ProviderKind::Groq,
        url_fragment: "api.groq.com",
        display_name: "Groq",
        default_error: "Error en la API de Groq",
    },
    ProviderSpec {
        kind: ProviderKind::OpenRouter,
        url_fragment: "openrouter.ai",
        display_name: "OpenRouter",
        default_error: "Error en la API de OpenRouter",
    },
];

/// Catch-all for URLs no rule matches.
pub static OPENAI_COMPATIBLE: ProviderSpec = ProviderSpec {
    kind: ProviderKind::OpenAiCompatible,
    url_fragment: "",
    display_name: "OpenAI-compatible",
    default_error: "Error en la API del proveedor",
};

// ─────────────────────────────────────────────
// Matching functions
// ─────────────────────────────────────────────

/// Find the spec for an endpoint URL. Never fails: unknown or empty URLs get
/// the OpenAI-compatible spec.
pub fn find_by_url(url: &str) -> &'static ProviderSpec {
    let url_lower = url.to_lowercase();
    PROVIDERS
        .iter()
        .find(|spec| url_lower.contains(spec.url_fragment))
        .unwrap_or(&OPENAI_COMPATIBLE)
}

/// Infer the provider kind of an endpoint URL.
pub fn detect(url: &str) -> ProviderKind {
    find_by_url(url).kind
}

/// The spec for a provider kind.
pub fn spec(kind: ProviderKind) -> &'static ProviderSpec {
    PROVIDERS
        .iter()
        .find(|s| s.kind == kind)
        .unwrap_or(&OPENAI_COMPATIBLE)
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_gemini() {
        let url = "https://generativelanguage.googleapis.com/v1beta/models/gemini-pro:generateContent";
        assert_eq!(detect(url), ProviderKind::Gemini);
    }

    #[test]
    fn test_detect_anthropic() {
        assert_eq!(
            detect("https://api.anthropic.com/v1/messages"),
            ProviderKind::Anthropic
        );
    }

    #[test]
    fn test_detect_groq() {
        assert_eq!(
            detect("https://api.groq.com/openai/v1/chat/completions"),
            ProviderKind::Groq
        );
    }

    #[test]
    fn test_detect_openrouter() {
        assert_eq!(
            detect("https://openrouter.ai/api/v1/chat/completions"),
            ProviderKind::OpenRouter
        );
    }

    #[test]
    fn test_detect_is_case_insensitive() {
        assert_eq!(
            detect("HTTPS://GenerativeLanguage.GoogleAPIs.com/v1beta/models/x"),
            ProviderKind::Gemini
        );
        assert_eq!(detect("https://API.GROQ.COM/v1"), ProviderKind::Groq);
        assert_eq!(detect("https://OpenRouter.AI/api"), ProviderKind::OpenRouter);
        assert_eq!(detect("https://Api.Anthropic.Com/v1"), ProviderKind::Anthropic);
    }

    #[test]
    fn test_detect_fragment_anywhere_in_url() {
        // Substring match, not host parsing: a proxy path still counts.
        assert_eq!(
            detect("http://localhost:8080/api.groq.com/openai/v1/chat/completions"),
            ProviderKind::Groq
        );
    }

    #[test]
    fn test_detect_unknown_and_empty_default() {
        assert_eq!(
            detect("https://api.openai.com/v1/chat/completions"),
            ProviderKind::OpenAiCompatible
        );
        assert_eq!(detect("http://localhost:11434/v1/chat/completions"), ProviderKind::OpenAiCompatible);
        assert_eq!(detect(""), ProviderKind::OpenAiCompatible);
        assert_eq!(detect("not a url"), ProviderKind::OpenAiCompatible);
    }

    #[test]
    fn test_first_rule_wins() {
        // Contains both gemini and openrouter fragments; gemini is earlier.
        let url = "https://openrouter.ai/proxy/generativelanguage.googleapis.com/v1";
        assert_eq!(detect(url), ProviderKind::Gemini);
    }

    #[test]
    fn test_rule_order_is_explicit() {
        let order: Vec<ProviderKind> = PROVIDERS.iter().map(|s| s.kind).collect();
        assert_eq!(
            order,
            vec![
                ProviderKind::Gemini,
                ProviderKind::Anthropic,
                ProviderKind::Groq,
                ProviderKind::OpenRouter,
            ]
        );
    }

    #[test]
    fn test_all_fragments_unique_and_lowercase() {
        let mut fragments: Vec<&str> = PROVIDERS.iter().map(|s| s.url_fragment).collect();
        assert!(fragments.iter().all(|f| *f == f.to_lowercase() && !f.is_empty()));
        fragments.sort();
        fragments.dedup();
        assert_eq!(fragments.len(), PROVIDERS.len(), "Duplicate URL fragments found");
    }

    #[test]
    fn test_spec_lookup_and_names() {
        assert_eq!(ProviderKind::Groq.display_name(), "Groq");
        assert_eq!(ProviderKind::OpenAiCompatible.display_name(), "OpenAI-compatible");
        assert_eq!(
            ProviderKind::OpenAiCompatible.default_error(),
            "Error en la API del proveedor"
        );
        assert_eq!(ProviderKind::OpenRouter.to_string(), "openrouter");
    }

    #[test]
    fn test_kind_identifiers_are_lowercase() {
        assert_eq!(ProviderKind::OpenAiCompatible.as_str(), "openai-compatible");
        assert_eq!(ProviderKind::Gemini.as_str(), "gemini");
    }
}
