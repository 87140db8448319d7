//! Outbound request shapes, one per provider protocol.
//!
//! | kind | auth | body |
//! |---|---|---|
//! | Gemini | `?key=` query param | `contents[].parts[].text` + `generationConfig` |
//! | Anthropic | `x-api-key` + `anthropic-version` | persona as a user turn acknowledged by the assistant |
//! | Groq | bearer | system + user, fixed model, temperature, max_tokens |
//! | OpenRouter | bearer | system + user, fixed model |
//! | OpenAI-compatible | bearer | system + user, temperature, max_tokens |

use serde::Serialize;
use tracing::debug;

use crate::policy::DEFAULT_SYSTEM_PROMPT;
use crate::registry::ProviderKind;

pub const TEMPERATURE: f64 = 0.7;
pub const MAX_TOKENS: u32 = 1000;

pub const ANTHROPIC_MODEL: &str = "claude-3-sonnet-20240229";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";
/// Assistant turn that acknowledges the persona in Anthropic conversations.
pub const ANTHROPIC_ACK: &str = "Entendido.";
pub const GROQ_MODEL: &str = "llama-3.3-70b-versatile";
pub const OPENROUTER_MODEL: &str = "deepseek/deepseek-chat";

// ─────────────────────────────────────────────
// Wire bodies
// ─────────────────────────────────────────────

/// A chat turn, serialized as `{"role": ..., "content": ...}`.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System { content: String },
    User { content: String },
    Assistant { content: String },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant {
            content: content.into(),
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct GeminiPart {
    pub text: String,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct GeminiContent {
    pub parts: Vec<GeminiPart>,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f64,
    pub max_output_tokens: u32,
}

/// `generateContent` request body.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeminiBody {
    pub contents: Vec<GeminiContent>,
    pub generation_config: GenerationConfig,
}

/// Messages API request body.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct AnthropicBody {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
}

/// `/chat/completions` request body shared by Groq, OpenRouter and
/// OpenAI-compatible endpoints. Absent fields are omitted from the JSON.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ChatCompletionBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Any provider body; serializes as the inner shape.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub enum RequestBody {
    Gemini(GeminiBody),
    Anthropic(AnthropicBody),
    ChatCompletion(ChatCompletionBody),
}

// ─────────────────────────────────────────────
// ProviderRequest
// ─────────────────────────────────────────────

/// A fully-formed outbound call, ready to hand to an HTTP client.
#[derive(Clone, PartialEq)]
pub struct ProviderRequest {
    pub kind: ProviderKind,
    pub method: reqwest::Method,
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: RequestBody,
}

impl ProviderRequest {
    /// Value of the first header with this name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl std::fmt::Debug for ProviderRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Header values and the URL may carry credentials.
        let header_names: Vec<&str> = self.headers.iter().map(|(n, _)| *n).collect();
        f.debug_struct("ProviderRequest")
            .field("kind", &self.kind)
            .field("method", &self.method)
            .field("headers", &header_names)
            .finish()
    }
}

// ─────────────────────────────────────────────
// Builder
// ─────────────────────────────────────────────

/// Build the outbound request for `kind`.
///
/// `system_prompt` is the effective prompt; `None` or blank means "no
/// prompt", in which case chat-completion bodies fall back to
/// [`DEFAULT_SYSTEM_PROMPT`] and Gemini/Anthropic send the message alone.
pub fn build_request(
    kind: ProviderKind,
    url: &str,
    credential: &str,
    message: &str,
    system_prompt: Option<&str>,
) -> ProviderRequest {
    let prompt = system_prompt.filter(|p| !p.trim().is_empty());
    let json_header = ("Content-Type", "application/json".to_string());
    let bearer = ("Authorization", format!("Bearer {credential}"));

    let (url, headers, body) = match kind {
        ProviderKind::Gemini => {
            if let Some(model) = gemini_model_name(url) {
                debug!(model = %model, "gemini endpoint");
            }
            let text = match prompt {
                Some(p) => format!("{p}\n\nUsuario: {message}"),
                None => message.to_string(),
            };
            let body = GeminiBody {
                contents: vec![GeminiContent {
                    parts: vec![GeminiPart { text }],
                }],
                generation_config: GenerationConfig {
                    temperature: TEMPERATURE,
                    max_output_tokens: MAX_TOKENS,
                },
            };
            (
                with_key_param(url, credential),
                vec![json_header],
                RequestBody::Gemini(body),
            )
        }
        ProviderKind::Anthropic => {
            let messages = match prompt {
                Some(p) => vec![
                    Message::user(p),
                    Message::assistant(ANTHROPIC_ACK),
                    Message::user(message),
                ],
                None => vec![Message::user(message)],
            };
            let body = AnthropicBody {
                model: ANTHROPIC_MODEL.to_string(),
                messages,
                max_tokens: MAX_TOKENS,
            };
            let headers = vec![
                json_header,
                ("x-api-key", credential.to_string()),
                ("anthropic-version", ANTHROPIC_VERSION.to_string()),
            ];
            (url.to_string(), headers, RequestBody::Anthropic(body))
        }
        ProviderKind::Groq => {
            let body = ChatCompletionBody {
                model: Some(GROQ_MODEL.to_string()),
                messages: system_and_user(prompt, message),
                temperature: Some(TEMPERATURE),
                max_tokens: Some(MAX_TOKENS),
            };
            (
                url.to_string(),
                vec![json_header, bearer],
                RequestBody::ChatCompletion(body),
            )
        }
        ProviderKind::OpenRouter => {
            let body = ChatCompletionBody {
                model: Some(OPENROUTER_MODEL.to_string()),
                messages: system_and_user(prompt, message),
                temperature: None,
                max_tokens: None,
            };
            (
                url.to_string(),
                vec![json_header, bearer],
                RequestBody::ChatCompletion(body),
            )
        }
        ProviderKind::OpenAiCompatible => {
            let body = ChatCompletionBody {
                model: None,
                messages: system_and_user(prompt, message),
                temperature: Some(TEMPERATURE),
                max_tokens: Some(MAX_TOKENS),
            };
            (
                url.to_string(),
                vec![json_header, bearer],
                RequestBody::ChatCompletion(body),
            )
        }
    };

    ProviderRequest {
        kind,
        method: reqwest::Method::POST,
        url,
        headers,
        body,
    }
}

fn system_and_user(prompt: Option<&str>, message: &str) -> Vec<Message> {
    vec![
        Message::system(prompt.unwrap_or(DEFAULT_SYSTEM_PROMPT)),
        Message::user(message),
    ]
}

/// Append an encoded `key=<credential>` unless the query already has a `key` pair.
fn with_key_param(url: &str, credential: &str) -> String {
    let mut parsed = match reqwest::Url::parse(url) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!(url = %url, error = %e, "unparseable Gemini URL, sending as stored");
            return url.to_string();
        }
    };
    if parsed.query_pairs().any(|(name, _)| name == "key") {
        return url.to_string();
    }
    parsed.query_pairs_mut().append_pair("key", credential);
    String::from(parsed)
}

/// Model name from a `.../models/<name>:generateContent` URL.
pub fn gemini_model_name(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once("models/")?;
    let end = rest.find([':', '?', '/']).unwrap_or(rest.len());
    Some(&rest[..end]).filter(|m| !m.is_empty())
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
