//! Response normalization: every provider's reply becomes plain text.
//!
//! A failing status is an error carrying the provider's own message when it
//! sent one. A successful status whose body lacks the expected field is *not*
//! an error: it degrades to [`NO_RESPONSE`].

use serde_json::Value;
use thiserror::Error;

use crate::registry::ProviderKind;

/// Placeholder reply for successful responses without text.
pub const NO_RESPONSE: &str = "Sin respuesta";

/// A provider answered with a failing status.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("{message}")]
pub struct ProviderError {
    pub kind: ProviderKind,
    pub message: String,
}

/// JSON pointer to the reply text for each provider shape.
fn reply_pointer(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::Gemini => "/candidates/0/content/parts/0/text",
        ProviderKind::Anthropic => "/content/0/text",
        ProviderKind::Groq | ProviderKind::OpenRouter | ProviderKind::OpenAiCompatible => {
            "/choices/0/message/content"
        }
    }
}

/// `error.message`, or `error` itself when it is a plain string.
fn embedded_error(body: &Value) -> Option<String> {
    let error = body.get("error")?;
    error
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| error.as_str())
        .filter(|m| !m.trim().is_empty())
        .map(String::from)
}

/// Extract the assistant's text from a provider response.
pub fn normalize(kind: ProviderKind, status: u16, body: &Value) -> Result<String, ProviderError> {
    if !(200..300).contains(&status) {
        let message = embedded_error(body).unwrap_or_else(|| kind.default_error().to_string());
        return Err(ProviderError { kind, message });
    }

    let text = body
        .pointer(reply_pointer(kind))
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .unwrap_or(NO_RESPONSE);
    Ok(text.to_string())
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_gemini_success() {
        let body = json!({
            "candidates": [{"content": {"parts": [{"text": "¡Hola!"}], "role": "model"}}]
        });
        assert_eq!(normalize(ProviderKind::Gemini, 200, &body).unwrap(), "¡Hola!");
    }

    #[test]
    fn test_anthropic_success() {
        let body = json!({"content": [{"type": "text", "text": "Saludos"}], "role": "assistant"});
        assert_eq!(normalize(ProviderKind::Anthropic, 200, &body).unwrap(), "Saludos");
    }

    #[test]
    fn test_chat_completion_success_for_all_bearer_kinds() {
        let body = json!({"choices": [{"message": {"role": "assistant", "content": "ok"}}]});
        for kind in [
            ProviderKind::Groq,
            ProviderKind::OpenRouter,
            ProviderKind::OpenAiCompatible,
        ] {
            assert_eq!(normalize(kind, 200, &body).unwrap(), "ok");
        }
    }

    #[test]
    fn test_empty_choices_is_placeholder() {
        let body = json!({"choices": []});
        assert_eq!(
            normalize(ProviderKind::OpenRouter, 200, &body).unwrap(),
            NO_RESPONSE
        );
    }

    #[test]
    fn test_malformed_success_bodies_are_placeholder() {
        assert_eq!(normalize(ProviderKind::Gemini, 200, &json!({})).unwrap(), NO_RESPONSE);
        assert_eq!(
            normalize(ProviderKind::Anthropic, 200, &json!({"content": [{"type": "tool_use"}]})).unwrap(),
            NO_RESPONSE
        );
        assert_eq!(
            normalize(ProviderKind::Groq, 200, &json!({"choices": [{"message": {"content": null}}]})).unwrap(),
            NO_RESPONSE
        );
        assert_eq!(normalize(ProviderKind::OpenAiCompatible, 201, &Value::Null).unwrap(), NO_RESPONSE);
    }

    #[test]
    fn test_error_message_passthrough() {
        let body = json!({"error": {"message": "rate limited"}});
        let err = normalize(ProviderKind::OpenRouter, 429, &body).unwrap_err();
        assert_eq!(err.message, "rate limited");
        assert_eq!(err.kind, ProviderKind::OpenRouter);
        assert_eq!(err.to_string(), "rate limited");
    }

    #[test]
    fn test_error_as_plain_string() {
        let body = json!({"error": "invalid key"});
        let err = normalize(ProviderKind::Groq, 401, &body).unwrap_err();
        assert_eq!(err.message, "invalid key");
    }

    #[test]
    fn test_error_without_message_uses_default() {
        let err = normalize(ProviderKind::Gemini, 500, &Value::Null).unwrap_err();
        assert_eq!(err.message, "Error en la API de Gemini");

        let err = normalize(ProviderKind::Anthropic, 400, &json!({"error": {"type": "x"}})).unwrap_err();
        assert_eq!(err.message, "Error en la API de Anthropic");

        let err = normalize(ProviderKind::OpenAiCompatible, 503, &json!({})).unwrap_err();
        assert_eq!(err.message, "Error en la API del proveedor");
    }

    #[test]
    fn test_failing_status_wins_over_body_text() {
        // A body that looks successful is still an error under a failing status.
        let body = json!({"choices": [{"message": {"content": "ok"}}]});
        assert!(normalize(ProviderKind::Groq, 500, &body).is_err());
    }
}
