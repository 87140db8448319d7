//! Core types for Tertulia: records stored in the hosted database and the
//! transient chat request relayed to a provider.
//!
//! Row types deserialize straight from the database's JSON rows. Ids may come
//! back as numbers (serial primary keys) or strings (uuid keys); both are
//! normalized to `String`.

use serde::{Deserialize, Deserializer, Serialize};

// ─────────────────────────────────────────────
// Models
// ─────────────────────────────────────────────

/// One configured LLM endpoint.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    #[serde(deserialize_with = "id_from_any")]
    pub id: String,
    pub name: String,
    /// Endpoint URL; the provider protocol is inferred from it.
    pub url: String,
    /// Stored credential. Empty means "use the environment credential".
    #[serde(default, deserialize_with = "string_or_null")]
    pub api_key: String,
    #[serde(default)]
    pub is_custom: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl ModelConfig {
    /// Whether this model carries its own credential.
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

/// Insert payload for a new model row.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NewModel {
    pub name: String,
    pub url: String,
    pub api_key: String,
    pub is_custom: bool,
}

// ─────────────────────────────────────────────
// Characters
// ─────────────────────────────────────────────

/// A persona the user can chat with.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Character {
    #[serde(deserialize_with = "id_from_any")]
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub description: String,
    /// Persona text sent as the character-specific system prompt.
    #[serde(default, deserialize_with = "string_or_null")]
    pub system_prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Insert payload for a new character row.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NewCharacter {
    pub name: String,
    pub description: String,
    pub system_prompt: String,
}

/// A decoded image ready to be uploaded to object storage.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    /// MIME type, e.g. `"image/png"`.
    pub content_type: String,
    /// File extension without the dot, e.g. `"png"`.
    pub extension: String,
}

// ─────────────────────────────────────────────
// Chat
// ─────────────────────────────────────────────

/// One stateless, single-turn chat call.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ChatRequest {
    #[serde(default, deserialize_with = "id_or_empty")]
    pub model_id: String,
    #[serde(default)]
    pub message: String,
    /// Character persona, if the chat is with a character.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl ChatRequest {
    pub fn new(model_id: impl Into<String>, message: impl Into<String>) -> Self {
        ChatRequest {
            model_id: model_id.into(),
            message: message.into(),
            system_prompt: None,
        }
    }

    /// Attach a character persona.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

// ─────────────────────────────────────────────
// Serde helpers
// ─────────────────────────────────────────────

/// Primary keys arrive as text (uuid) or integers (serial).
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Int(i64),
}

fn id_from_any<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Int(n) => n.to_string(),
    })
}

fn id_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<RawId>::deserialize(deserializer)? {
        Some(RawId::Text(s)) => s,
        Some(RawId::Int(n)) => n.to_string(),
        None => String::new(),
    })
}

fn string_or_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_row_with_numeric_id() {
        let row = serde_json::json!({
            "id": 7,
            "name": "Groq Llama",
            "url": "https://api.groq.com/openai/v1/chat/completions",
            "api_key": null,
            "is_custom": false,
            "created_at": "2024-05-01T10:00:00+00:00"
        });
        let model: ModelConfig = serde_json::from_value(row).unwrap();
        assert_eq!(model.id, "7");
        assert_eq!(model.api_key, "");
        assert!(!model.has_api_key());
    }

    #[test]
    fn test_model_row_with_uuid_id() {
        let row = serde_json::json!({
            "id": "3f2b7a",
            "name": "Custom",
            "url": "https://example.com/v1/chat/completions",
            "api_key": "sk-own",
            "is_custom": true
        });
        let model: ModelConfig = serde_json::from_value(row).unwrap();
        assert_eq!(model.id, "3f2b7a");
        assert!(model.has_api_key());
        assert!(model.created_at.is_none());
    }

    #[test]
    fn test_character_row_nullable_fields() {
        let row = serde_json::json!({
            "id": 1,
            "name": "Sócrates",
            "description": null,
            "system_prompt": "Responde siempre con preguntas.",
            "image_url": null
        });
        let character: Character = serde_json::from_value(row).unwrap();
        assert_eq!(character.description, "");
        assert!(character.image_url.is_none());
    }

    #[test]
    fn test_chat_request_from_json() {
        let req: ChatRequest = serde_json::from_value(serde_json::json!({
            "model_id": "1",
            "message": "hola"
        }))
        .unwrap();
        assert_eq!(req, ChatRequest::new("1", "hola"));

        let with_persona = ChatRequest::new("1", "hola").with_system_prompt("Eres un pirata");
        assert_eq!(with_persona.system_prompt.as_deref(), Some("Eres un pirata"));
    }

    #[test]
    fn test_chat_request_numeric_model_id() {
        let req: ChatRequest = serde_json::from_value(serde_json::json!({
            "model_id": 12,
            "message": "hola"
        }))
        .unwrap();
        assert_eq!(req.model_id, "12");
    }

    #[test]
    fn test_chat_request_missing_fields_default_empty() {
        let req: ChatRequest = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(req.model_id.is_empty());
        assert!(req.message.is_empty());
    }
}
