//! Chat dispatch: one stateless, single-turn relay to the model's provider.
//!
//! Steps, in order, none of them retried:
//! 1. validate the message and model id
//! 2. load the model from the store
//! 3. resolve a credential (stored key, else environment table)
//! 4. detect the provider from the model URL
//! 5. prepend the global policy to the persona
//! 6. build, send, normalize
//!
//! Both network calls (store lookup, provider request) are bounded by the
//! dispatcher's timeout.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, warn};

use tertulia_core::types::{ChatRequest, ModelConfig};
use tertulia_core::utils::truncate_string;
use tertulia_store::{DataStore, StoreError};

use crate::credentials::{resolve_credential, EnvCredentials};
use crate::normalize::normalize;
use crate::policy::{effective_system_prompt, GLOBAL_POLICY};
use crate::registry::{detect, ProviderKind};
use crate::request::{build_request, ProviderRequest};

/// Why a chat call failed.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Missing or blank required field.
    #[error("{0}")]
    InvalidInput(String),

    /// Unknown model id.
    #[error("{0}")]
    NotFound(String),

    /// No credential could be resolved.
    #[error("{0}")]
    Config(String),

    /// The provider failed, or could not be reached.
    #[error("{message}")]
    Upstream {
        provider: ProviderKind,
        message: String,
    },

    /// The data store failed while loading the model.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ChatError {
    /// Provider involved in the failure, if any.
    pub fn provider(&self) -> Option<ProviderKind> {
        match self {
            ChatError::Upstream { provider, .. } => Some(*provider),
            _ => None,
        }
    }
}

/// Relays chat messages to the provider behind each stored model.
pub struct ChatDispatcher {
    store: Arc<dyn DataStore>,
    credentials: EnvCredentials,
    /// Shared, connection-pooled client; carries the provider-call timeout.
    client: reqwest::Client,
    timeout: Duration,
}

impl ChatDispatcher {
    pub fn new(
        store: Arc<dyn DataStore>,
        credentials: EnvCredentials,
        timeout: Duration,
    ) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChatError::Config(format!("No se pudo crear el cliente HTTP: {e}")))?;

        Ok(ChatDispatcher {
            store,
            credentials,
            client,
            timeout,
        })
    }

    /// Send one message and return the provider's plain-text reply.
    pub async fn dispatch(&self, request: &ChatRequest) -> Result<String, ChatError> {
        if request.message.trim().is_empty() {
            return Err(ChatError::InvalidInput("El mensaje es requerido".into()));
        }
        let model_id = request.model_id.trim();
        if model_id.is_empty() {
            return Err(ChatError::InvalidInput("El modelo es requerido".into()));
        }

        let model = self.load_model(model_id).await?;

        let kind = detect(&model.url);
        let credential = resolve_credential(&model, kind, &self.credentials)
            .ok_or_else(|| ChatError::Config("API Key no configurada".into()))?;

        let system_prompt =
            effective_system_prompt(GLOBAL_POLICY, request.system_prompt.as_deref());

        debug!(
            model_id = %model.id,
            provider = kind.display_name(),
            stored_key = model.has_api_key(),
            message_chars = request.message.chars().count(),
            persona = request.system_prompt.is_some(),
            "dispatching chat"
        );

        let outbound = build_request(
            kind,
            &model.url,
            credential,
            &request.message,
            Some(&system_prompt),
        );
        self.send(outbound).await
    }

    async fn load_model(&self, id: &str) -> Result<ModelConfig, ChatError> {
        let lookup = tokio::time::timeout(self.timeout, self.store.get_model(id))
            .await
            .map_err(|_| {
                StoreError::Request(format!(
                    "la consulta del modelo superó {}s",
                    self.timeout.as_secs()
                ))
            })??;

        lookup.ok_or_else(|| ChatError::NotFound("Modelo no encontrado".into()))
    }

    async fn send(&self, outbound: ProviderRequest) -> Result<String, ChatError> {
        let kind = outbound.kind;
        let upstream = |message: String| ChatError::Upstream {
            provider: kind,
            message,
        };

        let mut builder = self.client.request(outbound.method.clone(), &outbound.url);
        for (name, value) in &outbound.headers {
            builder = builder.header(*name, value);
        }

        let response = builder.json(&outbound.body).send().await.map_err(|e| {
            error!(provider = kind.display_name(), error = %e, "provider request failed");
            upstream(format!(
                "Error de conexión con {}: {}",
                kind.display_name(),
                e.without_url()
            ))
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            error!(provider = kind.display_name(), error = %e, "failed to read provider response");
            upstream(format!(
                "Error leyendo la respuesta de {}: {}",
                kind.display_name(),
                e.without_url()
            ))
        })?;

        let body = serde_json::from_str::<Value>(&text).unwrap_or_else(|_| {
            warn!(
                provider = kind.display_name(),
                status = %status,
                body = %truncate_string(&text, 200),
                "provider returned a non-JSON body"
            );
            Value::Null
        });

        match normalize(kind, status.as_u16(), &body) {
            Ok(reply) => {
                debug!(
                    provider = kind.display_name(),
                    reply_chars = reply.chars().count(),
                    "provider reply received"
                );
                Ok(reply)
            }
            Err(e) => {
                error!(
                    provider = kind.display_name(),
                    status = %status,
                    error = %e,
                    "provider returned an error"
                );
                Err(upstream(e.message))
            }
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tertulia_core::types::NewModel;
    use tertulia_store::MemoryStore;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn model(url: String, api_key: &str) -> NewModel {
        NewModel {
            name: "test".into(),
            url,
            api_key: api_key.into(),
            is_custom: true,
        }
    }

    fn dispatcher(models: Vec<NewModel>, env: EnvCredentials) -> ChatDispatcher {
        let store = Arc::new(MemoryStore::with_models(models));
        ChatDispatcher::new(store, env, Duration::from_secs(5)).unwrap()
    }

    fn completion(content: &str) -> serde_json::Value {
        serde_json::json!({"choices": [{"message": {"role": "assistant", "content": content}}]})
    }

    // ── Validation ──

    #[tokio::test]
    async fn test_blank_message_is_invalid() {
        let d = dispatcher(vec![], EnvCredentials::default());
        let err = d.dispatch(&ChatRequest::new("1", "   ")).await.unwrap_err();
        assert!(matches!(err, ChatError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_missing_model_id_is_invalid() {
        let d = dispatcher(vec![], EnvCredentials::default());
        let err = d.dispatch(&ChatRequest::new("", "hola")).await.unwrap_err();
        assert_eq!(err.to_string(), "El modelo es requerido");
    }

    #[tokio::test]
    async fn test_unknown_model_is_not_found() {
        let d = dispatcher(
            vec![model("https://openrouter.ai/api/v1/chat/completions".into(), "k")],
            EnvCredentials::default(),
        );
        let err = d.dispatch(&ChatRequest::new("42", "hola")).await.unwrap_err();
        assert!(matches!(err, ChatError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_no_credential_is_config_error() {
        // Anthropic has no environment slot and OpenRouter is not configured.
        let d = dispatcher(
            vec![model("https://api.anthropic.com/v1/messages".into(), "")],
            EnvCredentials::default().with(ProviderKind::Groq, "gsk"),
        );
        let err = d.dispatch(&ChatRequest::new("1", "hola")).await.unwrap_err();
        match err {
            ChatError::Config(msg) => assert_eq!(msg, "API Key no configurada"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    // ── Provider round trips ──

    #[tokio::test]
    async fn test_openai_compatible_with_stored_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer stored-key"))
            .and(body_partial_json(serde_json::json!({
                "messages": [{"role": "system", "content": GLOBAL_POLICY}, {"role": "user", "content": "hola"}],
                "temperature": 0.7,
                "max_tokens": 1000
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("¡Hola!")))
            .mount(&server)
            .await;

        let d = dispatcher(
            vec![model(format!("{}/v1/chat/completions", server.uri()), "stored-key")],
            EnvCredentials::default(),
        );
        let reply = d.dispatch(&ChatRequest::new("1", "hola")).await.unwrap();
        assert_eq!(reply, "¡Hola!");
    }

    #[tokio::test]
    async fn test_groq_uses_env_key_and_policy_prefix() {
        let server = MockServer::start().await;
        let expected_system = format!("{GLOBAL_POLICY}\n\nEres Cervantes.");
        Mock::given(method("POST"))
            .and(path("/api.groq.com/openai/v1/chat/completions"))
            .and(header("Authorization", "Bearer env-groq"))
            .and(body_partial_json(serde_json::json!({
                "model": "llama-3.3-70b-versatile",
                "messages": [{"role": "system", "content": expected_system}, {"role": "user", "content": "hola"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("En un lugar...")))
            .mount(&server)
            .await;

        let d = dispatcher(
            vec![model(
                format!("{}/api.groq.com/openai/v1/chat/completions", server.uri()),
                "",
            )],
            EnvCredentials::default()
                .with(ProviderKind::Groq, "env-groq")
                .with(ProviderKind::OpenRouter, "sk-or"),
        );
        let reply = d
            .dispatch(&ChatRequest::new("1", "hola").with_system_prompt("Eres Cervantes."))
            .await
            .unwrap();
        assert_eq!(reply, "En un lugar...");
    }

    #[tokio::test]
    async fn test_unconfigured_kind_borrows_openrouter_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api.groq.com/openai/v1/chat/completions"))
            .and(header("Authorization", "Bearer sk-or-fallback"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("ok")))
            .mount(&server)
            .await;

        let d = dispatcher(
            vec![model(
                format!("{}/api.groq.com/openai/v1/chat/completions", server.uri()),
                "",
            )],
            EnvCredentials::default().with(ProviderKind::OpenRouter, "sk-or-fallback"),
        );
        assert_eq!(d.dispatch(&ChatRequest::new("1", "hola")).await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_gemini_key_param_and_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(
                "/generativelanguage.googleapis.com/v1beta/models/gemini-pro:generateContent",
            ))
            .and(query_param("key", "gm-key"))
            .and(body_partial_json(serde_json::json!({
                "contents": [{"parts": [{"text": format!("{GLOBAL_POLICY}\n\nUsuario: hola")}]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"content": {"parts": [{"text": "Hola desde Gemini"}]}}]
            })))
            .mount(&server)
            .await;

        let d = dispatcher(
            vec![model(
                format!(
                    "{}/generativelanguage.googleapis.com/v1beta/models/gemini-pro:generateContent",
                    server.uri()
                ),
                "",
            )],
            EnvCredentials::default().with(ProviderKind::Gemini, "gm-key"),
        );
        let reply = d.dispatch(&ChatRequest::new("1", "hola")).await.unwrap();
        assert_eq!(reply, "Hola desde Gemini");
    }

    #[tokio::test]
    async fn test_anthropic_policy_as_first_turn() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api.anthropic.com/v1/messages"))
            .and(header("x-api-key", "sk-ant"))
            .and(header("anthropic-version", "2023-06-01"))
            .and(body_partial_json(serde_json::json!({
                "messages": [
                    {"role": "user", "content": GLOBAL_POLICY},
                    {"role": "assistant", "content": "Entendido."},
                    {"role": "user", "content": "hola"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [{"type": "text", "text": "Hola, humano"}]
            })))
            .mount(&server)
            .await;

        let d = dispatcher(
            vec![model(format!("{}/api.anthropic.com/v1/messages", server.uri()), "sk-ant")],
            EnvCredentials::default(),
        );
        assert_eq!(
            d.dispatch(&ChatRequest::new("1", "hola")).await.unwrap(),
            "Hola, humano"
        );
    }

    // ── Failures ──

    #[tokio::test]
    async fn test_provider_error_message_passthrough() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": {"message": "rate limited"}
            })))
            .mount(&server)
            .await;

        let d = dispatcher(
            vec![model(format!("{}/openrouter.ai/api/v1/chat/completions", server.uri()), "k")],
            EnvCredentials::default(),
        );
        let err = d.dispatch(&ChatRequest::new("1", "hola")).await.unwrap_err();
        assert_eq!(err.provider(), Some(ProviderKind::OpenRouter));
        assert_eq!(err.to_string(), "rate limited");
    }

    #[tokio::test]
    async fn test_malformed_success_is_placeholder() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let d = dispatcher(
            vec![model(format!("{}/v1/chat/completions", server.uri()), "k")],
            EnvCredentials::default(),
        );
        assert_eq!(
            d.dispatch(&ChatRequest::new("1", "hola")).await.unwrap(),
            crate::normalize::NO_RESPONSE
        );
    }

    #[tokio::test]
    async fn test_network_error_is_upstream() {
        let d = dispatcher(
            vec![model("http://127.0.0.1:1/v1/chat/completions".into(), "k")],
            EnvCredentials::default(),
        );
        let err = d.dispatch(&ChatRequest::new("1", "hola")).await.unwrap_err();
        match err {
            ChatError::Upstream { provider, message } => {
                assert_eq!(provider, ProviderKind::OpenAiCompatible);
                assert!(message.starts_with("Error de conexión con OpenAI-compatible"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion("tarde"))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::with_models(vec![model(
            format!("{}/v1/chat/completions", server.uri()),
            "k",
        )]));
        let d = ChatDispatcher::new(store, EnvCredentials::default(), Duration::from_millis(200))
            .unwrap();
        let err = d.dispatch(&ChatRequest::new("1", "hola")).await.unwrap_err();
        assert!(matches!(err, ChatError::Upstream { .. }));
    }
}
