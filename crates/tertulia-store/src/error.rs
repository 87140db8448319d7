//! Store error catalogue.

use thiserror::Error;

/// Failure of a data-access call.
///
/// Display strings are user-facing: the gateway forwards them verbatim in
/// `{success:false, error}` bodies.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} no encontrado: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("No se puede eliminar el último modelo")]
    LastModel,

    #[error("Error de conexión con la base de datos: {0}")]
    Request(String),

    #[error("La base de datos respondió {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Respuesta inesperada de la base de datos: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn model_not_found(id: &str) -> Self {
        StoreError::NotFound {
            entity: "Modelo",
            id: id.to_string(),
        }
    }

    pub fn character_not_found(id: &str) -> Self {
        StoreError::NotFound {
            entity: "Personaje",
            id: id.to_string(),
        }
    }

    /// Whether the failure is the caller's fault (unknown id, last-model rule)
    /// rather than the backend's.
    pub fn is_client_error(&self) -> bool {
        matches!(self, StoreError::NotFound { .. } | StoreError::LastModel)
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            StoreError::Decode(e.to_string())
        } else {
            StoreError::Request(e.to_string())
        }
    }
}
