//! The data-access collaborator consumed by the gateway and the chat dispatcher.

use async_trait::async_trait;
use tertulia_core::types::{Character, ImageUpload, ModelConfig, NewCharacter, NewModel};

use crate::error::StoreError;

/// Tables + object storage behind the gateway.
///
/// Every mutation is a single call to the backend; there are no transactions.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Fetch one model by id. `Ok(None)` when no row matches.
    async fn get_model(&self, id: &str) -> Result<Option<ModelConfig>, StoreError>;

    /// All models, oldest first.
    async fn list_models(&self) -> Result<Vec<ModelConfig>, StoreError>;

    /// Insert a model row and return it as stored.
    async fn insert_model(&self, model: NewModel) -> Result<ModelConfig, StoreError>;

    /// Delete a model row unconditionally.
    ///
    /// Callers normally want [`DataStore::delete_model`], which enforces the
    /// last-model rule.
    async fn remove_model(&self, id: &str) -> Result<(), StoreError>;

    /// Delete a model, refusing to remove the last one.
    ///
    /// The custom flag is not consulted: seeded and user-added models are
    /// equally deletable.
    async fn delete_model(&self, id: &str) -> Result<(), StoreError> {
        let models = self.list_models().await?;
        if !models.iter().any(|m| m.id == id) {
            return Err(StoreError::model_not_found(id));
        }
        if models.len() <= 1 {
            return Err(StoreError::LastModel);
        }
        self.remove_model(id).await
    }

    /// All characters.
    async fn list_characters(&self) -> Result<Vec<Character>, StoreError>;

    /// Insert a character, uploading its image first when one is given.
    async fn insert_character(
        &self,
        character: NewCharacter,
        image: Option<ImageUpload>,
    ) -> Result<Character, StoreError>;

    /// Delete a character and its stored image.
    async fn delete_character(&self, id: &str) -> Result<(), StoreError>;

    /// Display name for logging.
    fn display_name(&self) -> &str;
}
