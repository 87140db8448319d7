//! In-process store: tables kept in memory behind a `RwLock`.
//!
//! Used by tests and by `tertulia serve --in-memory` when no hosted database
//! is configured. Nothing survives a restart.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use tertulia_core::types::{Character, ImageUpload, ModelConfig, NewCharacter, NewModel};
use tertulia_core::utils::timestamp;

use crate::error::StoreError;
use crate::traits::DataStore;

/// Scheme used for image URLs handed out by the memory store.
const MEMORY_IMAGE_PREFIX: &str = "memory://images/";

#[derive(Default)]
struct Tables {
    models: Vec<ModelConfig>,
    characters: Vec<Character>,
    images: HashMap<String, ImageUpload>,
    next_id: u64,
}

impl Tables {
    fn next_id(&mut self) -> String {
        self.next_id += 1;
        self.next_id.to_string()
    }
}

/// A [`DataStore`] that lives entirely in process memory.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store seeded with one shared OpenRouter model, so there is always
    /// something to chat with.
    pub fn seeded() -> Self {
        Self::with_models(vec![NewModel {
            name: "DeepSeek Chat (OpenRouter)".to_string(),
            url: "https://openrouter.ai/api/v1/chat/completions".to_string(),
            api_key: String::new(),
            is_custom: false,
        }])
    }

    /// A store pre-populated with the given models (ids `1..=n`).
    pub fn with_models(models: Vec<NewModel>) -> Self {
        let mut tables = Tables::default();
        for model in models {
            let id = tables.next_id();
            tables.models.push(model_row(id, model));
        }
        MemoryStore {
            tables: RwLock::new(tables),
        }
    }

    /// Number of stored images.
    pub async fn image_count(&self) -> usize {
        self.tables.read().await.images.len()
    }
}

fn model_row(id: String, model: NewModel) -> ModelConfig {
    ModelConfig {
        id,
        name: model.name,
        url: model.url,
        api_key: model.api_key,
        is_custom: model.is_custom,
        created_at: Some(timestamp()),
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn get_model(&self, id: &str) -> Result<Option<ModelConfig>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.models.iter().find(|m| m.id == id).cloned())
    }

    async fn list_models(&self) -> Result<Vec<ModelConfig>, StoreError> {
        Ok(self.tables.read().await.models.clone())
    }

    async fn insert_model(&self, model: NewModel) -> Result<ModelConfig, StoreError> {
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        let row = model_row(id, model);
        tables.models.push(row.clone());
        debug!(id = %row.id, "memory store: model inserted");
        Ok(row)
    }

    async fn remove_model(&self, id: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.models.retain(|m| m.id != id);
        Ok(())
    }

    /// Check and removal happen under one write guard, so concurrent deletes
    /// can never empty the table.
    async fn delete_model(&self, id: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.models.iter().any(|m| m.id == id) {
            return Err(StoreError::model_not_found(id));
        }
        if tables.models.len() <= 1 {
            return Err(StoreError::LastModel);
        }
        tables.models.retain(|m| m.id != id);
        debug!(id = %id, "memory store: model deleted");
        Ok(())
    }

    async fn list_characters(&self) -> Result<Vec<Character>, StoreError> {
        Ok(self.tables.read().await.characters.clone())
    }

    async fn insert_character(
        &self,
        character: NewCharacter,
        image: Option<ImageUpload>,
    ) -> Result<Character, StoreError> {
        let mut tables = self.tables.write().await;

        let image_url = image.map(|img| {
            let key = format!("{}.{}", uuid::Uuid::new_v4(), img.extension);
            tables.images.insert(key.clone(), img);
            format!("{MEMORY_IMAGE_PREFIX}{key}")
        });

        let id = tables.next_id();
        let row = Character {
            id,
            name: character.name,
            description: character.description,
            system_prompt: character.system_prompt,
            image_url,
            created_at: Some(timestamp()),
        };
        tables.characters.push(row.clone());
        debug!(id = %row.id, "memory store: character inserted");
        Ok(row)
    }

    async fn delete_character(&self, id: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let pos = tables
            .characters
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| StoreError::character_not_found(id))?;
        let removed = tables.characters.remove(pos);

        if let Some(key) = removed
            .image_url
            .as_deref()
            .and_then(|u| u.strip_prefix(MEMORY_IMAGE_PREFIX))
        {
            tables.images.remove(key);
        }
        Ok(())
    }

    fn display_name(&self) -> &str {
        "memory"
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
