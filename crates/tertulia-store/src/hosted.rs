//! Hosted store: talks to a managed backend's REST tables and object storage.
//!
//! Tables are exposed PostgREST-style under `/rest/v1/<table>`; images live in
//! a storage bucket under `/storage/v1/object/<bucket>/<path>` and are served
//! publicly from `/storage/v1/object/public/<bucket>/<path>`.
//!
//! Every request carries the project key both as `apikey` and as a bearer token.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use tertulia_core::config::schema::DatabaseConfig;
use tertulia_core::types::{Character, ImageUpload, ModelConfig, NewCharacter, NewModel};

use crate::error::StoreError;
use crate::traits::DataStore;

const MODELS_TABLE: &str = "models";
const CHARACTERS_TABLE: &str = "personajes";

/// Postgres "invalid text representation": an id that cannot be cast to the
/// column type, which can never match a row.
const INVALID_ID_SYNTAX: &str = "22P02";

/// Row written to the characters table.
#[derive(Serialize)]
struct CharacterRow<'a> {
    name: &'a str,
    description: &'a str,
    system_prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<&'a str>,
}

/// A [`DataStore`] backed by a managed database over HTTP.
pub struct HostedStore {
    client: reqwest::Client,
    /// Project base URL without trailing slash.
    base_url: String,
    key: String,
    bucket: String,
}

impl std::fmt::Debug for HostedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostedStore")
            .field("base_url", &self.base_url)
            .field("bucket", &self.bucket)
            .finish()
    }
}

impl HostedStore {
    /// Create a store from the database config; `timeout` bounds every call.
    pub fn new(config: &DatabaseConfig, timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Request(e.to_string()))?;

        Ok(HostedStore {
            client,
            base_url: config.url.trim().trim_end_matches('/').to_string(),
            key: config.key.trim().to_string(),
            bucket: config.images_bucket.clone(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, path)
    }

    /// Public URL under which an uploaded object is served.
    pub fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, path
        )
    }

    /// Recover the object path from a public URL issued by this store.
    ///
    /// Returns `None` for URLs pointing elsewhere (other bucket, external host).
    pub fn object_path(&self, public_url: &str) -> Option<String> {
        let prefix = self.public_url("");
        public_url
            .strip_prefix(&prefix)
            .filter(|p| !p.is_empty())
            .map(String::from)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.header("apikey", &self.key).bearer_auth(&self.key)
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, StoreError> {
        let response = self
            .authed(self.client.get(self.table_url(table)))
            .query(query)
            .send()
            .await?;
        read_json(response).await
    }

    /// Fetch the row with the given id; a malformed id yields no rows.
    async fn select_by_id<T: DeserializeOwned>(
        &self,
        table: &str,
        id: &str,
    ) -> Result<Vec<T>, StoreError> {
        let response = self
            .authed(self.client.get(self.table_url(table)))
            .query(&[
                ("id", format!("eq.{id}")),
                ("select", "*".to_string()),
                ("limit", "1".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::BAD_REQUEST {
            let body = response.text().await.unwrap_or_default();
            let code = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("code").and_then(|c| c.as_str()).map(String::from));
            if code.as_deref() == Some(INVALID_ID_SYNTAX) {
                debug!(table = %table, id = %id, "id rejected by backend, treating as missing");
                return Ok(Vec::new());
            }
            return Err(api_error(status, body));
        }
        read_json(response).await
    }

    async fn insert<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &str,
        row: &B,
    ) -> Result<T, StoreError> {
        let response = self
            .authed(self.client.post(self.table_url(table)))
            .header("Prefer", "return=representation")
            .json(row)
            .send()
            .await?;
        let mut rows: Vec<T> = read_json(response).await?;
        if rows.is_empty() {
            return Err(StoreError::Decode(format!(
                "insert into {table} returned no rows"
            )));
        }
        Ok(rows.swap_remove(0))
    }

    async fn delete_where_id(&self, table: &str, id: &str) -> Result<(), StoreError> {
        let response = self
            .authed(self.client.delete(self.table_url(table)))
            .query(&[("id", format!("eq.{id}"))])
            .send()
            .await?;
        check_status(response).await.map(|_| ())
    }

    async fn upload_image(&self, image: &ImageUpload) -> Result<String, StoreError> {
        let path = format!("{}.{}", uuid::Uuid::new_v4(), image.extension);
        debug!(path = %path, bytes = image.bytes.len(), "uploading character image");

        let response = self
            .authed(self.client.post(self.object_url(&path)))
            .header(reqwest::header::CONTENT_TYPE, image.content_type.as_str())
            .body(image.bytes.clone())
            .send()
            .await?;
        check_status(response).await?;
        Ok(path)
    }

    async fn remove_image(&self, path: &str) -> Result<(), StoreError> {
        let response = self
            .authed(self.client.delete(self.object_url(path)))
            .send()
            .await?;
        check_status(response).await.map(|_| ())
    }
}

/// Turn a non-2xx response into `StoreError::Api`, passing 2xx through.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(api_error(status, body))
}

/// Build an [`StoreError::Api`], preferring the backend's own message.
fn api_error(status: reqwest::StatusCode, body: String) -> StoreError {
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or(body);

    StoreError::Api {
        status: status.as_u16(),
        message,
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, StoreError> {
    let response = check_status(response).await?;
    response
        .json::<T>()
        .await
        .map_err(|e| StoreError::Decode(e.to_string()))
}

#[async_trait]
impl DataStore for HostedStore {
    async fn get_model(&self, id: &str) -> Result<Option<ModelConfig>, StoreError> {
        let mut rows: Vec<ModelConfig> = self.select_by_id(MODELS_TABLE, id).await?;
        Ok(rows.pop())
    }

    async fn list_models(&self) -> Result<Vec<ModelConfig>, StoreError> {
        self.select(
            MODELS_TABLE,
            &[
                ("select", "*".to_string()),
                ("order", "created_at.asc".to_string()),
            ],
        )
        .await
    }

    async fn insert_model(&self, model: NewModel) -> Result<ModelConfig, StoreError> {
        let row: ModelConfig = self.insert(MODELS_TABLE, &model).await?;
        info!(id = %row.id, name = %row.name, "model created");
        Ok(row)
    }

    async fn remove_model(&self, id: &str) -> Result<(), StoreError> {
        self.delete_where_id(MODELS_TABLE, id).await?;
        info!(id = %id, "model deleted");
        Ok(())
    }

    async fn list_characters(&self) -> Result<Vec<Character>, StoreError> {
        self.select(
            CHARACTERS_TABLE,
            &[
                ("select", "*".to_string()),
                ("order", "created_at.desc".to_string()),
            ],
        )
        .await
    }

    async fn insert_character(
        &self,
        character: NewCharacter,
        image: Option<ImageUpload>,
    ) -> Result<Character, StoreError> {
        let uploaded = match image {
            Some(ref img) => Some(self.upload_image(img).await?),
            None => None,
        };
        let image_url = uploaded.as_deref().map(|p| self.public_url(p));

        let row = CharacterRow {
            name: &character.name,
            description: &character.description,
            system_prompt: &character.system_prompt,
            image_url: image_url.as_deref(),
        };

        match self.insert::<_, Character>(CHARACTERS_TABLE, &row).await {
            Ok(created) => {
                info!(id = %created.id, name = %created.name, "character created");
                Ok(created)
            }
            Err(e) => {
                // Don't leave an orphaned image behind a failed insert.
                if let Some(path) = uploaded {
                    if let Err(cleanup) = self.remove_image(&path).await {
                        warn!(path = %path, error = %cleanup, "failed to remove orphaned image");
                    }
                }
                Err(e)
            }
        }
    }

    async fn delete_character(&self, id: &str) -> Result<(), StoreError> {
        let mut rows: Vec<Character> = self.select_by_id(CHARACTERS_TABLE, id).await?;
        let character = rows
            .pop()
            .ok_or_else(|| StoreError::character_not_found(id))?;

        self.delete_where_id(CHARACTERS_TABLE, id).await?;
        info!(id = %id, "character deleted");

        if let Some(path) = character
            .image_url
            .as_deref()
            .and_then(|u| self.object_path(u))
        {
            if let Err(e) = self.remove_image(&path).await {
                warn!(path = %path, error = %e, "character deleted but image removal failed");
            }
        }
        Ok(())
    }

    fn display_name(&self) -> &str {
        "hosted"
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
