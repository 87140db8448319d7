//! Utility helpers: path resolution, data-URL decoding, string manipulation.

use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

use crate::types::ImageUpload;

/// Get the Tertulia data directory (e.g. `~/.tertulia/`).
pub fn get_data_path() -> PathBuf {
    let home = home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".tertulia")
}

/// Get current ISO 8601 timestamp.
pub fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Truncate a string to `max_len` characters, adding "..." if truncated.
/// Unicode-safe.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

/// Mask a secret for display: keep the first 4 characters.
pub fn mask_secret(secret: &str) -> String {
    let secret = secret.trim();
    if secret.is_empty() {
        return String::new();
    }
    let visible: String = secret.chars().take(4).collect();
    format!("{visible}****")
}

/// Helper to get home directory.
fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| std::env::var("USERPROFILE").ok().map(PathBuf::from))
}

// ─────────────────────────────────────────────
// Data URLs
// ─────────────────────────────────────────────

/// Why an uploaded image could not be decoded.
#[derive(Debug, Error, PartialEq)]
pub enum DataUrlError {
    #[error("la imagen debe ser una data URL 'data:image/...'")]
    NotAnImage,
    #[error("la imagen debe venir codificada en base64")]
    NotBase64,
    #[error("la imagen está vacía")]
    Empty,
    #[error("base64 inválido: {0}")]
    Decode(String),
}

/// Decode a `data:image/<type>;base64,<payload>` URL into raw bytes.
pub fn parse_image_data_url(data_url: &str) -> Result<ImageUpload, DataUrlError> {
    let rest = data_url
        .trim()
        .strip_prefix("data:")
        .filter(|r| r.starts_with("image"))
        .ok_or(DataUrlError::NotAnImage)?;

    let (header, payload) = rest.split_once(',').ok_or(DataUrlError::NotBase64)?;
    let content_type = header
        .strip_suffix(";base64")
        .ok_or(DataUrlError::NotBase64)?;
    let subtype = content_type
        .strip_prefix("image/")
        .filter(|s| !s.is_empty())
        .ok_or(DataUrlError::NotAnImage)?;

    let payload = payload.trim();
    if payload.is_empty() {
        return Err(DataUrlError::Empty);
    }

    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| DataUrlError::Decode(e.to_string()))?;

    Ok(ImageUpload {
        bytes,
        content_type: content_type.to_string(),
        extension: image_extension(subtype).to_string(),
    })
}

/// Map an image MIME subtype to a file extension.
fn image_extension(subtype: &str) -> &str {
    match subtype {
        "jpeg" | "pjpeg" => "jpg",
        "svg+xml" => "svg",
        "x-icon" | "vnd.microsoft.icon" => "ico",
        other => other,
    }
}
