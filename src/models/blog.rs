use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::auth::User;
use crate::request::FormField;

// ==================================================================================================
// Posts and comments as returned by the backend
// ==================================================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub content: String,
    pub author: User,
    pub created_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub image: Option<String>,
    pub author: User,
    pub created_date: DateTime<Utc>,
    pub updated_date: DateTime<Utc>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub comments_count: u32,
}

impl Post {
    /// Comma-separated tags, trimmed, without empties
    pub fn tag_list(&self) -> Vec<&str> {
        self.tags
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect()
    }
}

// ==================================================================================================
// Outbound payloads
// ==================================================================================================

/// Image attached to a post
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Read an image from disk, guessing its content type from the extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read image: {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .context("Image path has no file name")?;
        let mime = mime_guess::from_path(path).first_or_octet_stream();

        Ok(Self {
            file_name,
            mime: Some(mime.to_string()),
            bytes,
        })
    }
}

/// Body for creating or replacing a post
#[derive(Debug, Clone, Default, Serialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub location: String,
    pub tags: String,
    #[serde(skip)]
    pub image: Option<ImageUpload>,
}

impl NewPost {
    /// Multipart fields, used when an image is attached
    pub fn form_fields(&self) -> Vec<FormField> {
        let mut fields = vec![
            FormField::text("title", self.title.clone()),
            FormField::text("content", self.content.clone()),
            FormField::text("location", self.location.clone()),
            FormField::text("tags", self.tags.clone()),
        ];
        if let Some(image) = &self.image {
            fields.push(FormField::file(
                "image",
                image.file_name.clone(),
                image.mime.clone(),
                image.bytes.clone(),
            ));
        }
        fields
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewComment {
    pub content: String,
}
