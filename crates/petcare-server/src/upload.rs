//! Multipart file uploads.
//!
//! Clients post `multipart/form-data` with the payload in a part named
//! `file`. The part's own content type is what gets checked against the
//! allowed media types.

use std::path::{Path, PathBuf};

use axum::body::Bytes;
use axum::extract::Multipart;
use tracing::debug;
use uuid::Uuid;

use crate::error::{ServerError, ServerResult};

pub const VIDEOS_DIR: &str = "videos";
pub const IMAGES_DIR: &str = "images";
pub const FILE_FIELD: &str = "file";

const MAX_EXTENSION_LEN: usize = 8;

/// The `file` part of an upload form.
#[derive(Debug)]
pub struct UploadedFile {
    pub media_type: Option<String>,
    pub file_name: Option<String>,
    pub bytes: Bytes,
}

impl UploadedFile {
    /// Whether the part's media type is one of `allowed`.
    pub fn has_type_in(&self, allowed: &[String]) -> bool {
        self.media_type
            .as_ref()
            .is_some_and(|t| allowed.iter().any(|a| a.eq_ignore_ascii_case(t)))
    }

    /// Extension for the stored file: the client's file name extension when it
    /// is a plain alphanumeric one, else one derived from the media type.
    pub fn extension(&self) -> String {
        let from_name = self
            .file_name
            .as_deref()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| {
                !ext.is_empty()
                    && ext.len() <= MAX_EXTENSION_LEN
                    && ext.chars().all(|c| c.is_ascii_alphanumeric())
            });
        match from_name {
            Some(ext) => ext.to_ascii_lowercase(),
            None => extension_for(self.media_type.as_deref().unwrap_or_default()).to_string(),
        }
    }
}

/// Media type without parameters, lowercased.
pub fn media_type(raw: &str) -> String {
    raw.split(';').next().unwrap_or(raw).trim().to_ascii_lowercase()
}

/// File extension for an accepted media type.
pub fn extension_for(media_type: &str) -> &'static str {
    match media_type {
        "video/mp4" => "mp4",
        "video/avi" => "avi",
        "video/mov" => "mov",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        _ => "bin",
    }
}

/// Read the `file` part of a multipart form, skipping any other parts.
pub async fn read_file_field(multipart: &mut Multipart) -> ServerResult<UploadedFile> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let media_type = field.content_type().map(media_type);
        let file_name = field.file_name().map(str::to_owned);
        let bytes = field.bytes().await?;
        return Ok(UploadedFile {
            media_type,
            file_name,
            bytes,
        });
    }
    Err(ServerError::BadRequest("Missing file field".into()))
}

/// Write `file` to `<uploads>/<folder>/<uuid>.<ext>` and return the path.
pub async fn save_upload(
    uploads_dir: &Path,
    folder: &str,
    file: &UploadedFile,
) -> ServerResult<PathBuf> {
    let dir = uploads_dir.join(folder);
    tokio::fs::create_dir_all(&dir).await?;
    let path = dir.join(format!("{}.{}", Uuid::new_v4(), file.extension()));
    tokio::fs::write(&path, &file.bytes).await?;
    debug!(path = %path.display(), bytes = file.bytes.len(), "stored upload");
    Ok(path)
}

/// Best-effort removal of an upload whose record could not be written.
pub async fn discard_upload(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        debug!(path = %path.display(), error = %e, "could not remove orphaned upload");
    }
}
