use std::path::PathBuf;

use axum::extract::Multipart;
use uuid::Uuid;

use crate::{
    dto::upload::UploadResponse,
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    response::{ApiResponse, Meta},
    state::AppState,
};

pub const UPLOAD_FIELD: &str = "files";
pub const PUBLIC_PREFIX: &str = "/uploads";

/// Store every `files` part of the form. Any bad part aborts the whole batch.
pub async fn store_uploads(
    state: &AppState,
    user: &AuthUser,
    mut multipart: Multipart,
) -> AppResult<ApiResponse<UploadResponse>> {
    let upload_dir = state.config.upload_dir.clone();
    tokio::fs::create_dir_all(&upload_dir)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;

    let mut written: Vec<PathBuf> = Vec::new();
    let result = async {
        let mut urls = Vec::new();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?
        {
            if field.name() != Some(UPLOAD_FIELD) {
                continue;
            }
            let content_type = field.content_type().unwrap_or_default().to_string();
            let extension = image_extension(&content_type).ok_or_else(|| {
                AppError::BadRequest(format!("Unsupported file type {content_type:?}"))
            })?;
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            if bytes.is_empty() {
                return Err(AppError::BadRequest("Empty file".into()));
            }
            if bytes.len() > state.config.max_upload_bytes {
                return Err(AppError::BadRequest("File too large".into()));
            }

            let file_name = format!("{}.{}", Uuid::new_v4(), extension);
            let path = upload_dir.join(&file_name);
            tokio::fs::write(&path, &bytes)
                .await
                .map_err(|e| AppError::Internal(e.into()))?;
            written.push(path);
            urls.push(format!("{PUBLIC_PREFIX}/{file_name}"));
        }

        if urls.is_empty() {
            return Err(AppError::BadRequest(format!(
                "No files found in field '{UPLOAD_FIELD}'"
            )));
        }
        Ok(urls)
    }
    .await;

    match result {
        Ok(urls) => {
            tracing::info!(user_id = %user.user_id, count = urls.len(), "files uploaded");
            Ok(ApiResponse::success(
                "Uploaded",
                UploadResponse { urls },
                Some(Meta::empty()),
            ))
        }
        Err(err) => {
            remove_all(&written).await;
            Err(err)
        }
    }
}

async fn remove_all(paths: &[PathBuf]) {
    for path in paths {
        if let Err(err) = tokio::fs::remove_file(path).await {
            tracing::warn!(error = %err, path = %path.display(), "failed to remove partial upload");
        }
    }
}

/// Stored extension for an accepted image type. The client file name is never used,
/// so nothing but these raster formats can end up under `/uploads`.
fn image_extension(content_type: &str) -> Option<&'static str> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_follows_the_content_type() {
        assert_eq!(image_extension("image/jpeg"), Some("jpg"));
        assert_eq!(image_extension("IMAGE/PNG; charset=binary"), Some("png"));
        assert_eq!(image_extension("image/gif"), Some("gif"));
        assert_eq!(image_extension("image/webp"), Some("webp"));
    }

    #[test]
    fn scriptable_and_unknown_types_are_refused() {
        assert_eq!(image_extension("image/svg+xml"), None);
        assert_eq!(image_extension("text/html"), None);
        assert_eq!(image_extension("image/x-unknown"), None);
        assert_eq!(image_extension(""), None);
    }
}
