use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    response::Json,
};
use serde_json::{Value, json};
use tracing::info;

use crate::errors::app_error::{AppError, AppResult};
use crate::state::AppState;

/// Health check handler
/// Returns a simple JSON response indicating the server is running
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "OK"
    }))
}

/// Document upload handler.
///
/// Accepts multipart form data with a `session_id` field and a `file` field,
/// writes the file under the configured upload directory as
/// `{session_id}_{filename}`, and returns the stored path. The stored path
/// is what a client later sends in an `attach` control message over the
/// session socket.
pub async fn upload_document(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> AppResult<Json<Value>> {
    let mut session_id: Option<String> = None;
    let mut file: Option<(String, bytes::Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {e}")))?
    {
        match field.name() {
            Some("session_id") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Invalid session_id field: {e}")))?;
                session_id = Some(value);
            }
            Some("file") => {
                let filename = field
                    .file_name()
                    .unwrap_or("upload.bin")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Invalid file field: {e}")))?;
                file = Some((filename, data));
            }
            _ => {}
        }
    }

    let session_id =
        session_id.ok_or_else(|| AppError::BadRequest("Missing session_id field".to_string()))?;
    let (filename, data) =
        file.ok_or_else(|| AppError::BadRequest("Missing file field".to_string()))?;

    tokio::fs::create_dir_all(&state.config.upload_dir).await?;
    let path = state
        .config
        .upload_dir
        .join(format!("{session_id}_{filename}"));
    tokio::fs::write(&path, &data).await?;
    info!("Stored upload {} ({} bytes)", path.display(), data.len());

    Ok(Json(json!({
        "file_path": path.to_string_lossy(),
        "filename": filename,
    })))
}
