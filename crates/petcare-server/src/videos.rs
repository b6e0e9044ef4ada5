//! `/api/videos` routes.

use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::response::Json;
use petcare_store::{Document, Query};
use serde_json::{json, Value};
use tracing::info;

use crate::analysis::{spawn_analysis, AnalysisJob, AnalysisStatus};
use crate::error::{ServerError, ServerResult};
use crate::handler::{present, present_all};
use crate::state::AppState;
use crate::upload::{discard_upload, read_file_field, save_upload, VIDEOS_DIR};

/// Store an uploaded video and queue it for analysis.
pub async fn upload_video(
    State(state): State<AppState>,
    Path(pet_id): Path<String>,
    mut multipart: Multipart,
) -> ServerResult<Json<Value>> {
    if state.repo.pets().get(&pet_id).await?.is_none() {
        return Err(ServerError::NotFound("Pet"));
    }
    let file = read_file_field(&mut multipart).await?;
    if !file.has_type_in(&state.config.allowed_video_types) {
        return Err(ServerError::BadRequest("Invalid video format".into()));
    }

    let path = save_upload(&state.config.uploads_dir, VIDEOS_DIR, &file).await?;
    let file_size = file.bytes.len();
    let inserted = match record_video(&state, &pet_id, &path, file_size).await {
        Ok(id) => id,
        Err(e) => {
            discard_upload(&path).await;
            return Err(e);
        }
    };
    info!(video_id = %inserted, pet_id = %pet_id, bytes = file_size, "video uploaded");

    spawn_analysis(
        Arc::clone(&state.repo),
        Arc::clone(&state.analyzer),
        AnalysisJob {
            video_id: inserted.clone(),
            pet_id,
            video_path: path,
        },
    );

    Ok(Json(json!({
        "video_id": inserted,
        "message": "Video uploaded successfully. Analysis in progress.",
        "status": AnalysisStatus::Processing.as_str(),
    })))
}

async fn record_video(
    state: &AppState,
    pet_id: &str,
    path: &std::path::Path,
    file_size: usize,
) -> ServerResult<String> {
    let record = Document::from_value(json!({
        "pet_id": pet_id,
        "video_path": path.to_string_lossy(),
        "file_size": file_size,
        "analysis_status": AnalysisStatus::Pending.as_str(),
        "insights": [],
        "recommendations": [],
    }))?;
    Ok(state.repo.videos().insert_one(record).await?.inserted_id)
}

pub async fn get_video(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<Json<Value>> {
    let video = state
        .repo
        .videos()
        .get(&id)
        .await?
        .ok_or(ServerError::NotFound("Video"))?;
    Ok(Json(present(video)))
}

pub async fn list_pet_videos(
    State(state): State<AppState>,
    Path(pet_id): Path<String>,
) -> ServerResult<Json<Value>> {
    let mut query = Query::new();
    query.insert("pet_id".into(), Value::String(pet_id));
    Ok(present_all(state.repo.videos().find(Some(&query)).await?))
}
