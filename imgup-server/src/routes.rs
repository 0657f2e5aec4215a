use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Path, State};
use axum::Json;
use imgup_blob::ObjectId;
use imgup_vision::Caption;
use serde::Serialize;

use crate::{ApiError, ApiResult, AppState};

const FILE_FIELD: &str = "file";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub id: ObjectId,
}

#[derive(Debug, Serialize)]
pub struct RecentResponse {
    pub ids: Vec<ObjectId>,
    #[serde(rename = "storageURL")]
    pub storage_url: String,
}

#[derive(Debug, Serialize)]
pub struct DetailResponse {
    pub id: ObjectId,
    pub captions: Vec<Caption>,
    pub tags: Vec<String>,
}

/// `PUT /api/upload`: store the multipart `file` field
pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<UploadResponse>> {
    let mut multipart = multipart.map_err(|e| ApiError::bad_request(e.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let content_type = field.content_type().unwrap_or(DEFAULT_CONTENT_TYPE).to_string();
        let receipt = state.pipeline.handle(Some(&content_type), field).await?;

        return Ok(Json(UploadResponse {
            success: true,
            id: receipt.id,
        }));
    }

    Err(ApiError::bad_request(format!("Missing multipart field \"{}\"", FILE_FIELD)))
}

/// `GET /api/recent`
pub async fn recent(State(state): State<AppState>) -> ApiResult<Json<RecentResponse>> {
    let objects = state.listing.recent().await?;

    Ok(Json(RecentResponse {
        ids: objects.into_iter().map(|o| o.id).collect(),
        storage_url: state.listing.base_url().to_string(),
    }))
}

/// `GET /api/detail/{id}`
pub async fn detail(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<DetailResponse>> {
    let id = ObjectId::parse(id)?;
    let description = state.vision.describe(&state.listing.object_url(&id)).await?;

    Ok(Json(DetailResponse {
        id,
        captions: description.captions,
        tags: description.tags,
    }))
}

pub async fn health() -> &'static str {
    "ok"
}
