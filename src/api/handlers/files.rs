use crate::AppState;
use crate::api::error::AppError;
use crate::api::middleware::user_id::OwnerId;
use crate::entities::{prelude::*, *};
use crate::services::search_service::{FileQuery, SearchService};
use axum::{
    Extension, Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};
use futures::TryStreamExt;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde::Serialize;
use tokio_util::io::StreamReader;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct FileResponse {
    pub id: String,
    pub filename: String,
    pub content_type: String,
    pub size: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub owner_id: String,
    pub content_hash: String,
    pub is_reference: bool,
    pub original_id: Option<String>,
    /// How many records point at this one; zero for references
    pub reference_count: i64,
    /// Present for originals only; references share their original's content
    pub download_url: Option<String>,
}

impl FileResponse {
    async fn from_model(state: &AppState, model: files::Model, reference_count: i64) -> Self {
        let download_url = match &model.storage_key {
            Some(key) => state.storage.get_download_url(key).await.ok(),
            None => None,
        };

        Self {
            id: model.id,
            filename: model.filename,
            content_type: model.content_type,
            size: model.size,
            created_at: model.created_at,
            owner_id: model.owner_id,
            content_hash: model.content_hash,
            is_reference: model.is_reference,
            original_id: model.original_id,
            reference_count,
            download_url,
        }
    }
}

#[utoipa::path(
    post,
    path = "/files",
    request_body(content = String, content_type = "multipart/form-data", description = "Multipart form with a single `file` field"),
    responses(
        (status = 201, description = "File stored", body = FileResponse),
        (status = 400, description = "Missing file field or UserId header"),
        (status = 413, description = "File exceeds the size limit"),
        (status = 429, description = "Storage quota exceeded")
    ),
    tag = "files"
)]
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(OwnerId(owner_id)): Extension<OwnerId>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<FileResponse>), AppError> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        let err_msg = e.to_string();
        if err_msg.contains("length limit exceeded") {
            AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
        } else {
            AppError::InvalidArgument(err_msg)
        }
    })? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or("unnamed").to_string();
        let content_type = field
            .content_type()
            .unwrap_or(mime::APPLICATION_OCTET_STREAM.as_ref())
            .to_string();

        let reader = StreamReader::new(field.map_err(std::io::Error::other));
        let record = state
            .upload_service
            .upload(&owner_id, reader, &filename, &content_type)
            .await?;

        // A freshly created record has no references yet
        let response = FileResponse::from_model(&state, record, 0).await;
        return Ok((StatusCode::CREATED, Json(response)));
    }

    Err(AppError::InvalidArgument("No file provided".to_string()))
}

#[utoipa::path(
    get,
    path = "/files",
    responses(
        (status = 200, description = "Files owned by the caller, newest first", body = Vec<FileResponse>)
    ),
    tag = "files"
)]
pub async fn list_files(
    State(state): State<AppState>,
    Extension(OwnerId(owner_id)): Extension<OwnerId>,
    Query(query): Query<FileQuery>,
) -> Result<Json<Vec<FileResponse>>, AppError> {
    let rows = SearchService::search_files(&state.db, &owner_id, &query).await?;

    let mut responses = Vec::with_capacity(rows.len());
    for (model, reference_count) in rows {
        responses.push(FileResponse::from_model(&state, model, reference_count).await);
    }

    Ok(Json(responses))
}

#[utoipa::path(
    get,
    path = "/files/{id}",
    params(("id" = String, Path, description = "File id")),
    responses(
        (status = 200, description = "File metadata", body = FileResponse),
        (status = 404, description = "File not found or not owned by caller")
    ),
    tag = "files"
)]
pub async fn get_file(
    State(state): State<AppState>,
    Extension(OwnerId(owner_id)): Extension<OwnerId>,
    Path(id): Path<String>,
) -> Result<Json<FileResponse>, AppError> {
    let record = Files::find_by_id(&id)
        .filter(files::Column::OwnerId.eq(owner_id.as_str()))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

    let reference_count = if record.is_reference {
        0
    } else {
        Files::find()
            .filter(files::Column::OriginalId.eq(record.id.as_str()))
            .count(&state.db)
            .await? as i64
    };

    Ok(Json(
        FileResponse::from_model(&state, record, reference_count).await,
    ))
}

#[utoipa::path(
    delete,
    path = "/files/{id}",
    params(("id" = String, Path, description = "File id")),
    responses(
        (status = 204, description = "File deleted"),
        (status = 404, description = "File not found or not owned by caller"),
        (status = 409, description = "Original still referenced by other records")
    ),
    tag = "files"
)]
pub async fn delete_file(
    State(state): State<AppState>,
    Extension(OwnerId(owner_id)): Extension<OwnerId>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.delete_service.delete(&owner_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/files/file_types",
    responses(
        (status = 200, description = "Distinct content types the caller has uploaded", body = Vec<String>)
    ),
    tag = "files"
)]
pub async fn file_types(
    State(state): State<AppState>,
    Extension(OwnerId(owner_id)): Extension<OwnerId>,
) -> Result<Json<Vec<String>>, AppError> {
    let types = SearchService::distinct_file_types(&state.db, &owner_id).await?;
    Ok(Json(types))
}
