use crate::AppState;
use crate::api::error::AppError;
use crate::api::middleware::user_id::OwnerId;
use crate::services::stats_service::{StatsService, StorageStats};
use axum::{Extension, Json, extract::State};

#[utoipa::path(
    get,
    path = "/files/storage_stats",
    responses(
        (status = 200, description = "Storage usage and dedup savings for the caller", body = StorageStats)
    ),
    tag = "stats"
)]
pub async fn storage_stats(
    State(state): State<AppState>,
    Extension(OwnerId(owner_id)): Extension<OwnerId>,
) -> Result<Json<StorageStats>, AppError> {
    let stats = StatsService::storage_stats(&state.db, &owner_id).await?;
    Ok(Json(stats))
}
