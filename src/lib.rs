pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod services;
pub mod utils;

use crate::config::VaultConfig;
use crate::services::VaultLocks;
use crate::services::delete_service::DeleteService;
use crate::services::storage::StorageService;
use crate::services::upload_service::UploadService;
use axum::{
    Router,
    http::HeaderValue,
    middleware::from_fn,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::files::upload_file,
        api::handlers::files::list_files,
        api::handlers::files::get_file,
        api::handlers::files::delete_file,
        api::handlers::files::file_types,
        api::handlers::stats::storage_stats,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::files::FileResponse,
            api::handlers::health::HealthResponse,
            services::stats_service::StorageStats,
        )
    ),
    tags(
        (name = "files", description = "File upload, listing and deletion"),
        (name = "stats", description = "Per-user storage statistics"),
        (name = "system", description = "Service health")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub storage: Arc<dyn StorageService>,
    pub upload_service: Arc<UploadService>,
    pub delete_service: Arc<DeleteService>,
    pub config: VaultConfig,
}

impl AppState {
    /// Wire the engines around one shared lock registry so uploads and
    /// deletes serialize on the same owner and content keys.
    pub fn new(
        db: DatabaseConnection,
        storage: Arc<dyn StorageService>,
        config: VaultConfig,
    ) -> Self {
        let locks = VaultLocks::new();

        let upload_service = Arc::new(UploadService::new(
            db.clone(),
            storage.clone(),
            locks.clone(),
            config.clone(),
        ));
        let delete_service = Arc::new(DeleteService::new(db.clone(), storage.clone(), locks));

        Self {
            db,
            storage,
            upload_service,
            delete_service,
            config,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let cors = if state.config.allowed_origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // Every /files route requires the UserId header; health and docs do not
    let files_routes = Router::new()
        .route(
            "/files",
            post(api::handlers::files::upload_file).get(api::handlers::files::list_files),
        )
        .route(
            "/files/storage_stats",
            get(api::handlers::stats::storage_stats),
        )
        .route("/files/file_types", get(api::handlers::files::file_types))
        .route(
            "/files/:id",
            get(api::handlers::files::get_file).delete(api::handlers::files::delete_file),
        )
        .layer(from_fn(api::middleware::user_id::user_id_middleware));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .merge(files_routes)
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(cors)
        .layer(axum::extract::DefaultBodyLimit::max(
            state.config.max_file_size + 10 * 1024 * 1024, // multipart overhead headroom
        ))
        .with_state(state)
}
