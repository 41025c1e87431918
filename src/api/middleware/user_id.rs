use axum::{
    Json,
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

pub const USER_ID_HEADER: &str = "UserId";

/// Owner identity extracted from the `UserId` header. The header is trusted
/// as supplied by the caller; there is no authentication layer in front.
#[derive(Clone, Debug)]
pub struct OwnerId(pub String);

pub async fn user_id_middleware(mut req: Request, next: Next) -> Response {
    let owner = req
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string());

    match owner {
        Some(owner) => {
            req.extensions_mut().insert(OwnerId(owner));
            next.run(req).await
        }
        None => {
            tracing::warn!("Missing UserId header for {}", req.uri().path());
            (
                StatusCode::BAD_REQUEST,
                Json(json!({"detail": "UserId header required"})),
            )
                .into_response()
        }
    }
}
