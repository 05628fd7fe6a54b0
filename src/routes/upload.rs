use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
};
use tower_http::limit::RequestBodyLimitLayer;

use crate::{
    dto::upload::UploadResponse,
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::upload_service,
    state::AppState,
};

/// Upload routes carry their own body limit, sized for a handful of images.
pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    let batch_limit = max_upload_bytes.saturating_mul(10);
    Router::new()
        .route("/", post(upload_files))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(batch_limit))
}

#[utoipa::path(
    post,
    path = "/api/upload",
    request_body(content_type = "multipart/form-data", description = "One or more image parts named `files`"),
    responses(
        (status = 200, description = "Public URLs of the stored files", body = ApiResponse<UploadResponse>),
        (status = 400, description = "Missing or unsupported files"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Upload"
)]
pub async fn upload_files(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> AppResult<Json<ApiResponse<UploadResponse>>> {
    let resp = upload_service::store_uploads(&state, &user, multipart).await?;
    Ok(Json(resp))
}
