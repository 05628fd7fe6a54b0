use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::dashboard::{DashboardStats, RecentActivity},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::dashboard_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stats", get(get_stats))
        .route("/activity", get(get_recent_activity))
}

#[utoipa::path(
    get,
    path = "/api/dashboard/stats",
    responses(
        (status = 200, description = "Spend, earnings and listing totals for the current user", body = ApiResponse<DashboardStats>),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn get_stats(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<DashboardStats>>> {
    let resp = dashboard_service::get_stats(&state, user.user_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/dashboard/activity",
    responses(
        (status = 200, description = "Five latest orders and sales", body = ApiResponse<RecentActivity>),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn get_recent_activity(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<RecentActivity>>> {
    let resp = dashboard_service::get_recent_activity(&state, user.user_id).await?;
    Ok(Json(resp))
}
