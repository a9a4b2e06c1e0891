use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::CookieJar;
use tracing::instrument;

use super::{
    dto::{
        ActionResponse, AdminConfigView, AdminUserView, Analytics, GiftRequest, UnlockRequest,
        WarnRequest, WithUsername,
    },
    services,
};
use crate::{
    auth::extractors::{AdminSession, CurrentSession},
    error::AppError,
    state::AppState,
    store::records::{Gift, Project, Report, Warning},
};

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/verify-code", post(verify_code))
        .route("/admin/users", get(users))
        .route("/admin/projects", get(projects))
        .route("/admin/warnings", get(warnings))
        .route("/admin/gifts", get(gifts))
        .route("/admin/reports", get(reports))
        .route("/admin/analytics", get(analytics))
        .route("/admin/config", get(config))
        .route("/admin/users/:id/suspend", post(suspend))
        .route("/admin/users/:id/unsuspend", post(unsuspend))
        .route("/admin/users/:id/warn", post(warn))
        .route("/admin/users/:id/gift", post(gift))
}

#[instrument(skip_all)]
pub async fn verify_code(
    State(state): State<AppState>,
    current: CurrentSession,
    jar: CookieJar,
    Json(body): Json<UnlockRequest>,
) -> Result<(CookieJar, Json<ActionResponse>), AppError> {
    let token = services::unlock(&state, current.token.as_deref(), &body.code)?;
    Ok((
        state.sessions.set_cookie(jar, token),
        Json(ActionResponse::ok("admin access granted")),
    ))
}

pub async fn users(_: AdminSession, State(state): State<AppState>) -> Json<Vec<AdminUserView>> {
    Json(services::list_users(&state.store))
}

pub async fn projects(
    _: AdminSession,
    State(state): State<AppState>,
) -> Json<Vec<WithUsername<Project>>> {
    Json(services::list_projects(&state.store))
}

pub async fn warnings(
    _: AdminSession,
    State(state): State<AppState>,
) -> Json<Vec<WithUsername<Warning>>> {
    Json(services::list_warnings(&state.store))
}

pub async fn gifts(_: AdminSession, State(state): State<AppState>) -> Json<Vec<WithUsername<Gift>>> {
    Json(services::list_gifts(&state.store))
}

pub async fn reports(_: AdminSession, State(state): State<AppState>) -> Json<Vec<Report>> {
    Json(services::list_reports(&state.store))
}

pub async fn analytics(_: AdminSession, State(state): State<AppState>) -> Json<Analytics> {
    Json(services::analytics(&state.store))
}

pub async fn config(_: AdminSession, State(state): State<AppState>) -> Json<AdminConfigView> {
    Json(services::config_view(&state))
}

#[instrument(skip_all)]
pub async fn suspend(
    _: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ActionResponse>, AppError> {
    services::set_suspended(&state, &id, true).await?;
    Ok(Json(ActionResponse::ok("user suspended")))
}

#[instrument(skip_all)]
pub async fn unsuspend(
    _: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ActionResponse>, AppError> {
    services::set_suspended(&state, &id, false).await?;
    Ok(Json(ActionResponse::ok("user unsuspended")))
}

#[instrument(skip_all)]
pub async fn warn(
    _: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<WarnRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    services::warn_user(&state, &id, &body.reason).await?;
    Ok(Json(ActionResponse::ok("warning issued")))
}

#[instrument(skip_all)]
pub async fn gift(
    _: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<GiftRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    services::grant_gift(&state, &id, &body.gift_type, body.description).await?;
    Ok(Json(ActionResponse::ok("gift granted")))
}
