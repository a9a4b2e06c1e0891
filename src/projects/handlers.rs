use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::CreateProjectRequest,
    services::{create_project, get_project, list_projects},
};
use crate::{auth::extractors::AuthUser, error::AppError, state::AppState, store::records::Project};

pub fn project_routes() -> Router<AppState> {
    Router::new()
        .route("/projects", get(list).post(create))
        .route("/projects/:id", get(show))
}

#[instrument(skip_all)]
pub async fn list(State(state): State<AppState>, AuthUser(user): AuthUser) -> Json<Vec<Project>> {
    Json(list_projects(&state.store, &user.id))
}

#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<CreateProjectRequest>,
) -> Result<Json<Project>, AppError> {
    let project = create_project(
        &state.store,
        &user.id,
        &body.name,
        body.code,
        &state.config.project_domain_suffix,
    )?;
    Ok(Json(project))
}

#[instrument(skip(state, user))]
pub async fn show(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Project>, AppError> {
    Ok(Json(get_project(&state.store, &user.id, &id)?))
}
