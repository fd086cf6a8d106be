//! User administration handlers (admin only)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};

use crate::error::AppResult;
use crate::middleware::{require_admin, AuthUser};
use crate::services::user::{CreateUserInput, UpdateUserInput};
use crate::services::UserService;
use crate::AppState;
use shared::User;

fn users(state: &AppState) -> UserService {
    UserService::new(state.store.clone(), state.cache.clone())
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<Vec<User>>> {
    require_admin(&user)?;
    Ok(Json(users(&state).list().await?))
}

pub async fn create_user(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CreateUserInput>,
) -> AppResult<(StatusCode, Json<User>)> {
    require_admin(&user)?;
    let created = users(&state).create(body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateUserInput>,
) -> AppResult<Json<User>> {
    require_admin(&user)?;
    Ok(Json(users(&state).update(id, body).await?))
}
