//! Authentication handlers

use axum::{extract::State, Json};
use serde::Serialize;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::auth::{AuthTokens, LoginInput};
use crate::services::{AuthService, UserService};
use crate::AppState;
use shared::User;

/// Login endpoint handler
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginInput>,
) -> AppResult<Json<AuthTokens>> {
    let auth_service = AuthService::new(state.store.clone(), &state.config);
    let tokens = auth_service.login(&body.login, &body.password).await?;
    Ok(Json(tokens))
}

#[derive(Serialize)]
pub struct MeResponse {
    pub user: User,
}

/// Profile of the authenticated user
pub async fn me(
    State(state): State<AppState>,
    CurrentUser(auth): CurrentUser,
) -> AppResult<Json<MeResponse>> {
    let service = UserService::new(state.store.clone(), state.cache.clone());
    let user = service.get(auth.user_id).await?;
    Ok(Json(MeResponse { user }))
}
