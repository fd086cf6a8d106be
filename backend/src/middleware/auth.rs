//! Authentication middleware
//!
//! JWT authentication and role-based access control middleware

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::AppError;
use crate::services::auth::validate_token;
use crate::AppState;
use shared::UserRole;

/// Authenticated user information extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: i64,
    pub role: UserRole,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Validates the `Authorization: Bearer` token and stores the [`AuthUser`]
/// in the request extensions
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
    {
        Some(token) => token,
        None => return AppError::InvalidToken.into_response(),
    };

    let auth_user = match validate_token(token, &state.config.jwt.secret)
        .and_then(|claims| Ok((claims.user_id()?, claims.role)))
    {
        Ok((user_id, role)) => AuthUser { user_id, role },
        Err(e) => return e.into_response(),
    };

    request.extensions_mut().insert(auth_user);
    next.run(request).await
}

/// Extractor for authenticated user
/// Use this in handlers to get the current user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or(AppError::InvalidToken)
    }
}

/// Role guard for admin-only handlers
pub fn require_admin(user: &AuthUser) -> Result<(), AppError> {
    if user.is_admin() {
        Ok(())
    } else {
        tracing::warn!(user_id = user.user_id, "admin operation refused");
        Err(AppError::InsufficientPermissions)
    }
}
