//! User administration

use std::sync::Arc;

use serde::Deserialize;
use validator::Validate;

use crate::cache::{keys, CacheEvent, ReadThroughCache};
use crate::error::{AppError, AppResult};
use crate::services::auth::hash_password;
use crate::store::Store;
use shared::{ActiveStatus, NewUser, User, UserRole};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserInput {
    #[validate(length(min = 3, max = 50, message = "Username must be 3-50 characters"))]
    pub username: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[serde(default)]
    pub role: UserRole,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserInput {
    pub role: Option<UserRole>,
    pub status: Option<ActiveStatus>,
}

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn Store>,
    cache: ReadThroughCache,
}

impl UserService {
    pub fn new(store: Arc<dyn Store>, cache: ReadThroughCache) -> Self {
        Self { store, cache }
    }

    pub async fn list(&self) -> AppResult<Vec<User>> {
        let store = self.store.clone();
        self.cache
            .get_or_set(keys::USERS_ALL, || async move { store.list_users().await })
            .await
    }

    pub async fn get(&self, id: i64) -> AppResult<User> {
        self.store
            .get_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound("User".to_string()))
    }

    pub async fn create(&self, input: CreateUserInput) -> AppResult<User> {
        input.validate()?;
        let password_hash = hash_password(&input.password)?;

        let mut uow = self.store.begin().await?;
        let user = uow
            .insert_user(NewUser {
                username: input.username.trim().to_string(),
                email: input.email.trim().to_lowercase(),
                password_hash,
                role: input.role,
            })
            .await?;
        uow.commit().await?;
        self.cache.invalidate(CacheEvent::UserChanged).await;

        tracing::info!(user_id = user.id, role = %user.role, "user created");
        Ok(user)
    }

    pub async fn update(&self, id: i64, input: UpdateUserInput) -> AppResult<User> {
        if input.role.is_none() && input.status.is_none() {
            return Err(AppError::ValidationError(
                "Nothing to update: provide a role or a status".to_string(),
            ));
        }

        let mut uow = self.store.begin().await?;
        let user = uow
            .update_user(id, input.role, input.status)
            .await?
            .ok_or_else(|| AppError::NotFound("User".to_string()))?;
        uow.commit().await?;
        self.cache.invalidate(CacheEvent::UserChanged).await;

        tracing::info!(user_id = id, role = %user.role, status = %user.status, "user updated");
        Ok(user)
    }
}
