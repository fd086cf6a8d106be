//! Authentication service for login and token management

use std::sync::Arc;

use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::store::Store;
use shared::{User, UserRole};

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // User ID
    pub role: UserRole,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn user_id(&self) -> AppResult<i64> {
        self.sub.parse().map_err(|_| AppError::InvalidToken)
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginInput {
    /// Username or email
    pub login: String,
    pub password: String,
}

/// Token issued on successful login
#[derive(Debug, Serialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: User,
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
    jwt_secret: String,
    access_token_expiry: i64,
}

impl AuthService {
    pub fn new(store: Arc<dyn Store>, config: &Config) -> Self {
        Self {
            store,
            jwt_secret: config.jwt.secret.clone(),
            access_token_expiry: config.jwt.access_token_expiry,
        }
    }

    /// Authenticate with username or email and password
    pub async fn login(&self, login: &str, password: &str) -> AppResult<AuthTokens> {
        let credentials = self
            .store
            .find_credentials(login.trim())
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        let valid = verify(password, &credentials.password_hash)
            .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))?;
        if !valid {
            tracing::warn!(login, "failed login attempt");
            return Err(AppError::InvalidCredentials);
        }

        // Account state is checked after the password
        if !credentials.user.status.is_active() {
            return Err(AppError::AccountDisabled);
        }

        let access_token = self.generate_token(&credentials.user)?;
        tracing::info!(user_id = credentials.user.id, "user logged in");

        Ok(AuthTokens {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_expiry,
            user: credentials.user,
        })
    }

    /// Validate access token and return claims
    pub fn validate_token(&self, token: &str) -> AppResult<Claims> {
        validate_token(token, &self.jwt_secret)
    }

    fn generate_token(&self, user: &User) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            role: user.role,
            exp: (now + Duration::seconds(self.access_token_expiry)).timestamp(),
            iat: now.timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }
}

/// Decode and validate an HS256 token
pub fn validate_token(token: &str, secret: &str) -> AppResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!(error = %e, "rejected token");
        AppError::InvalidToken
    })
}

pub fn hash_password(password: &str) -> AppResult<String> {
    hash(password, DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}
