use std::{sync::Arc, time::Duration};

use axum::extract::FromRef;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::AuthResponse,
        jwt::JwtKeys,
        password,
        repo::{DuplicateEmail, UserStore},
        repo_types::User,
    },
    db::{self, with_deadline},
    error::{AppError, AppResult},
    state::AppState,
    validation,
};

pub const MSG_USER_EXISTS: &str = "user already exists";
pub const MSG_INVALID_CREDENTIALS: &str = "invalid credentials";

/// Signup and login over the credential store.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    keys: JwtKeys,
    timeout: Duration,
}

impl FromRef<AppState> for AuthService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.users.clone(), state.jwt.clone(), state.config.store_timeout)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, keys: JwtKeys, timeout: Duration) -> Self {
        Self {
            users,
            keys,
            timeout,
        }
    }

    pub async fn sign_up(&self, email: &str, password: &str, name: &str) -> AppResult<AuthResponse> {
        let email = normalize_email(email);
        let name = name.trim();
        validation::validate_email(&email)?;
        validation::validate_password(password)?;
        validation::validate_name(name)?;

        let existing = with_deadline(self.timeout, self.users.find_by_email(&email))
            .await
            .map_err(|e| AppError::database("Failed to check user existence", e))?;
        if existing.is_some() {
            warn!(%email, "signup rejected: email taken");
            return Err(AppError::Conflict(MSG_USER_EXISTS.into()));
        }

        let password_hash = password::hash_password_blocking(password.to_string()).await?;
        let now = db::now();
        let user = User {
            id: Uuid::new_v4(),
            email,
            password_hash,
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        };

        // A concurrent signup can still win the race to the unique index.
        with_deadline(self.timeout, self.users.insert(&user))
            .await
            .map_err(|e| {
                if e.is::<DuplicateEmail>() {
                    AppError::Conflict(MSG_USER_EXISTS.into())
                } else {
                    AppError::database("Failed to create user", e)
                }
            })?;

        let token = self.keys.issue(&user.email, user.id)?;
        info!(user_id = %user.id, email = %user.email, "user signed up");
        Ok(AuthResponse {
            token,
            email: user.email,
            name: user.name,
        })
    }

    pub async fn login(&self, email: &str, password: &str) -> AppResult<AuthResponse> {
        let email = normalize_email(email);

        let user = with_deadline(self.timeout, self.users.find_by_email(&email))
            .await
            .map_err(|e| AppError::database("Failed to find user", e))?;
        let Some(user) = user else {
            warn!(%email, "login rejected: unknown email");
            return Err(AppError::BadRequest(MSG_INVALID_CREDENTIALS.into()));
        };

        let ok =
            password::verify_password_blocking(password.to_string(), user.password_hash.clone())
                .await?;
        if !ok {
            warn!(%email, user_id = %user.id, "login rejected: wrong password");
            return Err(AppError::BadRequest(MSG_INVALID_CREDENTIALS.into()));
        }

        let token = self.keys.issue(&user.email, user.id)?;
        info!(user_id = %user.id, email = %user.email, "user logged in");
        Ok(AuthResponse {
            token,
            email: user.email,
            name: user.name,
        })
    }
}
