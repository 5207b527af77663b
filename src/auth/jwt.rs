use axum::extract::FromRef;
use jsonwebtoken::{decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    auth::claims::Claims,
    config::JwtConfig,
    error::{AppError, AppResult},
    state::AppState,
};

/// Only the HMAC family is accepted; any other `alg` header is refused
/// before the signature is looked at.
const HMAC_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig) -> anyhow::Result<Self> {
        anyhow::ensure!(!cfg.secret.trim().is_empty(), "JWT secret must not be empty");
        anyhow::ensure!(cfg.ttl_hours > 0, "JWT ttl must be positive");
        Ok(Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            ttl: Duration::hours(cfg.ttl_hours),
        })
    }

    pub fn issue(&self, email: &str, user_id: Uuid) -> AppResult<String> {
        self.issue_at(email, user_id, OffsetDateTime::now_utc())
    }

    fn issue_at(&self, email: &str, user_id: Uuid, now: OffsetDateTime) -> AppResult<String> {
        let claims = Claims {
            email: email.to_string(),
            user_id: user_id.to_string(),
            iat: Some(now.unix_timestamp()),
            exp: (now + self.ttl).unix_timestamp(),
        };
        let token = encode(&Header::new(SIGNING_ALGORITHM), &claims, &self.encoding)
            .map_err(|e| AppError::internal("Failed to generate token", e))?;
        debug!(%user_id, "jwt issued");
        Ok(token)
    }

    pub fn validate(&self, token: &str) -> AppResult<Claims> {
        let header = decode_header(token).map_err(|e| rejected("malformed token", e))?;
        if !HMAC_ALGORITHMS.contains(&header.alg) {
            warn!(alg = ?header.alg, "token with non-HMAC algorithm rejected");
            return Err(AppError::Unauthenticated("unexpected signing algorithm".into()));
        }

        let mut validation = Validation::new(header.alg);
        validation.leeway = 0;
        let data = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|e| rejected("token verification failed", e))?;

        if data.claims.user_id.trim().is_empty() {
            return Err(AppError::Unauthenticated("missing user id in token".into()));
        }
        debug!(user_id = %data.claims.user_id, "jwt verified");
        Ok(data.claims)
    }
}

fn rejected(reason: &str, err: jsonwebtoken::errors::Error) -> AppError {
    debug!(error = %err, reason, "jwt rejected");
    AppError::Unauthenticated(reason.to_string())
}
