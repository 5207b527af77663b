use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use tracing::warn;
use uuid::Uuid;

use super::{extractors::AuthUser, jwt::JwtKeys};
use crate::error::AppError;

pub const MSG_MISSING_AUTH_HEADER: &str = "missing authorization header";
pub const MSG_INVALID_AUTH_HEADER: &str = "invalid authorization header format";
pub const MSG_INVALID_TOKEN: &str = "invalid or expired token";
pub const MSG_INVALID_CLAIMS: &str = "invalid token claims";

/// Expects `Authorization: Bearer <token>`, validates the token and injects
/// [`AuthUser`] into the request. Any failure ends the request with 401.
pub async fn require_auth(
    State(keys): State<JwtKeys>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthenticated(MSG_MISSING_AUTH_HEADER.into()))?;

    let token = header
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthenticated(MSG_INVALID_AUTH_HEADER.into()))?;

    // The caller never learns whether the token was expired, forged or garbled.
    let claims = keys.validate(token).map_err(|e| {
        warn!(reason = %e, "bearer token rejected");
        AppError::Unauthenticated(MSG_INVALID_TOKEN.into())
    })?;

    // Every account id is a UUID, so any other value cannot own anything here.
    let id = Uuid::parse_str(&claims.user_id).map_err(|_| {
        warn!(user_id = %claims.user_id, "token user id is not a uuid");
        AppError::Unauthenticated(MSG_INVALID_CLAIMS.into())
    })?;

    req.extensions_mut().insert(AuthUser {
        id,
        email: claims.email,
    });
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware::from_fn_with_state,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    fn keys() -> JwtKeys {
        JwtKeys::new(&JwtConfig {
            secret: "mw-secret".into(),
            ttl_hours: 1,
        })
        .unwrap()
    }

    async fn whoami(user: AuthUser) -> String {
        format!("{}|{}", user.id, user.email)
    }

    fn app(keys: JwtKeys) -> Router {
        Router::new()
            .route("/me", get(whoami))
            .route_layer(from_fn_with_state(keys.clone(), require_auth))
            .with_state(keys)
    }

    async fn call(keys: JwtKeys, auth: Option<&str>) -> (StatusCode, String) {
        let mut req = HttpRequest::builder().uri("/me");
        if let Some(v) = auth {
            req = req.header(AUTHORIZATION, v);
        }
        let res = app(keys)
            .oneshot(req.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn injects_identity() {
        let keys = keys();
        let id = Uuid::new_v4();
        let token = keys.issue("a@x.com", id).unwrap();
        let (status, body) = call(keys, Some(&format!("Bearer {token}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, format!("{id}|a@x.com"));
    }

    #[tokio::test]
    async fn missing_header() {
        let (status, body) = call(keys(), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains(MSG_MISSING_AUTH_HEADER));
    }

    #[tokio::test]
    async fn wrong_scheme() {
        let keys = keys();
        let token = keys.issue("a@x.com", Uuid::new_v4()).unwrap();
        for value in [token.clone(), format!("Basic {token}"), format!("bearer {token}")] {
            let (status, body) = call(keys.clone(), Some(&value)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert!(body.contains(MSG_INVALID_AUTH_HEADER), "{value}");
        }
    }

    #[tokio::test]
    async fn bad_tokens_share_one_message() {
        let other = JwtKeys::new(&JwtConfig {
            secret: "other-secret".into(),
            ttl_hours: 1,
        })
        .unwrap();
        let forged = other.issue("a@x.com", Uuid::new_v4()).unwrap();
        for token in ["garbage", forged.as_str()] {
            let (status, body) = call(keys(), Some(&format!("Bearer {token}"))).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert!(body.contains(MSG_INVALID_TOKEN));
        }
    }

    #[tokio::test]
    async fn non_uuid_user_id_is_rejected() {
        use jsonwebtoken::{encode, EncodingKey, Header};

        let exp = (time::OffsetDateTime::now_utc() + time::Duration::hours(1)).unix_timestamp();
        let token = encode(
            &Header::default(),
            &serde_json::json!({"email": "a@x.com", "userID": "user-42", "exp": exp}),
            &EncodingKey::from_secret(b"mw-secret"),
        )
        .unwrap();
        let (status, body) = call(keys(), Some(&format!("Bearer {token}"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains(MSG_INVALID_CLAIMS));
    }
}
