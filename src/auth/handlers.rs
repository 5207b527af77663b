use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, SignUpRequest},
        services::AuthService,
    },
    error::AppResult,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(sign_up))
        .route("/auth/login", post(login))
}

#[instrument(skip_all)]
pub async fn sign_up(
    State(auth): State<AuthService>,
    payload: Result<Json<SignUpRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let Json(payload) = payload?;
    let res = auth
        .sign_up(&payload.email, &payload.password, &payload.name)
        .await?;
    Ok((StatusCode::CREATED, Json(res)))
}

#[instrument(skip_all)]
pub async fn login(
    State(auth): State<AuthService>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<AuthResponse>> {
    let Json(payload) = payload?;
    let res = auth.login(&payload.email, &payload.password).await?;
    Ok(Json(res))
}
