// src/handlers/auth.rs

use axum::{Json, extract::State, response::IntoResponse};
use serde_json::json;

use crate::{
    config::Config,
    engine::Engine,
    error::AppError,
    models::user::CallbackRequest,
    utils::jwt::{sign_jwt, verify_identity_assertion},
};

/// Exchanges the identity provider's signed assertion for a session token.
///
/// The principal is created on first sign-in and refreshed afterwards.
/// The role is derived from the email domain.
pub async fn callback(
    State(engine): State<Engine>,
    State(config): State<Config>,
    Json(payload): Json<CallbackRequest>,
) -> Result<impl IntoResponse, AppError> {
    let assertion = verify_identity_assertion(&payload.assertion, &config.identity_secret)?;

    let principal = engine
        .principals
        .sign_in(&assertion, &config.student_email_domain)
        .await?;

    let token = sign_jwt(
        principal.id,
        principal.role,
        &config.jwt_secret,
        config.jwt_expiration,
    )?;

    Ok(Json(json!({
        "token": token,
        "type": "Bearer",
        "role": principal.role,
        "user": principal
    })))
}
