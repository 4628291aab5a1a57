// src/handlers/sessions.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{engine::Engine, error::AppError, models::session::SubmitRequest, utils::jwt::Claims};

pub async fn list_sessions(
    State(engine): State<Engine>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let sessions = engine.lifecycle.list_sessions(claims.user_id()?).await?;
    Ok(Json(sessions))
}

pub async fn get_session(
    State(engine): State<Engine>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let session = engine.lifecycle.get_session(claims.user_id()?, id).await?;
    Ok(Json(session))
}

/// Opens the answer sheet. Starting an already started sheet is a no-op.
pub async fn start_session(
    State(engine): State<Engine>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let session = engine.lifecycle.start(claims.user_id()?, id).await?;
    Ok(Json(session))
}

/// Submits answers. Rejected with 400 unless the session is open.
pub async fn submit_session(
    State(engine): State<Engine>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubmitRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = engine
        .lifecycle
        .submit(claims.user_id()?, id, payload)
        .await?;
    Ok(Json(session))
}
