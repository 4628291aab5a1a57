// src/handlers/evaluations.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    engine::Engine, error::AppError, models::evaluation::UpdateEvaluationRequest,
    utils::jwt::Claims,
};

/// Creates (or returns the existing) evaluation of a session.
pub async fn create_evaluation(
    State(engine): State<Engine>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let evaluation = engine
        .evaluations
        .create(claims.user_id()?, session_id)
        .await?;

    Ok(Json(json!({
        "evaluation_id": evaluation.id
    })))
}

pub async fn get_evaluation(
    State(engine): State<Engine>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let evaluation = engine.evaluations.get(claims.user_id()?, id).await?;
    Ok(Json(evaluation))
}

/// Full replace of the grading fields.
pub async fn update_evaluation(
    State(engine): State<Engine>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateEvaluationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let evaluation = engine
        .evaluations
        .update(claims.user_id()?, id, payload)
        .await?;
    Ok(Json(evaluation))
}
