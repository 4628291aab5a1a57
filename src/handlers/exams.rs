// src/handlers/exams.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::{
    engine::Engine,
    error::AppError,
    models::{exam::ExamDraft, question_set::GenerateSetsRequest},
    utils::jwt::Claims,
};

/// Creates an exam owned by the calling teacher.
pub async fn create_exam(
    State(engine): State<Engine>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ExamDraft>,
) -> Result<impl IntoResponse, AppError> {
    let exam = engine
        .catalog
        .create_exam(claims.user_id()?, payload)
        .await?;

    Ok((StatusCode::CREATED, Json(exam)))
}

/// Lists the calling teacher's exams.
pub async fn list_exams(
    State(engine): State<Engine>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let exams = engine.catalog.list_teacher_exams(claims.user_id()?).await?;
    Ok(Json(exams))
}

pub async fn get_exam(
    State(engine): State<Engine>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let exam = engine.catalog.get_exam(claims.user_id()?, id).await?;
    Ok(Json(exam))
}

/// Replaces the authored fields of an exam. Sets and sessions are kept.
pub async fn update_exam(
    State(engine): State<Engine>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ExamDraft>,
) -> Result<impl IntoResponse, AppError> {
    let exam = engine
        .catalog
        .update_exam(claims.user_id()?, id, payload)
        .await?;
    Ok(Json(exam))
}

/// Generates fresh question paper sets, replacing the exam's current ones.
pub async fn generate_sets(
    State(engine): State<Engine>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<GenerateSetsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let sets = engine
        .sets
        .generate(claims.user_id()?, id, &payload)
        .await?;

    let set_ids: Vec<Uuid> = sets.iter().map(|s| s.id).collect();
    Ok(Json(json!({
        "exam_id": id,
        "sets": set_ids
    })))
}

pub async fn list_exam_sessions(
    State(engine): State<Engine>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let sessions = engine
        .catalog
        .list_exam_sessions(claims.user_id()?, id)
        .await?;
    Ok(Json(sessions))
}

/// Name, email and total marks of every evaluated session.
pub async fn exam_results(
    State(engine): State<Engine>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let results = engine
        .evaluations
        .aggregate_by_exam(claims.user_id()?, id)
        .await?;
    Ok(Json(results))
}

/// Exams open today (UTC), without their question banks.
pub async fn list_available(State(engine): State<Engine>) -> Result<impl IntoResponse, AppError> {
    let exams = engine
        .catalog
        .list_available(Utc::now().date_naive())
        .await?;
    Ok(Json(exams))
}

/// Returns the student's active session for the exam, assigning a set if
/// this is their first visit. Safe to call on every page load.
pub async fn assign(
    State(engine): State<Engine>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let session = engine
        .assignment
        .assign_or_resume(claims.user_id()?, id)
        .await?;
    Ok(Json(session))
}
