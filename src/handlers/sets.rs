// src/handlers/sets.rs

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{engine::Engine, error::AppError};

/// Returns a question paper set (the paper a session was assigned).
pub async fn get_set(
    State(engine): State<Engine>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let set = engine.sets.get(id).await?;
    Ok(Json(set))
}
