// src/models/question_set.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::exam::Question;

/// One randomized, fixed ordinal variant of an exam's question paper.
/// Read-only once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionPaperSet {
    pub id: Uuid,
    pub exam_id: Uuid,

    /// Which regeneration of the exam's sets this belongs to.
    pub generation: i32,

    /// Ordinal, starting at 1.
    #[serde(rename = "set")]
    pub set_number: i32,

    pub questions: Vec<Question>,
    pub created_at: DateTime<Utc>,
}

/// DTO for generating question paper sets.
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = validate_composition))]
pub struct GenerateSetsRequest {
    #[validate(range(min = 1, max = 100, message = "num_sets must be between 1 and 100"))]
    pub num_sets: u32,
    #[serde(default)]
    pub hard: u32,
    #[serde(default)]
    pub medium: u32,
    #[serde(default)]
    pub easy: u32,
}

fn validate_composition(req: &GenerateSetsRequest) -> Result<(), validator::ValidationError> {
    if req.hard == 0 && req.medium == 0 && req.easy == 0 {
        return Err(validator::ValidationError::new("empty_composition"));
    }
    Ok(())
}
