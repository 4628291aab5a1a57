// src/models/evaluation.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::session::{Session, TypedAnswer};

/// Grading of one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationEntry {
    pub question: String,
    pub answers: Vec<TypedAnswer>,

    /// Evaluator note (manual or AI-assisted).
    #[serde(default)]
    pub ai_evaluation: String,

    #[serde(default)]
    pub marks: i32,
}

/// Represents the 'evaluations' table in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: Uuid,

    #[serde(rename = "answer_sheet_id")]
    pub session_id: Uuid,
    pub exam_id: Uuid,
    pub teacher_id: Uuid,

    pub student_name: String,
    pub email: String,
    pub exam_name: String,

    #[serde(rename = "qpaper_id")]
    pub set_id: Uuid,
    #[serde(rename = "set")]
    pub set_number: i32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_score: Option<f64>,

    pub data: Vec<EvaluationEntry>,
    pub total_marks: i32,
    pub evaluated: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Evaluation {
    /// Projects a session into an ungraded evaluation.
    pub fn from_session(session: &Session, teacher_id: Uuid, now: DateTime<Utc>) -> Self {
        let data = session
            .data
            .iter()
            .map(|qa| EvaluationEntry {
                question: qa.question.clone(),
                answers: qa.answers.clone(),
                ai_evaluation: String::new(),
                marks: 0,
            })
            .collect();

        Self {
            id: Uuid::new_v4(),
            session_id: session.id,
            exam_id: session.exam_id,
            teacher_id,
            student_name: session.student_name.clone(),
            email: session.email.clone(),
            exam_name: session.exam_name.clone(),
            set_id: session.set_id,
            set_number: session.set_number,
            ai_score: session.ai_score,
            data,
            total_marks: 0,
            evaluated: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// DTO for a teacher's grading pass. Replaces every grading field.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateEvaluationRequest {
    #[validate(custom(function = validate_marks))]
    pub data: Vec<EvaluationEntry>,

    #[validate(range(min = 0, message = "total_marks cannot be negative"))]
    pub total_marks: i32,

    #[serde(default)]
    pub evaluated: bool,
}

fn validate_marks(data: &[EvaluationEntry]) -> Result<(), validator::ValidationError> {
    if data.iter().any(|entry| entry.marks < 0) {
        return Err(validator::ValidationError::new("negative_marks"));
    }
    Ok(())
}

/// Aggregated row for an exam's results listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentMarks {
    pub student_name: String,
    pub email: String,
    pub total_marks: i32,
}
