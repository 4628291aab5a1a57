// src/models/exam.rs

use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// How an exam is delivered.
///
/// `internal` exams are self-paced: sessions skip the start gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExamType {
    External,
    Internal,
    Viva,
}

impl ExamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExamType::External => "external",
            ExamType::Internal => "internal",
            ExamType::Viva => "viva",
        }
    }
}

impl fmt::Display for ExamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExamType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "external" => Ok(ExamType::External),
            "internal" => Ok(ExamType::Internal),
            "viva" => Ok(ExamType::Viva),
            other => Err(format!("unknown exam type '{other}'")),
        }
    }
}

/// Difficulty bucket of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Easy,
    Medium,
    Hard,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Easy => "easy",
            Level::Medium => "medium",
            Level::Hard => "hard",
        })
    }
}

/// A question of the bank. Copied by value into question paper sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Question {
    /// The question text.
    #[validate(length(min = 1, max = 5000, message = "Question text must be between 1 and 5000 chars"))]
    pub question: String,

    /// Answer types requested for this question (e.g. "html", "css").
    #[validate(custom(function = validate_answer_types))]
    pub types: Vec<String>,

    pub level: Level,
}

fn validate_answer_types(types: &[String]) -> Result<(), validator::ValidationError> {
    if types.is_empty() {
        return Err(validator::ValidationError::new("types_cannot_be_empty"));
    }
    for t in types {
        if t.trim().is_empty() || t.len() > 32 {
            return Err(validator::ValidationError::new("invalid_answer_type"));
        }
    }
    Ok(())
}

/// Represents the 'exams' table in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exam {
    pub id: Uuid,

    /// Owning teacher.
    pub teacher_id: Uuid,

    pub exam_name: String,
    pub exam_type: ExamType,

    /// Calendar days (UTC) on which students may take the exam.
    pub available_dates: Vec<NaiveDate>,

    /// Configured duration in minutes.
    pub duration: i64,

    /// The question bank, in authoring order.
    pub questions: Vec<Question>,

    /// Ids of the current question paper sets, ordered by set number.
    #[serde(rename = "sets")]
    pub set_ids: Vec<Uuid>,

    /// Ids of every session produced against this exam.
    #[serde(rename = "answer_sheets")]
    pub session_ids: Vec<Uuid>,

    /// Bumped each time the sets are regenerated.
    pub set_generation: i32,

    pub created_at: DateTime<Utc>,
}

impl Exam {
    /// Builds a fresh exam from a validated draft with empty set and session lists.
    pub fn from_draft(teacher_id: Uuid, draft: ExamDraft, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            teacher_id,
            exam_name: draft.exam_name,
            exam_type: draft.exam_type,
            available_dates: draft.available_dates,
            duration: draft.duration,
            questions: draft.questions,
            set_ids: Vec::new(),
            session_ids: Vec::new(),
            set_generation: 0,
            created_at: now,
        }
    }

    /// Overwrites the authored fields, leaving sets and sessions untouched.
    pub fn apply_draft(&mut self, draft: ExamDraft) {
        self.exam_name = draft.exam_name;
        self.exam_type = draft.exam_type;
        self.available_dates = draft.available_dates;
        self.duration = draft.duration;
        self.questions = draft.questions;
    }

    pub fn is_available_on(&self, day: NaiveDate) -> bool {
        self.available_dates.contains(&day)
    }
}

/// DTO for creating or updating an exam.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ExamDraft {
    #[validate(length(min = 1, max = 200, message = "Exam name must be between 1 and 200 chars"))]
    pub exam_name: String,

    pub exam_type: ExamType,

    #[serde(default)]
    pub available_dates: Vec<NaiveDate>,

    #[validate(range(min = 1, max = 1440, message = "Duration must be between 1 and 1440 minutes"))]
    pub duration: i64,

    #[validate(length(min = 1, message = "An exam needs at least one question"), nested)]
    pub questions: Vec<Question>,
}

/// Projection returned to students browsing today's exams (no question bank).
#[derive(Debug, Clone, Serialize)]
pub struct AvailableExam {
    pub id: Uuid,
    pub exam_name: String,
    pub exam_type: ExamType,
    pub duration: i64,
}

impl From<&Exam> for AvailableExam {
    fn from(exam: &Exam) -> Self {
        Self {
            id: exam.id,
            exam_name: exam.exam_name.clone(),
            exam_type: exam.exam_type,
            duration: exam.duration,
        }
    }
}
