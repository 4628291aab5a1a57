// src/models/session.rs

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    exam::{Exam, ExamType},
    question_set::QuestionPaperSet,
    user::Principal,
};

/// Lifecycle status of an answer sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Assigned but not yet started.
    DidNotStart,
    Started,
    /// Terminal.
    Ended,
    /// Initial status for self-paced internal exams.
    Internal,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::DidNotStart => "didnotstart",
            SessionStatus::Started => "started",
            SessionStatus::Ended => "ended",
            SessionStatus::Internal => "internal",
        }
    }

    /// Initial status for a new session of the given exam type.
    pub fn initial_for(exam_type: ExamType) -> Self {
        match exam_type {
            ExamType::Internal => SessionStatus::Internal,
            _ => SessionStatus::DidNotStart,
        }
    }

    pub fn accepts_submission(&self) -> bool {
        matches!(self, SessionStatus::Started | SessionStatus::Internal)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "didnotstart" => Ok(SessionStatus::DidNotStart),
            "started" => Ok(SessionStatus::Started),
            "ended" => Ok(SessionStatus::Ended),
            "internal" => Ok(SessionStatus::Internal),
            other => Err(format!("unknown session status '{other}'")),
        }
    }
}

/// One answer slot: the answer given for one requested answer type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedAnswer {
    #[serde(rename = "type")]
    pub answer_type: String,
    #[serde(default)]
    pub ans: String,
}

/// All answer slots of one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionAnswers {
    pub question: String,
    pub answers: Vec<TypedAnswer>,
}

/// Represents the 'sessions' table (a student's answer sheet).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,

    pub student_id: Uuid,
    pub student_name: String,
    pub email: String,

    pub exam_id: Uuid,
    pub exam_name: String,
    pub exam_type: ExamType,

    /// The assigned question paper set.
    #[serde(rename = "qpaper_id")]
    pub set_id: Uuid,
    #[serde(rename = "set")]
    pub set_number: i32,

    /// Per-question, per-type answers in the set's canonical order.
    pub data: Vec<QuestionAnswers>,

    pub status: SessionStatus,
    pub submitted: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_score: Option<f64>,

    /// Exam duration in minutes at assignment time.
    pub duration: i64,

    pub started_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Materializes a blank answer sheet for `student` from the chosen set.
    pub fn materialize(
        student: &Principal,
        exam: &Exam,
        set: &QuestionPaperSet,
        now: DateTime<Utc>,
    ) -> Self {
        let data = set
            .questions
            .iter()
            .map(|q| QuestionAnswers {
                question: q.question.clone(),
                answers: q
                    .types
                    .iter()
                    .map(|t| TypedAnswer {
                        answer_type: t.clone(),
                        ans: String::new(),
                    })
                    .collect(),
            })
            .collect();

        Self {
            id: Uuid::new_v4(),
            student_id: student.id,
            student_name: student.name.clone(),
            email: student.email.clone(),
            exam_id: exam.id,
            exam_name: exam.exam_name.clone(),
            exam_type: exam.exam_type,
            set_id: set.id,
            set_number: set.set_number,
            data,
            status: SessionStatus::initial_for(exam.exam_type),
            submitted: false,
            ai_score: None,
            duration: exam.duration,
            started_at: None,
            submitted_at: None,
            created_at: now,
        }
    }
}

/// A single answer as sent by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    pub question: String,
    #[serde(rename = "type")]
    pub answer_type: String,
    pub answer: String,
}

/// DTO for submitting an answer sheet.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct SubmitRequest {
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub answers: Vec<SubmittedAnswer>,

    /// Score already obtained from an external scorer, if any.
    #[serde(default)]
    pub ai_score: Option<f64>,
}
