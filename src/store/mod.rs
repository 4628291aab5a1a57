// src/store/mod.rs

//! Storage collaborator.
//!
//! Methods are logical operations rather than raw document CRUD: every
//! multi-document write (session + enrollment, evaluation + teacher
//! enrollment, set replacement) is a single call, so a backend can make
//! it atomic.

pub mod memory;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    enrollment::{StudentEnrollment, TeacherEnrollment},
    evaluation::{Evaluation, EvaluationEntry},
    exam::Exam,
    question_set::QuestionPaperSet,
    session::{QuestionAnswers, Session, SessionStatus},
    user::{Principal, Role},
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors surfaced by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying database failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A uniqueness guarantee would have been violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The operation did not finish within its deadline.
    #[error("storage operation timed out after {0:?}")]
    Timeout(Duration),

    /// A stored record could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait ExamStore: Send + Sync {
    // Principals

    /// Inserts or refreshes the principal with this email.
    async fn upsert_principal(
        &self,
        email: &str,
        name: &str,
        role: Role,
    ) -> Result<Principal, StoreError>;

    async fn find_principal(&self, id: Uuid) -> Result<Option<Principal>, StoreError>;

    // Exams

    /// Persists a new exam and registers it in the owner's enrollment.
    async fn insert_exam(&self, exam: &Exam) -> Result<(), StoreError>;

    /// Replaces the authored fields of an exam. Returns false if absent.
    async fn update_exam(&self, exam: &Exam) -> Result<bool, StoreError>;

    async fn find_exam(&self, id: Uuid) -> Result<Option<Exam>, StoreError>;

    async fn find_exams(&self, ids: &[Uuid]) -> Result<Vec<Exam>, StoreError>;

    async fn list_exams_available_on(&self, day: NaiveDate) -> Result<Vec<Exam>, StoreError>;

    async fn teacher_enrollment(&self, teacher_id: Uuid) -> Result<TeacherEnrollment, StoreError>;

    // Question paper sets

    /// Makes `sets` the exam's current set list.
    ///
    /// Fails with `Conflict` unless the exam is still at `generation - 1`.
    async fn replace_sets(
        &self,
        exam_id: Uuid,
        generation: i32,
        sets: &[QuestionPaperSet],
    ) -> Result<(), StoreError>;

    async fn find_set(&self, id: Uuid) -> Result<Option<QuestionPaperSet>, StoreError>;

    /// Current-generation sets of an exam, ordered by set number.
    async fn list_sets(&self, exam_id: Uuid) -> Result<Vec<QuestionPaperSet>, StoreError>;

    // Sessions

    /// Most recent enrollment triple of a student for an exam.
    async fn latest_enrollment(
        &self,
        student_id: Uuid,
        exam_id: Uuid,
    ) -> Result<Option<StudentEnrollment>, StoreError>;

    /// Persists a session, appends it to the exam and records the
    /// student's enrollment triple.
    ///
    /// Fails with `Conflict` if the student already holds an unsubmitted
    /// session for the exam.
    async fn insert_session(&self, session: &Session) -> Result<(), StoreError>;

    async fn find_session(&self, id: Uuid) -> Result<Option<Session>, StoreError>;

    async fn find_active_session(
        &self,
        student_id: Uuid,
        exam_id: Uuid,
    ) -> Result<Option<Session>, StoreError>;

    async fn list_sessions_by_exam(&self, exam_id: Uuid) -> Result<Vec<Session>, StoreError>;

    async fn list_sessions_by_student(&self, student_id: Uuid)
    -> Result<Vec<Session>, StoreError>;

    /// `didnotstart` -> `started`. Returns false if the session was not in
    /// `didnotstart`.
    async fn mark_started(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Ends a session that is still unsubmitted and in `expected` status.
    /// Returns false if that precondition no longer holds.
    async fn record_submission(
        &self,
        id: Uuid,
        expected: SessionStatus,
        data: &[QuestionAnswers],
        ai_score: Option<f64>,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    // Evaluations

    /// Persists an evaluation and registers it under the teacher's exam entry.
    ///
    /// Fails with `Conflict` if the session already has an evaluation.
    async fn insert_evaluation(&self, evaluation: &Evaluation) -> Result<(), StoreError>;

    async fn find_evaluation(&self, id: Uuid) -> Result<Option<Evaluation>, StoreError>;

    async fn find_evaluation_by_session(
        &self,
        session_id: Uuid,
    ) -> Result<Option<Evaluation>, StoreError>;

    /// Full replace of the grading fields. Returns false if absent.
    async fn replace_grading(
        &self,
        id: Uuid,
        data: &[EvaluationEntry],
        total_marks: i32,
        evaluated: bool,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Evaluations of an exam flagged as evaluated, oldest first.
    async fn list_evaluated(&self, exam_id: Uuid) -> Result<Vec<Evaluation>, StoreError>;
}
