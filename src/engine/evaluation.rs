// src/engine/evaluation.rs

use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::{
    engine::{EngineError, StoreHandle, is_conflict},
    models::evaluation::{Evaluation, EvaluationEntry, StudentMarks, UpdateEvaluationRequest},
};

/// Turns finished sessions into grading records and reports results.
#[derive(Clone)]
pub struct EvaluationBuilder {
    db: StoreHandle,
}

impl EvaluationBuilder {
    pub fn new(db: StoreHandle) -> Self {
        Self { db }
    }

    /// Returns the session's evaluation, creating an ungraded one if none
    /// exists yet. At most one evaluation is ever stored per session.
    #[instrument(skip(self))]
    pub async fn create(&self, teacher_id: Uuid, session_id: Uuid) -> Result<Evaluation, EngineError> {
        let store = self.db.store();

        if let Some(existing) = self
            .db
            .bounded(store.find_evaluation_by_session(session_id))
            .await?
        {
            self.db.owned_exam(teacher_id, existing.exam_id).await?;
            tracing::debug!("Evaluation {} already exists for session {}", existing.id, session_id);
            return Ok(existing);
        }

        let session = self
            .db
            .bounded(store.find_session(session_id))
            .await?
            .ok_or(EngineError::SessionNotFound(session_id))?;
        self.db.owned_exam(teacher_id, session.exam_id).await?;
        if !session.submitted {
            return Err(EngineError::NotSubmitted(session_id));
        }

        let evaluation = Evaluation::from_session(&session, teacher_id, Utc::now());

        match self.db.bounded(store.insert_evaluation(&evaluation)).await {
            Ok(()) => {
                tracing::info!("Created evaluation {} for session {}", evaluation.id, session_id);
                Ok(evaluation)
            }
            Err(e) if is_conflict(&e) => self
                .db
                .bounded(store.find_evaluation_by_session(session_id))
                .await?
                .ok_or(e),
            Err(e) => Err(e),
        }
    }

    /// Loads an evaluation of an exam owned by `teacher_id`.
    pub async fn get(&self, teacher_id: Uuid, evaluation_id: Uuid) -> Result<Evaluation, EngineError> {
        let evaluation = self
            .db
            .bounded(self.db.store().find_evaluation(evaluation_id))
            .await?
            .ok_or(EngineError::EvaluationNotFound(evaluation_id))?;
        self.db.owned_exam(teacher_id, evaluation.exam_id).await?;
        Ok(evaluation)
    }

    /// Replaces every grading field. The per-question array must be resent
    /// in full and in stored order; only marks and evaluator notes are taken
    /// from it.
    #[instrument(skip(self, req), fields(evaluated = req.evaluated))]
    pub async fn update(
        &self,
        teacher_id: Uuid,
        evaluation_id: Uuid,
        req: UpdateEvaluationRequest,
    ) -> Result<Evaluation, EngineError> {
        req.validate()?;

        let current = self.get(teacher_id, evaluation_id).await?;
        let data = apply_grading(&current.data, &req.data)?;

        let now = Utc::now();
        let updated = self
            .db
            .bounded(self.db.store().replace_grading(
                evaluation_id,
                &data,
                req.total_marks,
                req.evaluated,
                now,
            ))
            .await?;
        if !updated {
            return Err(EngineError::EvaluationNotFound(evaluation_id));
        }

        tracing::info!("Evaluation {} graded ({} marks)", evaluation_id, req.total_marks);
        Ok(Evaluation {
            data,
            total_marks: req.total_marks,
            evaluated: req.evaluated,
            updated_at: now,
            ..current
        })
    }

    /// Name, email and total marks of every evaluated session of the exam.
    pub async fn aggregate_by_exam(
        &self,
        teacher_id: Uuid,
        exam_id: Uuid,
    ) -> Result<Vec<StudentMarks>, EngineError> {
        self.db.owned_exam(teacher_id, exam_id).await?;

        let evaluations = self.db.bounded(self.db.store().list_evaluated(exam_id)).await?;
        Ok(evaluations
            .into_iter()
            .map(|e| StudentMarks {
                student_name: e.student_name,
                email: e.email,
                total_marks: e.total_marks,
            })
            .collect())
    }
}

/// Copies marks and notes from `graded` onto the stored entries. Questions
/// and recorded answers stay as stored.
fn apply_grading(
    stored: &[EvaluationEntry],
    graded: &[EvaluationEntry],
) -> Result<Vec<EvaluationEntry>, EngineError> {
    if graded.len() != stored.len() {
        return Err(EngineError::Validation(format!(
            "expected marks for {} questions, got {}",
            stored.len(),
            graded.len()
        )));
    }

    stored
        .iter()
        .zip(graded)
        .enumerate()
        .map(|(i, (entry, grade))| {
            if entry.question != grade.question {
                return Err(EngineError::Validation(format!(
                    "entry {i} does not match question '{}'",
                    entry.question
                )));
            }
            Ok(EvaluationEntry {
                marks: grade.marks,
                ai_evaluation: grade.ai_evaluation.clone(),
                ..entry.clone()
            })
        })
        .collect()
}
