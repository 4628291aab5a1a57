// src/engine/catalog.rs

use chrono::{NaiveDate, Utc};
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::{
    engine::{EngineError, StoreHandle},
    models::{
        exam::{AvailableExam, Exam, ExamDraft},
        session::Session,
    },
    utils::html::clean_html,
};

/// Exam authoring and browsing.
#[derive(Clone)]
pub struct ExamCatalog {
    db: StoreHandle,
}

/// Validates a draft and strips unsafe markup from question text.
fn prepare(mut draft: ExamDraft) -> Result<ExamDraft, EngineError> {
    draft.validate()?;
    for q in &mut draft.questions {
        q.question = clean_html(&q.question);
        if q.question.trim().is_empty() {
            return Err(EngineError::Validation(
                "question text is empty after sanitization".to_string(),
            ));
        }
    }
    Ok(draft)
}

impl ExamCatalog {
    pub fn new(db: StoreHandle) -> Self {
        Self { db }
    }

    #[instrument(skip(self, draft), fields(exam_name = %draft.exam_name))]
    pub async fn create_exam(&self, teacher_id: Uuid, draft: ExamDraft) -> Result<Exam, EngineError> {
        let draft = prepare(draft)?;
        let exam = Exam::from_draft(teacher_id, draft, Utc::now());

        self.db.bounded(self.db.store().insert_exam(&exam)).await?;
        tracing::info!("Exam {} created by {}", exam.id, teacher_id);
        Ok(exam)
    }

    /// Replaces the authored fields. Existing sets and sessions are kept.
    #[instrument(skip(self, draft))]
    pub async fn update_exam(
        &self,
        teacher_id: Uuid,
        exam_id: Uuid,
        draft: ExamDraft,
    ) -> Result<Exam, EngineError> {
        let draft = prepare(draft)?;
        let mut exam = self.db.owned_exam(teacher_id, exam_id).await?;
        exam.apply_draft(draft);

        if !self.db.bounded(self.db.store().update_exam(&exam)).await? {
            return Err(EngineError::ExamNotFound(exam_id));
        }
        tracing::info!("Exam {} updated", exam_id);
        Ok(exam)
    }

    pub async fn get_exam(&self, teacher_id: Uuid, exam_id: Uuid) -> Result<Exam, EngineError> {
        self.db.owned_exam(teacher_id, exam_id).await
    }

    pub async fn list_teacher_exams(&self, teacher_id: Uuid) -> Result<Vec<Exam>, EngineError> {
        let enrollment = self
            .db
            .bounded(self.db.store().teacher_enrollment(teacher_id))
            .await?;
        self.db
            .bounded(self.db.store().find_exams(&enrollment.exam_ids()))
            .await
    }

    /// Exams open on `day`, without their question banks.
    pub async fn list_available(&self, day: NaiveDate) -> Result<Vec<AvailableExam>, EngineError> {
        let exams = self
            .db
            .bounded(self.db.store().list_exams_available_on(day))
            .await?;
        Ok(exams.iter().map(AvailableExam::from).collect())
    }

    pub async fn list_exam_sessions(
        &self,
        teacher_id: Uuid,
        exam_id: Uuid,
    ) -> Result<Vec<Session>, EngineError> {
        self.db.owned_exam(teacher_id, exam_id).await?;
        self.db
            .bounded(self.db.store().list_sessions_by_exam(exam_id))
            .await
    }
}
