// src/engine/assignment.rs

use std::collections::HashSet;

use chrono::Utc;
use rand::{Rng, seq::IndexedRandom};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    engine::{EngineError, StoreHandle, is_conflict},
    models::{
        question_set::QuestionPaperSet,
        session::Session,
        user::Role,
    },
};

/// Picks the first set (by ordinal) nobody holds yet, or any set at random
/// once every set is claimed. `sets` must be ordered by set number.
pub fn pick_set<'a, R>(
    sets: &'a [QuestionPaperSet],
    claimed: &HashSet<Uuid>,
    rng: &mut R,
) -> Option<&'a QuestionPaperSet>
where
    R: Rng + ?Sized,
{
    sets.iter()
        .find(|s| !claimed.contains(&s.id))
        .or_else(|| sets.choose(rng))
}

/// Hands each student exactly one active session per exam.
#[derive(Clone)]
pub struct AssignmentEngine {
    db: StoreHandle,
}

impl AssignmentEngine {
    pub fn new(db: StoreHandle) -> Self {
        Self { db }
    }

    /// Returns the student's unsubmitted session for the exam, creating one
    /// on a fresh set if none exists.
    ///
    /// Concurrent calls for the same student and exam all resolve to the
    /// same session: the store rejects a second active session and the
    /// loser re-reads the winner's.
    #[instrument(skip(self))]
    pub async fn assign_or_resume(
        &self,
        student_id: Uuid,
        exam_id: Uuid,
    ) -> Result<Session, EngineError> {
        let store = self.db.store();

        let student = self
            .db
            .bounded(store.find_principal(student_id))
            .await?
            .filter(|p| p.role == Role::Student)
            .ok_or(EngineError::StudentContainerNotFound(student_id))?;

        if let Some(enrollment) = self
            .db
            .bounded(store.latest_enrollment(student_id, exam_id))
            .await?
        {
            if let Some(session) = self
                .db
                .bounded(store.find_session(enrollment.session_id))
                .await?
                .filter(|s| !s.submitted)
            {
                tracing::debug!("Resuming session {} for student {}", session.id, student_id);
                return Ok(session);
            }
        }

        let exam = self
            .db
            .bounded(store.find_exam(exam_id))
            .await?
            .ok_or(EngineError::ExamNotFound(exam_id))?;

        let sets = self.db.bounded(store.list_sets(exam_id)).await?;
        if sets.is_empty() {
            return Err(EngineError::NoSetsConfigured(exam_id));
        }

        let claimed: HashSet<Uuid> = self
            .db
            .bounded(store.list_sessions_by_exam(exam_id))
            .await?
            .into_iter()
            .map(|s| s.set_id)
            .collect();

        let chosen = {
            let mut rng = rand::rng();
            pick_set(&sets, &claimed, &mut rng)
        }
        .ok_or(EngineError::NoSetsConfigured(exam_id))?;

        let session = Session::materialize(&student, &exam, chosen, Utc::now());

        match self.db.bounded(store.insert_session(&session)).await {
            Ok(()) => {
                tracing::info!(
                    "Assigned set {} (session {}) of exam {} to student {}",
                    session.set_number,
                    session.id,
                    exam_id,
                    student_id
                );
                Ok(session)
            }
            Err(e) if is_conflict(&e) => {
                tracing::debug!("Lost assignment race for student {}; re-reading", student_id);
                self.db
                    .bounded(store.find_active_session(student_id, exam_id))
                    .await?
                    .ok_or(e)
            }
            Err(e) => Err(e),
        }
    }
}
