// src/engine/sets.rs

use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::{
    engine::{
        EngineError, StoreHandle, is_conflict,
        partition::{Composition, partition},
    },
    models::question_set::{GenerateSetsRequest, QuestionPaperSet},
};

/// Builds randomized question paper sets for an exam.
#[derive(Clone)]
pub struct SetGenerator {
    db: StoreHandle,
}

impl SetGenerator {
    pub fn new(db: StoreHandle) -> Self {
        Self { db }
    }

    /// Generates `num_sets` fresh sets and makes them the exam's current sets.
    ///
    /// Previous sets stay readable so sessions that reference them keep
    /// working, but they are no longer offered to new students.
    #[instrument(skip(self, req), fields(num_sets = req.num_sets))]
    pub async fn generate(
        &self,
        teacher_id: Uuid,
        exam_id: Uuid,
        req: &GenerateSetsRequest,
    ) -> Result<Vec<QuestionPaperSet>, EngineError> {
        req.validate()?;

        let exam = self.db.owned_exam(teacher_id, exam_id).await?;

        let composition = Composition {
            hard: req.hard as usize,
            medium: req.medium as usize,
            easy: req.easy as usize,
        };
        let buckets = partition(&exam.questions, &composition)?;

        let generation = exam.set_generation + 1;
        let now = Utc::now();
        let sets: Vec<QuestionPaperSet> = {
            let mut rng = rand::rng();
            (1..=req.num_sets as i32)
                .map(|set_number| QuestionPaperSet {
                    id: Uuid::new_v4(),
                    exam_id,
                    generation,
                    set_number,
                    questions: buckets.draw(&composition, &mut rng),
                    created_at: now,
                })
                .collect()
        };

        match self
            .db
            .bounded(self.db.store().replace_sets(exam_id, generation, &sets))
            .await
        {
            Ok(()) => {}
            Err(e) if is_conflict(&e) => return Err(EngineError::SetsChanged(exam_id)),
            Err(e) => return Err(e),
        }

        tracing::info!(
            "Generated {} sets for exam {} (generation {})",
            sets.len(),
            exam_id,
            generation
        );
        Ok(sets)
    }

    /// Reads one set. Any principal may read a set they hold an id for.
    pub async fn get(&self, set_id: Uuid) -> Result<QuestionPaperSet, EngineError> {
        self.db
            .bounded(self.db.store().find_set(set_id))
            .await?
            .ok_or(EngineError::SetNotFound(set_id))
    }
}
