// src/engine/mod.rs

//! Exam session assignment and evaluation engine.
//!
//! Every component receives the store explicitly at construction; nothing
//! here holds process-wide state. Each storage call is bounded by the
//! configured timeout and surfaces expiry as a persistence error.

pub mod assignment;
pub mod catalog;
pub mod error;
pub mod evaluation;
pub mod lifecycle;
pub mod partition;
pub mod principals;
pub mod sets;

use std::{future::Future, sync::Arc, time::Duration};

use uuid::Uuid;

pub use assignment::AssignmentEngine;
pub use catalog::ExamCatalog;
pub use error::{EngineError, ErrorKind};
pub use evaluation::EvaluationBuilder;
pub use lifecycle::SessionLifecycle;
pub use principals::PrincipalDirectory;
pub use sets::SetGenerator;

use crate::{
    models::exam::Exam,
    scorer::Scorer,
    store::{ExamStore, StoreError},
};

/// Store client shared by the engine components.
#[derive(Clone)]
pub struct StoreHandle {
    store: Arc<dyn ExamStore>,
    timeout: Duration,
}

impl StoreHandle {
    pub fn new(store: Arc<dyn ExamStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub fn store(&self) -> &dyn ExamStore {
        self.store.as_ref()
    }

    /// Awaits a store call, failing with `StoreError::Timeout` past the deadline.
    pub async fn bounded<T, F>(&self, fut: F) -> Result<T, EngineError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(EngineError::from),
            Err(_) => {
                tracing::error!("Storage call exceeded {:?}", self.timeout);
                Err(StoreError::Timeout(self.timeout).into())
            }
        }
    }

    /// Loads an exam and checks that `teacher_id` owns it.
    pub async fn owned_exam(&self, teacher_id: Uuid, exam_id: Uuid) -> Result<Exam, EngineError> {
        let exam = self
            .bounded(self.store().find_exam(exam_id))
            .await?
            .ok_or(EngineError::ExamNotFound(exam_id))?;

        if exam.teacher_id != teacher_id {
            return Err(EngineError::NotOwner(exam_id));
        }
        Ok(exam)
    }
}

/// Returns true if the error is a uniqueness conflict reported by the store.
pub(crate) fn is_conflict(err: &EngineError) -> bool {
    matches!(err, EngineError::Persistence(StoreError::Conflict(_)))
}

/// All engine components, wired to one store.
#[derive(Clone)]
pub struct Engine {
    pub principals: PrincipalDirectory,
    pub catalog: ExamCatalog,
    pub sets: SetGenerator,
    pub assignment: AssignmentEngine,
    pub lifecycle: SessionLifecycle,
    pub evaluations: EvaluationBuilder,
}

impl Engine {
    pub fn new(
        store: Arc<dyn ExamStore>,
        scorer: Option<Arc<dyn Scorer>>,
        timeout: Duration,
    ) -> Self {
        let db = StoreHandle::new(store, timeout);
        Self {
            principals: PrincipalDirectory::new(db.clone()),
            catalog: ExamCatalog::new(db.clone()),
            sets: SetGenerator::new(db.clone()),
            assignment: AssignmentEngine::new(db.clone()),
            lifecycle: SessionLifecycle::new(db.clone(), scorer),
            evaluations: EvaluationBuilder::new(db),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::{sync::Arc, time::Duration};

    use uuid::Uuid;

    use super::Engine;
    use crate::{
        models::{
            exam::{Exam, ExamDraft, ExamType, Level, Question},
            question_set::GenerateSetsRequest,
            user::{Principal, Role},
        },
        scorer::Scorer,
        store::{ExamStore, MemoryStore},
    };

    pub fn question(text: &str, level: Level) -> Question {
        Question {
            question: text.to_string(),
            types: vec!["text".to_string()],
            level,
        }
    }

    /// A bank with `easy`, `medium` and `hard` uniquely named questions.
    pub fn bank(easy: usize, medium: usize, hard: usize) -> Vec<Question> {
        let mut questions = Vec::new();
        for i in 0..easy {
            questions.push(question(&format!("easy {i}"), Level::Easy));
        }
        for i in 0..medium {
            questions.push(question(&format!("medium {i}"), Level::Medium));
        }
        for i in 0..hard {
            questions.push(question(&format!("hard {i}"), Level::Hard));
        }
        questions
    }

    pub struct Harness {
        pub store: Arc<MemoryStore>,
        pub engine: Engine,
        pub teacher: Principal,
    }

    impl Harness {
        pub async fn new() -> Self {
            Self::with_scorer(None).await
        }

        pub async fn with_scorer(scorer: Option<Arc<dyn Scorer>>) -> Self {
            let store = Arc::new(MemoryStore::new());
            let engine = Engine::new(store.clone(), scorer, Duration::from_secs(5));
            let teacher = store
                .upsert_principal("prof@example.edu", "Prof", Role::Teacher)
                .await
                .unwrap();
            Self {
                store,
                engine,
                teacher,
            }
        }

        pub async fn student(&self, n: usize) -> Principal {
            self.store
                .upsert_principal(
                    &format!("s{n}@students.example.edu"),
                    &format!("Student {n}"),
                    Role::Student,
                )
                .await
                .unwrap()
        }

        pub async fn exam(&self, exam_type: ExamType, questions: Vec<Question>) -> Exam {
            self.engine
                .catalog
                .create_exam(
                    self.teacher.id,
                    ExamDraft {
                        exam_name: "Web Basics".to_string(),
                        exam_type,
                        available_dates: vec![],
                        duration: 60,
                        questions,
                    },
                )
                .await
                .unwrap()
        }

        /// An exam from the `bank(5, 3, 2)` bank with two (1, 1, 2) sets.
        pub async fn exam_with_sets(&self, exam_type: ExamType) -> Exam {
            let exam = self.exam(exam_type, bank(5, 3, 2)).await;
            self.engine
                .sets
                .generate(
                    self.teacher.id,
                    exam.id,
                    &GenerateSetsRequest {
                        num_sets: 2,
                        hard: 1,
                        medium: 1,
                        easy: 2,
                    },
                )
                .await
                .unwrap();
            exam
        }

        pub fn stranger(&self) -> Uuid {
            Uuid::new_v4()
        }
    }
}
