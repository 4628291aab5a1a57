// src/engine/lifecycle.rs

//! Session state machine.
//!
//! ```text
//! didnotstart --start--> started --submit--> ended
//! internal ---------------------submit-----> ended
//! ```

use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::{
    engine::{EngineError, StoreHandle},
    models::session::{
        QuestionAnswers, Session, SessionStatus, SubmitRequest, SubmittedAnswer, TypedAnswer,
    },
    scorer::{ScoreRequest, Scorer},
};

/// Copies incoming answers into the skeleton by (question text, answer type).
///
/// Unmatched incoming answers are dropped and unmatched slots keep their
/// current value, so the skeleton's ordering always wins. When the payload
/// repeats a slot, the last occurrence is kept.
pub fn merge_answers(
    skeleton: &[QuestionAnswers],
    incoming: &[SubmittedAnswer],
) -> Vec<QuestionAnswers> {
    let by_slot: HashMap<(&str, &str), &str> = incoming
        .iter()
        .map(|a| ((a.question.as_str(), a.answer_type.as_str()), a.answer.as_str()))
        .collect();

    skeleton
        .iter()
        .map(|qa| QuestionAnswers {
            question: qa.question.clone(),
            answers: qa
                .answers
                .iter()
                .map(|slot| TypedAnswer {
                    answer_type: slot.answer_type.clone(),
                    ans: by_slot
                        .get(&(qa.question.as_str(), slot.answer_type.as_str()))
                        .map(|a| a.to_string())
                        .unwrap_or_else(|| slot.ans.clone()),
                })
                .collect(),
        })
        .collect()
}

#[derive(Clone)]
pub struct SessionLifecycle {
    db: StoreHandle,
    scorer: Option<Arc<dyn Scorer>>,
}

impl SessionLifecycle {
    pub fn new(db: StoreHandle, scorer: Option<Arc<dyn Scorer>>) -> Self {
        Self { db, scorer }
    }

    /// Loads a session owned by `student_id`. Other students' sessions are
    /// reported as missing.
    pub async fn get_session(
        &self,
        student_id: Uuid,
        session_id: Uuid,
    ) -> Result<Session, EngineError> {
        self.db
            .bounded(self.db.store().find_session(session_id))
            .await?
            .filter(|s| s.student_id == student_id)
            .ok_or(EngineError::SessionNotFound(session_id))
    }

    pub async fn list_sessions(&self, student_id: Uuid) -> Result<Vec<Session>, EngineError> {
        self.db
            .bounded(self.db.store().list_sessions_by_student(student_id))
            .await
    }

    /// `didnotstart -> started`. Already started and internal sessions are
    /// returned unchanged.
    #[instrument(skip(self))]
    pub async fn start(&self, student_id: Uuid, session_id: Uuid) -> Result<Session, EngineError> {
        let session = self.get_session(student_id, session_id).await?;

        match session.status {
            SessionStatus::Started | SessionStatus::Internal => {
                tracing::debug!("Session {} already open ({})", session_id, session.status);
                Ok(session)
            }
            SessionStatus::Ended => Err(EngineError::AlreadySubmitted),
            SessionStatus::DidNotStart => {
                let now = Utc::now();
                if self
                    .db
                    .bounded(self.db.store().mark_started(session_id, now))
                    .await?
                {
                    tracing::info!("Session {} started", session_id);
                    return Ok(Session {
                        status: SessionStatus::Started,
                        started_at: Some(now),
                        ..session
                    });
                }

                // Someone else moved it first.
                let current = self.get_session(student_id, session_id).await?;
                match current.status {
                    SessionStatus::Ended => Err(EngineError::AlreadySubmitted),
                    _ => Ok(current),
                }
            }
        }
    }

    /// Merges the answers, attaches a score and ends the session.
    ///
    /// Legal from `started` or `internal` only. Scorer failures are logged
    /// and never block the submission.
    #[instrument(skip(self, req), fields(answers = req.answers.len()))]
    pub async fn submit(
        &self,
        student_id: Uuid,
        session_id: Uuid,
        req: SubmitRequest,
    ) -> Result<Session, EngineError> {
        req.validate()?;
        if req.ai_score.is_some_and(|score| !score.is_finite()) {
            return Err(EngineError::Validation("ai_score must be a finite number".to_string()));
        }

        let session = self.get_session(student_id, session_id).await?;
        if session.submitted || session.status == SessionStatus::Ended {
            return Err(EngineError::AlreadySubmitted);
        }
        if !session.status.accepts_submission() {
            return Err(EngineError::NotStarted);
        }

        let data = merge_answers(&session.data, &req.answers);
        let ai_score = match req.ai_score {
            Some(score) => Some(score),
            None => self.external_score(&session, &data).await,
        };

        let now = Utc::now();
        let recorded = self
            .db
            .bounded(self.db.store().record_submission(
                session_id,
                session.status,
                &data,
                ai_score,
                now,
            ))
            .await?;

        if !recorded {
            let current = self.get_session(student_id, session_id).await?;
            return Err(if current.submitted {
                EngineError::AlreadySubmitted
            } else {
                EngineError::NotStarted
            });
        }

        tracing::info!("Session {} submitted", session_id);
        Ok(Session {
            data,
            status: SessionStatus::Ended,
            submitted: true,
            ai_score,
            submitted_at: Some(now),
            ..session
        })
    }

    async fn external_score(&self, session: &Session, data: &[QuestionAnswers]) -> Option<f64> {
        let scorer = self.scorer.as_ref()?;
        let req = ScoreRequest {
            session_id: session.id,
            exam_name: &session.exam_name,
            data,
        };
        match scorer.score(&req).await {
            Ok(score) => Some(score),
            Err(e) => {
                tracing::warn!("Scoring session {} failed: {}", session.id, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::{
        engine::{
            ErrorKind,
            fixtures::{Harness, question},
        },
        models::exam::{ExamType, Level},
        scorer::ScorerError,
        store::ExamStore,
    };

    fn answer(question: &str, answer_type: &str, answer: &str) -> SubmittedAnswer {
        SubmittedAnswer {
            question: question.to_string(),
            answer_type: answer_type.to_string(),
            answer: answer.to_string(),
        }
    }

    fn skeleton(questions: &[&str]) -> Vec<QuestionAnswers> {
        questions
            .iter()
            .map(|q| QuestionAnswers {
                question: q.to_string(),
                answers: vec![TypedAnswer {
                    answer_type: "text".to_string(),
                    ans: String::new(),
                }],
            })
            .collect()
    }

    #[test]
    fn test_merge_keeps_skeleton_order_and_drops_strays() {
        let merged = merge_answers(
            &skeleton(&["Q1", "Q2"]),
            &[
                answer("Q9", "text", "stray"),
                answer("Q2", "css", "wrong type"),
                answer("Q1", "text", "first"),
            ],
        );

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].question, "Q1");
        assert_eq!(merged[0].answers[0].ans, "first");
        assert_eq!(merged[1].question, "Q2");
        assert_eq!(merged[1].answers[0].ans, "");
    }

    #[test]
    fn test_merge_last_duplicate_wins() {
        let merged = merge_answers(
            &skeleton(&["Q1"]),
            &[answer("Q1", "text", "a"), answer("Q1", "text", "b")],
        );
        assert_eq!(merged[0].answers[0].ans, "b");
    }

    /// Exam whose single set holds exactly Q1 and Q2, each with a "text" slot.
    async fn two_question_session(h: &Harness, exam_type: ExamType) -> Session {
        let exam = h
            .exam(
                exam_type,
                vec![question("Q1", Level::Easy), question("Q2", Level::Hard)],
            )
            .await;
        h.engine
            .sets
            .generate(
                h.teacher.id,
                exam.id,
                &crate::models::question_set::GenerateSetsRequest {
                    num_sets: 1,
                    hard: 1,
                    medium: 0,
                    easy: 1,
                },
            )
            .await
            .unwrap();
        let student = h.student(1).await;
        h.engine
            .assignment
            .assign_or_resume(student.id, exam.id)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_submit_before_start_is_rejected() {
        let h = Harness::new().await;
        let session = two_question_session(&h, ExamType::External).await;

        let err = h
            .engine
            .lifecycle
            .submit(session.student_id, session.id, SubmitRequest::default())
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::NotStarted));
        assert_eq!(err.kind(), ErrorKind::StateConflict);
        let stored = h.store.find_session(session.id).await.unwrap().unwrap();
        assert!(!stored.submitted);
        assert_eq!(stored.status, SessionStatus::DidNotStart);
    }

    #[tokio::test]
    async fn test_start_then_partial_submit() {
        let h = Harness::new().await;
        let session = two_question_session(&h, ExamType::External).await;
        let lifecycle = &h.engine.lifecycle;

        let started = lifecycle.start(session.student_id, session.id).await.unwrap();
        assert_eq!(started.status, SessionStatus::Started);
        assert!(started.started_at.is_some());

        // Starting again is benign.
        let again = lifecycle.start(session.student_id, session.id).await.unwrap();
        assert_eq!(again.status, SessionStatus::Started);

        let submitted = lifecycle
            .submit(
                session.student_id,
                session.id,
                SubmitRequest {
                    answers: vec![answer("Q1", "text", "my answer")],
                    ai_score: Some(7.5),
                },
            )
            .await
            .unwrap();

        let stored = h.store.find_session(session.id).await.unwrap().unwrap();
        for s in [&submitted, &stored] {
            assert_eq!(s.status, SessionStatus::Ended);
            assert!(s.submitted);
            assert_eq!(s.ai_score, Some(7.5));
            let q1 = s.data.iter().find(|qa| qa.question == "Q1").unwrap();
            let q2 = s.data.iter().find(|qa| qa.question == "Q2").unwrap();
            assert_eq!(q1.answers[0].ans, "my answer");
            assert_eq!(q2.answers[0].ans, "");
        }

        let err = lifecycle
            .submit(session.student_id, session.id, SubmitRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::AlreadySubmitted));

        let err = lifecycle.start(session.student_id, session.id).await.unwrap_err();
        assert!(matches!(err, EngineError::AlreadySubmitted));
    }

    #[tokio::test]
    async fn test_internal_sessions_submit_without_start() {
        let h = Harness::new().await;
        let session = two_question_session(&h, ExamType::Internal).await;
        assert_eq!(session.status, SessionStatus::Internal);

        let submitted = h
            .engine
            .lifecycle
            .submit(session.student_id, session.id, SubmitRequest::default())
            .await
            .unwrap();
        assert_eq!(submitted.status, SessionStatus::Ended);
    }

    #[tokio::test]
    async fn test_other_students_session_is_hidden() {
        let h = Harness::new().await;
        let session = two_question_session(&h, ExamType::External).await;
        let other = h.student(2).await;

        let err = h.engine.lifecycle.start(other.id, session.id).await.unwrap_err();
        assert!(matches!(err, EngineError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn test_rejects_non_finite_score() {
        let h = Harness::new().await;
        let session = two_question_session(&h, ExamType::Internal).await;

        let err = h
            .engine
            .lifecycle
            .submit(
                session.student_id,
                session.id,
                SubmitRequest {
                    answers: vec![],
                    ai_score: Some(f64::NAN),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    struct FixedScorer(Result<f64, ()>);

    #[async_trait]
    impl Scorer for FixedScorer {
        async fn score(&self, _req: &ScoreRequest<'_>) -> Result<f64, ScorerError> {
            self.0.map_err(|_| ScorerError::Rejected { status: 503 })
        }
    }

    #[tokio::test]
    async fn test_scorer_fills_missing_score() {
        let h = Harness::with_scorer(Some(Arc::new(FixedScorer(Ok(4.0))))).await;
        let session = two_question_session(&h, ExamType::Internal).await;

        let submitted = h
            .engine
            .lifecycle
            .submit(session.student_id, session.id, SubmitRequest::default())
            .await
            .unwrap();
        assert_eq!(submitted.ai_score, Some(4.0));
    }

    #[tokio::test]
    async fn test_scorer_failure_does_not_block_submission() {
        let h = Harness::with_scorer(Some(Arc::new(FixedScorer(Err(()))))).await;
        let session = two_question_session(&h, ExamType::Internal).await;

        let submitted = h
            .engine
            .lifecycle
            .submit(session.student_id, session.id, SubmitRequest::default())
            .await
            .unwrap();
        assert!(submitted.submitted);
        assert_eq!(submitted.ai_score, None);
    }
}
