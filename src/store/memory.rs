// src/store/memory.rs

//! In-process store with the same guarantees as the Postgres backend.
//! Each call runs under one lock, so multi-record writes are atomic.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    models::{
        enrollment::{StudentEnrollment, TeacherEnrollment},
        evaluation::{Evaluation, EvaluationEntry},
        exam::Exam,
        question_set::QuestionPaperSet,
        session::{QuestionAnswers, Session, SessionStatus},
        user::{Principal, Role},
    },
    store::{ExamStore, StoreError},
};

#[derive(Default)]
struct Inner {
    principals: HashMap<Uuid, Principal>,
    exams: HashMap<Uuid, Exam>,
    sets: HashMap<Uuid, QuestionPaperSet>,
    sessions: HashMap<Uuid, Session>,
    evaluations: HashMap<Uuid, Evaluation>,
    student_enrollments: Vec<StudentEnrollment>,
    teacher_enrollments: HashMap<Uuid, TeacherEnrollment>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted_by_creation<T, F>(mut items: Vec<T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> DateTime<Utc>,
{
    items.sort_by_key(|item| key(item));
    items
}

#[async_trait]
impl ExamStore for MemoryStore {
    async fn upsert_principal(
        &self,
        email: &str,
        name: &str,
        role: Role,
    ) -> Result<Principal, StoreError> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();

        if let Some(existing) = inner.principals.values_mut().find(|p| p.email == email) {
            existing.name = name.to_string();
            existing.role = role;
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let principal = Principal {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: name.to_string(),
            role,
            created_at: now,
            updated_at: now,
        };
        inner.principals.insert(principal.id, principal.clone());
        Ok(principal)
    }

    async fn find_principal(&self, id: Uuid) -> Result<Option<Principal>, StoreError> {
        Ok(self.inner.lock().await.principals.get(&id).cloned())
    }

    async fn insert_exam(&self, exam: &Exam) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.exams.contains_key(&exam.id) {
            return Err(StoreError::Conflict(format!("exam {} already exists", exam.id)));
        }
        inner.exams.insert(exam.id, exam.clone());
        inner
            .teacher_enrollments
            .entry(exam.teacher_id)
            .or_insert_with(|| TeacherEnrollment {
                teacher_id: exam.teacher_id,
                exams: Vec::new(),
            })
            .push(exam.id, None);
        Ok(())
    }

    async fn update_exam(&self, exam: &Exam) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        match inner.exams.get_mut(&exam.id) {
            Some(stored) => {
                stored.exam_name = exam.exam_name.clone();
                stored.exam_type = exam.exam_type;
                stored.available_dates = exam.available_dates.clone();
                stored.duration = exam.duration;
                stored.questions = exam.questions.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_exam(&self, id: Uuid) -> Result<Option<Exam>, StoreError> {
        Ok(self.inner.lock().await.exams.get(&id).cloned())
    }

    async fn find_exams(&self, ids: &[Uuid]) -> Result<Vec<Exam>, StoreError> {
        let inner = self.inner.lock().await;
        let exams = ids
            .iter()
            .filter_map(|id| inner.exams.get(id).cloned())
            .collect();
        Ok(sorted_by_creation(exams, |e: &Exam| e.created_at))
    }

    async fn list_exams_available_on(&self, day: NaiveDate) -> Result<Vec<Exam>, StoreError> {
        let inner = self.inner.lock().await;
        let exams = inner
            .exams
            .values()
            .filter(|e| e.is_available_on(day))
            .cloned()
            .collect();
        Ok(sorted_by_creation(exams, |e: &Exam| e.created_at))
    }

    async fn teacher_enrollment(&self, teacher_id: Uuid) -> Result<TeacherEnrollment, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .teacher_enrollments
            .get(&teacher_id)
            .cloned()
            .unwrap_or_else(|| TeacherEnrollment {
                teacher_id,
                exams: Vec::new(),
            }))
    }

    async fn replace_sets(
        &self,
        exam_id: Uuid,
        generation: i32,
        sets: &[QuestionPaperSet],
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let exam = inner
            .exams
            .get_mut(&exam_id)
            .ok_or_else(|| StoreError::Conflict(format!("exam {exam_id} vanished")))?;

        if exam.set_generation != generation - 1 {
            return Err(StoreError::Conflict(format!(
                "exam {exam_id} sets were regenerated concurrently"
            )));
        }

        exam.set_generation = generation;
        exam.set_ids = sets.iter().map(|s| s.id).collect();
        for set in sets {
            inner.sets.insert(set.id, set.clone());
        }
        Ok(())
    }

    async fn find_set(&self, id: Uuid) -> Result<Option<QuestionPaperSet>, StoreError> {
        Ok(self.inner.lock().await.sets.get(&id).cloned())
    }

    async fn list_sets(&self, exam_id: Uuid) -> Result<Vec<QuestionPaperSet>, StoreError> {
        let inner = self.inner.lock().await;
        let Some(exam) = inner.exams.get(&exam_id) else {
            return Ok(Vec::new());
        };
        let mut sets: Vec<QuestionPaperSet> = exam
            .set_ids
            .iter()
            .filter_map(|id| inner.sets.get(id).cloned())
            .collect();
        sets.sort_by_key(|s| s.set_number);
        Ok(sets)
    }

    async fn latest_enrollment(
        &self,
        student_id: Uuid,
        exam_id: Uuid,
    ) -> Result<Option<StudentEnrollment>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .student_enrollments
            .iter()
            .rev()
            .find(|e| e.student_id == student_id && e.exam_id == exam_id)
            .cloned())
    }

    async fn insert_session(&self, session: &Session) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;

        let already_active = inner.sessions.values().any(|s| {
            s.student_id == session.student_id && s.exam_id == session.exam_id && !s.submitted
        });
        if already_active {
            return Err(StoreError::Conflict(format!(
                "student {} already has an active session for exam {}",
                session.student_id, session.exam_id
            )));
        }

        let exam = inner
            .exams
            .get_mut(&session.exam_id)
            .ok_or_else(|| StoreError::Conflict(format!("exam {} vanished", session.exam_id)))?;
        exam.session_ids.push(session.id);

        inner.sessions.insert(session.id, session.clone());
        inner.student_enrollments.push(StudentEnrollment {
            student_id: session.student_id,
            exam_id: session.exam_id,
            set_id: session.set_id,
            session_id: session.id,
            created_at: session.created_at,
        });
        Ok(())
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<Session>, StoreError> {
        Ok(self.inner.lock().await.sessions.get(&id).cloned())
    }

    async fn find_active_session(
        &self,
        student_id: Uuid,
        exam_id: Uuid,
    ) -> Result<Option<Session>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .sessions
            .values()
            .find(|s| s.student_id == student_id && s.exam_id == exam_id && !s.submitted)
            .cloned())
    }

    async fn list_sessions_by_exam(&self, exam_id: Uuid) -> Result<Vec<Session>, StoreError> {
        let inner = self.inner.lock().await;
        let sessions = inner
            .sessions
            .values()
            .filter(|s| s.exam_id == exam_id)
            .cloned()
            .collect();
        Ok(sorted_by_creation(sessions, |s: &Session| s.created_at))
    }

    async fn list_sessions_by_student(
        &self,
        student_id: Uuid,
    ) -> Result<Vec<Session>, StoreError> {
        let inner = self.inner.lock().await;
        let sessions = inner
            .sessions
            .values()
            .filter(|s| s.student_id == student_id)
            .cloned()
            .collect();
        Ok(sorted_by_creation(sessions, |s: &Session| s.created_at))
    }

    async fn mark_started(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        match inner.sessions.get_mut(&id) {
            Some(s) if s.status == SessionStatus::DidNotStart => {
                s.status = SessionStatus::Started;
                s.started_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_submission(
        &self,
        id: Uuid,
        expected: SessionStatus,
        data: &[QuestionAnswers],
        ai_score: Option<f64>,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        match inner.sessions.get_mut(&id) {
            Some(s) if s.status == expected && !s.submitted => {
                s.status = SessionStatus::Ended;
                s.submitted = true;
                s.data = data.to_vec();
                s.ai_score = ai_score;
                s.submitted_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_evaluation(&self, evaluation: &Evaluation) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;

        if inner
            .evaluations
            .values()
            .any(|e| e.session_id == evaluation.session_id)
        {
            return Err(StoreError::Conflict(format!(
                "session {} already has an evaluation",
                evaluation.session_id
            )));
        }

        inner.evaluations.insert(evaluation.id, evaluation.clone());
        inner
            .teacher_enrollments
            .entry(evaluation.teacher_id)
            .or_insert_with(|| TeacherEnrollment {
                teacher_id: evaluation.teacher_id,
                exams: Vec::new(),
            })
            .push(evaluation.exam_id, Some(evaluation.id));
        Ok(())
    }

    async fn find_evaluation(&self, id: Uuid) -> Result<Option<Evaluation>, StoreError> {
        Ok(self.inner.lock().await.evaluations.get(&id).cloned())
    }

    async fn find_evaluation_by_session(
        &self,
        session_id: Uuid,
    ) -> Result<Option<Evaluation>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .evaluations
            .values()
            .find(|e| e.session_id == session_id)
            .cloned())
    }

    async fn replace_grading(
        &self,
        id: Uuid,
        data: &[EvaluationEntry],
        total_marks: i32,
        evaluated: bool,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        match inner.evaluations.get_mut(&id) {
            Some(e) => {
                e.data = data.to_vec();
                e.total_marks = total_marks;
                e.evaluated = evaluated;
                e.updated_at = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_evaluated(&self, exam_id: Uuid) -> Result<Vec<Evaluation>, StoreError> {
        let inner = self.inner.lock().await;
        let evaluations = inner
            .evaluations
            .values()
            .filter(|e| e.exam_id == exam_id && e.evaluated)
            .cloned()
            .collect();
        Ok(sorted_by_creation(evaluations, |e: &Evaluation| e.created_at))
    }
}
