// src/models/enrollment.rs

//! Per-principal indexes over exam ownership and session assignment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One (exam, set, session) triple recorded for a student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentEnrollment {
    pub student_id: Uuid,
    pub exam_id: Uuid,
    #[serde(rename = "question_paper_id")]
    pub set_id: Uuid,
    #[serde(rename = "answer_sheet_id")]
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// An exam owned by a teacher, with the evaluations registered under it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeacherExamEntry {
    pub exam_id: Uuid,
    pub evaluation_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeacherEnrollment {
    pub teacher_id: Uuid,
    pub exams: Vec<TeacherExamEntry>,
}

impl TeacherEnrollment {
    pub fn owns(&self, exam_id: Uuid) -> bool {
        self.exams.iter().any(|e| e.exam_id == exam_id)
    }

    pub fn exam_ids(&self) -> Vec<Uuid> {
        self.exams.iter().map(|e| e.exam_id).collect()
    }

    /// Records an (exam, evaluation) row, keeping entries grouped per exam.
    pub fn push(&mut self, exam_id: Uuid, evaluation_id: Option<Uuid>) {
        let idx = match self.exams.iter().position(|e| e.exam_id == exam_id) {
            Some(idx) => idx,
            None => {
                self.exams.push(TeacherExamEntry {
                    exam_id,
                    evaluation_ids: Vec::new(),
                });
                self.exams.len() - 1
            }
        };
        if let Some(evaluation_id) = evaluation_id {
            self.exams[idx].evaluation_ids.push(evaluation_id);
        }
    }
}
