// src/engine/error.rs

use thiserror::Error;
use uuid::Uuid;

use crate::{models::exam::Level, store::StoreError};

/// Coarse failure class, used by callers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input. Nothing was mutated.
    Validation,
    /// A referenced record does not exist.
    NotFound,
    /// The request is well-formed but illegal in the current state.
    StateConflict,
    /// The caller does not own the record.
    Forbidden,
    /// Storage failed or timed out. Safe to retry after re-reading.
    Persistence,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("exam {0} not found")]
    ExamNotFound(Uuid),

    #[error("session {0} not found")]
    SessionNotFound(Uuid),

    #[error("question paper set {0} not found")]
    SetNotFound(Uuid),

    #[error("evaluation {0} not found")]
    EvaluationNotFound(Uuid),

    #[error("no student record for principal {0}")]
    StudentContainerNotFound(Uuid),

    #[error("exam {0} has no question paper sets; generate them first")]
    NoSetsConfigured(Uuid),

    #[error("not enough {level} questions: requested {requested}, bank has {available}")]
    InsufficientQuestions {
        level: Level,
        requested: usize,
        available: usize,
    },

    #[error("session has not been started")]
    NotStarted,

    #[error("session has already been submitted")]
    AlreadySubmitted,

    #[error("session {0} has not been submitted yet")]
    NotSubmitted(Uuid),

    #[error("sets of exam {0} changed concurrently; retry")]
    SetsChanged(Uuid),

    #[error("exam {0} belongs to another teacher")]
    NotOwner(Uuid),

    #[error(transparent)]
    Persistence(#[from] StoreError),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation(_) => ErrorKind::Validation,
            EngineError::ExamNotFound(_)
            | EngineError::SessionNotFound(_)
            | EngineError::SetNotFound(_)
            | EngineError::EvaluationNotFound(_)
            | EngineError::StudentContainerNotFound(_) => ErrorKind::NotFound,
            EngineError::NoSetsConfigured(_)
            | EngineError::InsufficientQuestions { .. }
            | EngineError::NotStarted
            | EngineError::AlreadySubmitted
            | EngineError::NotSubmitted(_)
            | EngineError::SetsChanged(_) => ErrorKind::StateConflict,
            EngineError::NotOwner(_) => ErrorKind::Forbidden,
            EngineError::Persistence(_) => ErrorKind::Persistence,
        }
    }
}

impl From<validator::ValidationErrors> for EngineError {
    fn from(errors: validator::ValidationErrors) -> Self {
        EngineError::Validation(errors.to_string())
    }
}
