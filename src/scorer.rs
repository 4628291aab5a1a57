// src/scorer.rs

//! Optional external scorer. The score is additive: a failing scorer never
//! blocks a submission.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::models::session::QuestionAnswers;

/// Payload sent to the scorer.
#[derive(Debug, Serialize)]
pub struct ScoreRequest<'a> {
    pub session_id: Uuid,
    pub exam_name: &'a str,
    pub data: &'a [QuestionAnswers],
}

#[derive(Debug, Deserialize)]
struct ScoreResponse {
    score: f64,
}

#[derive(Debug, Error)]
pub enum ScorerError {
    #[error("scorer request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("scorer rejected the submission with status {status}")]
    Rejected { status: u16 },

    #[error("scorer returned a non-finite score")]
    InvalidScore,
}

#[async_trait]
pub trait Scorer: Send + Sync {
    async fn score(&self, req: &ScoreRequest<'_>) -> Result<f64, ScorerError>;
}

/// Scorer reached over HTTP: POSTs the submission as JSON and expects
/// `{"score": <number>}` back.
pub struct HttpScorer {
    endpoint: Url,
    client: reqwest::Client,
}

impl HttpScorer {
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, ScorerError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { endpoint, client })
    }
}

#[async_trait]
impl Scorer for HttpScorer {
    async fn score(&self, req: &ScoreRequest<'_>) -> Result<f64, ScorerError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(req)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScorerError::Rejected {
                status: status.as_u16(),
            });
        }

        let body: ScoreResponse = response.json().await?;
        if !body.score.is_finite() {
            return Err(ScorerError::InvalidScore);
        }
        Ok(body.score)
    }
}
