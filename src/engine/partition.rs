// src/engine/partition.rs

//! Difficulty partitioning of a question bank.

use rand::{
    Rng,
    seq::{IndexedRandom, SliceRandom},
};

use crate::{
    engine::EngineError,
    models::exam::{Level, Question},
};

/// Requested number of questions per difficulty in one set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Composition {
    pub hard: usize,
    pub medium: usize,
    pub easy: usize,
}

impl Composition {
    pub fn total(&self) -> usize {
        self.hard + self.medium + self.easy
    }
}

/// A bank split by level, borrowed from the exam.
#[derive(Debug, Default)]
pub struct QuestionBuckets<'a> {
    pub hard: Vec<&'a Question>,
    pub medium: Vec<&'a Question>,
    pub easy: Vec<&'a Question>,
}

impl<'a> QuestionBuckets<'a> {
    fn bucket(&self, level: Level) -> &[&'a Question] {
        match level {
            Level::Hard => &self.hard,
            Level::Medium => &self.medium,
            Level::Easy => &self.easy,
        }
    }

    /// Draws one set: `hard`, then `medium`, then `easy` questions, each
    /// sampled without replacement from the full bucket.
    pub fn draw<R>(&self, composition: &Composition, rng: &mut R) -> Vec<Question>
    where
        R: Rng + ?Sized,
    {
        let mut paper = Vec::with_capacity(composition.total());
        for (level, count) in [
            (Level::Hard, composition.hard),
            (Level::Medium, composition.medium),
            (Level::Easy, composition.easy),
        ] {
            let mut picked: Vec<&Question> =
                self.bucket(level).choose_multiple(rng, count).copied().collect();
            picked.shuffle(rng);
            paper.extend(picked.into_iter().cloned());
        }
        paper
    }
}

/// Splits `questions` by level and checks that `composition` can be drawn.
pub fn partition<'a>(
    questions: &'a [Question],
    composition: &Composition,
) -> Result<QuestionBuckets<'a>, EngineError> {
    let mut buckets = QuestionBuckets::default();
    for q in questions {
        match q.level {
            Level::Hard => buckets.hard.push(q),
            Level::Medium => buckets.medium.push(q),
            Level::Easy => buckets.easy.push(q),
        }
    }

    for (level, requested) in [
        (Level::Hard, composition.hard),
        (Level::Medium, composition.medium),
        (Level::Easy, composition.easy),
    ] {
        let available = buckets.bucket(level).len();
        if available < requested {
            return Err(EngineError::InsufficientQuestions {
                level,
                requested,
                available,
            });
        }
    }

    Ok(buckets)
}
