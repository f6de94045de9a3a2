//! Quiz play and scoring
//!
//! Served options keep their original index, so shuffling the display
//! order never changes how an answer is scored.

use mta_common::LocalizedText;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::db::quizzes::{Question, Quiz, ReviewItem};
use crate::error::ApiError;

/// In-place Fisher-Yates shuffle
pub fn fisher_yates<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.gen_range(0..=i);
        items.swap(i, j);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayOption {
    /// Position in the stored option list; submit this as `option_index`
    pub index: usize,
    pub text: LocalizedText,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayQuestion {
    pub id: String,
    pub prompt: LocalizedText,
    pub options: Vec<PlayOption>,
}

/// A quiz as served to a student: no answers, no explanations
#[derive(Debug, Clone, Serialize)]
pub struct PlayView {
    pub quiz_id: String,
    pub title: LocalizedText,
    pub description: LocalizedText,
    pub pass_percent: u8,
    pub questions: Vec<PlayQuestion>,
}

pub fn play_view<R: Rng + ?Sized>(quiz: &Quiz, questions: &[Question], rng: &mut R) -> PlayView {
    let mut served: Vec<PlayQuestion> = questions
        .iter()
        .map(|q| {
            let mut options: Vec<PlayOption> = q
                .options
                .iter()
                .enumerate()
                .map(|(index, text)| PlayOption {
                    index,
                    text: text.clone(),
                })
                .collect();
            if quiz.shuffle_options {
                fisher_yates(&mut options, rng);
            }
            PlayQuestion {
                id: q.id.clone(),
                prompt: q.prompt.clone(),
                options,
            }
        })
        .collect();

    if quiz.shuffle_questions {
        fisher_yates(&mut served, rng);
    }

    PlayView {
        quiz_id: quiz.id.clone(),
        title: quiz.title.clone(),
        description: quiz.description.clone(),
        pass_percent: quiz.pass_percent,
        questions: served,
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Answer {
    pub question_id: String,
    pub option_index: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScoreError {
    #[error("Quiz has no questions")]
    EmptyQuiz,

    #[error("Unknown question: {0}")]
    UnknownQuestion(String),

    #[error("Option {index} out of range for question {question_id}")]
    OptionOutOfRange { question_id: String, index: usize },
}

impl From<ScoreError> for ApiError {
    fn from(e: ScoreError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Score {
    pub correct: u32,
    pub total: u32,
    pub percent: u8,
    pub passed: bool,
    pub review: Vec<ReviewItem>,
}

/// Percentage rounded half up
pub fn percent(correct: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    ((200 * correct + total) / (2 * total)).min(100) as u8
}

/// Score submitted answers against the stored questions
///
/// The first answer to a question counts; unanswered questions are wrong.
pub fn score(questions: &[Question], answers: &[Answer], pass_percent: u8) -> Result<Score, ScoreError> {
    if questions.is_empty() {
        return Err(ScoreError::EmptyQuiz);
    }

    let by_id: HashMap<&str, &Question> = questions.iter().map(|q| (q.id.as_str(), q)).collect();
    let mut selected: HashMap<&str, usize> = HashMap::new();

    for answer in answers {
        let question = by_id
            .get(answer.question_id.as_str())
            .ok_or_else(|| ScoreError::UnknownQuestion(answer.question_id.clone()))?;
        if answer.option_index >= question.options.len() {
            return Err(ScoreError::OptionOutOfRange {
                question_id: answer.question_id.clone(),
                index: answer.option_index,
            });
        }
        selected.entry(question.id.as_str()).or_insert(answer.option_index);
    }

    let review: Vec<ReviewItem> = questions
        .iter()
        .map(|q| {
            let choice = selected.get(q.id.as_str()).copied();
            ReviewItem {
                question_id: q.id.clone(),
                selected: choice,
                correct_index: q.correct_index,
                is_correct: choice == Some(q.correct_index),
                explanation: q.explanation.clone(),
            }
        })
        .collect();

    let total = review.len() as u32;
    let correct = review.iter().filter(|r| r.is_correct).count() as u32;
    let percent = percent(correct, total);

    Ok(Score {
        correct,
        total,
        percent,
        passed: percent >= pass_percent,
        review,
    })
}
