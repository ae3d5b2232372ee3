// src/models/attempt.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::question::{Answer, QuestionWithAnswers};

/// Represents the 'attempts' table in the database.
/// One scored instance of a user (or anonymous caller) completing a quiz.
/// Immutable once scoring completes.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Attempt {
    pub id: i64,
    /// NULL for anonymous attempts.
    pub user_id: Option<i64>,
    pub quiz_id: i64,
    /// Client-supplied start time; not bounds-checked.
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: chrono::DateTime<chrono::Utc>,
    pub time_spent_seconds: i64,
    pub total_score: i32,
    pub max_score: i32,
    pub percentage_score: f64,
    pub passed: bool,
}

/// Represents the 'user_answers' table in the database.
/// Created once per submitted answer during grading, never mutated.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserAnswer {
    pub id: i64,
    pub attempt_id: i64,
    pub question_id: i64,
    /// Selected answer for choice types.
    pub answer_id: Option<i64>,
    /// Free text for fill-in-blank questions.
    pub text_answer: Option<String>,
    pub is_correct: bool,
    pub points_earned: i32,
}

/// One submitted answer: a selected answer id for choice types, or free
/// text for fill-in-blank.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmittedAnswer {
    pub question_id: i64,
    pub answer_id: Option<i64>,
    pub text_answer: Option<String>,
}

/// DTO for submitting an attempt. `started_at` and `answers` are optional
/// here so their absence maps to a 400 instead of a deserialization reject;
/// an empty answers array is valid and simply scores zero.
#[derive(Debug, Deserialize)]
pub struct SubmitAttemptRequest {
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub answers: Option<Vec<SubmittedAnswer>>,
}

/// Question joined into an attempt review, including correctness and
/// explanations (the attempt is complete, so nothing is hidden anymore).
#[derive(Debug, Serialize)]
pub struct ReviewQuestion {
    pub id: i64,
    #[serde(rename = "type")]
    pub question_type: String,
    pub text: String,
    pub points: i32,
    pub explanation: Option<String>,
    pub answers: Vec<Answer>,
}

impl From<QuestionWithAnswers> for ReviewQuestion {
    fn from(entry: QuestionWithAnswers) -> Self {
        ReviewQuestion {
            id: entry.question.id,
            question_type: entry.question.question_type,
            text: entry.question.text,
            points: entry.question.points,
            explanation: entry.question.explanation,
            answers: entry.answers,
        }
    }
}

/// A persisted user answer joined with its question for client-side review.
#[derive(Debug, Serialize)]
pub struct UserAnswerReview {
    pub id: i64,
    pub question_id: i64,
    pub answer_id: Option<i64>,
    pub text_answer: Option<String>,
    pub is_correct: bool,
    pub points_earned: i32,
    pub question: Option<ReviewQuestion>,
}

/// Full attempt response: the attempt, its reviewed answers, and whether the
/// caller should be offered account creation to keep the result.
#[derive(Debug, Serialize)]
pub struct AttemptResult {
    pub attempt: Attempt,
    pub answers: Vec<UserAnswerReview>,
    pub requires_login: bool,
}
