// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use validator::Validate;

/// The four supported question types. Stored as plain text in the database;
/// grading only distinguishes `fill_blank` from the choice types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionType {
    SingleChoice,
    MultipleChoice,
    TrueFalse,
    FillBlank,
}

impl QuestionType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "single_choice" => Some(Self::SingleChoice),
            "multiple_choice" => Some(Self::MultipleChoice),
            "true_false" => Some(Self::TrueFalse),
            "fill_blank" => Some(Self::FillBlank),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SingleChoice => "single_choice",
            Self::MultipleChoice => "multiple_choice",
            Self::TrueFalse => "true_false",
            Self::FillBlank => "fill_blank",
        }
    }
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    pub quiz_id: i64,

    /// The text content of the question.
    pub text: String,

    /// One of 'single_choice', 'multiple_choice', 'true_false', 'fill_blank'.
    #[serde(rename = "type")]
    pub question_type: String,

    /// Point value awarded when answered correctly. Always positive.
    pub points: i32,

    /// Explanation shown during attempt review, never in the quiz view.
    pub explanation: Option<String>,

    /// Stable ordinal for canonical (non-randomized) ordering.
    pub position: i32,
}

/// Represents the 'answers' table in the database.
/// For fill-in-blank questions, rows marked correct are the acceptable
/// text matches rather than selectable options.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Answer {
    pub id: i64,
    pub question_id: i64,
    pub text: String,
    pub is_correct: bool,
    pub explanation: Option<String>,
}

/// A question together with its answers, in canonical order.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionWithAnswers {
    #[serde(flatten)]
    pub question: Question,
    pub answers: Vec<Answer>,
}

/// Answer option as exposed in a quiz view (correctness stripped).
#[derive(Debug, Serialize)]
pub struct PublicAnswer {
    pub id: i64,
    pub text: String,
}

/// Question as exposed in a quiz view (no correctness flags, no explanation).
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    #[serde(rename = "type")]
    pub question_type: String,
    pub text: String,
    pub points: i32,
    pub position: i32,
    pub answers: Vec<PublicAnswer>,
}

impl From<QuestionWithAnswers> for PublicQuestion {
    fn from(entry: QuestionWithAnswers) -> Self {
        PublicQuestion {
            id: entry.question.id,
            question_type: entry.question.question_type,
            text: entry.question.text,
            points: entry.question.points,
            position: entry.question.position,
            answers: entry
                .answers
                .into_iter()
                .map(|a| PublicAnswer {
                    id: a.id,
                    text: a.text,
                })
                .collect(),
        }
    }
}

/// DTO for creating an answer inside a question tree.
/// `is_correct` is mandatory; a payload omitting it is rejected as a whole.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateAnswerRequest {
    #[validate(length(min = 1, max = 1000))]
    pub text: String,
    pub is_correct: bool,
    #[validate(length(max = 2000))]
    pub explanation: Option<String>,
}

/// DTO for creating a question (standalone or inside a quiz tree).
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 2000))]
    pub text: String,
    #[validate(custom(function = validate_question_type))]
    #[serde(rename = "type")]
    pub question_type: String,
    #[validate(range(min = 1))]
    pub points: Option<i32>,
    #[validate(length(max = 2000))]
    pub explanation: Option<String>,
    #[validate(length(min = 1, message = "A question needs at least one answer."), nested)]
    pub answers: Vec<CreateAnswerRequest>,
}

/// DTO for updating a question. Fields are optional; answers are managed
/// through their own operations.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuestionRequest {
    #[validate(length(min = 1, max = 2000))]
    pub text: Option<String>,
    #[validate(custom(function = validate_question_type))]
    #[serde(rename = "type")]
    pub question_type: Option<String>,
    #[validate(range(min = 1))]
    pub points: Option<i32>,
    #[validate(length(max = 2000))]
    pub explanation: Option<String>,
}

fn validate_question_type(question_type: &str) -> Result<(), validator::ValidationError> {
    if QuestionType::parse(question_type).is_none() {
        return Err(validator::ValidationError::new("unknown_question_type"));
    }
    Ok(())
}
