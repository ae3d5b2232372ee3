// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::question::{CreateQuestionRequest, PublicQuestion};

/// Represents the 'quizzes' table in the database.
/// A row with `lesson_id = NULL` is a standalone mock test, browsable
/// independently and taggable by category/difficulty.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    pub lesson_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub time_limit_minutes: Option<i32>,
    /// Percentage threshold for passing. Absent means every attempt passes.
    pub passing_score: Option<i32>,
    pub category: Option<String>,
    pub difficulty: Option<String>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Metadata attached to every quiz view response.
#[derive(Debug, Serialize)]
pub struct QuizViewMeta {
    /// Questions available on the underlying quiz.
    pub total_questions: usize,
    /// Questions actually returned after optional truncation.
    pub returned_questions: usize,
    pub randomized: bool,
    pub answers_shuffled: bool,
    /// The exact seed string, reported for transparency/debugging.
    pub seed: String,
}

/// Presentation-ready quiz: sanitized questions plus view metadata.
#[derive(Debug, Serialize)]
pub struct QuizView {
    pub id: i64,
    pub lesson_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub time_limit_minutes: Option<i32>,
    pub passing_score: Option<i32>,
    pub category: Option<String>,
    pub difficulty: Option<String>,
    pub questions: Vec<PublicQuestion>,
    pub meta: QuizViewMeta,
}

/// DTO for creating a quiz with its full question/answer tree.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuizRequest {
    pub lesson_id: Option<i64>,
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(range(min = 1))]
    pub time_limit_minutes: Option<i32>,
    #[validate(range(min = 0, max = 100))]
    pub passing_score: Option<i32>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[validate(length(max = 100))]
    pub difficulty: Option<String>,
    #[validate(length(min = 1, message = "A quiz needs at least one question."), nested)]
    pub questions: Vec<CreateQuestionRequest>,
}

/// DTO for updating quiz metadata. Fields are optional; the question/answer
/// subtree is never touched by this operation.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuizRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(range(min = 1))]
    pub time_limit_minutes: Option<i32>,
    #[validate(range(min = 0, max = 100))]
    pub passing_score: Option<i32>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[validate(length(max = 100))]
    pub difficulty: Option<String>,
}

/// Query parameters for listing quizzes / mock tests.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub lesson_id: Option<i64>,
    pub category: Option<String>,
    pub difficulty: Option<String>,
    pub q: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize)]
pub struct QuizListResponse {
    pub items: Vec<Quiz>,
    pub pagination: Pagination,
}

/// Aggregate statistics for a quiz (instructor/admin view).
#[derive(Debug, Serialize)]
pub struct QuizStatistics {
    pub total_attempts: i64,
    pub passed_attempts: i64,
    /// Percentage of attempts that passed.
    pub pass_rate: f64,
    /// Mean percentage score across attempts.
    pub average_score: f64,
    pub per_question: Vec<QuestionStats>,
}

#[derive(Debug, Serialize)]
pub struct QuestionStats {
    pub question_id: i64,
    pub text: String,
    pub position: i32,
    pub attempts: i64,
    pub correct: i64,
    /// Percentage of submissions for this question that were correct.
    pub correct_rate: f64,
}
