// src/handlers/quiz.rs

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};

use crate::{
    error::AppError,
    models::{
        question::{Answer, Question, QuestionWithAnswers},
        quiz::{ListParams, Pagination, QuestionStats, Quiz, QuizListResponse, QuizStatistics, QuizView, QuizViewMeta},
    },
    utils::{
        jwt::Requester,
        shuffle::{SeededRng, build_seed},
    },
};

/// Lookup mode for quizzes: lesson-bound quizzes and standalone mock tests
/// live in the same table but are exposed through separate endpoints, and a
/// cross-mode lookup is a miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizScope {
    Lesson,
    MockTest,
    Any,
}

impl QuizScope {
    fn matches(self, lesson_id: Option<i64>) -> bool {
        match self {
            QuizScope::Lesson => lesson_id.is_some(),
            QuizScope::MockTest => lesson_id.is_none(),
            QuizScope::Any => true,
        }
    }

    pub fn not_found(self) -> AppError {
        let what = match self {
            QuizScope::MockTest => "Mock test",
            _ => "Quiz",
        };
        AppError::NotFound(format!("{} not found", what))
    }

    fn sql_condition(self) -> &'static str {
        match self {
            QuizScope::Lesson => "lesson_id IS NOT NULL",
            QuizScope::MockTest => "lesson_id IS NULL",
            QuizScope::Any => "TRUE",
        }
    }
}

const QUIZ_COLUMNS: &str =
    "id, lesson_id, title, description, time_limit_minutes, passing_score, category, difficulty, created_at";

/// Loads a quiz by id, honoring the lookup scope.
pub async fn fetch_quiz(
    conn: &mut PgConnection,
    id: i64,
    scope: QuizScope,
) -> Result<Option<Quiz>, AppError> {
    let quiz = sqlx::query_as::<_, Quiz>(&format!(
        "SELECT {} FROM quizzes WHERE id = $1",
        QUIZ_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(quiz.filter(|q| scope.matches(q.lesson_id)))
}

/// Loads a quiz's questions with their answers in canonical order:
/// questions by position ascending, answers by id ascending.
pub async fn fetch_question_trees(
    conn: &mut PgConnection,
    quiz_id: i64,
) -> Result<Vec<QuestionWithAnswers>, AppError> {
    let questions = sqlx::query_as::<_, Question>(
        "SELECT id, quiz_id, text, question_type, points, explanation, position
         FROM questions
         WHERE quiz_id = $1
         ORDER BY position ASC, id ASC",
    )
    .bind(quiz_id)
    .fetch_all(&mut *conn)
    .await?;

    let answers = sqlx::query_as::<_, Answer>(
        "SELECT a.id, a.question_id, a.text, a.is_correct, a.explanation
         FROM answers a
         JOIN questions q ON q.id = a.question_id
         WHERE q.quiz_id = $1
         ORDER BY a.id ASC",
    )
    .bind(quiz_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut by_question: HashMap<i64, Vec<Answer>> = HashMap::new();
    for answer in answers {
        by_question.entry(answer.question_id).or_default().push(answer);
    }

    Ok(questions
        .into_iter()
        .map(|question| {
            let answers = by_question.remove(&question.id).unwrap_or_default();
            QuestionWithAnswers { question, answers }
        })
        .collect())
}

/// View options for `get_quiz`-style endpoints.
#[derive(Debug, Deserialize)]
pub struct ViewParams {
    #[serde(default)]
    pub randomize: bool,
    pub question_count: Option<usize>,
    pub sub_seed: Option<String>,
    #[serde(default)]
    pub shuffle_answers: bool,
}

struct AssembleOptions {
    randomize: bool,
    question_count: Option<usize>,
    shuffle_answers: bool,
}

/// Applies seeded randomization to a canonically-ordered question list.
///
/// Questions are shuffled first, then truncated, then each retained
/// question's answers are shuffled on the same generator stream, so the
/// whole arrangement is jointly determined by the one seed. Positions are
/// recomputed to the new 0-based contiguous order.
fn assemble_questions(
    mut questions: Vec<QuestionWithAnswers>,
    options: &AssembleOptions,
    seed: &str,
) -> Vec<QuestionWithAnswers> {
    if !options.randomize {
        return questions;
    }

    let mut rng = SeededRng::new(seed);
    rng.shuffle(&mut questions);

    if let Some(count) = options.question_count {
        questions.truncate(count.min(questions.len()));
    }

    if options.shuffle_answers {
        for entry in &mut questions {
            rng.shuffle(&mut entry.answers);
        }
    }

    for (index, entry) in questions.iter_mut().enumerate() {
        entry.question.position = index as i32;
    }

    questions
}

async fn quiz_view(
    scope: QuizScope,
    pool: PgPool,
    requester: Requester,
    id: i64,
    params: ViewParams,
) -> Result<Json<QuizView>, AppError> {
    if params.question_count == Some(0) {
        return Err(AppError::BadRequest(
            "question_count must be a positive integer".to_string(),
        ));
    }

    let mut conn = pool.acquire().await?;

    let quiz = fetch_quiz(&mut conn, id, scope)
        .await?
        .ok_or_else(|| scope.not_found())?;

    let questions = fetch_question_trees(&mut conn, quiz.id).await?;
    let total_questions = questions.len();

    let seed = build_seed(&requester.identity(), quiz.id, params.sub_seed.as_deref());

    let options = AssembleOptions {
        randomize: params.randomize,
        question_count: params.question_count,
        shuffle_answers: params.shuffle_answers,
    };
    let questions = assemble_questions(questions, &options, &seed);

    let meta = QuizViewMeta {
        total_questions,
        returned_questions: questions.len(),
        randomized: params.randomize,
        answers_shuffled: params.randomize && params.shuffle_answers,
        seed,
    };

    Ok(Json(QuizView {
        id: quiz.id,
        lesson_id: quiz.lesson_id,
        title: quiz.title,
        description: quiz.description,
        time_limit_minutes: quiz.time_limit_minutes,
        passing_score: quiz.passing_score,
        category: quiz.category,
        difficulty: quiz.difficulty,
        questions: questions.into_iter().map(Into::into).collect(),
        meta,
    }))
}

/// Returns a sanitized, presentation-ready view of a lesson-bound quiz.
/// Answer correctness and question explanations are never included.
pub async fn get_lesson_quiz(
    State(pool): State<PgPool>,
    requester: Requester,
    Path(id): Path<i64>,
    Query(params): Query<ViewParams>,
) -> Result<impl IntoResponse, AppError> {
    quiz_view(QuizScope::Lesson, pool, requester, id, params).await
}

/// Returns a sanitized view of a standalone mock test.
pub async fn get_mock_test(
    State(pool): State<PgPool>,
    requester: Requester,
    Path(id): Path<i64>,
    Query(params): Query<ViewParams>,
) -> Result<impl IntoResponse, AppError> {
    quiz_view(QuizScope::MockTest, pool, requester, id, params).await
}

/// Normalizes client paging inputs: page is capped so the offset cannot
/// overflow, limit is capped at 100 rows. Returns (page, limit, offset).
fn page_window(page: Option<i64>, limit: Option<i64>) -> (i64, i64, i64) {
    let page = page.unwrap_or(1).clamp(1, 1_000_000);
    let limit = limit.unwrap_or(20).clamp(1, 100);
    (page, limit, (page - 1) * limit)
}

async fn list_scoped(
    scope: QuizScope,
    pool: PgPool,
    params: ListParams,
) -> Result<Json<QuizListResponse>, AppError> {
    let (page, limit, offset) = page_window(params.page, params.limit);

    let search_pattern = params.q.map(|k| format!("%{}%", k));

    let filters = "($1::BIGINT IS NULL OR lesson_id = $1)
          AND ($2::TEXT IS NULL OR category = $2)
          AND ($3::TEXT IS NULL OR difficulty = $3)
          AND ($4::TEXT IS NULL OR title ILIKE $4)";

    let total: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM quizzes WHERE {} AND {}",
        scope.sql_condition(),
        filters
    ))
    .bind(params.lesson_id)
    .bind(&params.category)
    .bind(&params.difficulty)
    .bind(&search_pattern)
    .fetch_one(&pool)
    .await?;

    let items = sqlx::query_as::<_, Quiz>(&format!(
        "SELECT {} FROM quizzes WHERE {} AND {} ORDER BY id DESC LIMIT $5 OFFSET $6",
        QUIZ_COLUMNS,
        scope.sql_condition(),
        filters
    ))
    .bind(params.lesson_id)
    .bind(&params.category)
    .bind(&params.difficulty)
    .bind(&search_pattern)
    .bind(limit)
    .bind(offset)
    .fetch_all(&pool)
    .await?;

    Ok(Json(QuizListResponse {
        items,
        pagination: Pagination {
            page,
            limit,
            total,
            total_pages: if total == 0 { 0 } else { (total + limit - 1) / limit },
        },
    }))
}

/// Lists lesson-bound quizzes, optionally filtered by lesson and title.
pub async fn list_lesson_quizzes(
    State(pool): State<PgPool>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    list_scoped(QuizScope::Lesson, pool, params).await
}

/// Lists standalone mock tests, optionally filtered by category, difficulty
/// and title.
pub async fn list_mock_tests(
    State(pool): State<PgPool>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    list_scoped(QuizScope::MockTest, pool, params).await
}

#[derive(sqlx::FromRow)]
struct AttemptAggregates {
    total_attempts: i64,
    passed_attempts: i64,
    average_score: f64,
}

#[derive(sqlx::FromRow)]
struct QuestionAggregates {
    question_id: i64,
    text: String,
    position: i32,
    attempts: i64,
    correct: i64,
}

/// Aggregate attempt statistics for a quiz. Admin only (exposes
/// correctness-level aggregates).
pub async fn get_quiz_statistics(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;

    fetch_quiz(&mut conn, id, QuizScope::Any)
        .await?
        .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))?;

    let totals = sqlx::query_as::<_, AttemptAggregates>(
        "SELECT
            COUNT(*) AS total_attempts,
            COUNT(*) FILTER (WHERE passed) AS passed_attempts,
            COALESCE(AVG(percentage_score), 0)::FLOAT8 AS average_score
         FROM attempts
         WHERE quiz_id = $1",
    )
    .bind(id)
    .fetch_one(&mut *conn)
    .await?;

    let per_question_rows = sqlx::query_as::<_, QuestionAggregates>(
        "SELECT
            q.id AS question_id,
            q.text,
            q.position,
            COUNT(ua.id) AS attempts,
            COUNT(*) FILTER (WHERE ua.is_correct) AS correct
         FROM questions q
         LEFT JOIN user_answers ua ON ua.question_id = q.id
         WHERE q.quiz_id = $1
         GROUP BY q.id, q.text, q.position
         ORDER BY q.position ASC, q.id ASC",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    let per_question = per_question_rows
        .into_iter()
        .map(|row| QuestionStats {
            question_id: row.question_id,
            text: row.text,
            position: row.position,
            attempts: row.attempts,
            correct: row.correct,
            correct_rate: if row.attempts > 0 {
                100.0 * row.correct as f64 / row.attempts as f64
            } else {
                0.0
            },
        })
        .collect();

    Ok(Json(QuizStatistics {
        total_attempts: totals.total_attempts,
        passed_attempts: totals.passed_attempts,
        pass_rate: if totals.total_attempts > 0 {
            100.0 * totals.passed_attempts as f64 / totals.total_attempts as f64
        } else {
            0.0
        },
        average_score: totals.average_score,
        per_question,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::{Answer, PublicQuestion, Question};

    fn question(id: i64, position: i32, answer_ids: &[i64]) -> QuestionWithAnswers {
        QuestionWithAnswers {
            question: Question {
                id,
                quiz_id: 1,
                text: format!("Question {}", id),
                question_type: "single_choice".to_string(),
                points: 1,
                explanation: Some("hidden".to_string()),
                position,
            },
            answers: answer_ids
                .iter()
                .map(|&aid| Answer {
                    id: aid,
                    question_id: id,
                    text: format!("Answer {}", aid),
                    is_correct: aid % 2 == 0,
                    explanation: None,
                })
                .collect(),
        }
    }

    fn five_questions() -> Vec<QuestionWithAnswers> {
        (0..5)
            .map(|i| question(i + 1, i as i32, &[i * 10, i * 10 + 1, i * 10 + 2]))
            .collect()
    }

    #[test]
    fn canonical_order_is_preserved_without_randomize() {
        let options = AssembleOptions {
            randomize: false,
            question_count: Some(2),
            shuffle_answers: false,
        };
        let first = assemble_questions(five_questions(), &options, "17:1:default");
        let second = assemble_questions(five_questions(), &options, "17:1:default");

        let ids: Vec<i64> = first.iter().map(|q| q.question.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5], "no truncation without randomize");
        assert_eq!(
            ids,
            second.iter().map(|q| q.question.id).collect::<Vec<_>>()
        );
    }

    #[test]
    fn randomize_with_count_truncates_and_recomputes_positions() {
        let options = AssembleOptions {
            randomize: true,
            question_count: Some(2),
            shuffle_answers: false,
        };
        let first = assemble_questions(five_questions(), &options, "17:1:default");
        let second = assemble_questions(five_questions(), &options, "17:1:default");

        assert_eq!(first.len(), 2);
        assert_eq!(first[0].question.position, 0);
        assert_eq!(first[1].question.position, 1);

        // Same requester + quiz + sub-seed: identical subset, identical order.
        assert_eq!(
            first.iter().map(|q| q.question.id).collect::<Vec<_>>(),
            second.iter().map(|q| q.question.id).collect::<Vec<_>>()
        );
    }

    #[test]
    fn question_count_larger_than_quiz_returns_everything() {
        let options = AssembleOptions {
            randomize: true,
            question_count: Some(50),
            shuffle_answers: false,
        };
        let result = assemble_questions(five_questions(), &options, "x:1:default");
        assert_eq!(result.len(), 5);
    }

    #[test]
    fn answer_shuffle_is_deterministic_and_keeps_all_answers() {
        let options = AssembleOptions {
            randomize: true,
            question_count: None,
            shuffle_answers: true,
        };
        let first = assemble_questions(five_questions(), &options, "42:1:round-2");
        let second = assemble_questions(five_questions(), &options, "42:1:round-2");

        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(
                a.answers.iter().map(|x| x.id).collect::<Vec<_>>(),
                b.answers.iter().map(|x| x.id).collect::<Vec<_>>()
            );
            let mut ids: Vec<i64> = a.answers.iter().map(|x| x.id).collect();
            ids.sort();
            let mut expected: Vec<i64> = (0..3).map(|k| (a.question.id - 1) * 10 + k).collect();
            expected.sort();
            assert_eq!(ids, expected);
        }
    }

    #[test]
    fn page_window_caps_out_of_range_inputs() {
        assert_eq!(page_window(None, None), (1, 20, 0));
        assert_eq!(page_window(Some(3), Some(10)), (3, 10, 20));
        assert_eq!(page_window(Some(0), Some(0)), (1, 1, 0));
        // Absurd page numbers must not overflow the offset computation.
        assert_eq!(
            page_window(Some(i64::MAX), Some(i64::MAX)),
            (1_000_000, 100, 99_999_900)
        );
    }

    #[test]
    fn public_view_never_exposes_correctness_or_explanation() {
        let view: PublicQuestion = question(1, 0, &[10, 11]).into();
        let json = serde_json::to_value(&view).unwrap();

        assert!(json.get("explanation").is_none());
        for answer in json["answers"].as_array().unwrap() {
            assert!(answer.get("is_correct").is_none());
        }
    }
}
