// src/handlers/attempt.rs

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;

use crate::{
    error::AppError,
    handlers::quiz::{QuizScope, fetch_question_trees, fetch_quiz},
    models::attempt::{
        Attempt, AttemptResult, ReviewQuestion, SubmitAttemptRequest, UserAnswer, UserAnswerReview,
    },
    scoring,
    utils::jwt::Requester,
};

/// Submits an attempt against a lesson-bound quiz.
pub async fn submit_lesson_quiz_attempt(
    State(pool): State<PgPool>,
    requester: Requester,
    Path(id): Path<i64>,
    Json(payload): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    submit_scoped(QuizScope::Lesson, pool, requester, id, payload).await
}

/// Submits an attempt against a standalone mock test.
pub async fn submit_mock_test_attempt(
    State(pool): State<PgPool>,
    requester: Requester,
    Path(id): Path<i64>,
    Json(payload): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    submit_scoped(QuizScope::MockTest, pool, requester, id, payload).await
}

/// Whole seconds from `started_at` to `now`, rounded down. The start time
/// is client-supplied and unvalidated, so the duration can be negative;
/// flooring keeps the rounding direction consistent on both sides of zero.
fn elapsed_seconds(
    started_at: chrono::DateTime<chrono::Utc>,
    now: chrono::DateTime<chrono::Utc>,
) -> i64 {
    (now - started_at).num_milliseconds().div_euclid(1000)
}

/// Creates and scores an attempt in one transaction: the attempt row, one
/// user-answer row per graded submission, and the score update either all
/// commit or all roll back.
async fn submit_scoped(
    scope: QuizScope,
    pool: PgPool,
    requester: Requester,
    quiz_id: i64,
    payload: SubmitAttemptRequest,
) -> Result<(StatusCode, Json<AttemptResult>), AppError> {
    let started_at = payload
        .started_at
        .ok_or_else(|| AppError::BadRequest("started_at is required".to_string()))?;
    let submissions = payload
        .answers
        .ok_or_else(|| AppError::BadRequest("answers must be an array".to_string()))?;

    let mut tx = pool.begin().await?;

    let quiz = fetch_quiz(&mut tx, quiz_id, scope)
        .await?
        .ok_or_else(|| scope.not_found())?;

    let questions = fetch_question_trees(&mut tx, quiz.id).await?;

    let now = chrono::Utc::now();
    let time_spent_seconds = elapsed_seconds(started_at, now);

    let attempt_id: i64 = sqlx::query_scalar(
        "INSERT INTO attempts (user_id, quiz_id, started_at, completed_at, time_spent_seconds)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING id",
    )
    .bind(requester.user_id)
    .bind(quiz.id)
    .bind(started_at)
    .bind(now)
    .bind(time_spent_seconds)
    .fetch_one(&mut *tx)
    .await?;

    let grade = scoring::grade(&questions, &submissions);

    let question_lookup: HashMap<i64, &crate::models::question::QuestionWithAnswers> =
        questions.iter().map(|q| (q.question.id, q)).collect();

    let mut reviews = Vec::with_capacity(grade.answers.len());
    for graded in &grade.answers {
        let user_answer_id: i64 = sqlx::query_scalar(
            "INSERT INTO user_answers (attempt_id, question_id, answer_id, text_answer, is_correct, points_earned)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id",
        )
        .bind(attempt_id)
        .bind(graded.question_id)
        .bind(graded.answer_id)
        .bind(&graded.text_answer)
        .bind(graded.is_correct)
        .bind(graded.points_earned)
        .fetch_one(&mut *tx)
        .await?;

        reviews.push(UserAnswerReview {
            id: user_answer_id,
            question_id: graded.question_id,
            answer_id: graded.answer_id,
            text_answer: graded.text_answer.clone(),
            is_correct: graded.is_correct,
            points_earned: graded.points_earned,
            question: question_lookup
                .get(&graded.question_id)
                .map(|entry| ReviewQuestion::from((*entry).clone())),
        });
    }

    let percentage_score = scoring::percentage(grade.total_score, grade.max_score);
    let passed = scoring::passed(percentage_score, quiz.passing_score);

    sqlx::query(
        "UPDATE attempts
         SET total_score = $1, max_score = $2, percentage_score = $3, passed = $4
         WHERE id = $5",
    )
    .bind(grade.total_score)
    .bind(grade.max_score)
    .bind(percentage_score)
    .bind(passed)
    .bind(attempt_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        "Attempt {} on quiz {} scored {}/{} ({}%)",
        attempt_id,
        quiz.id,
        grade.total_score,
        grade.max_score,
        percentage_score
    );

    let requires_login = requester.user_id.is_none() && passed;

    let attempt = Attempt {
        id: attempt_id,
        user_id: requester.user_id,
        quiz_id: quiz.id,
        started_at,
        completed_at: now,
        time_spent_seconds,
        total_score: grade.total_score,
        max_score: grade.max_score,
        percentage_score,
        passed,
    };

    Ok((
        StatusCode::CREATED,
        Json(AttemptResult {
            attempt,
            answers: reviews,
            requires_login,
        }),
    ))
}

/// Returns a completed attempt with its answers joined to their questions
/// for review.
///
/// An anonymous attempt is readable by anyone holding its identifier; an
/// owned attempt only by its owner or an administrator.
pub async fn get_attempt(
    State(pool): State<PgPool>,
    requester: Requester,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;

    let attempt = sqlx::query_as::<_, Attempt>(
        "SELECT id, user_id, quiz_id, started_at, completed_at, time_spent_seconds,
                total_score, max_score, percentage_score, passed
         FROM attempts
         WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Attempt not found".to_string()))?;

    if let Some(owner_id) = attempt.user_id {
        if requester.user_id != Some(owner_id) && !requester.is_admin() {
            return Err(AppError::Forbidden(
                "You are not allowed to view this attempt".to_string(),
            ));
        }
    }

    let user_answers = sqlx::query_as::<_, UserAnswer>(
        "SELECT id, attempt_id, question_id, answer_id, text_answer, is_correct, points_earned
         FROM user_answers
         WHERE attempt_id = $1
         ORDER BY id ASC",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    let questions = fetch_question_trees(&mut conn, attempt.quiz_id).await?;
    let question_lookup: HashMap<i64, _> =
        questions.into_iter().map(|q| (q.question.id, q)).collect();

    let answers = user_answers
        .into_iter()
        .map(|ua| UserAnswerReview {
            id: ua.id,
            question_id: ua.question_id,
            answer_id: ua.answer_id,
            text_answer: ua.text_answer,
            is_correct: ua.is_correct,
            points_earned: ua.points_earned,
            question: question_lookup
                .get(&ua.question_id)
                .map(|entry| ReviewQuestion::from(entry.clone())),
        })
        .collect();

    let requires_login = attempt.user_id.is_none() && attempt.passed;

    Ok(Json(AttemptResult {
        attempt,
        answers,
        requires_login,
    }))
}
