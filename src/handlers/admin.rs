// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    error::AppError,
    handlers::quiz::{QuizScope, fetch_question_trees, fetch_quiz},
    models::{
        question::{CreateQuestionRequest, UpdateQuestionRequest},
        quiz::{CreateQuizRequest, UpdateQuizRequest},
    },
};

async fn quiz_has_attempts(conn: &mut PgConnection, quiz_id: i64) -> Result<bool, AppError> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM attempts WHERE quiz_id = $1)")
            .bind(quiz_id)
            .fetch_one(&mut *conn)
            .await?;
    Ok(exists)
}

async fn insert_question_tree(
    conn: &mut PgConnection,
    quiz_id: i64,
    position: i32,
    question: &CreateQuestionRequest,
) -> Result<i64, AppError> {
    let question_id: i64 = sqlx::query_scalar(
        "INSERT INTO questions (quiz_id, text, question_type, points, explanation, position)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING id",
    )
    .bind(quiz_id)
    .bind(&question.text)
    .bind(&question.question_type)
    .bind(question.points.unwrap_or(1))
    .bind(&question.explanation)
    .bind(position)
    .fetch_one(&mut *conn)
    .await?;

    for answer in &question.answers {
        sqlx::query(
            "INSERT INTO answers (question_id, text, is_correct, explanation)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(question_id)
        .bind(&answer.text)
        .bind(answer.is_correct)
        .bind(&answer.explanation)
        .execute(&mut *conn)
        .await?;
    }

    Ok(question_id)
}

/// Creates a quiz with its full question/answer tree in one transaction.
/// The submitted question order becomes each question's position. Any
/// structural validation failure aborts the whole tree.
/// Admin only.
pub async fn create_quiz(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let mut tx = pool.begin().await?;

    let quiz_id: i64 = sqlx::query_scalar(
        "INSERT INTO quizzes (lesson_id, title, description, time_limit_minutes, passing_score, category, difficulty)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING id",
    )
    .bind(payload.lesson_id)
    .bind(&payload.title)
    .bind(&payload.description)
    .bind(payload.time_limit_minutes)
    .bind(payload.passing_score)
    .bind(&payload.category)
    .bind(&payload.difficulty)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create quiz: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    for (index, question) in payload.questions.iter().enumerate() {
        insert_question_tree(&mut tx, quiz_id, index as i32, question).await?;
    }

    tx.commit().await?;

    let mut conn = pool.acquire().await?;
    let quiz = fetch_quiz(&mut conn, quiz_id, QuizScope::Any)
        .await?
        .ok_or_else(|| AppError::InternalServerError("Quiz vanished after insert".to_string()))?;
    let questions = fetch_question_trees(&mut conn, quiz_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "quiz": quiz,
            "questions": questions,
        })),
    ))
}

/// Updates quiz metadata by ID. Fields are optional; the question/answer
/// subtree is never touched by this operation.
/// Admin only.
pub async fn update_quiz(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let mut conn = pool.acquire().await?;
    let quiz = fetch_quiz(&mut conn, id, QuizScope::Any)
        .await?
        .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))?;

    // Nothing to change: answer with the current row so the response shape
    // matches the update path.
    if payload.title.is_none()
        && payload.description.is_none()
        && payload.time_limit_minutes.is_none()
        && payload.passing_score.is_none()
        && payload.category.is_none()
        && payload.difficulty.is_none()
    {
        return Ok((StatusCode::OK, Json(serde_json::json!({ "quiz": quiz }))).into_response());
    }

    if quiz_has_attempts(&mut conn, id).await? {
        tracing::warn!(
            "Quiz {} already has attempts; metadata edits affect how past scores read",
            id
        );
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE quizzes SET ");
    let mut separated = builder.separated(", ");

    if let Some(title) = payload.title {
        separated.push("title = ");
        separated.push_bind_unseparated(title);
    }

    if let Some(description) = payload.description {
        separated.push("description = ");
        separated.push_bind_unseparated(description);
    }

    if let Some(time_limit_minutes) = payload.time_limit_minutes {
        separated.push("time_limit_minutes = ");
        separated.push_bind_unseparated(time_limit_minutes);
    }

    if let Some(passing_score) = payload.passing_score {
        separated.push("passing_score = ");
        separated.push_bind_unseparated(passing_score);
    }

    if let Some(category) = payload.category {
        separated.push("category = ");
        separated.push_bind_unseparated(category);
    }

    if let Some(difficulty) = payload.difficulty {
        separated.push("difficulty = ");
        separated.push_bind_unseparated(difficulty);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    builder.build().execute(&mut *conn).await.map_err(|e| {
        tracing::error!("Failed to update quiz: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let quiz = fetch_quiz(&mut conn, id, QuizScope::Any)
        .await?
        .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))?;

    Ok((StatusCode::OK, Json(serde_json::json!({ "quiz": quiz }))).into_response())
}

/// Deletes a quiz and its question/answer tree in one transaction.
/// Blocked entirely while any attempt references the quiz.
/// Admin only.
pub async fn delete_quiz(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    fetch_quiz(&mut tx, id, QuizScope::Any)
        .await?
        .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))?;

    if quiz_has_attempts(&mut tx, id).await? {
        return Err(AppError::Conflict(
            "Cannot delete quiz with existing attempts".to_string(),
        ));
    }

    sqlx::query(
        "DELETE FROM answers WHERE question_id IN (SELECT id FROM questions WHERE quiz_id = $1)",
    )
    .bind(id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM questions WHERE quiz_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM quizzes WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Appends a question (with its answers) to an existing quiz.
/// Admin only.
pub async fn add_question(
    State(pool): State<PgPool>,
    Path(quiz_id): Path<i64>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let mut tx = pool.begin().await?;

    fetch_quiz(&mut tx, quiz_id, QuizScope::Any)
        .await?
        .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))?;

    if quiz_has_attempts(&mut tx, quiz_id).await? {
        tracing::warn!(
            "Quiz {} already has attempts; new questions change future max scores",
            quiz_id
        );
    }

    let position: i32 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(position) + 1, 0) FROM questions WHERE quiz_id = $1",
    )
    .bind(quiz_id)
    .fetch_one(&mut *tx)
    .await?;

    let question_id = insert_question_tree(&mut tx, quiz_id, position, &payload).await?;

    tx.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": question_id })),
    ))
}

/// Updates a question by ID. Fields are optional; answers are managed
/// through their own operations.
/// Admin only.
pub async fn update_question(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let mut conn = pool.acquire().await?;

    let quiz_id: i64 = sqlx::query_scalar("SELECT quiz_id FROM questions WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Question not found".to_string()))?;

    if payload.text.is_none()
        && payload.question_type.is_none()
        && payload.points.is_none()
        && payload.explanation.is_none()
    {
        return Ok(StatusCode::OK);
    }

    if quiz_has_attempts(&mut conn, quiz_id).await? {
        tracing::warn!(
            "Quiz {} already has attempts; question {} edits are not replayed onto past grading",
            quiz_id,
            id
        );
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE questions SET ");
    let mut separated = builder.separated(", ");

    if let Some(text) = payload.text {
        separated.push("text = ");
        separated.push_bind_unseparated(text);
    }

    if let Some(question_type) = payload.question_type {
        separated.push("question_type = ");
        separated.push_bind_unseparated(question_type);
    }

    if let Some(points) = payload.points {
        separated.push("points = ");
        separated.push_bind_unseparated(points);
    }

    if let Some(explanation) = payload.explanation {
        separated.push("explanation = ");
        separated.push_bind_unseparated(explanation);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    builder.build().execute(&mut *conn).await.map_err(|e| {
        tracing::error!("Failed to update question: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(StatusCode::OK)
}

/// Deletes a question and its answers. Blocked while any attempt references
/// the owning quiz.
/// Admin only.
pub async fn delete_question(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    let quiz_id: i64 = sqlx::query_scalar("SELECT quiz_id FROM questions WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Question not found".to_string()))?;

    if quiz_has_attempts(&mut tx, quiz_id).await? {
        return Err(AppError::Conflict(
            "Cannot delete a question from a quiz with existing attempts".to_string(),
        ));
    }

    sqlx::query("DELETE FROM answers WHERE question_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM questions WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}
