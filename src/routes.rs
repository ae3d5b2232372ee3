// src/routes.rs

use axum::{
    Router, http::Method, middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, attempt, auth, quiz},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, quizzes, mock tests, attempts, admin).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (Database Pool + Config).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    // Lesson-bound quizzes. Views and submission work with or without a
    // login; identity (if any) is picked up by the Requester extractor.
    let quiz_routes = Router::new()
        .route("/", get(quiz::list_lesson_quizzes))
        .route("/{id}", get(quiz::get_lesson_quiz))
        .route("/{id}/attempts", post(attempt::submit_lesson_quiz_attempt));

    // Standalone mock tests (no owning lesson).
    let mock_test_routes = Router::new()
        .route("/", get(quiz::list_mock_tests))
        .route("/{id}", get(quiz::get_mock_test))
        .route("/{id}/attempts", post(attempt::submit_mock_test_attempt));

    let attempt_routes = Router::new().route("/{id}", get(attempt::get_attempt));

    let admin_routes = Router::new()
        .route("/quizzes", post(admin::create_quiz))
        .route(
            "/quizzes/{id}",
            put(admin::update_quiz).delete(admin::delete_quiz),
        )
        .route("/quizzes/{id}/statistics", get(quiz::get_quiz_statistics))
        .route("/quizzes/{id}/questions", post(admin::add_question))
        .route(
            "/questions/{id}",
            put(admin::update_question).delete(admin::delete_question),
        )
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/quizzes", quiz_routes)
        .nest("/api/mock-tests", mock_test_routes)
        .nest("/api/attempts", attempt_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
