// tests/api_tests.rs

use lms_backend::{config::Config, routes, state::AppState};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL and a pool for seeding, or None when no test
/// database is configured (the test is then skipped).
async fn spawn_app() -> Option<(String, PgPool)> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping integration test");
        return None;
    };

    // 1. Create a pool
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing");

    // 2. Run migrations
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    // 3. Create test configuration and state
    let config = Config {
        database_url: database_url.clone(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        admin_username: None,
        admin_password: None,
    };

    let state = AppState {
        pool: pool.clone(),
        config,
    };

    // 4. Create the router with the app state
    let app = routes::create_router(state);

    // 5. Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // 6. Spawn the server in the background (with connect-info, like main)
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
        )
        .await
        .unwrap();
    });

    Some((address, pool))
}

/// Seeds a standalone mock test: one 4-point single-choice question (one
/// correct answer, three wrong) and one 1-point fill-blank question.
/// Returns (quiz_id, choice_question_id, correct_answer_id, blank_question_id).
async fn seed_mock_test(pool: &PgPool) -> (i64, i64, i64, i64) {
    let quiz_id: i64 = sqlx::query_scalar(
        "INSERT INTO quizzes (lesson_id, title, passing_score, category, difficulty)
         VALUES (NULL, 'Geography mock test', 50, 'geography', 'easy')
         RETURNING id",
    )
    .fetch_one(pool)
    .await
    .unwrap();

    let choice_question_id: i64 = sqlx::query_scalar(
        "INSERT INTO questions (quiz_id, text, question_type, points, position)
         VALUES ($1, 'Which continent is France in?', 'single_choice', 4, 0)
         RETURNING id",
    )
    .bind(quiz_id)
    .fetch_one(pool)
    .await
    .unwrap();

    let mut correct_answer_id = 0;
    for (text, is_correct) in [
        ("Europe", true),
        ("Asia", false),
        ("Africa", false),
        ("Oceania", false),
    ] {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO answers (question_id, text, is_correct) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(choice_question_id)
        .bind(text)
        .bind(is_correct)
        .fetch_one(pool)
        .await
        .unwrap();
        if is_correct {
            correct_answer_id = id;
        }
    }

    let blank_question_id: i64 = sqlx::query_scalar(
        "INSERT INTO questions (quiz_id, text, question_type, points, position)
         VALUES ($1, 'Capital of France?', 'fill_blank', 1, 1)
         RETURNING id",
    )
    .bind(quiz_id)
    .fetch_one(pool)
    .await
    .unwrap();

    for text in ["Paris", "paris "] {
        sqlx::query("INSERT INTO answers (question_id, text, is_correct) VALUES ($1, $2, TRUE)")
            .bind(blank_question_id)
            .bind(text)
            .execute(pool)
            .await
            .unwrap();
    }

    (quiz_id, choice_question_id, correct_answer_id, blank_question_id)
}

/// Registers a user, promotes it to admin directly in the database, and
/// returns a bearer token.
async fn admin_token(address: &str, pool: &PgPool, client: &reqwest::Client) -> String {
    let username = format!("a_{}", &uuid::Uuid::new_v4().to_string()[..8]);
    let password = "password123";

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({ "username": username, "password": password }))
        .send()
        .await
        .expect("Register failed");
    assert_eq!(response.status().as_u16(), 201);

    sqlx::query("UPDATE users SET role = 'admin' WHERE username = $1")
        .bind(&username)
        .execute(pool)
        .await
        .unwrap();

    let login: serde_json::Value = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({ "username": username, "password": password }))
        .send()
        .await
        .expect("Login failed")
        .json()
        .await
        .expect("Failed to parse login json");

    login["token"].as_str().expect("Token not found").to_string()
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let Some((address, _pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_works_and_rejects_duplicates() {
    let Some((address, _pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();
    let unique_name = format!("u_{}", &uuid::Uuid::new_v4().to_string()[..8]);
    let body = serde_json::json!({ "username": unique_name, "password": "password123" });

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&body)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 201);

    let duplicate = client
        .post(format!("{}/api/auth/register", address))
        .json(&body)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(duplicate.status().as_u16(), 409);
}

#[tokio::test]
async fn register_fails_validation() {
    let Some((address, _pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({ "username": "yo", "password": "password123" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn mock_test_view_is_sanitized_and_scoped() {
    let Some((address, pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();
    let (quiz_id, _, _, _) = seed_mock_test(&pool).await;

    let response = client
        .get(format!("{}/api/mock-tests/{}", address, quiz_id))
        .send()
        .await
        .expect("Failed to fetch mock test");
    assert_eq!(response.status().as_u16(), 200);

    let view: serde_json::Value = response.json().await.unwrap();
    assert_eq!(view["meta"]["total_questions"], 2);
    assert_eq!(view["meta"]["returned_questions"], 2);
    assert_eq!(view["meta"]["randomized"], false);

    for question in view["questions"].as_array().unwrap() {
        assert!(question.get("explanation").is_none());
        for answer in question["answers"].as_array().unwrap() {
            assert!(answer.get("is_correct").is_none());
        }
    }

    // A mock test is not reachable through the lesson-quiz endpoint.
    let cross_mode = client
        .get(format!("{}/api/quizzes/{}", address, quiz_id))
        .send()
        .await
        .expect("Failed to fetch");
    assert_eq!(cross_mode.status().as_u16(), 404);
}

#[tokio::test]
async fn randomized_view_is_stable_for_same_requester_and_sub_seed() {
    let Some((address, pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();
    let (quiz_id, _, _, _) = seed_mock_test(&pool).await;

    let url = format!(
        "{}/api/mock-tests/{}?randomize=true&question_count=1&sub_seed=round-1",
        address, quiz_id
    );

    let first: serde_json::Value = client.get(&url).send().await.unwrap().json().await.unwrap();
    let second: serde_json::Value = client.get(&url).send().await.unwrap().json().await.unwrap();

    assert_eq!(first["meta"]["returned_questions"], 1);
    assert_eq!(first["meta"]["randomized"], true);
    assert_eq!(first["questions"][0]["position"], 0);
    assert_eq!(first["questions"][0]["id"], second["questions"][0]["id"]);
    assert_eq!(first["meta"]["seed"], second["meta"]["seed"]);
}

#[tokio::test]
async fn mock_test_listing_supports_filters_and_pagination() {
    let Some((address, pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();
    let (quiz_id, _, _, _) = seed_mock_test(&pool).await;

    let listing: serde_json::Value = client
        .get(format!(
            "{}/api/mock-tests?category=geography&limit=5",
            address
        ))
        .send()
        .await
        .expect("Failed to list mock tests")
        .json()
        .await
        .unwrap();

    assert!(listing["pagination"]["total"].as_i64().unwrap() >= 1);
    assert_eq!(listing["pagination"]["limit"], 5);
    assert!(
        listing["items"]
            .as_array()
            .unwrap()
            .iter()
            .any(|item| item["id"] == quiz_id)
    );
}

#[tokio::test]
async fn anonymous_attempt_flow() {
    let Some((address, pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();
    let (quiz_id, choice_q, correct_a, blank_q) = seed_mock_test(&pool).await;

    let started_at = (chrono::Utc::now() - chrono::Duration::seconds(42)).to_rfc3339();

    let response = client
        .post(format!("{}/api/mock-tests/{}/attempts", address, quiz_id))
        .json(&serde_json::json!({
            "started_at": started_at,
            "answers": [
                { "question_id": choice_q, "answer_id": correct_a },
                { "question_id": blank_q, "text_answer": " PARIS " },
                { "question_id": 99999999, "answer_id": 1 }
            ]
        }))
        .send()
        .await
        .expect("Submit failed");
    assert_eq!(response.status().as_u16(), 201);

    let result: serde_json::Value = response.json().await.unwrap();
    assert_eq!(result["attempt"]["total_score"], 5);
    assert_eq!(result["attempt"]["max_score"], 5);
    assert_eq!(result["attempt"]["percentage_score"], 100.0);
    assert_eq!(result["attempt"]["passed"], true);
    // Unknown question ids are skipped: two answers persisted, not three.
    assert_eq!(result["answers"].as_array().unwrap().len(), 2);
    // Anonymous and passed: the caller should be offered account creation.
    assert_eq!(result["requires_login"], true);

    // Possession of the id is sufficient to read an anonymous attempt back.
    let attempt_id = result["attempt"]["id"].as_i64().unwrap();
    let readback = client
        .get(format!("{}/api/attempts/{}", address, attempt_id))
        .send()
        .await
        .expect("Readback failed");
    assert_eq!(readback.status().as_u16(), 200);

    let readback: serde_json::Value = readback.json().await.unwrap();
    assert_eq!(readback["attempt"]["total_score"], 5);
    assert_eq!(readback["answers"].as_array().unwrap().len(), 2);
    // The review join includes full answers, correctness included.
    assert!(readback["answers"][0]["question"]["answers"][0].get("is_correct").is_some());
}

#[tokio::test]
async fn submission_without_started_at_is_rejected() {
    let Some((address, pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();
    let (quiz_id, _, _, _) = seed_mock_test(&pool).await;

    let response = client
        .post(format!("{}/api/mock-tests/{}/attempts", address, quiz_id))
        .json(&serde_json::json!({ "answers": [] }))
        .send()
        .await
        .expect("Submit failed");
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn owned_attempt_is_private() {
    let Some((address, pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();
    let (quiz_id, choice_q, correct_a, _) = seed_mock_test(&pool).await;

    // Register a regular user and submit with their token.
    let username = format!("u_{}", &uuid::Uuid::new_v4().to_string()[..8]);
    client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({ "username": username, "password": "password123" }))
        .send()
        .await
        .expect("Register failed");
    let login: serde_json::Value = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({ "username": username, "password": "password123" }))
        .send()
        .await
        .expect("Login failed")
        .json()
        .await
        .unwrap();
    let token = login["token"].as_str().unwrap();

    let result: serde_json::Value = client
        .post(format!("{}/api/mock-tests/{}/attempts", address, quiz_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "started_at": chrono::Utc::now().to_rfc3339(),
            "answers": [{ "question_id": choice_q, "answer_id": correct_a }]
        }))
        .send()
        .await
        .expect("Submit failed")
        .json()
        .await
        .unwrap();

    // A logged-in requester never needs to be prompted to sign up.
    assert_eq!(result["requires_login"], false);
    let attempt_id = result["attempt"]["id"].as_i64().unwrap();

    // Anonymous readback of an owned attempt is forbidden.
    let anonymous = client
        .get(format!("{}/api/attempts/{}", address, attempt_id))
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous.status().as_u16(), 403);

    // The owner can read it back.
    let owner = client
        .get(format!("{}/api/attempts/{}", address, attempt_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(owner.status().as_u16(), 200);
}

#[tokio::test]
async fn authoring_flow_and_delete_guard() {
    let Some((address, pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();
    let token = admin_token(&address, &pool, &client).await;

    // Authoring endpoints require the admin role.
    let unauthorized = client
        .post(format!("{}/api/admin/quizzes", address))
        .json(&serde_json::json!({ "title": "x", "questions": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(unauthorized.status().as_u16(), 401);

    // Create a quiz through the API.
    let created = client
        .post(format!("{}/api/admin/quizzes", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "title": "Unit conversions",
            "passing_score": 60,
            "questions": [
                {
                    "text": "1 km in meters?",
                    "type": "single_choice",
                    "points": 2,
                    "answers": [
                        { "text": "1000", "is_correct": true },
                        { "text": "100", "is_correct": false }
                    ]
                },
                {
                    "text": "Water boils at 100C at sea level.",
                    "type": "true_false",
                    "answers": [
                        { "text": "True", "is_correct": true },
                        { "text": "False", "is_correct": false }
                    ]
                }
            ]
        }))
        .send()
        .await
        .expect("Create failed");
    assert_eq!(created.status().as_u16(), 201);

    let created: serde_json::Value = created.json().await.unwrap();
    let quiz_id = created["quiz"]["id"].as_i64().unwrap();
    let questions = created["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 2);
    // Array order becomes position.
    assert_eq!(questions[0]["position"], 0);
    assert_eq!(questions[1]["position"], 1);

    // Structural failure aborts the whole tree: nothing is persisted.
    let invalid = client
        .post(format!("{}/api/admin/quizzes", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "title": "Broken quiz",
            "questions": [
                { "text": "No answers here", "type": "single_choice", "answers": [] }
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(invalid.status().as_u16(), 400);

    // A quiz with no attempts deletes cleanly.
    let deleted = client
        .delete(format!("{}/api/admin/quizzes/{}", address, quiz_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status().as_u16(), 204);

    // Seed a quiz, give it an attempt, and verify deletion is blocked.
    let (guarded_id, choice_q, correct_a, _) = seed_mock_test(&pool).await;
    client
        .post(format!("{}/api/mock-tests/{}/attempts", address, guarded_id))
        .json(&serde_json::json!({
            "started_at": chrono::Utc::now().to_rfc3339(),
            "answers": [{ "question_id": choice_q, "answer_id": correct_a }]
        }))
        .send()
        .await
        .expect("Submit failed");

    let blocked = client
        .delete(format!("{}/api/admin/quizzes/{}", address, guarded_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(blocked.status().as_u16(), 409);

    // The tree is untouched.
    let still_there = client
        .get(format!("{}/api/mock-tests/{}", address, guarded_id))
        .send()
        .await
        .unwrap();
    assert_eq!(still_there.status().as_u16(), 200);
    let view: serde_json::Value = still_there.json().await.unwrap();
    assert_eq!(view["meta"]["total_questions"], 2);

    // Statistics reflect the attempt.
    let stats: serde_json::Value = client
        .get(format!("{}/api/admin/quizzes/{}/statistics", address, guarded_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["total_attempts"], 1);
    assert_eq!(stats["passed_attempts"], 1);
    assert_eq!(stats["pass_rate"], 100.0);
}

#[tokio::test]
async fn empty_quiz_update_returns_the_current_quiz() {
    let Some((address, pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();
    let token = admin_token(&address, &pool, &client).await;
    let (quiz_id, ..) = seed_mock_test(&pool).await;

    // An update with no fields is a no-op, but the response shape must match
    // the real update path.
    let response = client
        .put(format!("{}/api/admin/quizzes/{}", address, quiz_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({}))
        .send()
        .await
        .expect("Update failed");
    assert_eq!(response.status().as_u16(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["quiz"]["id"].as_i64(), Some(quiz_id));
    assert_eq!(body["quiz"]["title"], "Geography mock test");
}
