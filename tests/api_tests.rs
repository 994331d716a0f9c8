// tests/api_tests.rs

use axum::{ServiceExt, extract::Request};
use exam_engine::{
    config::{Branding, Config},
    routes,
    services::sequencer::{self, SiblingKind},
    state::AppState,
};
use serde_json::{Value, json};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
async fn spawn_app() -> String {
    // Note: For Postgres, you must have a running database.
    // We'll read from DATABASE_URL environment variable.
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    // 1. Create a pool
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing. Make sure DATABASE_URL is set.");

    // 2. Run migrations
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    // 3. Create test configuration and state
    let config = Config {
        database_url: database_url.clone(),
        database_max_connections: 2,
        bind_addr: "127.0.0.1:0".to_string(),
        cors_allowed_origins: vec!["http://localhost:5173".to_string()],
        rust_log: "error".to_string(),
        branding: Branding::default(),
    };

    let state = AppState::new(pool, config);

    // 4. Create the router with the app state
    let app = routes::create_app(state);

    // 5. Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // 6. Spawn the server in the background
    tokio::spawn(async move {
        axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
            .await
            .unwrap();
    });

    address
}

/// Direct store access for rows the HTTP surface does not expose.
async fn connect_db() -> PgPool {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing.")
}

fn unique(prefix: &str) -> String {
    format!("{}_{}", prefix, &uuid::Uuid::new_v4().to_string()[..8])
}

async fn create_exam(client: &reqwest::Client, address: &str, title: &str) -> i64 {
    let response = client
        .post(format!("{}/api/admin/exams", address))
        .json(&json!({
            "title": title,
            "subject": "Geography",
            "passing_score": 50,
        }))
        .send()
        .await
        .expect("Failed to create exam");
    assert_eq!(response.status().as_u16(), 201);

    let body: Value = response.json().await.unwrap();
    body["exam"]["id"].as_i64().unwrap()
}

/// Adds a question with three options; `correct` is the 0-based index of the right one.
/// Returns (question id, option ids in order).
async fn add_question(
    client: &reqwest::Client,
    address: &str,
    exam_id: i64,
    prompt: &str,
    correct: usize,
) -> (i64, Vec<i64>) {
    let options: Vec<Value> = ["A", "B", "C"]
        .iter()
        .enumerate()
        .map(|(i, text)| json!({ "text": text, "is_correct": i == correct }))
        .collect();

    let response = client
        .post(format!("{}/api/admin/exams/{}/questions", address, exam_id))
        .json(&json!({
            "prompt": prompt,
            "topic": "capitals",
            "position": 999,
            "options": options,
        }))
        .send()
        .await
        .expect("Failed to create question");
    assert_eq!(response.status().as_u16(), 201);

    let body: Value = response.json().await.unwrap();
    let option_ids = body["options"]
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["id"].as_i64().unwrap())
        .collect();
    (body["id"].as_i64().unwrap(), option_ids)
}

async fn publish(client: &reqwest::Client, address: &str, exam_id: i64) {
    let response = client
        .post(format!("{}/api/admin/exams/{}/publish", address, exam_id))
        .send()
        .await
        .expect("Failed to publish exam");
    assert_eq!(response.status().as_u16(), 200);
}

/// Published exam with three questions whose correct option is always the first.
async fn published_exam(client: &reqwest::Client, address: &str) -> (i64, Vec<(i64, Vec<i64>)>) {
    let exam_id = create_exam(client, address, &unique("Capitals")).await;
    let mut questions = Vec::new();
    for prompt in ["Capital of France?", "Capital of Peru?", "Capital of Japan?"] {
        questions.push(add_question(client, address, exam_id, prompt, 0).await);
    }
    publish(client, address, exam_id).await;
    (exam_id, questions)
}

async fn submit(
    client: &reqwest::Client,
    address: &str,
    exam_id: i64,
    body: Value,
) -> reqwest::Response {
    client
        .post(format!("{}/api/exams/{}/submit", address, exam_id))
        .json(&body)
        .send()
        .await
        .expect("Failed to execute request")
}

#[tokio::test]
async fn health_check_404() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn index_exposes_branding() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client.get(format!("{}/", address)).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["name"], Branding::default().site_header);
    assert_eq!(body["links"]["exams"], "/api/exams");
}

#[tokio::test]
async fn public_exam_hides_correct_answers() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (exam_id, questions) = published_exam(&client, &address).await;

    let response = client
        .get(format!("{}/api/exams/{}", address, exam_id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let body: Value = response.json().await.unwrap();
    let listed = body["questions"].as_array().unwrap();
    assert_eq!(listed.len(), 3);
    for (i, question) in listed.iter().enumerate() {
        assert_eq!(question["id"].as_i64().unwrap(), questions[i].0);
        assert_eq!(question["position"].as_i64().unwrap(), i as i64 + 1);
        for option in question["options"].as_array().unwrap() {
            assert!(option.get("is_correct").is_none());
        }
    }

    let list: Value = client
        .get(format!("{}/api/exams", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let summary = list
        .as_array()
        .unwrap()
        .iter()
        .find(|e| e["id"].as_i64() == Some(exam_id))
        .expect("published exam is listed");
    assert_eq!(summary["questions_count"], 3);
    assert_eq!(summary["effective_duration_minutes"], 20);
}

#[tokio::test]
async fn inactive_exam_is_not_found() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let exam_id = create_exam(&client, &address, &unique("Draft")).await;
    add_question(&client, &address, exam_id, "Unpublished?", 0).await;

    let response = client
        .get(format!("{}/api/exams/{}", address, exam_id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    let response = submit(&client, &address, exam_id, json!({ "user_name": "Ada" })).await;
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn submit_all_correct_scores_full_marks() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (exam_id, questions) = published_exam(&client, &address).await;

    let answers: serde_json::Map<String, Value> = questions
        .iter()
        .map(|(qid, options)| (qid.to_string(), json!(options[0])))
        .collect();
    let response = submit(
        &client,
        &address,
        exam_id,
        json!({ "user_name": "  Ada  ", "duration_seconds": 42, "answers": answers }),
    )
    .await;
    assert_eq!(response.status().as_u16(), 201);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["attempt"]["score"], 100);
    assert_eq!(body["attempt"]["correct_count"], 3);
    assert_eq!(body["attempt"]["total_questions"], 3);
    assert_eq!(body["attempt"]["user_name"], "Ada");
    assert_eq!(body["attempt"]["duration_seconds"], 42);
    assert_eq!(body["passing_score"], 50);
    assert_eq!(body["reviews"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn submit_partial_answers_rounds_percentage() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (exam_id, questions) = published_exam(&client, &address).await;

    // One right, one wrong, one missing: 1/3 -> 33.
    let one_right = json!({
        "user_name": "",
        "answers": {
            questions[0].0.to_string(): questions[0].1[0],
            questions[1].0.to_string(): questions[1].1[2],
        }
    });
    let body: Value = submit(&client, &address, exam_id, one_right)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["attempt"]["score"], 33);
    assert_eq!(body["attempt"]["user_name"], "Student");

    let reviews = body["reviews"].as_array().unwrap();
    assert_eq!(reviews[1]["is_correct"], false);
    assert_eq!(reviews[2]["selected_option_id"], Value::Null);
    assert_eq!(reviews[2]["selected_text"], "Not selected");
    assert_eq!(reviews[2]["correct_option_id"].as_i64(), Some(questions[2].1[0]));

    // Two right: 2/3 -> 67.
    let two_right = json!({
        "user_name": "Ada",
        "answers": {
            questions[0].0.to_string(): questions[0].1[0],
            questions[1].0.to_string(): questions[1].1[0].to_string(),
        }
    });
    let body: Value = submit(&client, &address, exam_id, two_right)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["attempt"]["score"], 67);
    assert_eq!(body["attempt"]["correct_count"], 2);
}

#[tokio::test]
async fn submit_without_answers_scores_zero() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (exam_id, _) = published_exam(&client, &address).await;

    let response = submit(&client, &address, exam_id, json!({ "user_name": "Ada" })).await;
    assert_eq!(response.status().as_u16(), 201);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["attempt"]["score"], 0);
    assert_eq!(body["attempt"]["correct_count"], 0);
    assert_eq!(body["reviews"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn option_from_another_question_does_not_count() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (exam_id, questions) = published_exam(&client, &address).await;

    // Answer question 1 with question 2's correct option.
    let body: Value = submit(
        &client,
        &address,
        exam_id,
        json!({
            "user_name": "Mallory",
            "answers": { questions[0].0.to_string(): questions[1].1[0] }
        }),
    )
    .await
    .json()
    .await
    .unwrap();

    assert_eq!(body["attempt"]["correct_count"], 0);
    assert_eq!(body["reviews"][0]["is_correct"], false);
    assert_eq!(body["reviews"][0]["selected_option_id"], Value::Null);
}

#[tokio::test]
async fn resubmission_creates_a_new_attempt() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (exam_id, _) = published_exam(&client, &address).await;

    let first: Value = submit(&client, &address, exam_id, json!({ "user_name": "Ada" }))
        .await
        .json()
        .await
        .unwrap();
    let second: Value = submit(&client, &address, exam_id, json!({ "user_name": "Ada" }))
        .await
        .json()
        .await
        .unwrap();

    assert_ne!(first["attempt"]["id"], second["attempt"]["id"]);
}

#[tokio::test]
async fn submit_rejects_malformed_input() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (exam_id, questions) = published_exam(&client, &address).await;

    let negative = submit(
        &client,
        &address,
        exam_id,
        json!({ "user_name": "Ada", "duration_seconds": -5 }),
    )
    .await;
    assert_eq!(negative.status().as_u16(), 400);

    let bad_value = submit(
        &client,
        &address,
        exam_id,
        json!({ "user_name": "Ada", "answers": { questions[0].0.to_string(): "first" } }),
    )
    .await;
    assert_eq!(bad_value.status().as_u16(), 400);
    let body: Value = bad_value.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn empty_active_exam_rejects_submission_without_saving() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let exam_id = create_exam(&client, &address, &unique("Emptied")).await;
    let (question_id, _) = add_question(&client, &address, exam_id, "Only one?", 0).await;
    publish(&client, &address, exam_id).await;

    // Removing the last question leaves an active exam with nothing to answer.
    let response = client
        .delete(format!("{}/api/admin/questions/{}", address, question_id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);

    let user_name = unique("empty");
    let response = submit(&client, &address, exam_id, json!({ "user_name": user_name })).await;
    assert_eq!(response.status().as_u16(), 400);

    let attempts: Value = client
        .get(format!("{}/api/stats/attempts", address))
        .query(&[("user_name", user_name.as_str())])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(attempts.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn stats_aggregate_per_user() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (exam_id, questions) = published_exam(&client, &address).await;
    let user_name = unique("stats");

    let all_right: serde_json::Map<String, Value> = questions
        .iter()
        .map(|(qid, options)| (qid.to_string(), json!(options[0])))
        .collect();
    submit(
        &client,
        &address,
        exam_id,
        json!({ "user_name": user_name, "duration_seconds": 30, "answers": all_right }),
    )
    .await;
    submit(
        &client,
        &address,
        exam_id,
        json!({ "user_name": user_name, "duration_seconds": 10 }),
    )
    .await;

    let stats: Value = client
        .get(format!("{}/api/stats/users", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let mine = stats
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["user_name"] == user_name.as_str())
        .expect("user appears in stats");
    assert_eq!(mine["attempts_count"], 2);
    assert_eq!(mine["best_score"], 100);
    assert_eq!(mine["avg_score"].as_f64(), Some(50.0));
    assert_eq!(mine["avg_duration_seconds"].as_f64(), Some(20.0));

    let attempts: Value = client
        .get(format!("{}/api/stats/attempts", address))
        .query(&[("user_name", user_name.as_str())])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let attempts = attempts.as_array().unwrap();
    assert_eq!(attempts.len(), 2);
    // Most recent first.
    assert_eq!(attempts[0]["score"], 0);
    assert_eq!(attempts[0]["exam"].as_i64(), Some(exam_id));
}

#[tokio::test]
async fn exam_with_attempts_cannot_be_deleted() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (exam_id, questions) = published_exam(&client, &address).await;
    submit(&client, &address, exam_id, json!({ "user_name": "Ada" })).await;

    let response = client
        .delete(format!("{}/api/admin/exams/{}", address, exam_id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);

    let response = client
        .delete(format!("{}/api/admin/questions/{}", address, questions[0].0))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn trailing_slash_paths_reach_the_same_handlers() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (exam_id, _) = published_exam(&client, &address).await;
    let user_name = unique("slash");

    for path in [
        "/api/exams/".to_string(),
        format!("/api/exams/{}/", exam_id),
        "/api/stats/users/".to_string(),
    ] {
        let response = client.get(format!("{}{}", address, path)).send().await.unwrap();
        assert_eq!(response.status().as_u16(), 200, "GET {}", path);
    }

    let response = client
        .post(format!("{}/api/exams/{}/submit/", address, exam_id))
        .json(&json!({ "user_name": user_name }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);

    let attempts: Value = client
        .get(format!("{}/api/stats/attempts/", address))
        .query(&[("user_name", user_name.as_str())])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(attempts.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn submission_persists_one_answer_row_per_question() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let pool = connect_db().await;
    let (exam_id, questions) = published_exam(&client, &address).await;

    let body: Value = submit(
        &client,
        &address,
        exam_id,
        json!({
            "user_name": "Ada",
            "answers": {
                questions[0].0.to_string(): questions[0].1[0],
                questions[1].0.to_string(): questions[1].1[2],
            }
        }),
    )
    .await
    .json()
    .await
    .unwrap();
    let attempt_id = body["attempt"]["id"].as_i64().unwrap();
    assert_eq!(body["attempt"]["total_questions"], 3);

    let rows = sqlx::query_as::<_, (i64, Option<i64>, bool)>(
        "SELECT question_id, selected_option_id, is_correct \
         FROM attempt_answers WHERE attempt_id = $1 ORDER BY question_id",
    )
    .bind(attempt_id)
    .fetch_all(&pool)
    .await
    .unwrap();

    assert_eq!(
        rows,
        vec![
            (questions[0].0, Some(questions[0].1[0]), true),
            (questions[1].0, Some(questions[1].1[2]), false),
            (questions[2].0, None, false),
        ]
    );
}

#[tokio::test]
async fn deleting_a_selected_option_keeps_the_answer_row() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let pool = connect_db().await;
    let (exam_id, questions) = published_exam(&client, &address).await;
    let (question_id, option_ids) = &questions[1];

    let body: Value = submit(
        &client,
        &address,
        exam_id,
        json!({
            "user_name": "Ada",
            "answers": { question_id.to_string(): option_ids[2] }
        }),
    )
    .await
    .json()
    .await
    .unwrap();
    let attempt_id = body["attempt"]["id"].as_i64().unwrap();

    let response = client
        .delete(format!("{}/api/admin/options/{}", address, option_ids[2]))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);

    let row = sqlx::query_as::<_, (Option<i64>, bool)>(
        "SELECT selected_option_id, is_correct FROM attempt_answers \
         WHERE attempt_id = $1 AND question_id = $2",
    )
    .bind(attempt_id)
    .bind(*question_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(row, (None, false));

    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM attempt_answers WHERE attempt_id = $1")
            .bind(attempt_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(count, 3);
}

#[tokio::test]
async fn plain_text_fields_are_stored_as_typed() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let title = format!("Rivers & <Lakes> {}", unique("t"));
    let exam_id = create_exam(&client, &address, &title).await;
    let (question_id, _) = add_question(&client, &address, exam_id, "Which is larger?", 0).await;

    // Exactly at the column limit, with characters an HTML escaper would expand.
    let text = format!("x < y & {}", "a".repeat(292));
    assert_eq!(text.chars().count(), 300);
    let response = client
        .post(format!("{}/api/admin/questions/{}/options", address, question_id))
        .json(&json!({ "text": text }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let option: Value = response.json().await.unwrap();
    assert_eq!(option["text"], text.as_str());

    let detail: Value = client
        .get(format!("{}/api/admin/exams/{}", address, exam_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail["title"], title.as_str());
    let stored = detail["questions"][0]["options"]
        .as_array()
        .unwrap()
        .iter()
        .any(|o| o["text"] == text.as_str());
    assert!(stored);

    // Too long even before any processing: a client error, not a 500.
    let response = client
        .post(format!("{}/api/admin/questions/{}/options", address, question_id))
        .json(&json!({ "text": "b".repeat(301) }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn pending_reorder_does_not_block_submissions() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let pool = connect_db().await;
    let (exam_id, questions) = published_exam(&client, &address).await;

    // Hold the exam's ordering locks in an open transaction.
    let mut tx = pool.begin().await.unwrap();
    sequencer::reorder_within(&mut tx, SiblingKind::Question, questions[0].0, Some(3))
        .await
        .unwrap();

    let submission = submit(
        &client,
        &address,
        exam_id,
        json!({
            "user_name": "Ada",
            "answers": { questions[0].0.to_string(): questions[0].1[0] }
        }),
    );
    let response = tokio::time::timeout(std::time::Duration::from_secs(10), submission)
        .await
        .expect("submission waited on the ordering locks");
    assert_eq!(response.status().as_u16(), 201);

    tx.rollback().await.unwrap();
}
