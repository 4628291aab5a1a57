// tests/api_tests.rs

use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use examhall::{
    config::Config,
    engine::Engine,
    routes,
    state::AppState,
    store::{ExamStore, MemoryStore, PgStore},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use sqlx::postgres::PgPoolOptions;

const JWT_SECRET: &str = "test_secret_for_integration_tests";
const IDENTITY_SECRET: &str = "test_identity_secret";

struct TestApp {
    address: String,
    client: reqwest::Client,
}

/// Postgres when `DATABASE_URL` is set, the in-memory store otherwise.
async fn open_store() -> Arc<dyn ExamStore> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return Arc::new(MemoryStore::new());
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing. Check DATABASE_URL.");
    let store = PgStore::new(pool);
    store.migrate().await.expect("Failed to migrate database");
    Arc::new(store)
}

/// Spawns the app on a random port.
async fn spawn_app() -> TestApp {
    let config = Config {
        database_url: None,
        jwt_secret: JWT_SECRET.to_string(),
        jwt_expiration: 600,
        identity_secret: IDENTITY_SECRET.to_string(),
        student_email_domain: "students.example.edu".to_string(),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        cors_origins: vec!["http://localhost:5173".to_string()],
        store_timeout: Duration::from_secs(5),
        scorer_url: None,
        scorer_timeout: Duration::from_secs(5),
        rust_log: "error".to_string(),
    };

    let engine = Engine::new(open_store().await, None, config.store_timeout);
    let app = routes::create_router(AppState { engine, config });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        client: reqwest::Client::new(),
    }
}

fn assertion(email: &str, name: &str, secret: &str) -> String {
    let exp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
        + 600;
    encode(
        &Header::default(),
        &json!({ "sub": format!("idp|{email}"), "email": email, "name": name, "exp": exp }),
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// Signs in through the identity callback and returns the bearer token.
    async fn sign_in(&self, email: &str, name: &str) -> String {
        let response = self
            .client
            .post(self.url("/api/auth/callback"))
            .json(&json!({ "assertion": assertion(email, name, IDENTITY_SECRET) }))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), 200);

        let body: Value = response.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    async fn get(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request")
    }

    async fn post(&self, path: &str, token: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    async fn put(&self, path: &str, token: &str, body: Value) -> reqwest::Response {
        self.client
            .put(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }
}

/// 5 easy, 3 medium and 2 hard questions, open today.
fn exam_payload() -> Value {
    let mut questions = Vec::new();
    for (level, count) in [("easy", 5), ("medium", 3), ("hard", 2)] {
        for i in 0..count {
            questions.push(json!({
                "question": format!("{level} question {i}"),
                "types": ["text"],
                "level": level
            }));
        }
    }
    json!({
        "exam_name": "Web Basics",
        "exam_type": "external",
        "available_dates": [chrono::Utc::now().date_naive()],
        "duration": 60,
        "questions": questions
    })
}

async fn create_exam_with_sets(app: &TestApp, teacher: &str) -> String {
    let response = app.post("/api/exams", teacher, exam_payload()).await;
    assert_eq!(response.status().as_u16(), 201);
    let exam: Value = response.json().await.unwrap();
    let exam_id = exam["id"].as_str().unwrap().to_string();

    let response = app
        .post(
            &format!("/api/exams/{exam_id}/sets"),
            teacher,
            json!({ "num_sets": 2, "hard": 1, "medium": 1, "easy": 2 }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["sets"].as_array().unwrap().len(), 2);

    exam_id
}

#[tokio::test]
async fn health_check_404() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(app.url("/random_path_that_does_not_exist"))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn callback_rejects_forged_assertion() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(app.url("/api/auth/callback"))
        .json(&json!({ "assertion": assertion("x@example.edu", "X", "wrong_secret") }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn callback_assigns_role_by_domain() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(app.url("/api/auth/callback"))
        .json(&json!({ "assertion": assertion("ada@students.example.edu", "Ada", IDENTITY_SECRET) }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["role"], "student");
    assert_eq!(body["type"], "Bearer");
}

#[tokio::test]
async fn protected_routes_require_token() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(app.url("/api/exams"))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 401);

    let response = app.get("/api/sessions", "not-a-token").await;
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn role_gates_are_enforced() {
    let app = spawn_app().await;
    let teacher = app.sign_in("prof@example.edu", "Prof").await;
    let student = app.sign_in("s1@students.example.edu", "Student 1").await;

    let response = app.post("/api/exams", &student, exam_payload()).await;
    assert_eq!(response.status().as_u16(), 403);

    let response = app.get("/api/exams/available", &teacher).await;
    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn malformed_ids_and_payloads_are_bad_requests() {
    let app = spawn_app().await;
    let teacher = app.sign_in("prof@example.edu", "Prof").await;
    let student = app.sign_in("s1@students.example.edu", "Student 1").await;

    let response = app.get("/api/exams/not-a-uuid", &teacher).await;
    assert_eq!(response.status().as_u16(), 400);

    let response = app
        .post("/api/exams/not-a-uuid/assign", &student, json!({}))
        .await;
    assert_eq!(response.status().as_u16(), 400);

    let mut payload = exam_payload();
    payload["questions"] = json!([]);
    let response = app.post("/api/exams", &teacher, payload).await;
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn generate_sets_rejects_unsatisfiable_composition() {
    let app = spawn_app().await;
    let teacher = app.sign_in("prof@example.edu", "Prof").await;

    let response = app.post("/api/exams", &teacher, exam_payload()).await;
    let exam: Value = response.json().await.unwrap();
    let exam_id = exam["id"].as_str().unwrap();

    let response = app
        .post(
            &format!("/api/exams/{exam_id}/sets"),
            &teacher,
            json!({ "num_sets": 1, "hard": 3 }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 400);

    let response = app.get(&format!("/api/exams/{exam_id}"), &teacher).await;
    let exam: Value = response.json().await.unwrap();
    assert!(exam["sets"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn other_teachers_cannot_touch_exam() {
    let app = spawn_app().await;
    let owner = app.sign_in("prof@example.edu", "Prof").await;
    let other = app.sign_in("other@example.edu", "Other").await;
    let exam_id = create_exam_with_sets(&app, &owner).await;

    let response = app.get(&format!("/api/exams/{exam_id}"), &other).await;
    assert_eq!(response.status().as_u16(), 403);

    let response = app
        .post(
            &format!("/api/exams/{exam_id}/sets"),
            &other,
            json!({ "num_sets": 1, "easy": 1 }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn assignment_balances_sets_across_students() {
    let app = spawn_app().await;
    let teacher = app.sign_in("prof@example.edu", "Prof").await;
    let exam_id = create_exam_with_sets(&app, &teacher).await;

    let mut assigned = Vec::new();
    for n in 1..=3 {
        let student = app
            .sign_in(&format!("s{n}@students.example.edu"), &format!("Student {n}"))
            .await;
        let response = app
            .post(&format!("/api/exams/{exam_id}/assign"), &student, json!({}))
            .await;
        assert_eq!(response.status().as_u16(), 200);
        let session: Value = response.json().await.unwrap();
        assigned.push(session["set"].as_i64().unwrap());
    }

    assert_eq!(assigned[0], 1);
    assert_eq!(assigned[1], 2);
    assert!(assigned[2] == 1 || assigned[2] == 2);

    let response = app
        .get(&format!("/api/exams/{exam_id}/sessions"), &teacher)
        .await;
    let sessions: Value = response.json().await.unwrap();
    assert_eq!(sessions.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn full_exam_flow() {
    let app = spawn_app().await;
    let teacher = app.sign_in("prof@example.edu", "Prof").await;
    let student = app.sign_in("s1@students.example.edu", "Student 1").await;
    let exam_id = create_exam_with_sets(&app, &teacher).await;

    // Student sees today's exam without its question bank.
    let response = app.get("/api/exams/available", &student).await;
    let available: Value = response.json().await.unwrap();
    let listed = available
        .as_array()
        .unwrap()
        .iter()
        .find(|exam| exam["id"] == exam_id.as_str())
        .expect("exam should be available today");
    assert!(listed.get("questions").is_none());

    // Assignment is idempotent.
    let session: Value = app
        .post(&format!("/api/exams/{exam_id}/assign"), &student, json!({}))
        .await
        .json()
        .await
        .unwrap();
    let again: Value = app
        .post(&format!("/api/exams/{exam_id}/assign"), &student, json!({}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(session["id"], again["id"]);
    assert_eq!(session["status"], "didnotstart");
    let session_id = session["id"].as_str().unwrap().to_string();

    // The assigned paper is readable.
    let set_id = session["qpaper_id"].as_str().unwrap();
    let response = app.get(&format!("/api/sets/{set_id}"), &student).await;
    assert_eq!(response.status().as_u16(), 200);
    let set: Value = response.json().await.unwrap();
    assert_eq!(set["questions"].as_array().unwrap().len(), 4);

    // Submitting before starting is rejected.
    let first_question = session["data"][0]["question"].as_str().unwrap().to_string();
    let answers = json!({
        "answers": [{ "question": first_question, "type": "text", "answer": "my answer" }]
    });
    let response = app
        .post(&format!("/api/sessions/{session_id}/submit"), &student, answers.clone())
        .await;
    assert_eq!(response.status().as_u16(), 400);

    // Nothing to grade until the sheet is submitted.
    let response = app
        .post(&format!("/api/sessions/{session_id}/evaluation"), &teacher, json!({}))
        .await;
    assert_eq!(response.status().as_u16(), 400);

    let response = app
        .post(&format!("/api/sessions/{session_id}/start"), &student, json!({}))
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let response = app
        .post(&format!("/api/sessions/{session_id}/submit"), &student, answers)
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let submitted: Value = response.json().await.unwrap();
    assert_eq!(submitted["status"], "ended");
    assert_eq!(submitted["submitted"], true);
    assert_eq!(submitted["data"][0]["answers"][0]["ans"], "my answer");
    assert_eq!(submitted["data"][1]["answers"][0]["ans"], "");

    // Evaluation creation is idempotent.
    let path = format!("/api/sessions/{session_id}/evaluation");
    let first: Value = app.post(&path, &teacher, json!({})).await.json().await.unwrap();
    let second: Value = app.post(&path, &teacher, json!({})).await.json().await.unwrap();
    assert_eq!(first["evaluation_id"], second["evaluation_id"]);
    let evaluation_id = first["evaluation_id"].as_str().unwrap().to_string();

    let mut evaluation: Value = app
        .get(&format!("/api/evaluations/{evaluation_id}"), &teacher)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(evaluation["evaluated"], false);
    assert_eq!(evaluation["data"][0]["answers"][0]["ans"], "my answer");

    for entry in evaluation["data"].as_array_mut().unwrap() {
        entry["marks"] = json!(2);
    }
    let response = app
        .put(
            &format!("/api/evaluations/{evaluation_id}"),
            &teacher,
            json!({ "data": evaluation["data"], "total_marks": 8, "evaluated": true }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let results: Value = app
        .get(&format!("/api/exams/{exam_id}/results"), &teacher)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(
        results,
        json!([{ "student_name": "Student 1", "email": "s1@students.example.edu", "total_marks": 8 }])
    );

    // The student's history shows the finished session.
    let sessions: Value = app.get("/api/sessions", &student).await.json().await.unwrap();
    let finished = sessions
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["id"] == session_id.as_str())
        .expect("session should be listed");
    assert_eq!(finished["status"], "ended");
}
