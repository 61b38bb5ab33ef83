// tests/api_tests.rs

use std::{sync::Arc, time::Duration};

use arena::{config::Config, routes, state::AppState, store::MemoryChallengeStore, utils::jwt::sign_jwt};
use serde_json::{Value, json};

const SECRET: &str = "test_secret_for_integration_tests";

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
async fn spawn_app() -> String {
    // 1. Create test configuration and state (in-memory store, no database needed)
    let config = Config {
        database_url: None,
        jwt_secret: SECRET.to_string(),
        rust_log: "error".to_string(),
        port: 0,
    };

    let state = AppState {
        store: Arc::new(MemoryChallengeStore::new()),
        config,
    };

    // 2. Create the router with the app state
    let app = routes::create_router(state);

    // 3. Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // 4. Spawn the server in the background
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

fn token(participant_id: &str) -> String {
    sign_jwt(participant_id, SECRET, 600).expect("Failed to sign token")
}

fn questions() -> Value {
    json!([
        {"id": "q1", "prompt": "2 + 2", "options": ["3", "4"], "answer": "4", "time_limit_ms": 10000},
        {"id": "q2", "prompt": "H2O is", "options": ["water", "salt"], "answer": "water", "time_limit_ms": 10000},
        {"id": "q3", "prompt": "Largest planet", "options": ["Mars", "Jupiter"], "answer": "Jupiter", "time_limit_ms": 10000},
        {"id": "q4", "prompt": "Speed of light unit", "options": ["m/s", "kg"], "answer": "m/s", "time_limit_ms": 10000}
    ])
}

/// Answers every question, getting the first `correct` of them right.
fn answers(correct: usize, time_ms: u64) -> Value {
    let keys = ["4", "water", "Jupiter", "m/s"];
    let list: Vec<Value> = keys
        .iter()
        .enumerate()
        .map(|(i, key)| {
            let answer = if i < correct { *key } else { "wrong" };
            json!({
                "question_id": format!("q{}", i + 1),
                "answer": answer,
                "time_ms": time_ms,
            })
        })
        .collect();
    Value::Array(list)
}

async fn create_challenge(
    client: &reqwest::Client,
    address: &str,
    creator: &str,
    challenge_type: &str,
    opponents: &[&str],
) -> String {
    let response = client
        .post(format!("{}/api/challenges", address))
        .bearer_auth(token(creator))
        .json(&json!({
            "challenge_type": challenge_type,
            "opponent_ids": opponents,
            "questions": questions(),
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 201);
    let body = response.json::<Value>().await.unwrap();
    body["id"].as_str().unwrap().to_string()
}

async fn submit(
    client: &reqwest::Client,
    address: &str,
    challenge_id: &str,
    participant: &str,
    body: Value,
) -> reqwest::Response {
    client
        .post(format!("{}/api/challenges/{}/submit", address, challenge_id))
        .bearer_auth(token(participant))
        .json(&body)
        .send()
        .await
        .expect("Failed to execute request")
}

fn submission(name: &str, correct: usize, time_ms: u64) -> Value {
    json!({
        "display_name": name,
        "affiliation": "Lincoln High",
        "answers": answers(correct, time_ms),
    })
}

#[tokio::test]
async fn unknown_path_returns_404() {
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
async fn create_requires_identity() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/challenges", address))
        .json(&json!({"challenge_type": "practice", "questions": questions()}))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 401);
    let body = response.json::<Value>().await.unwrap();
    assert_eq!(body["error"], "Authentication required");
}

#[tokio::test]
async fn create_rejects_practice_with_opponents() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/challenges", address))
        .bearer_auth(token("alice"))
        .json(&json!({
            "challenge_type": "practice",
            "opponent_ids": ["bob"],
            "questions": questions(),
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn public_challenge_hides_answer_keys() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let id = create_challenge(&client, &address, "alice", "quick", &["bob"]).await;

    let body = client
        .get(format!("{}/api/challenges/{}", address, id))
        .send()
        .await
        .unwrap()
        .json::<Value>()
        .await
        .unwrap();

    assert_eq!(body["status"], "pending");
    assert_eq!(body["expected_participants"], 2);
    let questions = body["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 4);
    assert!(questions.iter().all(|q| q.get("answer").is_none()));
}

#[tokio::test]
async fn unknown_challenge_returns_404() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api/challenges/{}", address, uuid::Uuid::new_v4()))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn quick_match_waits_then_reveals_ranked_results() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let id = create_challenge(&client, &address, "alice", "quick", &["bob"]).await;

    // Alice finishes first: waiting on Bob.
    let response = submit(&client, &address, &id, "alice", submission("Alice", 3, 2000)).await;
    assert_eq!(response.status().as_u16(), 200);
    let body = response.json::<Value>().await.unwrap();
    assert_eq!(body["view"]["state"], "waiting");
    assert_eq!(body["view"]["finished"], 1);
    assert_eq!(body["view"]["expected"], 2);
    assert_eq!(body["integrity"]["status"], "clean");

    // Bob accepts and finishes with a better score.
    let response = client
        .post(format!("{}/api/challenges/{}/accept", address, id))
        .bearer_auth(token("bob"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let response = submit(&client, &address, &id, "bob", submission("Bob", 4, 2500)).await;
    assert_eq!(response.status().as_u16(), 200);
    let body = response.json::<Value>().await.unwrap();
    assert_eq!(body["view"]["state"], "revealed");
    assert_eq!(body["view"]["status"], "completed");
    assert_eq!(body["view"]["my_result"]["participant_id"], "bob");
    assert_eq!(body["view"]["my_result"]["rank"], 1);
    assert_eq!(body["view"]["my_result"]["score"], 40);

    // Alice now sees her own result, ranked second.
    let body = client
        .get(format!("{}/api/challenges/{}/results", address, id))
        .bearer_auth(token("alice"))
        .send()
        .await
        .unwrap()
        .json::<Value>()
        .await
        .unwrap();
    assert_eq!(body["state"], "revealed");
    assert_eq!(body["my_result"]["participant_id"], "alice");
    assert_eq!(body["my_result"]["rank"], 2);
    assert_eq!(body["my_result"]["score"], 30);
    assert_eq!(body["my_result"]["total_time_ms"], 8000);
    assert_eq!(body["my_result"]["affiliation"], "Lincoln High");
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["participant_id"], "bob");
}

#[tokio::test]
async fn second_submission_is_rejected() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let id = create_challenge(&client, &address, "alice", "quick", &["bob"]).await;

    let first = submit(&client, &address, &id, "alice", submission("Alice", 2, 2000)).await;
    assert_eq!(first.status().as_u16(), 200);

    let second = submit(&client, &address, &id, "alice", submission("Alice", 4, 2000)).await;
    assert_eq!(second.status().as_u16(), 409);
}

#[tokio::test]
async fn outsider_cannot_submit() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let id = create_challenge(&client, &address, "alice", "quick", &["bob"]).await;

    let response = submit(&client, &address, &id, "mallory", submission("Mallory", 4, 2000)).await;
    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn practice_reveals_immediately() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let id = create_challenge(&client, &address, "alice", "practice", &[]).await;

    let body = submit(&client, &address, &id, "alice", submission("Alice", 4, 3000))
        .await
        .json::<Value>()
        .await
        .unwrap();

    assert_eq!(body["view"]["state"], "revealed");
    assert_eq!(body["view"]["my_result"]["rank"], 1);
    assert_eq!(body["view"]["my_result"]["accuracy"], 100.0);
}

#[tokio::test]
async fn quick_match_against_bot_reveals_without_waiting() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let id = create_challenge(&client, &address, "alice", "quick", &["bot-7"]).await;

    let body = submit(&client, &address, &id, "alice", submission("Alice", 3, 2000))
        .await
        .json::<Value>()
        .await
        .unwrap();

    assert_eq!(body["view"]["state"], "revealed");
    assert_eq!(body["view"]["status"], "in-progress");
    // Provisional rank for the only result in.
    assert_eq!(body["view"]["my_result"]["rank"], 1);
}

#[tokio::test]
async fn impossibly_fast_submission_is_blocked() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let id = create_challenge(&client, &address, "alice", "practice", &[]).await;

    let response = submit(&client, &address, &id, "alice", submission("Alice", 4, 50)).await;
    assert_eq!(response.status().as_u16(), 400);

    // Nothing was recorded, so a genuine attempt still goes through.
    let response = submit(&client, &address, &id, "alice", submission("Alice", 4, 3000)).await;
    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn padding_fast_answers_with_unknown_questions_is_still_blocked() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let id = create_challenge(&client, &address, "alice", "practice", &[]).await;

    let mut padded = answers(4, 50).as_array().unwrap().clone();
    for i in 0..4 {
        padded.push(json!({"question_id": format!("ghost-{}", i), "answer": "x", "time_ms": 5000}));
    }
    padded.push(json!({"question_id": "q1", "answer": "4", "time_ms": 5000}));

    let response = submit(
        &client,
        &address,
        &id,
        "alice",
        json!({"display_name": "Alice", "answers": padded}),
    )
    .await;
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn results_stay_hidden_until_caller_submits() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    for (challenge_type, opponents) in [("practice", vec![]), ("quick", vec!["bot-7"])] {
        let id = create_challenge(&client, &address, "alice", challenge_type, &opponents).await;
        if !opponents.is_empty() {
            let bot = submit(&client, &address, &id, "bot-7", submission("Bot", 4, 2000)).await;
            assert_eq!(bot.status().as_u16(), 200);
        }

        let body = client
            .get(format!("{}/api/challenges/{}/results", address, id))
            .bearer_auth(token("alice"))
            .send()
            .await
            .expect("Failed to execute request")
            .json::<Value>()
            .await
            .unwrap();

        assert_eq!(body["state"], "playing", "{} challenge", challenge_type);
        assert!(body.get("results").is_none());
    }
}

#[tokio::test]
async fn display_name_markup_is_stripped() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let id = create_challenge(&client, &address, "alice", "practice", &[]).await;

    let body = submit(&client, &address, &id, "alice", submission("<b>Alice</b>", 1, 3000))
        .await
        .json::<Value>()
        .await
        .unwrap();

    assert_eq!(body["view"]["my_result"]["display_name"], "Alice");
}

#[tokio::test]
async fn event_stream_reveals_when_opponent_finishes() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let id = create_challenge(&client, &address, "alice", "school", &["bob"]).await;

    let first = submit(&client, &address, &id, "alice", submission("Alice", 4, 2000)).await;
    assert_eq!(first.status().as_u16(), 200);

    let mut stream = client
        .get(format!("{}/api/challenges/{}/events", address, id))
        .bearer_auth(token("alice"))
        .send()
        .await
        .unwrap();
    assert_eq!(stream.status().as_u16(), 200);

    // Wait for the initial view so the subscription is live.
    let mut buffer = String::new();
    while !buffer.contains("\"state\":\"waiting\"") {
        let chunk = tokio::time::timeout(Duration::from_secs(5), stream.chunk())
            .await
            .expect("Timed out waiting for initial view")
            .unwrap()
            .expect("Stream ended early");
        buffer.push_str(&String::from_utf8_lossy(&chunk));
    }

    let second = submit(&client, &address, &id, "bob", submission("Bob", 2, 2000)).await;
    assert_eq!(second.status().as_u16(), 200);

    while !buffer.contains("\"state\":\"revealed\"") {
        let chunk = tokio::time::timeout(Duration::from_secs(5), stream.chunk())
            .await
            .expect("Timed out waiting for revealed view")
            .unwrap()
            .expect("Stream ended early");
        buffer.push_str(&String::from_utf8_lossy(&chunk));
    }

    assert!(buffer.contains("event: view"));
    assert!(buffer.contains("\"participant_id\":\"alice\""));
}
