// tests/exam_flow_tests.rs

mod common;

use chrono::Duration;
use common::{bearer, best_three, correct_answer, ranking, small_content, small_exam, spawn_app};
use sjt_prep::store::SessionStore;

#[tokio::test]
async fn full_exam_with_correct_answers_scores_one_hundred() {
    // Arrange
    let app = spawn_app(small_exam(Duration::minutes(105)), small_content()).await;
    let client = reqwest::Client::new();
    let user = 10;

    // 1. Start
    let start = client
        .post(app.url("/api/sjt/start"))
        .header("Authorization", bearer(user))
        .send()
        .await
        .expect("Start failed");
    assert_eq!(start.status().as_u16(), 201);
    let start: serde_json::Value = start.json().await.unwrap();
    assert_eq!(start["total_questions"], 4);
    assert_eq!(start["duration_seconds"], 105 * 60);

    // 2. Load the player
    let state: serde_json::Value = client
        .get(app.url("/api/sjt/exam"))
        .header("Authorization", bearer(user))
        .send()
        .await
        .expect("Fetch exam failed")
        .json()
        .await
        .unwrap();
    assert_eq!(state["status"], "in_progress");
    let questions = state["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 4);
    for q in questions {
        assert!(q.get("rationale").is_none());
        let actions = q["actions"].as_array().unwrap();
        match q["archetype"].as_str().unwrap() {
            "ranking" => assert_eq!(actions.len(), 5),
            "best_three" => assert_eq!(actions.len(), 8),
            other => panic!("unexpected archetype {}", other),
        }
    }

    // 3. Submit the correct answer for every position
    let session = app.sessions.get_active(user).await.unwrap();
    for entry in &session.questions {
        let response = client
            .post(app.url("/api/sjt/answers"))
            .header("Authorization", bearer(user))
            .json(&serde_json::json!({
                "position": entry.position,
                "answers": correct_answer(&entry.question.body),
            }))
            .send()
            .await
            .expect("Submit failed");
        assert_eq!(response.status().as_u16(), 200);
    }

    // 4. Results
    let results: serde_json::Value = client
        .get(app.url("/api/sjt/results"))
        .header("Authorization", bearer(user))
        .send()
        .await
        .expect("Results failed")
        .json()
        .await
        .unwrap();

    assert_eq!(results["percentage"], 100.0);
    assert_eq!(results["total_score"], 64);
    assert_eq!(results["max_possible_score"], 64);
    assert_eq!(results["timed_out"], false);
    assert_eq!(results["questions"].as_array().unwrap().len(), 4);
    assert!(results["questions"][0]["rationale"].as_str().is_some());

    // 5. The session is gone afterwards
    let again = client
        .get(app.url("/api/sjt/results"))
        .header("Authorization", bearer(user))
        .send()
        .await
        .unwrap();
    assert_eq!(again.status().as_u16(), 404);
}

#[tokio::test]
async fn resubmitting_the_same_answer_changes_nothing() {
    let app = spawn_app(small_exam(Duration::minutes(105)), small_content()).await;
    let client = reqwest::Client::new();
    let user = 11;

    client
        .post(app.url("/api/sjt/start"))
        .header("Authorization", bearer(user))
        .send()
        .await
        .unwrap();

    let payload = serde_json::json!({ "position": 2, "answers": ["7", "3"] });
    for _ in 0..2 {
        let response = client
            .post(app.url("/api/sjt/answers"))
            .header("Authorization", bearer(user))
            .json(&payload)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
    }

    let state: serde_json::Value = client
        .get(app.url("/api/sjt/exam"))
        .header("Authorization", bearer(user))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(state["answers"], serde_json::json!({ "2": ["7", "3"] }));
}

#[tokio::test]
async fn clearing_an_answer_keeps_the_position_unanswered() {
    let app = spawn_app(small_exam(Duration::minutes(105)), small_content()).await;
    let client = reqwest::Client::new();
    let user = 12;

    client
        .post(app.url("/api/sjt/start"))
        .header("Authorization", bearer(user))
        .send()
        .await
        .unwrap();

    for answers in [serde_json::json!(["1"]), serde_json::json!([])] {
        client
            .post(app.url("/api/sjt/answers"))
            .header("Authorization", bearer(user))
            .json(&serde_json::json!({ "position": 0, "answers": answers }))
            .send()
            .await
            .unwrap();
    }

    let results: serde_json::Value = client
        .get(app.url("/api/sjt/results"))
        .header("Authorization", bearer(user))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(results["total_score"], 0);
}

#[tokio::test]
async fn timed_out_exam_is_auto_finalized() {
    // Arrange: zero-length exam
    let app = spawn_app(small_exam(Duration::zero()), small_content()).await;
    let client = reqwest::Client::new();
    let user = 13;

    let start: serde_json::Value = client
        .post(app.url("/api/sjt/start"))
        .header("Authorization", bearer(user))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(start["seconds_remaining"], 0);

    // Draft saving is refused
    let response = client
        .post(app.url("/api/sjt/answers"))
        .header("Authorization", bearer(user))
        .json(&serde_json::json!({ "position": 0, "answers": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 410);

    // The player is sent to the results
    let state: serde_json::Value = client
        .get(app.url("/api/sjt/exam"))
        .header("Authorization", bearer(user))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(state["status"], "expired");
    assert_eq!(state["results"], "/api/sjt/results");

    // Results still work
    let response = client
        .get(app.url("/api/sjt/results"))
        .header("Authorization", bearer(user))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let results: serde_json::Value = response.json().await.unwrap();
    assert_eq!(results["timed_out"], true);
    assert_eq!(results["total_score"], 0);
    assert_eq!(results["max_possible_score"], 64);
}

#[tokio::test]
async fn pilot_questions_are_reported_but_not_counted() {
    let content = vec![
        ranking(0, true),
        ranking(1, false),
        best_three(0, false),
        best_three(1, false),
    ];
    let app = spawn_app(small_exam(Duration::minutes(105)), content).await;
    let client = reqwest::Client::new();
    let user = 14;

    client
        .post(app.url("/api/sjt/start"))
        .header("Authorization", bearer(user))
        .send()
        .await
        .unwrap();

    let results: serde_json::Value = client
        .get(app.url("/api/sjt/results"))
        .header("Authorization", bearer(user))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(results["max_possible_score"], 20 + 2 * 12);
    let questions = results["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 4);
    assert_eq!(
        questions.iter().filter(|q| q["is_pilot"] == true).count(),
        1
    );
}

#[tokio::test]
async fn users_have_separate_sessions() {
    let app = spawn_app(small_exam(Duration::minutes(105)), small_content()).await;
    let client = reqwest::Client::new();

    for user in [20, 21] {
        client
            .post(app.url("/api/sjt/start"))
            .header("Authorization", bearer(user))
            .send()
            .await
            .unwrap();
    }

    client
        .post(app.url("/api/sjt/answers"))
        .header("Authorization", bearer(20))
        .json(&serde_json::json!({ "position": 1, "answers": ["5"] }))
        .send()
        .await
        .unwrap();

    assert_eq!(app.sessions.get_active(20).await.unwrap().answers.len(), 1);
    assert!(app.sessions.get_active(21).await.unwrap().answers.is_empty());
}
