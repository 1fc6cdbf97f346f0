// tests/common/mod.rs

use std::sync::Arc;

use chrono::Duration;
use sjt_prep::{
    config::{Config, ExamSettings},
    engine::ExamService,
    models::question::{
        NewActionOption, NewBestThreeQuestion, NewQuestion, NewRankableAction, NewRankingQuestion,
        QuestionBody,
    },
    routes,
    state::AppState,
    store::{
        QuestionRepository,
        memory::{MemoryQuestionRepository, MemorySessionStore},
    },
    utils::jwt::sign_jwt,
};

pub const JWT_SECRET: &str = "test_secret_for_integration_tests";

#[allow(dead_code)]
pub struct TestApp {
    pub address: String,
    pub repo: Arc<MemoryQuestionRepository>,
    pub sessions: Arc<MemorySessionStore>,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }
}

pub fn bearer(user_id: i64) -> String {
    let token = sign_jwt(user_id, "user", JWT_SECRET, 600).expect("Failed to sign token");
    format!("Bearer {}", token)
}

pub fn ranking(i: usize, is_pilot: bool) -> NewQuestion {
    NewQuestion::Ranking(NewRankingQuestion {
        attribute: Some("Integrity".to_string()),
        scenario: format!("Ranking scenario {}", i),
        rationale: format!("Ranking rationale {}", i),
        is_pilot,
        is_active: true,
        actions: [3u8, 1, 5, 2, 4]
            .iter()
            .map(|rank| NewRankableAction {
                action_text: format!("Ranking {} action {}", i, rank),
                correct_rank: *rank,
            })
            .collect(),
    })
}

pub fn best_three(i: usize, is_pilot: bool) -> NewQuestion {
    NewQuestion::BestThree(NewBestThreeQuestion {
        attribute: Some("Teamwork".to_string()),
        scenario: format!("Best-three scenario {}", i),
        rationale: format!("Best-three rationale {}", i),
        is_pilot,
        is_active: true,
        options: (0..8)
            .map(|o| NewActionOption {
                action_text: format!("Best-three {} option {}", i, o),
                is_correct: matches!(o, 1 | 4 | 6),
            })
            .collect(),
    })
}

/// Correct submission for a question, as action ids.
#[allow(dead_code)]
pub fn correct_answer(body: &QuestionBody) -> Vec<String> {
    match body {
        QuestionBody::Ranking { actions } => {
            let mut sorted = actions.clone();
            sorted.sort_by_key(|a| a.correct_rank);
            sorted.iter().map(|a| a.id.to_string()).collect()
        }
        QuestionBody::BestThree { options } => options
            .iter()
            .filter(|o| o.is_correct)
            .map(|o| o.id.to_string())
            .collect(),
    }
}

/// Spawns the app on a random port with in-memory stores.
/// Returns the running app and its stores for seeding and inspection.
pub async fn spawn_app(
    settings: ExamSettings,
    content: Vec<NewQuestion>,
) -> TestApp {
    let repo = Arc::new(MemoryQuestionRepository::new());
    for question in content {
        let validated = question.validated().expect("Seed content must be valid");
        repo.insert(&validated).await.expect("Failed to seed question");
    }
    let sessions = Arc::new(MemorySessionStore::new());

    let config = Config {
        database_url: "postgres://unused".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        exam: settings.clone(),
    };

    let exams = ExamService::new(repo.clone(), sessions.clone(), settings);
    let state = AppState { exams, config };
    let app = routes::create_router(state);

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // Spawn the server in the background
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address,
        repo,
        sessions,
    }
}

/// Two of each archetype, no pilots.
pub fn small_exam(duration: Duration) -> ExamSettings {
    ExamSettings {
        ranking_quota: 2,
        best_three_quota: 2,
        duration,
    }
}

#[allow(dead_code)]
pub fn small_content() -> Vec<NewQuestion> {
    vec![
        ranking(0, false),
        ranking(1, false),
        best_three(0, false),
        best_three(1, false),
    ]
}
