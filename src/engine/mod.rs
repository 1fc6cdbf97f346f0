// src/engine/mod.rs

//! The SJT exam engine: assembly, session lifecycle and scoring.

use std::sync::Arc;

use chrono::Utc;
use rand::seq::SliceRandom;

use crate::{
    config::ExamSettings,
    error::ExamError,
    models::{
        question::{PublicAction, PublicQuestion},
        results::ExamResults,
        session::{ExamSession, ExamState, ExamView, SessionStatus},
    },
    store::{QuestionRepository, SessionStore},
};

pub mod assembler;
pub mod scorer;

/// Where the exam player is sent once time is up.
pub const RESULTS_PATH: &str = "/api/sjt/results";

/// Player view of a session. Actions are reshuffled on every call so the
/// authored order never reaches the client.
pub fn build_view(session: &ExamSession) -> ExamView {
    let mut rng = rand::thread_rng();
    let questions = session
        .questions
        .iter()
        .map(|entry| {
            let mut actions: Vec<PublicAction> = entry
                .question
                .action_texts()
                .into_iter()
                .map(|(id, text)| PublicAction {
                    id: id.to_string(),
                    text: text.to_string(),
                })
                .collect();
            actions.shuffle(&mut rng);
            PublicQuestion {
                position: entry.position,
                archetype: entry.archetype,
                scenario: entry.question.scenario.clone(),
                actions,
            }
        })
        .collect();

    ExamView {
        questions,
        seconds_remaining: session.time_remaining().num_seconds(),
        answers: session.answers.clone(),
    }
}

/// Engine entry points, one per request type.
#[derive(Clone)]
pub struct ExamService {
    questions: Arc<dyn QuestionRepository>,
    sessions: Arc<dyn SessionStore>,
    settings: ExamSettings,
}

impl ExamService {
    pub fn new(
        questions: Arc<dyn QuestionRepository>,
        sessions: Arc<dyn SessionStore>,
        settings: ExamSettings,
    ) -> Self {
        Self {
            questions,
            sessions,
            settings,
        }
    }

    pub fn settings(&self) -> &ExamSettings {
        &self.settings
    }

    pub fn questions(&self) -> &Arc<dyn QuestionRepository> {
        &self.questions
    }

    /// Assembles a new exam and replaces any attempt already in flight.
    pub async fn start_exam(&self, user_id: i64) -> Result<ExamSession, ExamError> {
        let session =
            assembler::assemble_exam(self.questions.as_ref(), user_id, &self.settings, Utc::now())
                .await
                .inspect_err(|e| {
                    if matches!(e, ExamError::InsufficientContent { .. }) {
                        tracing::warn!("Cannot start SJT exam for user {}: {}", user_id, e);
                    }
                })?;

        self.sessions.start(&session).await?;
        tracing::info!(
            "SJT exam started for user {} ({} questions, {}s)",
            user_id,
            session.questions.len(),
            session.duration_seconds
        );
        Ok(session)
    }

    /// Current state of the user's exam. An expired attempt is marked as such
    /// and the caller is pointed at the results.
    pub async fn exam_state(&self, user_id: i64) -> Result<ExamState, ExamError> {
        let mut session = self.sessions.get_active(user_id).await?;

        if session.is_expired_at(Utc::now()) {
            if session.status != SessionStatus::Expired {
                tracing::info!("SJT exam for user {} ran out of time", user_id);
                self.sessions.set_status(user_id, SessionStatus::Expired).await?;
            }
            return Ok(ExamState::Expired {
                results: RESULTS_PATH.to_string(),
            });
        }

        if session.status == SessionStatus::Created {
            self.sessions.set_status(user_id, SessionStatus::InProgress).await?;
            session.status = SessionStatus::InProgress;
        }

        Ok(ExamState::InProgress(build_view(&session)))
    }

    pub async fn submit_answer(
        &self,
        user_id: i64,
        position: usize,
        selected_ids: Vec<String>,
    ) -> Result<(), ExamError> {
        self.sessions
            .submit_partial_answer(user_id, position, selected_ids)
            .await?;
        tracing::debug!("Saved SJT answer for user {} at position {}", user_id, position);
        Ok(())
    }

    /// Finalizes the attempt (expired or not) and scores it. The session is gone afterwards.
    pub async fn results(&self, user_id: i64) -> Result<ExamResults, ExamError> {
        let finalized = self.sessions.finalize(user_id).await?;
        let results = scorer::score(&finalized);
        tracing::info!(
            "SJT exam scored for user {}: {}/{} ({}%){}",
            user_id,
            results.total_score,
            results.max_possible_score,
            results.percentage,
            if results.timed_out { " after time ran out" } else { "" }
        );
        Ok(results)
    }
}
