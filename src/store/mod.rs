// src/store/mod.rs

//! Storage seams of the exam engine: read access to question content and
//! the per-user session arena.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::{
    error::ExamError,
    models::{
        question::{Archetype, Question, QuestionId, QuestionSummary, ValidatedQuestion},
        session::{ExamSession, FinalizedSession, SessionStatus},
    },
};

pub mod import;
pub mod memory;
pub mod postgres;

/// Read access to authored SJT content.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Ids and pilot flags of active questions, at most `limit_hint` of them.
    async fn fetch_active(
        &self,
        archetype: Archetype,
        limit_hint: Option<usize>,
    ) -> Result<Vec<QuestionSummary>, ExamError>;

    /// Full questions with their actions, in the order of `ids`.
    /// Ids that do not resolve are left out.
    async fn fetch_full(
        &self,
        ids: &[QuestionId],
        archetype: Archetype,
    ) -> Result<Vec<Question>, ExamError>;

    /// Stores authored content, returning the new question id.
    async fn insert(&self, question: &ValidatedQuestion) -> Result<QuestionId, ExamError>;
}

/// One exam session per user, last write wins.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persists a new session, replacing any prior one for the same user.
    async fn start(&self, session: &ExamSession) -> Result<(), ExamError>;

    async fn get_active(&self, user_id: i64) -> Result<ExamSession, ExamError>;

    async fn set_status(&self, user_id: i64, status: SessionStatus) -> Result<(), ExamError>;

    /// Overwrites the draft answer at `position`.
    /// Fails with `SessionExpired` once the clock has run out.
    async fn submit_partial_answer(
        &self,
        user_id: i64,
        position: usize,
        selected_ids: Vec<String>,
    ) -> Result<(), ExamError>;

    /// Removes the session and hands it over for scoring.
    async fn finalize(&self, user_id: i64) -> Result<FinalizedSession, ExamError>;
}

/// Decodes a stored session context. Undecodable data, including an
/// unparseable start time, is reported as corrupted.
pub fn decode_session(context: Value) -> Result<ExamSession, ExamError> {
    let session: ExamSession = serde_json::from_value(context)
        .map_err(|e| ExamError::CorruptedSession(e.to_string()))?;
    session.check_timer()?;
    Ok(session)
}

pub fn encode_session(session: &ExamSession) -> Result<Value, ExamError> {
    serde_json::to_value(session).map_err(|e| ExamError::Storage(e.to_string()))
}

/// Checks an answer write against the stored session.
pub fn check_answer_write(
    session: &ExamSession,
    position: usize,
    now: DateTime<Utc>,
) -> Result<(), ExamError> {
    if session.is_expired_at(now) {
        return Err(ExamError::SessionExpired);
    }
    session.check_position(position)
}
