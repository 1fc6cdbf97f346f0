// src/models/session.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::ExamError,
    models::question::{Archetype, PublicQuestion, Question, QuestionId},
};

/// Lifecycle of an exam attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Created,
    InProgress,
    Expired,
    Finalized,
}

/// A question as placed in an exam, with its content snapshotted at assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionQuestion {
    pub position: usize,
    pub archetype: Archetype,
    pub question_id: QuestionId,
    pub is_pilot: bool,
    pub question: Question,
}

impl SessionQuestion {
    pub fn new(position: usize, question: Question) -> Self {
        Self {
            position,
            archetype: question.archetype(),
            question_id: question.id,
            is_pilot: question.is_pilot,
            question,
        }
    }
}

/// Server-side record of one user's in-flight exam.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamSession {
    pub user_id: i64,

    /// Presentation order, fixed at creation.
    pub questions: Vec<SessionQuestion>,

    pub start_time: DateTime<Utc>,

    pub duration_seconds: i64,

    /// Position -> selected action ids, as echoed by the client.
    /// An absent position is unanswered.
    #[serde(default)]
    pub answers: BTreeMap<usize, Vec<String>>,

    pub status: SessionStatus,
}

impl ExamSession {
    pub fn new(
        user_id: i64,
        questions: Vec<Question>,
        start_time: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        let questions = questions
            .into_iter()
            .enumerate()
            .map(|(position, q)| SessionQuestion::new(position, q))
            .collect();

        Self {
            user_id,
            questions,
            start_time,
            duration_seconds: duration.num_seconds(),
            answers: BTreeMap::new(),
            status: SessionStatus::Created,
        }
    }

    /// `None` when `duration_seconds` is outside what `Duration` can hold.
    pub fn duration(&self) -> Option<Duration> {
        Duration::try_seconds(self.duration_seconds)
    }

    /// `None` when the deadline falls outside the representable calendar.
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.duration()
            .and_then(|duration| self.start_time.checked_add_signed(duration))
    }

    /// `max(0, duration - elapsed)` at `now`.
    /// Unrepresentable timer data counts as no time left; `check_timer`
    /// rejects it before a session leaves the store.
    pub fn time_remaining_at(&self, now: DateTime<Utc>) -> Duration {
        let Some(deadline) = self.deadline() else {
            return Duration::zero();
        };
        let remaining = deadline.signed_duration_since(now);
        if remaining > Duration::zero() {
            remaining
        } else {
            Duration::zero()
        }
    }

    pub fn time_remaining(&self) -> Duration {
        self.time_remaining_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.time_remaining_at(now).is_zero()
    }

    /// Rejects timer data that cannot describe a real attempt.
    pub fn check_timer(&self) -> Result<(), ExamError> {
        if self.duration_seconds < 0 {
            return Err(ExamError::CorruptedSession(format!(
                "negative duration {}",
                self.duration_seconds
            )));
        }
        if self.deadline().is_none() {
            return Err(ExamError::CorruptedSession(format!(
                "duration {}s from {} overflows the clock",
                self.duration_seconds, self.start_time
            )));
        }
        Ok(())
    }

    pub fn check_position(&self, position: usize) -> Result<(), ExamError> {
        if position >= self.questions.len() {
            return Err(ExamError::InvalidPosition {
                position,
                total: self.questions.len(),
            });
        }
        Ok(())
    }

    /// Overwrites the draft for `position`. An empty list clears it.
    pub fn record_answer(&mut self, position: usize, selected_ids: Vec<String>) -> Result<(), ExamError> {
        self.check_position(position)?;
        self.answers.insert(position, selected_ids);
        Ok(())
    }

    pub fn answer_for(&self, position: usize) -> &[String] {
        self.answers
            .get(&position)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// A session taken out of the store for scoring.
#[derive(Debug, Clone)]
pub struct FinalizedSession {
    pub session: ExamSession,
    /// The clock had run out when the session was finalized.
    pub timed_out: bool,
}

impl FinalizedSession {
    pub fn from_session(mut session: ExamSession, now: DateTime<Utc>) -> Self {
        let timed_out = session.is_expired_at(now);
        session.status = SessionStatus::Finalized;
        Self { session, timed_out }
    }
}

/// What the exam player needs to render or resume an attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamView {
    pub questions: Vec<PublicQuestion>,
    pub seconds_remaining: i64,
    pub answers: BTreeMap<usize, Vec<String>>,
}

/// Response of `GET /api/sjt/exam`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExamState {
    InProgress(ExamView),
    Expired { results: String },
}

/// DTO returned when an exam starts.
#[derive(Debug, Serialize, Deserialize)]
pub struct StartExamResponse {
    pub total_questions: usize,
    pub duration_seconds: i64,
    pub seconds_remaining: i64,
    pub started_at: DateTime<Utc>,
}

/// DTO for saving a draft answer.
#[derive(Debug, Deserialize, validator::Validate)]
pub struct SubmitAnswerRequest {
    pub position: usize,

    /// Selected action ids in order. Omitted or empty clears the answer.
    #[serde(default)]
    #[validate(length(max = 32))]
    pub answers: Vec<String>,
}
