// src/store/memory.rs

//! Process-local stores, used by tests and single-node deployments.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use tokio::sync::RwLock;

use crate::{
    error::ExamError,
    models::{
        attribute::Attribute,
        question::{
            ActionId, ActionOption, Archetype, NewQuestion, Question, QuestionBody, QuestionId,
            QuestionSummary, RankableAction, ValidatedQuestion,
        },
        session::{ExamSession, FinalizedSession, SessionStatus},
    },
    store::{QuestionRepository, SessionStore, check_answer_write, decode_session, encode_session},
};

#[derive(Default)]
struct Content {
    next_question_id: QuestionId,
    next_action_id: ActionId,
    attributes: HashMap<String, Attribute>,
    questions: Vec<Question>,
}

impl Content {
    fn question_id(&mut self) -> QuestionId {
        self.next_question_id += 1;
        self.next_question_id
    }

    fn action_id(&mut self) -> ActionId {
        self.next_action_id += 1;
        self.next_action_id
    }

    fn attribute(&mut self, name: Option<&str>) -> Option<Attribute> {
        let name = name?;
        let next_id = self.attributes.len() as i64 + 1;
        Some(
            self.attributes
                .entry(name.to_string())
                .or_insert_with(|| Attribute {
                    id: next_id,
                    name: name.to_string(),
                    description: String::new(),
                })
                .clone(),
        )
    }
}

/// Question content held in memory.
#[derive(Default)]
pub struct MemoryQuestionRepository {
    content: RwLock<Content>,
}

impl MemoryQuestionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggles whether a question can be picked for new exams.
    pub async fn set_active(&self, id: QuestionId, active: bool) -> bool {
        let mut content = self.content.write().await;
        match content.questions.iter_mut().find(|q| q.id == id) {
            Some(q) => {
                q.is_active = active;
                true
            }
            None => false,
        }
    }

    pub async fn remove(&self, id: QuestionId) -> bool {
        let mut content = self.content.write().await;
        let before = content.questions.len();
        content.questions.retain(|q| q.id != id);
        content.questions.len() != before
    }
}

#[async_trait]
impl QuestionRepository for MemoryQuestionRepository {
    async fn fetch_active(
        &self,
        archetype: Archetype,
        limit_hint: Option<usize>,
    ) -> Result<Vec<QuestionSummary>, ExamError> {
        let content = self.content.read().await;
        Ok(content
            .questions
            .iter()
            .filter(|q| q.is_active && q.archetype() == archetype)
            .map(Question::summary)
            .take(limit_hint.unwrap_or(usize::MAX))
            .collect())
    }

    async fn fetch_full(
        &self,
        ids: &[QuestionId],
        archetype: Archetype,
    ) -> Result<Vec<Question>, ExamError> {
        let content = self.content.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| {
                content
                    .questions
                    .iter()
                    .find(|q| q.id == *id && q.archetype() == archetype)
                    .cloned()
            })
            .collect())
    }

    async fn insert(&self, question: &ValidatedQuestion) -> Result<QuestionId, ExamError> {
        let mut content = self.content.write().await;
        let id = content.question_id();

        let question = match question.get() {
            NewQuestion::Ranking(q) => {
                let mut actions = Vec::with_capacity(q.actions.len());
                for a in &q.actions {
                    actions.push(RankableAction {
                        id: content.action_id(),
                        action_text: a.action_text.clone(),
                        correct_rank: a.correct_rank,
                    });
                }
                actions.sort_by_key(|a| a.correct_rank);
                Question {
                    id,
                    scenario: q.scenario.clone(),
                    rationale: q.rationale.clone(),
                    attribute: content.attribute(q.attribute.as_deref()),
                    is_pilot: q.is_pilot,
                    is_active: q.is_active,
                    body: QuestionBody::Ranking { actions },
                }
            }
            NewQuestion::BestThree(q) => {
                let mut options = Vec::with_capacity(q.options.len());
                for o in &q.options {
                    options.push(ActionOption {
                        id: content.action_id(),
                        action_text: o.action_text.clone(),
                        is_correct: o.is_correct,
                    });
                }
                Question {
                    id,
                    scenario: q.scenario.clone(),
                    rationale: q.rationale.clone(),
                    attribute: content.attribute(q.attribute.as_deref()),
                    is_pilot: q.is_pilot,
                    is_active: q.is_active,
                    body: QuestionBody::BestThree { options },
                }
            }
        };

        content.questions.push(question);
        Ok(id)
    }
}

/// Session contexts kept as serialized JSON, keyed by user id.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<i64, Value>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a context without checking it.
    pub async fn insert_raw(&self, user_id: i64, context: Value) {
        self.sessions.write().await.insert(user_id, context);
    }

    pub async fn contains(&self, user_id: i64) -> bool {
        self.sessions.read().await.contains_key(&user_id)
    }

    /// Decodes the context for `user_id`, dropping it if it is corrupted.
    fn load(sessions: &mut HashMap<i64, Value>, user_id: i64) -> Result<ExamSession, ExamError> {
        let context = sessions
            .get(&user_id)
            .cloned()
            .ok_or(ExamError::SessionNotFound)?;
        decode_session(context).inspect_err(|e| {
            if matches!(e, ExamError::CorruptedSession(_)) {
                tracing::warn!("Discarding corrupted SJT session for user {}: {}", user_id, e);
                sessions.remove(&user_id);
            }
        })
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn start(&self, session: &ExamSession) -> Result<(), ExamError> {
        let context = encode_session(session)?;
        self.sessions.write().await.insert(session.user_id, context);
        Ok(())
    }

    async fn get_active(&self, user_id: i64) -> Result<ExamSession, ExamError> {
        let mut sessions = self.sessions.write().await;
        Self::load(&mut sessions, user_id)
    }

    async fn set_status(&self, user_id: i64, status: SessionStatus) -> Result<(), ExamError> {
        let mut sessions = self.sessions.write().await;
        Self::load(&mut sessions, user_id)?;
        if let Some(context) = sessions.get_mut(&user_id) {
            context["status"] = json!(status);
        }
        Ok(())
    }

    async fn submit_partial_answer(
        &self,
        user_id: i64,
        position: usize,
        selected_ids: Vec<String>,
    ) -> Result<(), ExamError> {
        let mut sessions = self.sessions.write().await;
        let session = Self::load(&mut sessions, user_id)?;
        check_answer_write(&session, position, Utc::now())?;
        if let Some(context) = sessions.get_mut(&user_id) {
            context["answers"][position.to_string()] = json!(selected_ids);
        }
        Ok(())
    }

    async fn finalize(&self, user_id: i64) -> Result<FinalizedSession, ExamError> {
        let context = self
            .sessions
            .write()
            .await
            .remove(&user_id)
            .ok_or(ExamError::SessionNotFound)?;
        let session = decode_session(context)?;
        Ok(FinalizedSession::from_session(session, Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::models::question::{NewActionOption, NewBestThreeQuestion};

    fn best_three(pilot: bool) -> ValidatedQuestion {
        NewQuestion::BestThree(NewBestThreeQuestion {
            attribute: Some("Teamwork".to_string()),
            scenario: "A nurse disagrees with your plan.".to_string(),
            rationale: "Listen first.".to_string(),
            is_pilot: pilot,
            is_active: true,
            options: (0..5)
                .map(|i| NewActionOption {
                    action_text: format!("Option {}", i),
                    is_correct: i < 3,
                })
                .collect(),
        })
        .validated()
        .unwrap()
    }

    async fn session_for(repo: &MemoryQuestionRepository, user_id: i64, minutes: i64) -> ExamSession {
        let ids: Vec<QuestionId> = repo
            .fetch_active(Archetype::BestThree, None)
            .await
            .unwrap()
            .iter()
            .map(|s| s.id)
            .collect();
        let questions = repo.fetch_full(&ids, Archetype::BestThree).await.unwrap();
        ExamSession::new(user_id, questions, Utc::now(), Duration::minutes(minutes))
    }

    #[tokio::test]
    async fn repository_filters_by_archetype_and_activity() {
        let repo = MemoryQuestionRepository::new();
        let a = repo.insert(&best_three(false)).await.unwrap();
        let b = repo.insert(&best_three(true)).await.unwrap();

        assert!(repo.fetch_active(Archetype::Ranking, None).await.unwrap().is_empty());
        assert_eq!(repo.fetch_active(Archetype::BestThree, Some(1)).await.unwrap().len(), 1);

        assert!(repo.set_active(a, false).await);
        let active = repo.fetch_active(Archetype::BestThree, None).await.unwrap();
        assert_eq!(active, vec![QuestionSummary { id: b, is_pilot: true }]);

        let full = repo.fetch_full(&[b, 999, a], Archetype::BestThree).await.unwrap();
        assert_eq!(full.iter().map(|q| q.id).collect::<Vec<_>>(), vec![b, a]);
        assert_eq!(full[0].attribute.as_ref().unwrap().name, "Teamwork");
        assert!(repo.fetch_full(&[a], Archetype::Ranking).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn start_replaces_the_previous_session() {
        let repo = MemoryQuestionRepository::new();
        repo.insert(&best_three(false)).await.unwrap();
        let store = MemorySessionStore::new();

        let first = session_for(&repo, 1, 105).await;
        store.start(&first).await.unwrap();
        store.submit_partial_answer(1, 0, vec!["1".into()]).await.unwrap();

        let second = session_for(&repo, 1, 105).await;
        store.start(&second).await.unwrap();
        assert!(store.get_active(1).await.unwrap().answers.is_empty());
    }

    #[tokio::test]
    async fn repeated_submission_is_idempotent() {
        let repo = MemoryQuestionRepository::new();
        repo.insert(&best_three(false)).await.unwrap();
        let store = MemorySessionStore::new();
        store.start(&session_for(&repo, 3, 105).await).await.unwrap();

        store.submit_partial_answer(3, 0, vec!["2".into(), "3".into()]).await.unwrap();
        let once = store.get_active(3).await.unwrap().answers;
        store.submit_partial_answer(3, 0, vec!["2".into(), "3".into()]).await.unwrap();
        let twice = store.get_active(3).await.unwrap().answers;
        assert_eq!(once, twice);
        assert_eq!(twice.len(), 1);
    }

    #[tokio::test]
    async fn expired_session_rejects_answers_but_finalizes() {
        let repo = MemoryQuestionRepository::new();
        repo.insert(&best_three(false)).await.unwrap();
        let store = MemorySessionStore::new();

        let mut session = session_for(&repo, 4, 0).await;
        session.record_answer(0, vec!["1".into()]).unwrap();
        store.start(&session).await.unwrap();

        assert!(matches!(
            store.submit_partial_answer(4, 0, vec![]).await,
            Err(ExamError::SessionExpired)
        ));

        let done = store.finalize(4).await.unwrap();
        assert!(done.timed_out);
        assert_eq!(done.session.answer_for(0), ["1".to_string()]);
        assert!(matches!(store.finalize(4).await, Err(ExamError::SessionNotFound)));
    }

    #[tokio::test]
    async fn invalid_position_is_rejected() {
        let repo = MemoryQuestionRepository::new();
        repo.insert(&best_three(false)).await.unwrap();
        let store = MemorySessionStore::new();
        store.start(&session_for(&repo, 5, 105).await).await.unwrap();

        assert!(matches!(
            store.submit_partial_answer(5, 1, vec![]).await,
            Err(ExamError::InvalidPosition { position: 1, total: 1 })
        ));
        assert!(store.get_active(5).await.unwrap().answers.is_empty());
    }

    #[tokio::test]
    async fn answers_are_checked_against_the_current_session() {
        let repo = MemoryQuestionRepository::new();
        repo.insert(&best_three(false)).await.unwrap();
        let dropped = repo.insert(&best_three(false)).await.unwrap();
        let store = MemorySessionStore::new();
        store.start(&session_for(&repo, 6, 105).await).await.unwrap();

        // Restart with a shorter exam
        repo.set_active(dropped, false).await;
        store.start(&session_for(&repo, 6, 105).await).await.unwrap();

        assert!(matches!(
            store.submit_partial_answer(6, 1, vec!["1".into()]).await,
            Err(ExamError::InvalidPosition { position: 1, total: 1 })
        ));
        assert!(store.get_active(6).await.unwrap().answers.is_empty());
    }

    #[tokio::test]
    async fn corrupted_context_is_discarded() {
        let store = MemorySessionStore::new();
        store
            .insert_raw(
                6,
                json!({
                    "user_id": 6,
                    "questions": [],
                    "start_time": "not a timestamp",
                    "duration_seconds": 60,
                    "answers": {},
                    "status": "created"
                }),
            )
            .await;

        assert!(matches!(
            store.get_active(6).await,
            Err(ExamError::CorruptedSession(_))
        ));
        assert!(!store.contains(6).await);
        assert!(matches!(store.get_active(6).await, Err(ExamError::SessionNotFound)));
    }

    #[tokio::test]
    async fn status_updates_are_persisted() {
        let repo = MemoryQuestionRepository::new();
        repo.insert(&best_three(false)).await.unwrap();
        let store = MemorySessionStore::new();
        store.start(&session_for(&repo, 8, 105).await).await.unwrap();

        store.set_status(8, SessionStatus::InProgress).await.unwrap();
        assert_eq!(store.get_active(8).await.unwrap().status, SessionStatus::InProgress);
        assert!(matches!(
            store.set_status(9, SessionStatus::InProgress).await,
            Err(ExamError::SessionNotFound)
        ));
    }
}
