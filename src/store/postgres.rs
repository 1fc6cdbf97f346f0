// src/store/postgres.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction, prelude::FromRow};

use crate::{
    error::ExamError,
    models::{
        attribute::Attribute,
        question::{
            ActionOption, Archetype, NewQuestion, Question, QuestionBody, QuestionId,
            QuestionSummary, RankableAction, ValidatedQuestion,
        },
        session::{ExamSession, FinalizedSession, SessionStatus},
    },
    store::{QuestionRepository, SessionStore, check_answer_write, decode_session, encode_session},
};

fn question_table(archetype: Archetype) -> &'static str {
    match archetype {
        Archetype::Ranking => "sjt_ranking_questions",
        Archetype::BestThree => "sjt_best_three_questions",
    }
}

#[derive(FromRow)]
struct SummaryRow {
    id: i64,
    is_pilot: bool,
}

/// A question joined with its (optional) attribute.
#[derive(FromRow)]
struct QuestionRow {
    id: i64,
    scenario: String,
    rationale: String,
    is_pilot: bool,
    is_active: bool,
    attribute_id: Option<i64>,
    attribute_name: Option<String>,
    attribute_description: Option<String>,
}

impl QuestionRow {
    fn into_question(self, body: QuestionBody) -> Question {
        let attribute = match (self.attribute_id, self.attribute_name) {
            (Some(id), Some(name)) => Some(Attribute {
                id,
                name,
                description: self.attribute_description.unwrap_or_default(),
            }),
            _ => None,
        };
        Question {
            id: self.id,
            scenario: self.scenario,
            rationale: self.rationale,
            attribute,
            is_pilot: self.is_pilot,
            is_active: self.is_active,
            body,
        }
    }
}

#[derive(FromRow)]
struct RankableActionRow {
    id: i64,
    question_id: i64,
    action_text: String,
    correct_rank: i16,
}

#[derive(FromRow)]
struct ActionOptionRow {
    id: i64,
    question_id: i64,
    action_text: String,
    is_correct: bool,
}

/// SJT content stored in Postgres.
#[derive(Clone)]
pub struct PgQuestionRepository {
    pool: PgPool,
}

impl PgQuestionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn ranking_actions(
        &self,
        ids: &[QuestionId],
    ) -> Result<HashMap<QuestionId, Vec<RankableAction>>, ExamError> {
        let rows: Vec<RankableActionRow> = sqlx::query_as(
            r#"
            SELECT id, question_id, action_text, correct_rank
            FROM sjt_rankable_actions
            WHERE question_id = ANY($1)
            ORDER BY question_id, correct_rank
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<QuestionId, Vec<RankableAction>> = HashMap::new();
        for row in rows {
            let correct_rank = u8::try_from(row.correct_rank).map_err(|_| {
                ExamError::Storage(format!(
                    "action {} has out-of-range rank {}",
                    row.id, row.correct_rank
                ))
            })?;
            grouped.entry(row.question_id).or_default().push(RankableAction {
                id: row.id,
                action_text: row.action_text,
                correct_rank,
            });
        }
        Ok(grouped)
    }

    async fn best_three_options(
        &self,
        ids: &[QuestionId],
    ) -> Result<HashMap<QuestionId, Vec<ActionOption>>, ExamError> {
        let rows: Vec<ActionOptionRow> = sqlx::query_as(
            r#"
            SELECT id, question_id, action_text, is_correct
            FROM sjt_action_options
            WHERE question_id = ANY($1)
            ORDER BY question_id, id
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<QuestionId, Vec<ActionOption>> = HashMap::new();
        for row in rows {
            grouped.entry(row.question_id).or_default().push(ActionOption {
                id: row.id,
                action_text: row.action_text,
                is_correct: row.is_correct,
            });
        }
        Ok(grouped)
    }
}

async fn upsert_attribute(
    tx: &mut Transaction<'_, Postgres>,
    name: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        INSERT INTO sjt_attributes (name)
        VALUES ($1)
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(name)
    .fetch_one(&mut **tx)
    .await
}

async fn insert_question_row(
    tx: &mut Transaction<'_, Postgres>,
    archetype: Archetype,
    attribute: Option<&str>,
    scenario: &str,
    rationale: &str,
    is_pilot: bool,
    is_active: bool,
) -> Result<QuestionId, sqlx::Error> {
    let attribute_id = match attribute {
        Some(name) => Some(upsert_attribute(tx, name).await?),
        None => None,
    };
    let sql = format!(
        "INSERT INTO {} (attribute_id, scenario, rationale, is_pilot, is_active) \
         VALUES ($1, $2, $3, $4, $5) RETURNING id",
        question_table(archetype)
    );
    sqlx::query_scalar(&sql)
        .bind(attribute_id)
        .bind(scenario)
        .bind(rationale)
        .bind(is_pilot)
        .bind(is_active)
        .fetch_one(&mut **tx)
        .await
}

#[async_trait]
impl QuestionRepository for PgQuestionRepository {
    async fn fetch_active(
        &self,
        archetype: Archetype,
        limit_hint: Option<usize>,
    ) -> Result<Vec<QuestionSummary>, ExamError> {
        let mut query_builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT id, is_pilot FROM {} WHERE is_active = TRUE ORDER BY id",
            question_table(archetype)
        ));
        if let Some(limit) = limit_hint {
            query_builder.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows: Vec<SummaryRow> = query_builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to fetch active {} questions: {:?}", archetype, e);
                ExamError::from(e)
            })?;

        Ok(rows
            .into_iter()
            .map(|r| QuestionSummary {
                id: r.id,
                is_pilot: r.is_pilot,
            })
            .collect())
    }

    async fn fetch_full(
        &self,
        ids: &[QuestionId],
        archetype: Archetype,
    ) -> Result<Vec<Question>, ExamError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            r#"
            SELECT
                q.id,
                q.scenario,
                q.rationale,
                q.is_pilot,
                q.is_active,
                a.id AS attribute_id,
                a.name AS attribute_name,
                a.description AS attribute_description
            FROM {} q
            LEFT JOIN sjt_attributes a ON a.id = q.attribute_id
            WHERE q.id = ANY($1)
            "#,
            question_table(archetype)
        );
        let rows: Vec<QuestionRow> = sqlx::query_as(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to fetch {} questions: {:?}", archetype, e);
                ExamError::from(e)
            })?;

        let mut by_id: HashMap<QuestionId, Question> = HashMap::with_capacity(rows.len());
        match archetype {
            Archetype::Ranking => {
                let mut actions = self.ranking_actions(ids).await?;
                for row in rows {
                    let body = QuestionBody::Ranking {
                        actions: actions.remove(&row.id).unwrap_or_default(),
                    };
                    by_id.insert(row.id, row.into_question(body));
                }
            }
            Archetype::BestThree => {
                let mut options = self.best_three_options(ids).await?;
                for row in rows {
                    let body = QuestionBody::BestThree {
                        options: options.remove(&row.id).unwrap_or_default(),
                    };
                    by_id.insert(row.id, row.into_question(body));
                }
            }
        }

        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn insert(&self, question: &ValidatedQuestion) -> Result<QuestionId, ExamError> {
        let mut tx = self.pool.begin().await?;

        let id = match question.get() {
            NewQuestion::Ranking(q) => {
                let id = insert_question_row(
                    &mut tx,
                    Archetype::Ranking,
                    q.attribute.as_deref(),
                    &q.scenario,
                    &q.rationale,
                    q.is_pilot,
                    q.is_active,
                )
                .await?;
                for action in &q.actions {
                    sqlx::query(
                        "INSERT INTO sjt_rankable_actions (question_id, action_text, correct_rank) VALUES ($1, $2, $3)",
                    )
                    .bind(id)
                    .bind(&action.action_text)
                    .bind(i16::from(action.correct_rank))
                    .execute(&mut *tx)
                    .await?;
                }
                id
            }
            NewQuestion::BestThree(q) => {
                let id = insert_question_row(
                    &mut tx,
                    Archetype::BestThree,
                    q.attribute.as_deref(),
                    &q.scenario,
                    &q.rationale,
                    q.is_pilot,
                    q.is_active,
                )
                .await?;
                for option in &q.options {
                    sqlx::query(
                        "INSERT INTO sjt_action_options (question_id, action_text, is_correct) VALUES ($1, $2, $3)",
                    )
                    .bind(id)
                    .bind(&option.action_text)
                    .bind(option.is_correct)
                    .execute(&mut *tx)
                    .await?;
                }
                id
            }
        };

        tx.commit().await?;
        Ok(id)
    }
}

/// Exam sessions stored as one JSONB row per user.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn discard(&self, user_id: i64) -> Result<(), ExamError> {
        sqlx::query("DELETE FROM sjt_sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn load(&self, user_id: i64) -> Result<ExamSession, ExamError> {
        let context: Option<Value> =
            sqlx::query_scalar("SELECT context FROM sjt_sessions WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        let context = context.ok_or(ExamError::SessionNotFound)?;
        match decode_session(context) {
            Ok(session) => Ok(session),
            Err(e @ ExamError::CorruptedSession(_)) => {
                tracing::warn!("Discarding corrupted SJT session for user {}: {}", user_id, e);
                self.discard(user_id).await?;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn start(&self, session: &ExamSession) -> Result<(), ExamError> {
        sqlx::query(
            r#"
            INSERT INTO sjt_sessions (user_id, context, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id) DO UPDATE SET
                context = EXCLUDED.context,
                updated_at = NOW()
            "#,
        )
        .bind(session.user_id)
        .bind(encode_session(session)?)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to store SJT session: {:?}", e);
            ExamError::from(e)
        })?;
        Ok(())
    }

    async fn get_active(&self, user_id: i64) -> Result<ExamSession, ExamError> {
        self.load(user_id).await
    }

    async fn set_status(&self, user_id: i64, status: SessionStatus) -> Result<(), ExamError> {
        self.load(user_id).await?;
        sqlx::query(
            r#"
            UPDATE sjt_sessions
            SET context = jsonb_set(context, '{status}', $2), updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(json!(status))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn submit_partial_answer(
        &self,
        user_id: i64,
        position: usize,
        selected_ids: Vec<String>,
    ) -> Result<(), ExamError> {
        // The row lock keeps a concurrent `start` from replacing the session
        // between the check and the write.
        let mut tx = self.pool.begin().await?;
        let context: Option<Value> = sqlx::query_scalar(
            "SELECT context FROM sjt_sessions WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let context = context.ok_or(ExamError::SessionNotFound)?;
        let session = match decode_session(context) {
            Ok(session) => session,
            Err(e @ ExamError::CorruptedSession(_)) => {
                tx.rollback().await?;
                tracing::warn!("Discarding corrupted SJT session for user {}: {}", user_id, e);
                self.discard(user_id).await?;
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        check_answer_write(&session, position, Utc::now())?;

        // Single-key update, so concurrent writes to other positions are kept.
        sqlx::query(
            r#"
            UPDATE sjt_sessions
            SET context = jsonb_set(context, ARRAY['answers', $2::text], $3, true),
                updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(position.to_string())
        .bind(json!(selected_ids))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn finalize(&self, user_id: i64) -> Result<FinalizedSession, ExamError> {
        let context: Option<Value> =
            sqlx::query_scalar("DELETE FROM sjt_sessions WHERE user_id = $1 RETURNING context")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        let session = decode_session(context.ok_or(ExamError::SessionNotFound)?)?;
        Ok(FinalizedSession::from_session(session, Utc::now()))
    }
}
