// src/engine/assembler.rs

use chrono::{DateTime, Utc};
use rand::{Rng, seq::SliceRandom};

use crate::{
    config::ExamSettings,
    error::ExamError,
    models::{
        question::{Archetype, Question, QuestionId, QuestionSummary},
        session::ExamSession,
    },
    store::QuestionRepository,
};

/// Shuffles `pool` and keeps the first `quota` entries.
/// A short pool is a hard failure: no partial exam is ever started.
pub fn select<R: Rng + ?Sized>(
    mut pool: Vec<QuestionSummary>,
    quota: usize,
    archetype: Archetype,
    rng: &mut R,
) -> Result<Vec<QuestionSummary>, ExamError> {
    pool.shuffle(rng);
    pool.truncate(quota);
    if pool.len() < quota {
        return Err(ExamError::InsufficientContent {
            archetype,
            required: quota,
            available: pool.len(),
        });
    }
    Ok(pool)
}

/// Combines both selections into one presentation order.
pub fn interleave<R: Rng + ?Sized>(
    ranking: Vec<Question>,
    best_three: Vec<Question>,
    rng: &mut R,
) -> Vec<Question> {
    let mut combined = ranking;
    combined.extend(best_three);
    combined.shuffle(rng);
    combined
}

fn ids(selection: &[QuestionSummary]) -> Vec<QuestionId> {
    selection.iter().map(|s| s.id).collect()
}

/// Loads the selected questions, failing if any vanished since selection.
async fn load_selected(
    repo: &dyn QuestionRepository,
    selection: &[QuestionSummary],
    archetype: Archetype,
    quota: usize,
) -> Result<Vec<Question>, ExamError> {
    let questions = repo.fetch_full(&ids(selection), archetype).await?;
    if questions.len() < quota {
        return Err(ExamError::InsufficientContent {
            archetype,
            required: quota,
            available: questions.len(),
        });
    }
    Ok(questions)
}

/// Builds a fresh exam for `user_id` with content snapshotted from `repo`.
pub async fn assemble_exam(
    repo: &dyn QuestionRepository,
    user_id: i64,
    settings: &ExamSettings,
    now: DateTime<Utc>,
) -> Result<ExamSession, ExamError> {
    let ranking_pool = repo.fetch_active(Archetype::Ranking, None).await?;
    let best_three_pool = repo.fetch_active(Archetype::BestThree, None).await?;

    // The thread-local rng is not `Send`, so it never lives across an await.
    let (ranking, best_three) = {
        let mut rng = rand::thread_rng();
        (
            select(ranking_pool, settings.ranking_quota, Archetype::Ranking, &mut rng)?,
            select(
                best_three_pool,
                settings.best_three_quota,
                Archetype::BestThree,
                &mut rng,
            )?,
        )
    };

    let ranking = load_selected(repo, &ranking, Archetype::Ranking, settings.ranking_quota).await?;
    let best_three = load_selected(
        repo,
        &best_three,
        Archetype::BestThree,
        settings.best_three_quota,
    )
    .await?;

    let questions = interleave(ranking, best_three, &mut rand::thread_rng());

    Ok(ExamSession::new(user_id, questions, now, settings.duration))
}
