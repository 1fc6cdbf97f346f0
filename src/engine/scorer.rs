// src/engine/scorer.rs

//! Proximity scoring for ranking questions and all-or-nothing selection
//! scoring for best-three questions.

use std::collections::{HashMap, HashSet};

use crate::models::{
    question::{ActionId, ActionOption, BEST_THREE_REQUIRED, QuestionBody, RankableAction},
    results::{BestThreeFeedback, ExamResults, Feedback, QuestionResult, RankingFeedback},
    session::{FinalizedSession, SessionQuestion},
};

/// Points by distance between submitted and correct rank.
pub const PROXIMITY_POINTS: [u32; 5] = [4, 3, 2, 1, 0];

/// 5 actions * 4 points.
pub const RANKING_MAX_SCORE: u32 = 20;

pub const POINTS_PER_CORRECT: u32 = 4;

/// 3 correct options * 4 points.
pub const BEST_THREE_MAX_SCORE: u32 = 12;

/// Resolves an id echoed by the client. Anything unparseable is ignored.
fn parse_action_id(raw: &str) -> Option<ActionId> {
    raw.trim().parse().ok()
}

/// 1-based rank the candidate gave each known action.
/// An action listed twice keeps its first placement.
fn user_ranks(actions: &[RankableAction], submitted: &[String]) -> HashMap<ActionId, usize> {
    let known: HashSet<ActionId> = actions.iter().map(|a| a.id).collect();
    let mut ranks = HashMap::new();
    for (index, raw) in submitted.iter().enumerate() {
        if let Some(id) = parse_action_id(raw) {
            if known.contains(&id) {
                ranks.entry(id).or_insert(index + 1);
            }
        }
    }
    ranks
}

pub fn score_ranking(actions: &[RankableAction], submitted: &[String]) -> u32 {
    let ranks = user_ranks(actions, submitted);
    actions
        .iter()
        .filter_map(|action| {
            let user_rank = *ranks.get(&action.id)?;
            let distance = user_rank.abs_diff(action.correct_rank as usize);
            Some(PROXIMITY_POINTS.get(distance).copied().unwrap_or(0))
        })
        .sum()
}

/// Distinct submitted ids, in submission order.
fn selected_ids(submitted: &[String]) -> Vec<ActionId> {
    let mut seen = HashSet::new();
    submitted
        .iter()
        .filter_map(|raw| parse_action_id(raw))
        .filter(|id| seen.insert(*id))
        .collect()
}

pub fn score_best_three(options: &[ActionOption], submitted: &[String]) -> u32 {
    // Over-selection scores nothing, however many picks were right.
    if submitted.len() > BEST_THREE_REQUIRED {
        return 0;
    }
    let correct: HashSet<ActionId> = options
        .iter()
        .filter(|o| o.is_correct)
        .map(|o| o.id)
        .collect();

    selected_ids(submitted)
        .into_iter()
        .filter(|id| correct.contains(id))
        .count() as u32
        * POINTS_PER_CORRECT
}

pub fn score_question(entry: &SessionQuestion, submitted: &[String]) -> QuestionResult {
    let question = &entry.question;
    let (score, max_score, feedback) = match &question.body {
        QuestionBody::Ranking { actions } => {
            let ranks = user_ranks(actions, submitted);
            let mut ordered: Vec<&RankableAction> = actions.iter().collect();
            ordered.sort_by_key(|a| a.correct_rank);
            let feedback = ordered
                .into_iter()
                .map(|a| RankingFeedback {
                    text: a.action_text.clone(),
                    correct_rank: a.correct_rank,
                    user_rank: ranks.get(&a.id).copied(),
                })
                .collect();
            (
                score_ranking(actions, submitted),
                RANKING_MAX_SCORE,
                Feedback::Ranking { actions: feedback },
            )
        }
        QuestionBody::BestThree { options } => {
            let picked: HashSet<ActionId> = selected_ids(submitted).into_iter().collect();
            let feedback = options
                .iter()
                .map(|o| BestThreeFeedback {
                    text: o.action_text.clone(),
                    is_correct: o.is_correct,
                    user_selected: picked.contains(&o.id),
                })
                .collect();
            (
                score_best_three(options, submitted),
                BEST_THREE_MAX_SCORE,
                Feedback::BestThree { options: feedback },
            )
        }
    };

    QuestionResult {
        number: entry.position + 1,
        archetype: entry.archetype,
        question_id: entry.question_id,
        is_pilot: entry.is_pilot,
        scenario: question.scenario.clone(),
        rationale: question.rationale.clone(),
        attribute: question.attribute.as_ref().map(|a| a.name.clone()),
        score,
        max_score,
        feedback,
    }
}

fn round_two_decimals(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Scores every question in session order. Pilots are reported but not aggregated.
pub fn score(finalized: &FinalizedSession) -> ExamResults {
    let session = &finalized.session;
    let questions: Vec<QuestionResult> = session
        .questions
        .iter()
        .map(|entry| score_question(entry, session.answer_for(entry.position)))
        .collect();

    let (total_score, max_possible_score) = questions
        .iter()
        .filter(|r| !r.is_pilot)
        .fold((0, 0), |(total, max), r| (total + r.score, max + r.max_score));

    let percentage = if max_possible_score > 0 {
        round_two_decimals(total_score as f64 / max_possible_score as f64 * 100.0)
    } else {
        0.0
    };

    ExamResults {
        total_score,
        max_possible_score,
        percentage,
        timed_out: finalized.timed_out,
        questions,
    }
}
