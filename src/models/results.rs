// src/models/results.rs

use serde::{Deserialize, Serialize};

use crate::models::question::{Archetype, QuestionId};

/// How the candidate placed one ranking action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingFeedback {
    pub text: String,
    pub correct_rank: u8,
    /// `None` when the action was not ranked.
    pub user_rank: Option<usize>,
}

/// Whether the candidate picked one best-three option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestThreeFeedback {
    pub text: String,
    pub is_correct: bool,
    pub user_selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "archetype", rename_all = "snake_case")]
pub enum Feedback {
    Ranking { actions: Vec<RankingFeedback> },
    BestThree { options: Vec<BestThreeFeedback> },
}

/// Scored breakdown of a single question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResult {
    /// 1-based question number as displayed.
    pub number: usize,
    pub archetype: Archetype,
    pub question_id: QuestionId,
    pub is_pilot: bool,
    pub scenario: String,
    pub rationale: String,
    pub attribute: Option<String>,
    pub score: u32,
    pub max_score: u32,
    pub feedback: Feedback,
}

/// Response of `GET /api/sjt/results`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamResults {
    /// Sum over non-pilot questions.
    pub total_score: u32,
    /// Sum over non-pilot questions.
    pub max_possible_score: u32,
    /// Rounded to two decimals; 0 when nothing counted.
    pub percentage: f64,
    pub timed_out: bool,
    pub questions: Vec<QuestionResult>,
}
