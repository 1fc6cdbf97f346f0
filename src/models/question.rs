// src/models/question.rs

use std::fmt;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{models::attribute::Attribute, utils::html::clean_html};

pub type QuestionId = i64;
pub type ActionId = i64;

/// Number of actions a ranking question orders.
pub const RANKING_ACTION_COUNT: usize = 5;

/// Upper bound on the options of a best-three question.
pub const BEST_THREE_MAX_OPTIONS: usize = 8;

/// Number of options a candidate must pick in a best-three question.
pub const BEST_THREE_REQUIRED: usize = 3;

/// The two question shapes an SJT exam is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    Ranking,
    BestThree,
}

impl Archetype {
    pub fn as_str(&self) -> &'static str {
        match self {
            Archetype::Ranking => "ranking",
            Archetype::BestThree => "best_three",
        }
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lightweight row used when picking questions for an exam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionSummary {
    pub id: QuestionId,
    pub is_pilot: bool,
}

/// One of the five actions of a ranking question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankableAction {
    pub id: ActionId,
    pub action_text: String,
    /// 1 = most appropriate, 5 = least appropriate.
    pub correct_rank: u8,
}

/// One of the (up to eight) options of a best-three question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOption {
    pub id: ActionId,
    pub action_text: String,
    pub is_correct: bool,
}

/// Archetype-specific part of a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "archetype", rename_all = "snake_case")]
pub enum QuestionBody {
    Ranking { actions: Vec<RankableAction> },
    BestThree { options: Vec<ActionOption> },
}

/// A fully loaded SJT question with its actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,

    /// The situation presented to the candidate.
    pub scenario: String,

    /// Explanation of the correct answers, shown with the results.
    pub rationale: String,

    pub attribute: Option<Attribute>,

    /// Pilot questions are presented and scored but left out of the aggregate.
    pub is_pilot: bool,

    pub is_active: bool,

    pub body: QuestionBody,
}

impl Question {
    pub fn archetype(&self) -> Archetype {
        match self.body {
            QuestionBody::Ranking { .. } => Archetype::Ranking,
            QuestionBody::BestThree { .. } => Archetype::BestThree,
        }
    }

    pub fn summary(&self) -> QuestionSummary {
        QuestionSummary {
            id: self.id,
            is_pilot: self.is_pilot,
        }
    }

    /// `(id, text)` pairs in authored order.
    pub fn action_texts(&self) -> Vec<(ActionId, &str)> {
        match &self.body {
            QuestionBody::Ranking { actions } => actions
                .iter()
                .map(|a| (a.id, a.action_text.as_str()))
                .collect(),
            QuestionBody::BestThree { options } => options
                .iter()
                .map(|o| (o.id, o.action_text.as_str()))
                .collect(),
        }
    }
}

/// DTO for sending an action to the client. Ids travel as opaque strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicAction {
    pub id: String,
    pub text: String,
}

/// DTO for sending a question to the client (excludes ranks, correctness and rationale).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub position: usize,
    pub archetype: Archetype,
    pub scenario: String,
    pub actions: Vec<PublicAction>,
}

fn default_active() -> bool {
    true
}

/// DTO for authoring a ranking action.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewRankableAction {
    #[validate(length(min = 1, max = 500))]
    pub action_text: String,
    #[validate(range(min = 1, max = 5))]
    pub correct_rank: u8,
}

/// DTO for authoring a ranking question.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewRankingQuestion {
    #[validate(length(min = 1, max = 100))]
    pub attribute: Option<String>,
    #[validate(length(min = 1, max = 5000))]
    pub scenario: String,
    #[validate(length(min = 1, max = 5000))]
    pub rationale: String,
    #[serde(default)]
    pub is_pilot: bool,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[validate(nested, custom(function = validate_ranks))]
    pub actions: Vec<NewRankableAction>,
}

/// DTO for authoring a best-three option.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewActionOption {
    #[validate(length(min = 1, max = 500))]
    pub action_text: String,
    #[serde(default)]
    pub is_correct: bool,
}

/// DTO for authoring a best-three question.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewBestThreeQuestion {
    #[validate(length(min = 1, max = 100))]
    pub attribute: Option<String>,
    #[validate(length(min = 1, max = 5000))]
    pub scenario: String,
    #[validate(length(min = 1, max = 5000))]
    pub rationale: String,
    #[serde(default)]
    pub is_pilot: bool,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[validate(nested, custom(function = validate_best_three_options))]
    pub options: Vec<NewActionOption>,
}

/// Every rank 1..=5 must be used exactly once.
fn validate_ranks(actions: &[NewRankableAction]) -> Result<(), ValidationError> {
    if actions.len() != RANKING_ACTION_COUNT {
        return Err(ValidationError::new("ranking_requires_five_actions"));
    }
    let mut ranks: Vec<u8> = actions.iter().map(|a| a.correct_rank).collect();
    ranks.sort_unstable();
    if ranks != [1, 2, 3, 4, 5] {
        return Err(ValidationError::new("ranks_must_cover_one_to_five"));
    }
    Ok(())
}

fn validate_best_three_options(options: &[NewActionOption]) -> Result<(), ValidationError> {
    if options.len() < BEST_THREE_REQUIRED || options.len() > BEST_THREE_MAX_OPTIONS {
        return Err(ValidationError::new("best_three_requires_three_to_eight_options"));
    }
    if options.iter().filter(|o| o.is_correct).count() != BEST_THREE_REQUIRED {
        return Err(ValidationError::new("best_three_requires_exactly_three_correct"));
    }
    Ok(())
}

/// Authored question of either archetype, as found in an import file.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "archetype", rename_all = "snake_case")]
pub enum NewQuestion {
    Ranking(NewRankingQuestion),
    BestThree(NewBestThreeQuestion),
}

impl NewQuestion {
    pub fn archetype(&self) -> Archetype {
        match self {
            NewQuestion::Ranking(_) => Archetype::Ranking,
            NewQuestion::BestThree(_) => Archetype::BestThree,
        }
    }

    /// Sanitizes every authored string, then checks the archetype's invariants.
    pub fn validated(self) -> Result<ValidatedQuestion, ValidationErrors> {
        let question = match self {
            NewQuestion::Ranking(mut q) => {
                q.attribute = q.attribute.map(|a| clean_html(a.trim()));
                q.scenario = clean_html(&q.scenario);
                q.rationale = clean_html(&q.rationale);
                for action in &mut q.actions {
                    action.action_text = clean_html(&action.action_text);
                }
                q.validate()?;
                NewQuestion::Ranking(q)
            }
            NewQuestion::BestThree(mut q) => {
                q.attribute = q.attribute.map(|a| clean_html(a.trim()));
                q.scenario = clean_html(&q.scenario);
                q.rationale = clean_html(&q.rationale);
                for option in &mut q.options {
                    option.action_text = clean_html(&option.action_text);
                }
                q.validate()?;
                NewQuestion::BestThree(q)
            }
        };
        Ok(ValidatedQuestion(question))
    }
}

/// Content that passed `NewQuestion::validated`. Only this can be stored.
#[derive(Debug, Clone)]
pub struct ValidatedQuestion(NewQuestion);

impl ValidatedQuestion {
    pub fn get(&self) -> &NewQuestion {
        &self.0
    }
}
