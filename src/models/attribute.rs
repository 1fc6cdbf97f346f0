// src/models/attribute.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'sjt_attributes' table in the database.
/// A category questions are tagged with (e.g., "Integrity", "Teamwork").
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Attribute {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
}
