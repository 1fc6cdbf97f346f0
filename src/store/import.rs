// src/store/import.rs

//! Bulk loading of authored SJT content.

use serde_json::Value;

use crate::{
    error::ExamError,
    models::question::{NewQuestion, QuestionId},
    store::QuestionRepository,
};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: Vec<QuestionId>,
    pub skipped: usize,
}

/// Imports each entry on its own, so one bad entry does not block the rest.
///
/// Malformed or invalid entries are logged and counted as skipped.
/// A storage failure aborts the import.
pub async fn import_questions(
    repo: &dyn QuestionRepository,
    entries: Vec<Value>,
) -> Result<ImportSummary, ExamError> {
    let mut summary = ImportSummary::default();

    for (index, raw) in entries.into_iter().enumerate() {
        let entry = index + 1;
        let question: NewQuestion = match serde_json::from_value(raw) {
            Ok(q) => q,
            Err(e) => {
                tracing::warn!("Skipping entry {}: {}", entry, e);
                summary.skipped += 1;
                continue;
            }
        };

        let archetype = question.archetype();
        let validated = match question.validated() {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("Skipping {} entry {}: {}", archetype, entry, e);
                summary.skipped += 1;
                continue;
            }
        };

        let id = repo.insert(&validated).await?;
        tracing::info!("Entry {}: created {} question {}", entry, archetype, id);
        summary.imported.push(id);
    }

    Ok(summary)
}
