// src/bin/import_sjt.rs

//! Loads SJT questions from a JSON file into the database.
//!
//! Usage: `import_sjt <questions.json>`

use std::env;

use dotenvy::dotenv;
use sjt_prep::store::{import::import_questions, postgres::PgQuestionRepository};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let path = env::args()
        .nth(1)
        .ok_or("usage: import_sjt <questions.json>")?;
    let database_url = env::var("DATABASE_URL")?;

    let raw = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| format!("cannot read {}: {}", path, e))?;
    let entries: Vec<serde_json::Value> = serde_json::from_str(&raw)?;

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let repo = PgQuestionRepository::new(pool);
    let summary = import_questions(&repo, entries).await?;

    tracing::info!(
        "Import completed. Imported: {}. Skipped: {}.",
        summary.imported.len(),
        summary.skipped
    );
    Ok(())
}
