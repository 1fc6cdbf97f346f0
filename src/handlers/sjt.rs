// src/handlers/sjt.rs

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use validator::Validate;

use crate::{
    engine::ExamService,
    error::AppError,
    models::session::{StartExamResponse, SubmitAnswerRequest},
    utils::jwt::Claims,
};

/// Describes the mock exam before it is started.
pub async fn setup(State(exams): State<ExamService>) -> impl IntoResponse {
    let settings = exams.settings();
    Json(json!({
        "duration_minutes": settings.duration.num_minutes(),
        "total_questions": settings.total_questions(),
        "ranking_questions": settings.ranking_quota,
        "best_three_questions": settings.best_three_quota,
    }))
}

/// Starts a new mock exam for the caller.
///
/// * Picks the questions at random from active content (pilots included).
/// * Replaces any exam the caller already had in progress.
/// * Returns 409 Conflict if there is not enough content.
pub async fn start_exam(
    State(exams): State<ExamService>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let session = exams.start_exam(user_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(StartExamResponse {
            total_questions: session.questions.len(),
            duration_seconds: session.duration_seconds,
            seconds_remaining: session.time_remaining().num_seconds(),
            started_at: session.start_time,
        }),
    ))
}

/// Returns the exam player data: questions with shuffled actions, the time
/// left and any saved answers. Once time is up it points to the results instead.
pub async fn exam_state(
    State(exams): State<ExamService>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let state = exams.exam_state(user_id).await?;
    Ok(Json(state))
}

/// Saves (or clears) the draft answer for one question. Safe to retry.
pub async fn submit_answer(
    State(exams): State<ExamService>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = req.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let user_id = claims.user_id()?;
    exams.submit_answer(user_id, req.position, req.answers).await?;

    Ok(Json(json!({ "status": "success" })))
}

/// Scores the exam and discards the session.
pub async fn results(
    State(exams): State<ExamService>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let results = exams.results(user_id).await?;
    Ok(Json(results))
}
