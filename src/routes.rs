// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{handlers::sjt, state::AppState, utils::jwt::auth_middleware};

/// Assembles the main application router.
///
/// * Mounts the SJT exam routes under `/api/sjt`.
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (exam engine and configuration).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let sjt_routes = Router::new()
        .route("/setup", get(sjt::setup))
        // Protected exam routes, keyed by the caller's identity
        .merge(
            Router::new()
                .route("/start", post(sjt::start_exam))
                .route("/exam", get(sjt::exam_state))
                .route("/answers", post(sjt::submit_answer))
                .route("/results", get(sjt::results))
                .layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        );

    Router::new()
        .nest("/api/sjt", sjt_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
