// src/state.rs

use axum::extract::FromRef;

use crate::{config::Config, engine::ExamService};

#[derive(Clone)]
pub struct AppState {
    pub exams: ExamService,
    pub config: Config,
}

impl FromRef<AppState> for ExamService {
    fn from_ref(state: &AppState) -> Self {
        state.exams.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
