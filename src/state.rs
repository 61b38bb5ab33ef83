// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{config::Config, store::ChallengeStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ChallengeStore>,
    pub config: Config,
}

impl FromRef<AppState> for Arc<dyn ChallengeStore> {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
