// src/state.rs

use crate::{config::Config, engine::Engine};
use axum::extract::FromRef;

#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
    pub config: Config,
}

impl FromRef<AppState> for Engine {
    fn from_ref(state: &AppState) -> Self {
        state.engine.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
