// src/state.rs

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::config::Config;

/// Shared application state injected into the router.
///
/// Handlers extract only the piece they need (`State<PgPool>` or
/// `State<Config>`) through the `FromRef` impls below rather than the
/// whole state.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
}

/// Lets handlers extract the pool directly via `State<PgPool>`.
impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

/// Lets handlers and the `Requester` extractor reach the config without
/// carrying the pool along.
impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
