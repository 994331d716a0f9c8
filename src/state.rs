// src/state.rs

use crate::config::{Branding, Config};
use axum::extract::FromRef;
use sqlx::PgPool;

/// Shared handler state: the store handle plus the startup configuration.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        Self { pool, config }
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Branding {
    fn from_ref(state: &AppState) -> Self {
        state.config.branding.clone()
    }
}
