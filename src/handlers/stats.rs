// src/handlers/stats.rs

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use sqlx::PgPool;

use crate::{error::AppError, models::attempt::AttemptListParams, services::stats};

/// Per-user aggregates ordered by best score, then average score.
pub async fn user_stats(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let stats = stats::user_stats(&pool).await?;
    Ok(Json(stats))
}

/// The 100 most recent attempts, optionally for one user name.
pub async fn list_attempts(
    State(pool): State<PgPool>,
    Query(params): Query<AttemptListParams>,
) -> Result<impl IntoResponse, AppError> {
    let attempts = stats::recent_attempts(&pool, params.user_name.as_deref()).await?;
    Ok(Json(attempts))
}
