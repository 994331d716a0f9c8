// src/services/stats.rs

use sqlx::PgPool;

use crate::{
    error::AppError,
    models::attempt::{ATTEMPT_COLUMNS, Attempt, UserStat},
};

pub const RECENT_ATTEMPTS_LIMIT: i64 = 100;

/// Per-user aggregates, best score first, then mean score.
pub async fn user_stats(pool: &PgPool) -> Result<Vec<UserStat>, AppError> {
    let stats = sqlx::query_as::<_, UserStat>(
        r#"
        SELECT
            user_name,
            COUNT(*) AS attempts_count,
            MAX(score) AS best_score,
            AVG(score)::FLOAT8 AS avg_score,
            AVG(duration_seconds)::FLOAT8 AS avg_duration_seconds
        FROM attempts
        GROUP BY user_name
        ORDER BY best_score DESC, avg_score DESC, user_name
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(stats)
}

/// Most recent attempts, optionally for one exact user name.
pub async fn recent_attempts(
    pool: &PgPool,
    user_name: Option<&str>,
) -> Result<Vec<Attempt>, AppError> {
    let user_name = user_name.filter(|name| !name.is_empty());

    let attempts = sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {ATTEMPT_COLUMNS} \
         FROM attempts a JOIN exams e ON e.id = a.exam_id \
         WHERE ($1::TEXT IS NULL OR a.user_name = $1) \
         ORDER BY a.finished_at DESC, a.id DESC \
         LIMIT $2"
    ))
    .bind(user_name)
    .bind(RECENT_ATTEMPTS_LIMIT)
    .fetch_all(pool)
    .await?;

    Ok(attempts)
}
