// src/handlers/exams.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::attempt::SubmitAttemptRequest,
    services::{exams, submission},
    utils::json::AppJson,
};

/// Lists active exams with question counts and effective durations.
pub async fn list_exams(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let exams = exams::list_active(&pool).await?;
    Ok(Json(exams))
}

/// Retrieves an active exam with its questions and options.
/// Option correctness is never exposed here.
pub async fn get_exam(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let exam = exams::get_active(&pool, id).await?;
    Ok(Json(exam))
}

/// Submits answers for an exam and returns the scored attempt with a
/// per-question review.
///
/// * 404 when the exam is missing or inactive.
/// * 400 when the payload is invalid or the exam has no questions.
pub async fn submit_attempt(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let result = submission::submit_attempt(&pool, id, payload).await?;
    Ok((StatusCode::CREATED, Json(result)))
}
