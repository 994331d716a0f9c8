// src/handlers/admin.rs

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
    models::{
        exam::{CreateExamRequest, UpdateExamRequest},
        option::{CreateOptionRequest, UpdateOptionRequest},
        question::{CreateQuestionRequest, MoveQuestionRequest, UpdateQuestionRequest},
    },
    services::{exams, options, questions},
    utils::json::AppJson,
};

/// Creates a new exam.
/// An exam requested as active without passing the publication check is
/// stored inactive; the reasons come back as `warnings`.
pub async fn create_exam(
    State(pool): State<PgPool>,
    AppJson(payload): AppJson<CreateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let saved = exams::create_exam(&pool, payload).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

/// Retrieves any exam, including inactive ones and option correctness.
pub async fn get_exam(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let exam = exams::get_for_admin(&pool, id).await?;
    Ok(Json(exam))
}

/// Updates an exam by ID. Fields are optional.
pub async fn update_exam(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<UpdateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let saved = exams::update_exam(&pool, id, payload).await?;
    Ok(Json(saved))
}

/// Publishes an exam if every question has options and a correct answer.
pub async fn publish_exam(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let exam = exams::publish_exam(&pool, id).await?;
    Ok(Json(exam))
}

/// Deletes an exam by ID together with its questions.
pub async fn delete_exam(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    exams::delete_exam(&pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Creates a question in an exam at the requested position.
pub async fn create_question(
    State(pool): State<PgPool>,
    Path(exam_id): Path<i64>,
    AppJson(payload): AppJson<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let question = questions::insert_question(&pool, exam_id, payload).await?;
    Ok((StatusCode::CREATED, Json(question)))
}

/// Updates a question by ID; may reorder it or move it to another exam.
pub async fn update_question(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let question = questions::update_question(&pool, id, payload).await?;
    Ok(Json(question))
}

/// Moves a question to another exam.
pub async fn move_question(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<MoveQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let question = questions::move_question(&pool, id, payload.exam_id, payload.position).await?;
    Ok(Json(question))
}

/// Deletes a question by ID and renumbers the rest of its exam.
pub async fn delete_question(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    questions::delete_question(&pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Adds an answer option to a question.
pub async fn create_option(
    State(pool): State<PgPool>,
    Path(question_id): Path<i64>,
    AppJson(payload): AppJson<CreateOptionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let option = options::insert_option(&pool, question_id, payload).await?;
    Ok((StatusCode::CREATED, Json(option)))
}

/// Updates an option by ID.
pub async fn update_option(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<UpdateOptionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let option = options::update_option(&pool, id, payload).await?;
    Ok(Json(option))
}

/// Deletes an option by ID.
pub async fn delete_option(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    options::delete_option(&pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
