// src/services/options.rs

use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::{
    error::AppError,
    models::option::{AnswerOption, CreateOptionRequest, OPTION_COLUMNS, UpdateOptionRequest},
    services::sequencer::{self, SiblingKind},
    utils::html::plain_text,
};

/// Adds an option to `question_id` at the requested position.
pub async fn insert_option(
    pool: &PgPool,
    question_id: i64,
    req: CreateOptionRequest,
) -> Result<AnswerOption, AppError> {
    let mut tx = pool.begin().await?;

    let position = sequencer::make_room(&mut tx, SiblingKind::Option, question_id, req.position).await?;

    let option = sqlx::query_as::<_, AnswerOption>(&format!(
        "INSERT INTO answer_options (question_id, text, is_correct, position) \
         VALUES ($1, $2, $3, $4) \
         RETURNING {OPTION_COLUMNS}"
    ))
    .bind(question_id)
    .bind(plain_text(&req.text))
    .bind(req.is_correct)
    .bind(position)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(option)
}

/// Edits an option's text or correctness, and swaps it to `position` when given.
pub async fn update_option(
    pool: &PgPool,
    option_id: i64,
    req: UpdateOptionRequest,
) -> Result<AnswerOption, AppError> {
    let mut tx = pool.begin().await?;

    if req.position.is_some() {
        sequencer::reorder_within(&mut tx, SiblingKind::Option, option_id, req.position).await?;
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE answer_options SET ");
    let mut separated = builder.separated(", ");
    // Keeps the statement valid when only the position changed.
    separated.push("id = id");

    if let Some(text) = req.text {
        separated.push("text = ");
        separated.push_bind_unseparated(plain_text(&text));
    }

    if let Some(is_correct) = req.is_correct {
        separated.push("is_correct = ");
        separated.push_bind_unseparated(is_correct);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(option_id);
    builder.push(format!(" RETURNING {OPTION_COLUMNS}"));

    let option = builder
        .build_query_as::<AnswerOption>()
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Option not found".to_string()))?;

    tx.commit().await?;
    Ok(option)
}

/// Deletes an option and closes the gap. Attempt answers that selected it keep
/// their row with the selection cleared.
pub async fn delete_option(pool: &PgPool, option_id: i64) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;
    sequencer::remove(&mut tx, SiblingKind::Option, option_id).await?;
    tx.commit().await?;
    Ok(())
}
