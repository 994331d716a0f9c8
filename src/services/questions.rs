// src/services/questions.rs

//! Question lifecycle. Each call is one transaction; positions are kept
//! contiguous through the sequencer.

use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use crate::{
    error::AppError,
    models::{
        option::{AnswerOption, OPTION_COLUMNS},
        question::{
            CreateQuestionRequest, QUESTION_COLUMNS, Question, QuestionWithOptions,
            UpdateQuestionRequest,
        },
    },
    services::sequencer::{self, SiblingKind},
    utils::html::{clean_html, plain_text},
};

async fn fetch_question(conn: &mut PgConnection, question_id: i64) -> Result<Question, AppError> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = $1"
    ))
    .bind(question_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Question not found".to_string()))
}

/// Creates a question at the requested position of `exam_id`, shifting later
/// questions down. Options supplied with the request are stored in the order
/// given.
pub async fn insert_question(
    pool: &PgPool,
    exam_id: i64,
    req: CreateQuestionRequest,
) -> Result<QuestionWithOptions, AppError> {
    let mut tx = pool.begin().await?;

    let position = sequencer::make_room(&mut tx, SiblingKind::Question, exam_id, req.position).await?;

    let question = sqlx::query_as::<_, Question>(&format!(
        "INSERT INTO questions \
         (exam_id, prompt, explanation, topic, difficulty, score_value, time_limit_sec, position) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING {QUESTION_COLUMNS}"
    ))
    .bind(exam_id)
    .bind(clean_html(&req.prompt))
    .bind(clean_html(&req.explanation))
    .bind(plain_text(&req.topic))
    .bind(req.difficulty)
    .bind(req.score_value.unwrap_or(1))
    .bind(req.time_limit_sec)
    .bind(position)
    .fetch_one(&mut *tx)
    .await?;

    let mut options = Vec::with_capacity(req.options.len());
    for (index, option) in req.options.iter().enumerate() {
        let created = sqlx::query_as::<_, AnswerOption>(&format!(
            "INSERT INTO answer_options (question_id, text, is_correct, position) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {OPTION_COLUMNS}"
        ))
        .bind(question.id)
        .bind(plain_text(&option.text))
        .bind(option.is_correct)
        .bind(index as i32 + 1)
        .fetch_one(&mut *tx)
        .await?;
        options.push(created);
    }

    tx.commit().await?;

    tracing::info!(
        "Question {} inserted into exam {} at position {} with {} options",
        question.id,
        exam_id,
        position,
        options.len()
    );
    Ok(QuestionWithOptions { question, options })
}

/// Edits a question. A different `exam_id` moves it across exams; a
/// `position` alone swaps it within its exam.
pub async fn update_question(
    pool: &PgPool,
    question_id: i64,
    req: UpdateQuestionRequest,
) -> Result<Question, AppError> {
    if let Some(Some(seconds)) = req.time_limit_sec {
        if seconds < 1 {
            return Err(AppError::BadRequest("time_limit_sec must be positive".to_string()));
        }
    }

    let mut tx = pool.begin().await?;

    match (req.exam_id, req.position) {
        (Some(exam_id), position) => {
            sequencer::move_to(&mut tx, SiblingKind::Question, question_id, exam_id, position)
                .await?;
        }
        (None, Some(position)) => {
            sequencer::reorder_within(&mut tx, SiblingKind::Question, question_id, Some(position))
                .await?;
        }
        (None, None) => {}
    }

    let has_field_changes = req.prompt.is_some()
        || req.explanation.is_some()
        || req.topic.is_some()
        || req.difficulty.is_some()
        || req.score_value.is_some()
        || req.time_limit_sec.is_some();

    if has_field_changes {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE questions SET ");
        let mut separated = builder.separated(", ");

        if let Some(prompt) = req.prompt {
            separated.push("prompt = ");
            separated.push_bind_unseparated(clean_html(&prompt));
        }

        if let Some(explanation) = req.explanation {
            separated.push("explanation = ");
            separated.push_bind_unseparated(clean_html(&explanation));
        }

        if let Some(topic) = req.topic {
            separated.push("topic = ");
            separated.push_bind_unseparated(plain_text(&topic));
        }

        if let Some(difficulty) = req.difficulty {
            separated.push("difficulty = ");
            separated.push_bind_unseparated(difficulty);
        }

        if let Some(score_value) = req.score_value {
            separated.push("score_value = ");
            separated.push_bind_unseparated(score_value);
        }

        if let Some(time_limit) = req.time_limit_sec {
            separated.push("time_limit_sec = ");
            separated.push_bind_unseparated(time_limit);
        }

        builder.push(" WHERE id = ");
        builder.push_bind(question_id);

        let result = builder.build().execute(&mut *tx).await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Question not found".to_string()));
        }
    }

    let question = fetch_question(&mut tx, question_id).await?;
    tx.commit().await?;
    Ok(question)
}

/// Moves a question to `exam_id` at `position` (top when omitted).
pub async fn move_question(
    pool: &PgPool,
    question_id: i64,
    exam_id: i64,
    position: Option<i32>,
) -> Result<Question, AppError> {
    let mut tx = pool.begin().await?;
    let position = position.or(Some(1));
    sequencer::move_to(&mut tx, SiblingKind::Question, question_id, exam_id, position).await?;
    let question = fetch_question(&mut tx, question_id).await?;
    tx.commit().await?;
    Ok(question)
}

/// Deletes a question and closes the gap. Questions referenced by attempts
/// are protected.
pub async fn delete_question(pool: &PgPool, question_id: i64) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    let referenced: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM attempt_answers WHERE question_id = $1)")
            .bind(question_id)
            .fetch_one(&mut *tx)
            .await?;
    if referenced {
        return Err(AppError::Conflict(
            "Question is referenced by submitted attempts and cannot be deleted".to_string(),
        ));
    }

    sequencer::remove(&mut tx, SiblingKind::Question, question_id).await?;
    tx.commit().await?;
    Ok(())
}
