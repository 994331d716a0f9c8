// src/services/exams.rs

use std::collections::HashMap;

use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use crate::{
    error::AppError,
    models::{
        exam::{
            AdminExamDetail, CreateExamRequest, DEFAULT_DURATION_MINUTES, DEFAULT_PASSING_SCORE,
            DEFAULT_SUBJECT_COLOR, EXAM_COLUMNS, Exam, ExamDetail, ExamSaved, ExamSummary,
            UpdateExamRequest,
        },
        option::{AnswerOption, OPTION_COLUMNS},
        question::{QUESTION_COLUMNS, Question, QuestionWithOptions},
    },
    utils::html::{clean_html, plain_text},
};

/// Loads an exam's questions and their options, both in position order,
/// with two queries regardless of the number of questions.
pub async fn load_questions(
    conn: &mut PgConnection,
    exam_id: i64,
) -> Result<Vec<QuestionWithOptions>, AppError> {
    let questions = sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE exam_id = $1 ORDER BY position, id"
    ))
    .bind(exam_id)
    .fetch_all(&mut *conn)
    .await?;

    let options = sqlx::query_as::<_, AnswerOption>(&format!(
        "SELECT {OPTION_COLUMNS} FROM answer_options \
         WHERE question_id IN (SELECT id FROM questions WHERE exam_id = $1) \
         ORDER BY question_id, position, id"
    ))
    .bind(exam_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut by_question: HashMap<i64, Vec<AnswerOption>> = HashMap::new();
    for option in options {
        by_question.entry(option.question_id).or_default().push(option);
    }

    Ok(questions
        .into_iter()
        .map(|question| {
            let options = by_question.remove(&question.id).unwrap_or_default();
            QuestionWithOptions { question, options }
        })
        .collect())
}

async fn find_exam(
    conn: &mut PgConnection,
    exam_id: i64,
    active_only: bool,
) -> Result<Exam, AppError> {
    let filter = if active_only { " AND is_active" } else { "" };
    sqlx::query_as::<_, Exam>(&format!(
        "SELECT {EXAM_COLUMNS} FROM exams WHERE id = $1{filter}"
    ))
    .bind(exam_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Exam not found".to_string()))
}

/// Problems that prevent an exam from being published. Empty means publishable.
pub fn publication_errors(questions: &[QuestionWithOptions]) -> Vec<String> {
    if questions.is_empty() {
        return vec!["Exam has no questions".to_string()];
    }

    let mut errors = Vec::new();
    for q in questions {
        if q.options.is_empty() {
            errors.push(format!("Question #{} has no answer options", q.question.id));
            continue;
        }
        if !q.options.iter().any(|o| o.is_correct) {
            errors.push(format!("Question #{} has no correct option", q.question.id));
        }
    }
    errors
}

/// Lists active exams ordered by title, with question counts and effective durations.
pub async fn list_active(pool: &PgPool) -> Result<Vec<ExamSummary>, AppError> {
    let exams = sqlx::query_as::<_, Exam>(&format!(
        "SELECT {EXAM_COLUMNS} FROM exams WHERE is_active ORDER BY title, id"
    ))
    .fetch_all(pool)
    .await?;

    let exam_ids: Vec<i64> = exams.iter().map(|e| e.id).collect();
    let limits = sqlx::query_as::<_, (i64, Option<i32>)>(
        "SELECT exam_id, time_limit_sec FROM questions WHERE exam_id = ANY($1)",
    )
    .bind(&exam_ids)
    .fetch_all(pool)
    .await?;

    let mut by_exam: HashMap<i64, Vec<Option<i32>>> = HashMap::new();
    for (exam_id, limit) in limits {
        by_exam.entry(exam_id).or_default().push(limit);
    }

    Ok(exams
        .into_iter()
        .map(|exam| {
            let limits = by_exam.remove(&exam.id).unwrap_or_default();
            ExamSummary::new(exam, &limits)
        })
        .collect())
}

/// A single active exam for test-takers.
pub async fn get_active(pool: &PgPool, exam_id: i64) -> Result<ExamDetail, AppError> {
    let mut conn = pool.acquire().await?;
    let exam = find_exam(&mut conn, exam_id, true).await?;
    let questions = load_questions(&mut conn, exam_id).await?;
    Ok(ExamDetail::new(exam, questions))
}

/// Any exam, with option correctness, for authoring.
pub async fn get_for_admin(pool: &PgPool, exam_id: i64) -> Result<AdminExamDetail, AppError> {
    let mut conn = pool.acquire().await?;
    let exam = find_exam(&mut conn, exam_id, false).await?;
    let questions = load_questions(&mut conn, exam_id).await?;
    let time_limits: Vec<Option<i32>> =
        questions.iter().map(|q| q.question.time_limit_sec).collect();

    Ok(AdminExamDetail {
        effective_duration_seconds: exam.effective_duration_seconds(&time_limits),
        exam,
        questions,
    })
}

/// Keeps `is_active` only if the exam passes the publication check.
async fn enforce_publication(
    conn: &mut PgConnection,
    exam: Exam,
) -> Result<ExamSaved, AppError> {
    if !exam.is_active {
        return Ok(ExamSaved {
            exam,
            warnings: Vec::new(),
        });
    }

    let questions = load_questions(conn, exam.id).await?;
    let warnings = publication_errors(&questions);
    if warnings.is_empty() {
        return Ok(ExamSaved { exam, warnings });
    }

    tracing::warn!(
        "Exam {} kept inactive: {}",
        exam.id,
        warnings.join(" | ")
    );
    let exam = sqlx::query_as::<_, Exam>(&format!(
        "UPDATE exams SET is_active = FALSE, updated_at = NOW() WHERE id = $1 RETURNING {EXAM_COLUMNS}"
    ))
    .bind(exam.id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(ExamSaved { exam, warnings })
}

pub async fn create_exam(pool: &PgPool, req: CreateExamRequest) -> Result<ExamSaved, AppError> {
    let mut tx = pool.begin().await?;

    let exam = sqlx::query_as::<_, Exam>(&format!(
        "INSERT INTO exams \
         (title, description, subject, subject_color, duration_minutes, \
          default_question_time_sec, passing_score, is_active) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING {EXAM_COLUMNS}"
    ))
    .bind(plain_text(&req.title))
    .bind(clean_html(&req.description))
    .bind(plain_text(&req.subject))
    .bind(req.subject_color.as_deref().unwrap_or(DEFAULT_SUBJECT_COLOR))
    .bind(req.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES))
    .bind(req.default_question_time_sec)
    .bind(req.passing_score.unwrap_or(DEFAULT_PASSING_SCORE))
    .bind(req.is_active)
    .fetch_one(&mut *tx)
    .await?;

    let saved = enforce_publication(&mut tx, exam).await?;
    tx.commit().await?;

    tracing::info!("Exam {} created: {}", saved.exam.id, saved.exam.title);
    Ok(saved)
}

pub async fn update_exam(
    pool: &PgPool,
    exam_id: i64,
    req: UpdateExamRequest,
) -> Result<ExamSaved, AppError> {
    if let Some(Some(seconds)) = req.default_question_time_sec {
        if seconds < 1 {
            return Err(AppError::BadRequest(
                "default_question_time_sec must be positive".to_string(),
            ));
        }
    }

    let mut tx = pool.begin().await?;

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE exams SET ");
    let mut separated = builder.separated(", ");
    separated.push("updated_at = NOW()");

    if let Some(title) = req.title {
        separated.push("title = ");
        separated.push_bind_unseparated(plain_text(&title));
    }

    if let Some(description) = req.description {
        separated.push("description = ");
        separated.push_bind_unseparated(clean_html(&description));
    }

    if let Some(subject) = req.subject {
        separated.push("subject = ");
        separated.push_bind_unseparated(plain_text(&subject));
    }

    if let Some(color) = req.subject_color {
        separated.push("subject_color = ");
        separated.push_bind_unseparated(color);
    }

    if let Some(minutes) = req.duration_minutes {
        separated.push("duration_minutes = ");
        separated.push_bind_unseparated(minutes);
    }

    if let Some(default_time) = req.default_question_time_sec {
        separated.push("default_question_time_sec = ");
        separated.push_bind_unseparated(default_time);
    }

    if let Some(passing_score) = req.passing_score {
        separated.push("passing_score = ");
        separated.push_bind_unseparated(passing_score);
    }

    if let Some(is_active) = req.is_active {
        separated.push("is_active = ");
        separated.push_bind_unseparated(is_active);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(exam_id);
    builder.push(format!(" RETURNING {EXAM_COLUMNS}"));

    let exam = builder
        .build_query_as::<Exam>()
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Exam not found".to_string()))?;

    let saved = enforce_publication(&mut tx, exam).await?;
    tx.commit().await?;
    Ok(saved)
}

/// Marks an exam active, or explains why it cannot be.
pub async fn publish_exam(pool: &PgPool, exam_id: i64) -> Result<Exam, AppError> {
    let mut tx = pool.begin().await?;

    sqlx::query_scalar::<_, i64>("SELECT id FROM exams WHERE id = $1 FOR NO KEY UPDATE")
        .bind(exam_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Exam not found".to_string()))?;

    let questions = load_questions(&mut tx, exam_id).await?;
    let errors = publication_errors(&questions);
    if !errors.is_empty() {
        return Err(AppError::BadRequest(format!(
            "Exam cannot be published: {}",
            errors.join(" | ")
        )));
    }

    let exam = sqlx::query_as::<_, Exam>(&format!(
        "UPDATE exams SET is_active = TRUE, updated_at = NOW() WHERE id = $1 RETURNING {EXAM_COLUMNS}"
    ))
    .bind(exam_id)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    tracing::info!("Exam {} published", exam_id);
    Ok(exam)
}

/// Deletes an exam with its questions and options. Exams with attempts are
/// protected and yield `Conflict`.
pub async fn delete_exam(pool: &PgPool, exam_id: i64) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    let has_attempts: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM attempts WHERE exam_id = $1)")
            .bind(exam_id)
            .fetch_one(&mut *tx)
            .await?;
    if has_attempts {
        return Err(AppError::Conflict(
            "Exam has attempts and cannot be deleted; deactivate it instead".to_string(),
        ));
    }

    let result = sqlx::query("DELETE FROM exams WHERE id = $1")
        .bind(exam_id)
        .execute(&mut *tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Exam not found".to_string()));
    }

    tx.commit().await?;
    tracing::info!("Exam {} deleted", exam_id);
    Ok(())
}
