// src/services/submission.rs

use chrono::Utc;
use sqlx::PgPool;

use crate::{
    error::AppError,
    models::{
        attempt::{ATTEMPT_COLUMNS, Attempt, SubmissionResult, SubmitAttemptRequest},
        exam::{EXAM_COLUMNS, Exam},
    },
    services::{exams::load_questions, scoring},
};

/// Scores a submission and persists the attempt with one answer row per
/// question, all in one transaction.
///
/// * Exam must exist and be active (`NotFound`) and have questions (`BadRequest`).
/// * Questions and options are read from a single snapshot (repeatable read).
/// * The attempt row is created first, answers are bulk-inserted, then the
///   aggregates are written back in one update.
/// * Every call creates a new attempt; there is no de-duplication.
pub async fn submit_attempt(
    pool: &PgPool,
    exam_id: i64,
    req: SubmitAttemptRequest,
) -> Result<SubmissionResult, AppError> {
    let user_name = req.display_name();
    let started_at = req.started_at.unwrap_or_else(Utc::now);
    let duration_seconds = i32::try_from(req.duration_seconds.unwrap_or(0))
        .ok()
        .filter(|d| *d >= 0)
        .ok_or_else(|| {
            AppError::BadRequest("duration_seconds must be a non-negative integer".to_string())
        })?;

    let mut tx = pool.begin().await?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
        .execute(&mut *tx)
        .await?;

    let exam = sqlx::query_as::<_, Exam>(&format!(
        "SELECT {EXAM_COLUMNS} FROM exams WHERE id = $1 AND is_active"
    ))
    .bind(exam_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Exam not found".to_string()))?;

    let questions = load_questions(&mut tx, exam_id).await?;
    if questions.is_empty() {
        return Err(AppError::BadRequest("Exam has no questions".to_string()));
    }

    let max_scoring_points = scoring::max_scoring_points(&questions);
    let attempt_id: i64 = sqlx::query_scalar(
        "INSERT INTO attempts \
         (exam_id, user_name, started_at, finished_at, duration_seconds, \
          score, scoring_points, max_scoring_points, correct_count, total_questions) \
         VALUES ($1, $2, $3, NOW(), $4, 0, 0, $5, 0, $6) \
         RETURNING id",
    )
    .bind(exam_id)
    .bind(&user_name)
    .bind(started_at)
    .bind(duration_seconds)
    .bind(max_scoring_points)
    .bind(questions.len() as i32)
    .fetch_one(&mut *tx)
    .await?;

    let grade = scoring::grade(&questions, &req.answers);

    let question_ids: Vec<i64> = grade.reviews.iter().map(|r| r.question_id).collect();
    let selected_ids: Vec<Option<i64>> =
        grade.reviews.iter().map(|r| r.selected_option_id).collect();
    let correctness: Vec<bool> = grade.reviews.iter().map(|r| r.is_correct).collect();

    sqlx::query(
        "INSERT INTO attempt_answers (attempt_id, question_id, selected_option_id, is_correct) \
         SELECT $1, a.question_id, a.selected_option_id, a.is_correct \
         FROM UNNEST($2::BIGINT[], $3::BIGINT[], $4::BOOLEAN[]) \
              AS a(question_id, selected_option_id, is_correct)",
    )
    .bind(attempt_id)
    .bind(question_ids)
    .bind(selected_ids)
    .bind(correctness)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "UPDATE attempts \
         SET score = $1, scoring_points = $2, max_scoring_points = $3, correct_count = $4 \
         WHERE id = $5",
    )
    .bind(grade.score())
    .bind(grade.scoring_points)
    .bind(grade.max_scoring_points)
    .bind(grade.correct_count)
    .bind(attempt_id)
    .execute(&mut *tx)
    .await?;

    let attempt = sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {ATTEMPT_COLUMNS} FROM attempts a JOIN exams e ON e.id = a.exam_id WHERE a.id = $1"
    ))
    .bind(attempt_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        "Attempt {} by '{}' on exam {}: {}/{} correct, score {}%",
        attempt.id,
        attempt.user_name,
        exam_id,
        attempt.correct_count,
        attempt.total_questions,
        attempt.score
    );

    Ok(SubmissionResult {
        attempt,
        exam_title: exam.title,
        passing_score: exam.passing_score,
        reviews: grade.reviews,
    })
}
