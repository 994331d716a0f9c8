// src/models/exam.rs

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use validator::Validate;

use crate::models::question::{PublicQuestion, QuestionWithOptions};
use crate::utils::nullable;

static HEX_COLOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").expect("valid colour regex"));

pub const DEFAULT_SUBJECT_COLOR: &str = "#2563eb";
pub const DEFAULT_DURATION_MINUTES: i32 = 20;
pub const DEFAULT_PASSING_SCORE: i32 = 70;

/// Column list shared by every query that loads a full `Exam` row.
pub const EXAM_COLUMNS: &str = "id, title, description, subject, subject_color, duration_minutes, \
    default_question_time_sec, passing_score, is_active, created_at, updated_at";

/// Represents the 'exams' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Exam {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub subject: String,

    /// Accent colour used by the frontend, `#RRGGBB`.
    pub subject_color: String,

    /// Nominal duration, used when per-question timing is not configured.
    pub duration_minutes: i32,

    /// Time budget for questions that carry no limit of their own.
    pub default_question_time_sec: Option<i32>,

    /// Percentage required to pass.
    pub passing_score: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Exam {
    pub fn effective_duration_seconds(&self, time_limits: &[Option<i32>]) -> i64 {
        effective_duration_seconds(
            self.duration_minutes,
            self.default_question_time_sec,
            time_limits,
        )
    }
}

/// Total time allowed for an exam.
///
/// When the exam has questions and a default per-question time, the duration is
/// the sum of every question's own limit (falling back to the default).
/// Otherwise the nominal `duration_minutes` applies.
pub fn effective_duration_seconds(
    duration_minutes: i32,
    default_question_time_sec: Option<i32>,
    time_limits: &[Option<i32>],
) -> i64 {
    match default_question_time_sec {
        Some(default_time) if default_time > 0 && !time_limits.is_empty() => time_limits
            .iter()
            .map(|limit| i64::from(limit.unwrap_or(default_time)))
            .sum(),
        _ => i64::from(duration_minutes) * 60,
    }
}

/// Whole minutes, rounded up, never below one.
pub fn effective_duration_minutes(seconds: i64) -> i64 {
    ((seconds + 59) / 60).max(1)
}

/// Row of the public exam listing.
#[derive(Debug, Serialize)]
pub struct ExamSummary {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub subject: String,
    pub subject_color: String,
    pub duration_minutes: i32,
    pub effective_duration_minutes: i64,
    pub effective_duration_seconds: i64,
    pub passing_score: i32,
    pub questions_count: usize,
}

impl ExamSummary {
    pub fn new(exam: Exam, time_limits: &[Option<i32>]) -> Self {
        let seconds = exam.effective_duration_seconds(time_limits);
        Self {
            id: exam.id,
            title: exam.title,
            description: exam.description,
            subject: exam.subject,
            subject_color: exam.subject_color,
            duration_minutes: exam.duration_minutes,
            effective_duration_minutes: effective_duration_minutes(seconds),
            effective_duration_seconds: seconds,
            passing_score: exam.passing_score,
            questions_count: time_limits.len(),
        }
    }
}

/// Public exam with nested questions. Never carries option correctness.
#[derive(Debug, Serialize)]
pub struct ExamDetail {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub subject: String,
    pub subject_color: String,
    pub duration_minutes: i32,
    pub effective_duration_minutes: i64,
    pub effective_duration_seconds: i64,
    pub passing_score: i32,
    pub questions: Vec<PublicQuestion>,
}

impl ExamDetail {
    pub fn new(exam: Exam, questions: Vec<QuestionWithOptions>) -> Self {
        let time_limits: Vec<Option<i32>> =
            questions.iter().map(|q| q.question.time_limit_sec).collect();
        let seconds = exam.effective_duration_seconds(&time_limits);
        Self {
            id: exam.id,
            title: exam.title,
            description: exam.description,
            subject: exam.subject,
            subject_color: exam.subject_color,
            duration_minutes: exam.duration_minutes,
            effective_duration_minutes: effective_duration_minutes(seconds),
            effective_duration_seconds: seconds,
            passing_score: exam.passing_score,
            questions: questions.into_iter().map(PublicQuestion::from).collect(),
        }
    }
}

/// Authoring view: includes inactive exams and option correctness.
#[derive(Debug, Serialize)]
pub struct AdminExamDetail {
    #[serde(flatten)]
    pub exam: Exam,
    pub effective_duration_seconds: i64,
    pub questions: Vec<QuestionWithOptions>,
}

/// Result of saving an exam. `warnings` lists publication problems that
/// forced the exam to stay inactive.
#[derive(Debug, Serialize)]
pub struct ExamSaved {
    pub exam: Exam,
    pub warnings: Vec<String>,
}

/// DTO for creating a new exam.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateExamRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub description: String,
    #[validate(length(min = 1, max = 100))]
    pub subject: String,
    #[validate(custom(function = validate_subject_color))]
    pub subject_color: Option<String>,
    #[validate(range(min = 1))]
    pub duration_minutes: Option<i32>,
    #[validate(range(min = 1))]
    pub default_question_time_sec: Option<i32>,
    #[validate(range(min = 0, max = 100))]
    pub passing_score: Option<i32>,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
}

fn active_by_default() -> bool {
    true
}

/// DTO for updating an exam. Fields are optional.
/// `default_question_time_sec: null` clears the default.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateExamRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub subject: Option<String>,
    #[validate(custom(function = validate_subject_color))]
    pub subject_color: Option<String>,
    #[validate(range(min = 1))]
    pub duration_minutes: Option<i32>,
    #[serde(default, deserialize_with = "nullable")]
    pub default_question_time_sec: Option<Option<i32>>,
    #[validate(range(min = 0, max = 100))]
    pub passing_score: Option<i32>,
    pub is_active: Option<bool>,
}

fn validate_subject_color(color: &str) -> Result<(), validator::ValidationError> {
    if HEX_COLOR.is_match(color) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("subject_color_must_be_hex"))
    }
}
