// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use validator::Validate;

use crate::models::option::{AnswerOption, CreateOptionRequest, PublicOption};
use crate::utils::nullable;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "question_difficulty", rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

pub const QUESTION_COLUMNS: &str = "id, exam_id, prompt, explanation, topic, difficulty, \
    score_value, time_limit_sec, position";

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Question {
    pub id: i64,
    pub exam_id: i64,

    /// The text content of the question.
    pub prompt: String,

    /// Shown in the review after an attempt is scored.
    pub explanation: String,
    pub topic: String,
    pub difficulty: Difficulty,

    /// Points earned for a correct answer.
    pub score_value: i32,

    /// Per-question time budget; falls back to the exam default.
    pub time_limit_sec: Option<i32>,

    /// 1-based rank within the exam; contiguous across the exam's questions.
    pub position: i32,
}

/// A question together with its options, both ordered by position.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionWithOptions {
    #[serde(flatten)]
    pub question: Question,
    pub options: Vec<AnswerOption>,
}

/// DTO for sending a question to test-takers (options without correctness).
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub prompt: String,
    pub explanation: String,
    pub topic: String,
    pub difficulty: Difficulty,
    pub score_value: i32,
    pub time_limit_sec: Option<i32>,
    pub position: i32,
    pub options: Vec<PublicOption>,
}

impl From<QuestionWithOptions> for PublicQuestion {
    fn from(q: QuestionWithOptions) -> Self {
        Self {
            id: q.question.id,
            prompt: q.question.prompt,
            explanation: q.question.explanation,
            topic: q.question.topic,
            difficulty: q.question.difficulty,
            score_value: q.question.score_value,
            time_limit_sec: q.question.time_limit_sec,
            position: q.question.position,
            options: q.options.into_iter().map(PublicOption::from).collect(),
        }
    }
}

/// DTO for creating a new question inside an exam.
///
/// `position` is clamped into the exam's current range; omitted or
/// non-positive values insert at the top. `options`, when given, are appended
/// in order after the question is placed.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 5000))]
    pub prompt: String,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub explanation: String,
    #[validate(length(min = 1, max = 100))]
    pub topic: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[validate(range(min = 1))]
    pub score_value: Option<i32>,
    #[validate(range(min = 1))]
    pub time_limit_sec: Option<i32>,
    pub position: Option<i32>,
    #[serde(default)]
    #[validate(nested)]
    #[validate(custom(function = validate_options))]
    pub options: Vec<CreateOptionRequest>,
}

/// DTO for updating a question. Fields are optional.
///
/// Setting `exam_id` to a different exam moves the question there;
/// `position` alone reorders it within its exam.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateQuestionRequest {
    pub exam_id: Option<i64>,
    pub position: Option<i32>,
    #[validate(length(min = 1, max = 5000))]
    pub prompt: Option<String>,
    #[validate(length(max = 5000))]
    pub explanation: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub topic: Option<String>,
    pub difficulty: Option<Difficulty>,
    #[validate(range(min = 1))]
    pub score_value: Option<i32>,
    #[serde(default, deserialize_with = "nullable")]
    pub time_limit_sec: Option<Option<i32>>,
}

/// DTO for moving a question to another exam.
#[derive(Debug, Deserialize)]
pub struct MoveQuestionRequest {
    pub exam_id: i64,
    pub position: Option<i32>,
}

/// Options created together with a question must name exactly one correct answer.
fn validate_options(options: &[CreateOptionRequest]) -> Result<(), validator::ValidationError> {
    if options.is_empty() {
        return Ok(());
    }
    let correct = options.iter().filter(|o| o.is_correct).count();
    if correct != 1 {
        return Err(validator::ValidationError::new("exactly_one_correct_option_required"));
    }
    Ok(())
}
