// src/models/option.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use validator::Validate;

pub const OPTION_COLUMNS: &str = "id, question_id, text, is_correct, position";

/// Represents the 'answer_options' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AnswerOption {
    pub id: i64,
    pub question_id: i64,
    pub text: String,
    pub is_correct: bool,

    /// 1-based rank within the question.
    pub position: i32,
}

/// Option as shown to test-takers.
#[derive(Debug, Serialize)]
pub struct PublicOption {
    pub id: i64,
    pub text: String,
    pub position: i32,
}

impl From<AnswerOption> for PublicOption {
    fn from(option: AnswerOption) -> Self {
        Self {
            id: option.id,
            text: option.text,
            position: option.position,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateOptionRequest {
    #[validate(length(min = 1, max = 300))]
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
    pub position: Option<i32>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateOptionRequest {
    #[validate(length(min = 1, max = 300))]
    pub text: Option<String>,
    pub is_correct: Option<bool>,
    pub position: Option<i32>,
}
