// src/models/attempt.rs

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, de};
use sqlx::FromRow;
use validator::Validate;

/// Columns of an attempt joined with its exam title (`a` = attempts, `e` = exams).
pub const ATTEMPT_COLUMNS: &str = "a.id, a.exam_id, e.title AS exam_title, a.user_name, \
    a.started_at, a.finished_at, a.score, a.scoring_points, a.max_scoring_points, \
    a.correct_count, a.total_questions, a.duration_seconds";

/// Represents the 'attempts' table in the database, with the exam title.
/// Immutable once the scoring transaction commits.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Attempt {
    pub id: i64,
    #[serde(rename = "exam")]
    pub exam_id: i64,
    pub exam_title: String,
    pub user_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Percentage of correctly answered questions, 0..=100.
    pub score: i32,
    pub scoring_points: i32,
    pub max_scoring_points: i32,
    pub correct_count: i32,
    pub total_questions: i32,
    pub duration_seconds: i32,
}

/// Represents the 'attempt_answers' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AttemptAnswer {
    pub id: i64,
    pub attempt_id: i64,
    pub question_id: i64,
    pub selected_option_id: Option<i64>,
    pub is_correct: bool,
}

/// Placeholder stored when the submitted name is blank.
pub const DEFAULT_USER_NAME: &str = "Student";

pub const MAX_USER_NAME_CHARS: usize = 100;

/// DTO for submitting an exam attempt.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitAttemptRequest {
    #[serde(default)]
    #[validate(custom(function = validate_user_name))]
    pub user_name: String,

    /// When the test-taker opened the exam; defaults to the submission time.
    pub started_at: Option<DateTime<Utc>>,

    #[validate(range(min = 0, max = 2147483647))]
    pub duration_seconds: Option<i64>,

    /// Question id -> chosen option id. Unanswered questions are simply absent.
    #[serde(default)]
    pub answers: AnswerMap,
}

impl SubmitAttemptRequest {
    /// Trimmed user name, or the placeholder when nothing usable was sent.
    pub fn display_name(&self) -> String {
        let trimmed = self.user_name.trim();
        if trimmed.is_empty() {
            DEFAULT_USER_NAME.to_string()
        } else {
            trimmed.to_string()
        }
    }
}

/// The limit applies to the stored (trimmed) name, not the raw input.
fn validate_user_name(user_name: &str) -> Result<(), validator::ValidationError> {
    if user_name.trim().chars().count() > MAX_USER_NAME_CHARS {
        return Err(validator::ValidationError::new("user_name_too_long"));
    }
    Ok(())
}

/// Mapping from question id to the chosen option id, normalized from the wire.
///
/// JSON object keys are always strings; keys that are not integers can never
/// name a question and are dropped. Values may be integers, integer strings or
/// `null` (no selection). When two keys normalize to the same question id
/// (`"7"` and `"07"`), the canonical decimal key wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerMap(HashMap<i64, Option<i64>>);

impl AnswerMap {
    /// The option chosen for `question_id`, if any.
    pub fn selection(&self, question_id: i64) -> Option<i64> {
        self.0.get(&question_id).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(i64, i64)> for AnswerMap {
    fn from_iter<I: IntoIterator<Item = (i64, i64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(q, o)| (q, Some(o))).collect())
    }
}

impl<'de> Deserialize<'de> for AnswerMap {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = HashMap::<String, serde_json::Value>::deserialize(deserializer)?;
        let mut answers: HashMap<i64, Option<i64>> = HashMap::with_capacity(raw.len());
        let mut canonical: HashMap<i64, bool> = HashMap::with_capacity(raw.len());

        for (key, value) in raw {
            let Ok(question_id) = key.trim().parse::<i64>() else {
                continue;
            };
            let selection = parse_option_id(&value).map_err(|msg| {
                de::Error::custom(format!("answers[{}]: {}", key, msg))
            })?;

            let is_canonical = key == question_id.to_string();
            match canonical.get(&question_id) {
                Some(true) if !is_canonical => continue,
                _ => {}
            }
            canonical.insert(question_id, is_canonical);
            answers.insert(question_id, selection);
        }

        Ok(Self(answers))
    }
}

fn parse_option_id(value: &serde_json::Value) -> Result<Option<i64>, &'static str> {
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::Number(n) => n.as_i64().map(Some).ok_or("option id must be an integer"),
        serde_json::Value::String(s) if s.trim().is_empty() => Ok(None),
        serde_json::Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| "option id must be an integer"),
        _ => Err("option id must be an integer"),
    }
}

/// Per-question breakdown returned after scoring.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Review {
    pub question_id: i64,
    pub prompt: String,
    pub topic: String,
    pub explanation: String,
    pub score_value: i32,
    pub selected_option_id: Option<i64>,
    pub selected_text: String,
    pub correct_option_id: Option<i64>,
    pub correct_text: String,
    pub is_correct: bool,
}

/// Response body of a successful submission.
#[derive(Debug, Serialize)]
pub struct SubmissionResult {
    pub attempt: Attempt,
    pub exam_title: String,
    pub passing_score: i32,
    pub reviews: Vec<Review>,
}

/// Per-user aggregate over all attempts.
#[derive(Debug, Serialize, FromRow)]
pub struct UserStat {
    pub user_name: String,
    pub attempts_count: i64,
    pub best_score: i32,
    pub avg_score: f64,
    pub avg_duration_seconds: f64,
}

/// Query parameters for the recent-attempts listing.
#[derive(Debug, Deserialize)]
pub struct AttemptListParams {
    pub user_name: Option<String>,
}
