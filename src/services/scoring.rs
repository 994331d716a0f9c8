// src/services/scoring.rs

use std::cmp::Ordering;

use crate::models::{
    attempt::{AnswerMap, Review},
    option::AnswerOption,
    question::QuestionWithOptions,
};

pub const NOT_SELECTED: &str = "Not selected";
pub const NOT_SET: &str = "Not set";

/// Outcome of grading one submission against an exam's questions.
#[derive(Debug, Clone, PartialEq)]
pub struct Grade {
    /// One entry per question, in exam order.
    pub reviews: Vec<Review>,
    pub correct_count: i32,
    pub scoring_points: i32,
    pub max_scoring_points: i32,
    pub total_questions: i32,
}

impl Grade {
    pub fn score(&self) -> i32 {
        percentage(self.correct_count, self.total_questions)
    }
}

pub fn max_scoring_points(questions: &[QuestionWithOptions]) -> i32 {
    questions.iter().map(|q| q.question.score_value).sum()
}

/// `correct / total` as a whole percentage, rounding halves to even.
///
/// Exact integer arithmetic: 1/3 -> 33, 2/3 -> 67, 1/8 -> 12, 3/8 -> 38.
pub fn percentage(correct: i32, total: i32) -> i32 {
    if total <= 0 {
        return 0;
    }
    let scaled = i64::from(correct.clamp(0, total)) * 100;
    let total = i64::from(total);
    let (quotient, remainder) = (scaled / total, scaled % total);

    let rounded = match (remainder * 2).cmp(&total) {
        Ordering::Less => quotient,
        Ordering::Greater => quotient + 1,
        Ordering::Equal if quotient % 2 == 0 => quotient,
        Ordering::Equal => quotient + 1,
    };
    rounded as i32
}

/// The answer key: the first option flagged correct, by position.
fn correct_option(question: &QuestionWithOptions) -> Option<&AnswerOption> {
    question.options.iter().find(|o| o.is_correct)
}

/// Grades `answers` against `questions` (already in exam order).
///
/// A selection only counts when it names an option of the same question;
/// unknown ids, ids of other questions' options and missing entries are all
/// "not selected".
pub fn grade(questions: &[QuestionWithOptions], answers: &AnswerMap) -> Grade {
    let mut correct_count = 0;
    let mut scoring_points = 0;
    let mut reviews = Vec::with_capacity(questions.len());

    for question in questions {
        let correct = correct_option(question);
        let selected = answers
            .selection(question.question.id)
            .and_then(|id| question.options.iter().find(|o| o.id == id));

        let is_correct = matches!((selected, correct), (Some(s), Some(c)) if s.id == c.id);
        if is_correct {
            correct_count += 1;
            scoring_points += question.question.score_value;
        }

        reviews.push(Review {
            question_id: question.question.id,
            prompt: question.question.prompt.clone(),
            topic: question.question.topic.clone(),
            explanation: question.question.explanation.clone(),
            score_value: question.question.score_value,
            selected_option_id: selected.map(|o| o.id),
            selected_text: selected.map_or_else(|| NOT_SELECTED.to_string(), |o| o.text.clone()),
            correct_option_id: correct.map(|o| o.id),
            correct_text: correct.map_or_else(|| NOT_SET.to_string(), |o| o.text.clone()),
            is_correct,
        });
    }

    Grade {
        reviews,
        correct_count,
        scoring_points,
        max_scoring_points: max_scoring_points(questions),
        total_questions: questions.len() as i32,
    }
}
