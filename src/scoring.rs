// src/scoring.rs

use std::collections::HashMap;

use crate::models::attempt::SubmittedAnswer;
use crate::models::question::{QuestionType, QuestionWithAnswers};

/// Grading result for a single submitted answer.
#[derive(Debug, Clone)]
pub struct GradedAnswer {
    pub question_id: i64,
    pub answer_id: Option<i64>,
    pub text_answer: Option<String>,
    pub is_correct: bool,
    pub points_earned: i32,
}

/// Aggregate grading outcome for one submission set.
#[derive(Debug, Clone)]
pub struct GradeResult {
    pub answers: Vec<GradedAnswer>,
    pub total_score: i32,
    pub max_score: i32,
}

/// Grades submitted answers against the authoritative question/answer set.
///
/// Submissions referencing questions outside the quiz are skipped silently:
/// they produce no result and contribute nothing to `max_score`, which
/// accumulates only over matched submissions. A submission with neither a
/// usable selection nor text is an incorrect zero-point result, not an
/// error. Duplicate submissions for one question are each graded
/// independently.
pub fn grade(questions: &[QuestionWithAnswers], submissions: &[SubmittedAnswer]) -> GradeResult {
    let by_id: HashMap<i64, &QuestionWithAnswers> =
        questions.iter().map(|q| (q.question.id, q)).collect();

    let mut answers = Vec::with_capacity(submissions.len());
    let mut total_score = 0;
    let mut max_score = 0;

    for submission in submissions {
        let Some(entry) = by_id.get(&submission.question_id) else {
            continue;
        };

        max_score += entry.question.points;

        let is_correct =
            if entry.question.question_type == QuestionType::FillBlank.as_str() {
                grade_fill_blank(entry, submission.text_answer.as_deref())
            } else {
                grade_choice(entry, submission.answer_id)
            };

        let points_earned = if is_correct { entry.question.points } else { 0 };
        total_score += points_earned;

        answers.push(GradedAnswer {
            question_id: submission.question_id,
            answer_id: submission.answer_id,
            text_answer: submission.text_answer.clone(),
            is_correct,
            points_earned,
        });
    }

    GradeResult {
        answers,
        total_score,
        max_score,
    }
}

/// Case- and whitespace-insensitive match against every answer marked
/// correct for the question.
fn grade_fill_blank(entry: &QuestionWithAnswers, text_answer: Option<&str>) -> bool {
    let Some(text) = text_answer else {
        return false;
    };
    let submitted = text.trim().to_lowercase();

    entry
        .answers
        .iter()
        .filter(|a| a.is_correct)
        .any(|a| a.text.trim().to_lowercase() == submitted)
}

/// The selected answer must exist on the question and carry the correct flag.
fn grade_choice(entry: &QuestionWithAnswers, answer_id: Option<i64>) -> bool {
    let Some(id) = answer_id else {
        return false;
    };
    entry
        .answers
        .iter()
        .find(|a| a.id == id)
        .map(|a| a.is_correct)
        .unwrap_or(false)
}

/// percentage = 100 * total / max when max > 0, else 0.
pub fn percentage(total_score: i32, max_score: i32) -> f64 {
    if max_score > 0 {
        100.0 * total_score as f64 / max_score as f64
    } else {
        0.0
    }
}

/// An absent passing threshold means every attempt passes.
pub fn passed(percentage_score: f64, passing_score: Option<i32>) -> bool {
    match passing_score {
        Some(threshold) => percentage_score >= threshold as f64,
        None => true,
    }
}
