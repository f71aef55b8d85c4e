//! crates/study_planner_core/src/quiz.rs
//!
//! Multiple-choice quizzes generated from study material.

use serde::{Deserialize, Serialize};

use crate::repair::extract_json;

pub const MIN_QUIZ_QUESTIONS: u32 = 1;
pub const MAX_QUIZ_QUESTIONS: u32 = 20;
pub const DEFAULT_QUIZ_QUESTIONS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub questions: Vec<QuizQuestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub answer: String,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuizParseError {
    #[error("AI response did not contain a quiz object")]
    NoJson,
    #[error("Quiz contains no questions")]
    NoQuestions,
    #[error("Question {0} must have exactly four options")]
    WrongOptionCount(usize),
    #[error("The answer to question {0} is not one of its options")]
    AnswerNotAnOption(usize),
}

/// Parses and checks a quiz completion.
pub fn parse_quiz_response(raw: &str) -> Result<Quiz, QuizParseError> {
    let (quiz, _stage): (Quiz, _) = extract_json(raw).ok_or(QuizParseError::NoJson)?;
    if quiz.questions.is_empty() {
        return Err(QuizParseError::NoQuestions);
    }
    for (i, q) in quiz.questions.iter().enumerate() {
        let number = i + 1;
        if q.options.len() != 4 {
            return Err(QuizParseError::WrongOptionCount(number));
        }
        if !q.options.iter().any(|o| o.trim() == q.answer.trim()) {
            return Err(QuizParseError::AnswerNotAnOption(number));
        }
    }
    Ok(quiz)
}
