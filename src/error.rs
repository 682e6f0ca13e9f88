use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorDetail {
    pub field: String,
    pub issue: String,
}

impl ErrorDetail {
    pub fn new(field: impl Into<String>, issue: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            issue: issue.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("quiz has no questions")]
    NotReady,

    #[error("quiz validation failed ({} issues)", .0.len())]
    InvalidQuiz(Vec<ErrorDetail>),

    #[error("unknown question: {0}")]
    UnknownQuestion(String),

    #[error("answer for {question_id} must be {expected}")]
    AnswerShape {
        question_id: String,
        expected: &'static str,
    },

    #[error("session runtime stopped: {0}")]
    Runtime(String),
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::NotReady => "NOT_READY",
            EngineError::InvalidQuiz(_) => "VALIDATION_ERROR",
            EngineError::UnknownQuestion(_) => "NOT_FOUND",
            EngineError::AnswerShape { .. } => "ANSWER_SHAPE",
            EngineError::Runtime(_) => "RUNTIME_STOPPED",
        }
    }

    pub fn details(&self) -> &[ErrorDetail] {
        match self {
            EngineError::InvalidQuiz(details) => details,
            _ => &[],
        }
    }
}
