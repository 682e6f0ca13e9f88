use crate::error::ErrorDetail;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Multiple,
    Boolean,
    Checkbox,
    ShortAnswer,
    FillBlanks,
    Matching,
    Ordering,
    Image,
}

impl QuestionType {
    /// Single-pick types are graded the moment an answer is chosen; the rest
    /// wait for an explicit check.
    pub fn is_simple(self) -> bool {
        matches!(
            self,
            QuestionType::Multiple | QuestionType::Boolean | QuestionType::Image
        )
    }

    pub fn expected_shape(self) -> &'static str {
        match self {
            QuestionType::Multiple | QuestionType::Boolean | QuestionType::Image => "a choice",
            QuestionType::Checkbox => "a selection",
            QuestionType::ShortAnswer => "text",
            QuestionType::FillBlanks => "a blank map",
            QuestionType::Matching => "a matching map",
            QuestionType::Ordering => "an order",
        }
    }

    pub fn accepts(self, value: &AnswerValue) -> bool {
        matches!(
            (self, value),
            (
                QuestionType::Multiple | QuestionType::Boolean | QuestionType::Image,
                AnswerValue::Choice(_)
            ) | (QuestionType::Checkbox, AnswerValue::Selection(_))
                | (QuestionType::ShortAnswer, AnswerValue::Text(_))
                | (QuestionType::FillBlanks, AnswerValue::Blanks(_))
                | (QuestionType::Matching, AnswerValue::Matching(_))
                | (QuestionType::Ordering, AnswerValue::Order(_))
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOption {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Blank {
    pub id: String,
    pub correct_answer: String,
    #[serde(default)]
    pub accepted_answers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchingPair {
    pub left: String,
    pub right: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OrderingItem {
    pub id: String,
    #[serde(default)]
    pub text: String,
    pub correct_order: i32,
}

fn default_points() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    #[serde(rename = "type")]
    pub q_type: QuestionType,
    pub text: String,
    #[serde(default)]
    pub answers: Vec<AnswerOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
    #[serde(default)]
    pub accepted_answers: Vec<String>,
    #[serde(default)]
    pub blanks: Vec<Blank>,
    #[serde(default)]
    pub matching_pairs: Vec<MatchingPair>,
    #[serde(default)]
    pub ordering_items: Vec<OrderingItem>,
    #[serde(default = "default_points")]
    pub points: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl Question {
    pub fn new(id: impl Into<String>, q_type: QuestionType, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            q_type,
            text: text.into(),
            answers: Vec::new(),
            correct_answer: None,
            accepted_answers: Vec::new(),
            blanks: Vec::new(),
            matching_pairs: Vec::new(),
            ordering_items: Vec::new(),
            points: default_points(),
            explanation: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AnswerValue {
    Choice(String),
    Selection(Vec<String>),
    Text(String),
    Blanks(BTreeMap<String, String>),
    Matching(BTreeMap<String, String>),
    Order(Vec<String>),
}

impl AnswerValue {
    pub fn is_empty(&self) -> bool {
        match self {
            AnswerValue::Choice(s) | AnswerValue::Text(s) => s.is_empty(),
            AnswerValue::Selection(v) | AnswerValue::Order(v) => v.is_empty(),
            AnswerValue::Blanks(m) | AnswerValue::Matching(m) => m.is_empty(),
        }
    }
}

pub type AnswerMap = HashMap<String, AnswerValue>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct QuizMeta {
    pub id: String,
    #[serde(default)]
    pub duration_minutes: u32,
    #[serde(default)]
    pub has_explanations: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub duration_minutes: u32,
    #[serde(default)]
    pub has_explanations: bool,
    pub questions: Vec<Question>,
}

impl Quiz {
    pub fn meta(&self) -> QuizMeta {
        QuizMeta {
            id: self.id.clone(),
            duration_minutes: self.duration_minutes,
            has_explanations: self.has_explanations,
        }
    }
}

pub fn validate_quiz(quiz: &Quiz) -> Result<(), Vec<ErrorDetail>> {
    let mut issues = Vec::new();
    if quiz.id.trim().is_empty() {
        issues.push(ErrorDetail::new("id", "must not be empty"));
    }
    if quiz.questions.is_empty() {
        issues.push(ErrorDetail::new("questions", "must contain at least one question"));
    }

    let mut question_ids = HashSet::new();
    for (i, q) in quiz.questions.iter().enumerate() {
        if q.id.trim().is_empty() {
            issues.push(ErrorDetail::new(format!("questions[{i}].id"), "must not be empty"));
        }
        if !question_ids.insert(q.id.as_str()) {
            issues.push(ErrorDetail::new(format!("questions[{i}].id"), "must be unique"));
        }
        if q.text.trim().is_empty() {
            issues.push(ErrorDetail::new(format!("questions[{i}].text"), "must not be empty"));
        }

        match q.q_type {
            QuestionType::Multiple
            | QuestionType::Boolean
            | QuestionType::Image
            | QuestionType::Checkbox => {
                if q.answers.len() < 2 {
                    issues.push(ErrorDetail::new(
                        format!("questions[{i}].answers"),
                        "must contain at least 2 answers",
                    ));
                }
                let mut seen = HashSet::new();
                for (j, a) in q.answers.iter().enumerate() {
                    if a.id.trim().is_empty() {
                        issues.push(ErrorDetail::new(
                            format!("questions[{i}].answers[{j}].id"),
                            "must not be empty",
                        ));
                    }
                    if !seen.insert(a.id.as_str()) {
                        issues.push(ErrorDetail::new(
                            format!("questions[{i}].answers[{j}].id"),
                            "must be unique",
                        ));
                    }
                }
                let correct = q.answers.iter().filter(|a| a.is_correct).count();
                if correct == 0 {
                    issues.push(ErrorDetail::new(
                        format!("questions[{i}].answers"),
                        "must flag at least one correct answer",
                    ));
                } else if correct > 1 && q.q_type != QuestionType::Checkbox {
                    issues.push(ErrorDetail::new(
                        format!("questions[{i}].answers"),
                        "must flag exactly one correct answer",
                    ));
                }
            }
            QuestionType::ShortAnswer => {
                let empty = q
                    .correct_answer
                    .as_deref()
                    .map(|s| s.trim().is_empty())
                    .unwrap_or(true);
                if empty {
                    issues.push(ErrorDetail::new(
                        format!("questions[{i}].correctAnswer"),
                        "is required for short_answer",
                    ));
                }
            }
            QuestionType::FillBlanks => {
                if q.blanks.is_empty() {
                    issues.push(ErrorDetail::new(
                        format!("questions[{i}].blanks"),
                        "must contain at least one blank",
                    ));
                }
                let mut seen = HashSet::new();
                for (j, b) in q.blanks.iter().enumerate() {
                    if !seen.insert(b.id.as_str()) {
                        issues.push(ErrorDetail::new(
                            format!("questions[{i}].blanks[{j}].id"),
                            "must be unique",
                        ));
                    }
                }
            }
            QuestionType::Matching => {
                if q.matching_pairs.is_empty() {
                    issues.push(ErrorDetail::new(
                        format!("questions[{i}].matchingPairs"),
                        "must contain at least one pair",
                    ));
                }
                let mut seen = HashSet::new();
                for (j, p) in q.matching_pairs.iter().enumerate() {
                    if !seen.insert(p.left.as_str()) {
                        issues.push(ErrorDetail::new(
                            format!("questions[{i}].matchingPairs[{j}].left"),
                            "must be unique",
                        ));
                    }
                }
            }
            QuestionType::Ordering => {
                if q.ordering_items.len() < 2 {
                    issues.push(ErrorDetail::new(
                        format!("questions[{i}].orderingItems"),
                        "must contain at least 2 items",
                    ));
                }
            }
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}
