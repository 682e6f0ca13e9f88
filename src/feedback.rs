use crate::evaluator::{check_answer, correct_answer};
use crate::models::{AnswerValue, Question};
use crate::settings::QuizSettings;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackEntry {
    pub is_answered: bool,
    pub is_correct: Option<bool>,
    pub correct_answer: Option<AnswerValue>,
}

#[derive(Debug, Clone)]
pub struct FeedbackTracker {
    enabled: bool,
    retry_on_wrong: bool,
    show_explanation: bool,
    entries: HashMap<String, FeedbackEntry>,
}

impl FeedbackTracker {
    pub fn new(settings: &QuizSettings) -> Self {
        Self {
            enabled: settings.should_show_instant_feedback(),
            retry_on_wrong: settings.can_retry_on_wrong(),
            show_explanation: settings.should_show_explanation(),
            entries: HashMap::new(),
        }
    }

    pub fn reconfigure(&mut self, settings: &QuizSettings) {
        self.enabled = settings.should_show_instant_feedback();
        self.retry_on_wrong = settings.can_retry_on_wrong();
        self.show_explanation = settings.should_show_explanation();
        if !self.enabled {
            self.entries.clear();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn entry(&self, question_id: &str) -> Option<&FeedbackEntry> {
        self.entries.get(question_id)
    }

    pub fn is_locked(&self, question_id: &str) -> bool {
        self.entries
            .get(question_id)
            .map(|e| e.is_answered)
            .unwrap_or(false)
    }

    pub fn record(&mut self, question: &Question, answer: Option<&AnswerValue>) -> Option<bool> {
        if !self.enabled || self.is_locked(&question.id) {
            return None;
        }
        let is_correct = check_answer(question, answer);
        self.entries.insert(
            question.id.clone(),
            FeedbackEntry {
                is_answered: true,
                is_correct: Some(is_correct),
                correct_answer: correct_answer(question),
            },
        );
        Some(is_correct)
    }

    /// Time ran out: the question counts as answered and wrong, whatever was staged.
    pub fn force_incorrect(&mut self, question: &Question) -> bool {
        if !self.enabled || self.is_locked(&question.id) {
            return false;
        }
        self.entries.insert(
            question.id.clone(),
            FeedbackEntry {
                is_answered: true,
                is_correct: Some(false),
                correct_answer: correct_answer(question),
            },
        );
        true
    }

    pub fn can_retry(&self, question_id: &str) -> bool {
        self.retry_on_wrong
            && self
                .entries
                .get(question_id)
                .map(|e| e.is_answered && e.is_correct == Some(false))
                .unwrap_or(false)
    }

    pub fn clear_for_retry(&mut self, question_id: &str) -> bool {
        if !self.can_retry(question_id) {
            return false;
        }
        self.entries.remove(question_id).is_some()
    }

    fn is_withheld(&self, entry: &FeedbackEntry) -> bool {
        self.retry_on_wrong && entry.is_correct == Some(false)
    }

    pub fn visible_correct_answer(&self, question_id: &str) -> Option<&AnswerValue> {
        let entry = self.entries.get(question_id)?;
        if self.is_withheld(entry) {
            return None;
        }
        entry.correct_answer.as_ref()
    }

    pub fn visible_explanation<'q>(&self, question: &'q Question) -> Option<&'q str> {
        let entry = self.entries.get(&question.id)?;
        if !self.show_explanation || self.is_withheld(entry) {
            return None;
        }
        question.explanation.as_deref()
    }
}
