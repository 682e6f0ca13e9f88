use crate::models::{AnswerMap, AnswerValue, Question, QuestionType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Expected answer in the same shape a learner would submit. `None` when the
/// question carries no usable key (e.g. a single-choice question with no
/// option flagged correct).
pub fn correct_answer(question: &Question) -> Option<AnswerValue> {
    match question.q_type {
        QuestionType::Multiple | QuestionType::Boolean | QuestionType::Image => question
            .answers
            .iter()
            .find(|a| a.is_correct)
            .map(|a| AnswerValue::Choice(a.id.clone())),
        QuestionType::Checkbox => Some(AnswerValue::Selection(
            question
                .answers
                .iter()
                .filter(|a| a.is_correct)
                .map(|a| a.id.clone())
                .collect(),
        )),
        QuestionType::ShortAnswer => question.correct_answer.clone().map(AnswerValue::Text),
        QuestionType::FillBlanks => Some(AnswerValue::Blanks(
            question
                .blanks
                .iter()
                .map(|b| (b.id.clone(), b.correct_answer.clone()))
                .collect(),
        )),
        QuestionType::Matching => Some(AnswerValue::Matching(
            question
                .matching_pairs
                .iter()
                .map(|p| (p.left.clone(), p.right.clone()))
                .collect(),
        )),
        QuestionType::Ordering => {
            let mut items: Vec<_> = question.ordering_items.iter().collect();
            // sort_by_key is stable, ties keep authoring order
            items.sort_by_key(|item| item.correct_order);
            Some(AnswerValue::Order(items.iter().map(|i| i.id.clone()).collect()))
        }
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

pub fn check_answer(question: &Question, answer: Option<&AnswerValue>) -> bool {
    let Some(answer) = answer else {
        return false;
    };
    let Some(correct) = correct_answer(question) else {
        return false;
    };

    match (question.q_type, &correct, answer) {
        (QuestionType::Ordering, AnswerValue::Order(expected), AnswerValue::Order(given)) => {
            expected == given
        }
        (
            QuestionType::Checkbox,
            AnswerValue::Selection(expected),
            AnswerValue::Selection(given),
        ) => expected.len() == given.len() && expected.iter().all(|id| given.contains(id)),
        (QuestionType::ShortAnswer, AnswerValue::Text(expected), AnswerValue::Text(given)) => {
            let given = normalize(given);
            normalize(expected) == given
                || question
                    .accepted_answers
                    .iter()
                    .any(|alt| normalize(alt) == given)
        }
        (QuestionType::FillBlanks, _, AnswerValue::Blanks(given)) => {
            check_blanks(question, given)
        }
        (
            QuestionType::Matching,
            AnswerValue::Matching(expected),
            AnswerValue::Matching(given),
        ) => {
            expected.len() == given.len()
                && expected
                    .iter()
                    .all(|(left, right)| given.get(left) == Some(right))
        }
        (
            QuestionType::Multiple | QuestionType::Boolean | QuestionType::Image,
            AnswerValue::Choice(expected),
            AnswerValue::Choice(given),
        ) => expected == given,
        _ => false,
    }
}

fn check_blanks(question: &Question, given: &BTreeMap<String, String>) -> bool {
    question.blanks.iter().all(|blank| {
        let Some(value) = given.get(&blank.id) else {
            return false;
        };
        let value = normalize(value);
        normalize(&blank.correct_answer) == value
            || blank
                .accepted_answers
                .iter()
                .any(|alt| normalize(alt) == value)
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSummary {
    pub correct: u32,
    pub total: u32,
    pub percentage: u32,
    pub earned_points: u32,
    pub total_points: u32,
}

pub fn score(questions: &[Question], answers: &AnswerMap) -> ScoreSummary {
    let mut correct = 0u32;
    let mut earned_points = 0u32;
    let mut total_points = 0u32;
    for question in questions {
        total_points += question.points;
        if check_answer(question, answers.get(&question.id)) {
            correct += 1;
            earned_points += question.points;
        }
    }
    let total = questions.len() as u32;
    let percentage = if total == 0 {
        0
    } else {
        (f64::from(correct) * 100.0 / f64::from(total)).round() as u32
    };
    ScoreSummary {
        correct,
        total,
        percentage,
        earned_points,
        total_points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::*;
    use crate::models::{Blank, MatchingPair};

    fn choice(s: &str) -> AnswerValue {
        AnswerValue::Choice(s.into())
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn single_choice_uses_first_flagged_answer() {
        let mut q = multiple("q1", "b");
        assert_eq!(correct_answer(&q), Some(choice("b")));
        assert!(check_answer(&q, Some(&choice("b"))));
        assert!(!check_answer(&q, Some(&choice("a"))));

        q.answers[2].is_correct = true;
        assert_eq!(correct_answer(&q), Some(choice("b")));

        for a in q.answers.iter_mut() {
            a.is_correct = false;
        }
        assert_eq!(correct_answer(&q), None);
        assert!(!check_answer(&q, Some(&choice("b"))));
    }

    #[test]
    fn missing_answer_is_wrong() {
        assert!(!check_answer(&multiple("q1", "a"), None));
    }

    #[test]
    fn ordering_requires_exact_sequence() {
        let q = ordering("q1", &[("A", 2), ("B", 1), ("C", 3)]);
        assert_eq!(correct_answer(&q), Some(AnswerValue::Order(ids(&["B", "A", "C"]))));
        assert!(check_answer(&q, Some(&AnswerValue::Order(ids(&["B", "A", "C"])))));
        assert!(!check_answer(&q, Some(&AnswerValue::Order(ids(&["A", "B", "C"])))));
        assert!(!check_answer(&q, Some(&AnswerValue::Order(ids(&["B", "A"])))));
    }

    #[test]
    fn ordering_ties_keep_authoring_order() {
        let q = ordering("q1", &[("X", 1), ("Y", 0), ("Z", 1)]);
        assert_eq!(correct_answer(&q), Some(AnswerValue::Order(ids(&["Y", "X", "Z"]))));
    }

    #[test]
    fn checkbox_is_set_equality() {
        let q = checkbox("q1", &["1", "3"]);
        assert!(check_answer(&q, Some(&AnswerValue::Selection(ids(&["3", "1"])))));
        assert!(!check_answer(&q, Some(&AnswerValue::Selection(ids(&["1"])))));
        assert!(!check_answer(&q, Some(&AnswerValue::Selection(ids(&["1", "2", "3"])))));
    }

    #[test]
    fn short_answer_normalizes_case_and_whitespace() {
        let q = short_answer("q1", "Paris", &["paris city"]);
        let text = |s: &str| AnswerValue::Text(s.into());
        assert!(check_answer(&q, Some(&text(" PARIS "))));
        assert!(check_answer(&q, Some(&text("paris "))));
        assert!(check_answer(&q, Some(&text("Paris City"))));
        assert!(!check_answer(&q, Some(&text("Rome"))));

        let mut keyless = q.clone();
        keyless.correct_answer = None;
        assert!(!check_answer(&keyless, Some(&text("paris city"))));
    }

    #[test]
    fn fill_blanks_needs_every_blank() {
        let mut q = Question::new("q1", QuestionType::FillBlanks, "___ and ___");
        q.blanks = vec![
            Blank {
                id: "b1".into(),
                correct_answer: "Salt".into(),
                accepted_answers: vec![],
            },
            Blank {
                id: "b2".into(),
                correct_answer: "pepper".into(),
                accepted_answers: vec!["Black Pepper".into()],
            },
        ];
        let given = |pairs: &[(&str, &str)]| AnswerValue::Blanks(map(pairs));
        assert!(check_answer(&q, Some(&given(&[("b1", " salt"), ("b2", "PEPPER")]))));
        assert!(check_answer(&q, Some(&given(&[("b1", "salt"), ("b2", "black pepper ")]))));
        assert!(!check_answer(&q, Some(&given(&[("b1", "salt")]))));
        assert!(!check_answer(&q, Some(&given(&[("b1", "salt"), ("b2", "sugar")]))));
        assert_eq!(
            correct_answer(&q),
            Some(AnswerValue::Blanks(map(&[("b1", "Salt"), ("b2", "pepper")])))
        );
    }

    #[test]
    fn matching_compares_every_pair() {
        let mut q = Question::new("q1", QuestionType::Matching, "Match capitals");
        q.matching_pairs = vec![
            MatchingPair {
                left: "France".into(),
                right: "Paris".into(),
            },
            MatchingPair {
                left: "Italy".into(),
                right: "Rome".into(),
            },
        ];
        let given = |pairs: &[(&str, &str)]| AnswerValue::Matching(map(pairs));
        assert!(check_answer(&q, Some(&given(&[("Italy", "Rome"), ("France", "Paris")]))));
        assert!(!check_answer(&q, Some(&given(&[("France", "Rome"), ("Italy", "Paris")]))));
        assert!(!check_answer(&q, Some(&given(&[("France", "Paris")]))));
        assert!(!check_answer(
            &q,
            Some(&given(&[("France", "Paris"), ("Italy", "Rome"), ("Spain", "Madrid")]))
        ));
    }

    #[test]
    fn wrong_shape_is_wrong() {
        let q = checkbox("q1", &["1"]);
        assert!(!check_answer(&q, Some(&choice("1"))));
    }

    #[test]
    fn score_counts_points_and_rounds() {
        let mut heavy = short_answer("q3", "Paris", &[]);
        heavy.points = 5;
        let questions = vec![multiple("q1", "a"), checkbox("q2", &["1"]), heavy];
        let mut answers = AnswerMap::new();
        answers.insert("q1".into(), choice("a"));
        answers.insert("q3".into(), AnswerValue::Text("paris".into()));
        let summary = score(&questions, &answers);
        assert_eq!(summary.correct, 2);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.percentage, 67);
        assert_eq!(summary.earned_points, 6);
        assert_eq!(summary.total_points, 7);
        assert_eq!(score(&[], &answers).percentage, 0);
    }
}
