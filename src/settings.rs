//! Versioned quiz-taking preferences.
//!
//! A persisted blob is trusted only when its `version` equals [`SETTINGS_VERSION`];
//! anything else (missing, unparseable, older or newer) is replaced wholesale by
//! [`default_settings`]. There is no field-by-field migration.

use crate::models::{Question, QuizMeta};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const SETTINGS_VERSION: u32 = 2;
pub const DEFAULT_TIME_PER_QUESTION: u32 = 30;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QuizMode {
    Exam,
    Practice,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExamConfig {
    /// Minutes; 0 means "use the quiz duration".
    pub total_time: u32,
    pub allow_review: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PracticeConfig {
    /// Seconds; 0 disables the per-question timer.
    pub time_per_question: u32,
    pub instant_feedback: bool,
    pub show_explanation: bool,
    pub retry_on_wrong: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuizSettings {
    pub version: u32,
    pub mode: QuizMode,
    pub shuffle_questions: bool,
    pub shuffle_answers: bool,
    pub auto_advance: bool,
    pub auto_submit: bool,
    pub sound_effects: bool,
    pub exam_config: ExamConfig,
    pub practice_config: PracticeConfig,
}

// Mirror of the stored shape where every field may be absent. Presence, not
// truthiness, decides whether the stored value wins.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedSettings {
    mode: Option<QuizMode>,
    shuffle_questions: Option<bool>,
    shuffle_answers: Option<bool>,
    auto_advance: Option<bool>,
    auto_submit: Option<bool>,
    sound_effects: Option<bool>,
    exam_config: Option<PersistedExam>,
    practice_config: Option<PersistedPractice>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedExam {
    total_time: Option<u32>,
    allow_review: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedPractice {
    time_per_question: Option<u32>,
    instant_feedback: Option<bool>,
    show_explanation: Option<bool>,
    retry_on_wrong: Option<bool>,
}

pub fn default_settings(meta: &QuizMeta) -> QuizSettings {
    QuizSettings {
        version: SETTINGS_VERSION,
        mode: QuizMode::Exam,
        shuffle_questions: false,
        shuffle_answers: false,
        auto_advance: false,
        auto_submit: true,
        sound_effects: true,
        exam_config: ExamConfig {
            total_time: meta.duration_minutes,
            allow_review: true,
        },
        practice_config: PracticeConfig {
            time_per_question: DEFAULT_TIME_PER_QUESTION,
            instant_feedback: true,
            show_explanation: true,
            retry_on_wrong: false,
        },
    }
}

pub fn load(persisted: Option<&str>, meta: &QuizMeta) -> QuizSettings {
    let defaults = default_settings(meta);
    let Some(raw) = persisted else {
        debug!(quiz_id = %meta.id, "no stored settings, using defaults");
        return defaults;
    };

    let value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(err) => {
            warn!(quiz_id = %meta.id, "stored settings unreadable: {}", err);
            return defaults;
        }
    };

    let version = value.get("version").and_then(|v| v.as_u64());
    if version != Some(u64::from(SETTINGS_VERSION)) {
        warn!(
            quiz_id = %meta.id,
            "stored settings version {:?} != {}, resetting to defaults",
            version,
            SETTINGS_VERSION
        );
        return defaults;
    }

    match serde_json::from_value::<PersistedSettings>(value) {
        Ok(stored) => merge(defaults, stored),
        Err(err) => {
            warn!(quiz_id = %meta.id, "stored settings malformed: {}", err);
            defaults
        }
    }
}

fn merge(defaults: QuizSettings, stored: PersistedSettings) -> QuizSettings {
    let exam = stored.exam_config.unwrap_or_default();
    let practice = stored.practice_config.unwrap_or_default();
    QuizSettings {
        version: SETTINGS_VERSION,
        mode: stored.mode.unwrap_or(defaults.mode),
        shuffle_questions: stored.shuffle_questions.unwrap_or(defaults.shuffle_questions),
        shuffle_answers: stored.shuffle_answers.unwrap_or(defaults.shuffle_answers),
        auto_advance: stored.auto_advance.unwrap_or(defaults.auto_advance),
        auto_submit: stored.auto_submit.unwrap_or(defaults.auto_submit),
        sound_effects: stored.sound_effects.unwrap_or(defaults.sound_effects),
        exam_config: ExamConfig {
            total_time: exam.total_time.unwrap_or(defaults.exam_config.total_time),
            allow_review: exam.allow_review.unwrap_or(defaults.exam_config.allow_review),
        },
        practice_config: PracticeConfig {
            time_per_question: practice
                .time_per_question
                .unwrap_or(defaults.practice_config.time_per_question),
            instant_feedback: practice
                .instant_feedback
                .unwrap_or(defaults.practice_config.instant_feedback),
            show_explanation: practice
                .show_explanation
                .unwrap_or(defaults.practice_config.show_explanation),
            retry_on_wrong: practice
                .retry_on_wrong
                .unwrap_or(defaults.practice_config.retry_on_wrong),
        },
    }
}

pub fn to_persisted_json(settings: &QuizSettings) -> serde_json::Result<String> {
    let mut stamped = settings.clone();
    stamped.version = SETTINGS_VERSION;
    serde_json::to_string(&stamped)
}

impl QuizSettings {
    pub fn is_exam(&self) -> bool {
        self.mode == QuizMode::Exam
    }

    pub fn is_practice(&self) -> bool {
        self.mode == QuizMode::Practice
    }

    pub fn should_show_instant_feedback(&self) -> bool {
        self.is_practice() && self.practice_config.instant_feedback
    }

    pub fn can_retry_on_wrong(&self) -> bool {
        self.is_practice() && self.practice_config.retry_on_wrong
    }

    pub fn can_review_before_submit(&self) -> bool {
        self.is_exam() && self.exam_config.allow_review
    }

    /// Auto-advance is suppressed while instant feedback is on.
    pub fn should_auto_advance(&self) -> bool {
        if self.should_show_instant_feedback() {
            return false;
        }
        self.auto_advance
    }

    pub fn should_show_explanation(&self) -> bool {
        self.is_practice() && self.practice_config.show_explanation
    }

    /// Whole-attempt time budget in seconds, 0 when unlimited.
    pub fn calculate_total_time(&self, question_count: usize) -> u64 {
        match self.mode {
            QuizMode::Exam => u64::from(self.exam_config.total_time) * 60,
            QuizMode::Practice => {
                u64::from(self.practice_config.time_per_question) * question_count as u64
            }
        }
    }
}

pub fn shuffle_questions<R: Rng + ?Sized>(
    settings: &QuizSettings,
    questions: &mut [Question],
    rng: &mut R,
) {
    if settings.shuffle_questions {
        questions.shuffle(rng);
        debug!(count = questions.len(), "questions shuffled");
    }
}

pub fn shuffle_answers<R: Rng + ?Sized>(
    settings: &QuizSettings,
    question: &mut Question,
    rng: &mut R,
) {
    if settings.shuffle_answers {
        question.answers.shuffle(rng);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::multiple;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn meta() -> QuizMeta {
        QuizMeta {
            id: "quiz-1".into(),
            duration_minutes: 15,
            has_explanations: true,
        }
    }

    #[test]
    fn defaults_follow_quiz_meta() {
        let s = default_settings(&meta());
        assert_eq!(s.version, SETTINGS_VERSION);
        assert_eq!(s.exam_config.total_time, 15);
        assert_eq!(s.practice_config.time_per_question, 30);
    }

    #[test]
    fn missing_or_garbage_blob_yields_defaults() {
        assert_eq!(load(None, &meta()), default_settings(&meta()));
        assert_eq!(load(Some("{not json"), &meta()), default_settings(&meta()));
        assert_eq!(load(Some("42"), &meta()), default_settings(&meta()));
        let wrong_types = format!(r#"{{"version": {SETTINGS_VERSION}, "mode": 7}}"#);
        assert_eq!(load(Some(&wrong_types), &meta()), default_settings(&meta()));
    }

    #[test]
    fn version_mismatch_resets_everything() {
        for version in ["1", "3", "\"2\"", "null"] {
            let raw = format!(
                r#"{{"version": {version}, "mode": "practice", "autoAdvance": true,
                    "practiceConfig": {{"timePerQuestion": 5}}}}"#
            );
            let loaded = load(Some(&raw), &meta());
            assert_eq!(loaded, default_settings(&meta()), "version {version}");
        }
        let unversioned = r#"{"mode": "practice"}"#;
        assert_eq!(load(Some(unversioned), &meta()), default_settings(&meta()));
    }

    #[test]
    fn matching_version_merges_fields() {
        let raw = format!(
            r#"{{"version": {SETTINGS_VERSION}, "mode": "practice",
                "examConfig": {{"totalTime": 0}},
                "practiceConfig": {{"timePerQuestion": 0, "instantFeedback": false}}}}"#
        );
        let loaded = load(Some(&raw), &meta());
        let defaults = default_settings(&meta());
        assert_eq!(loaded.mode, QuizMode::Practice);
        assert_eq!(loaded.exam_config.total_time, 0);
        assert_eq!(loaded.exam_config.allow_review, defaults.exam_config.allow_review);
        assert_eq!(loaded.practice_config.time_per_question, 0);
        assert!(!loaded.practice_config.instant_feedback);
        assert_eq!(
            loaded.practice_config.retry_on_wrong,
            defaults.practice_config.retry_on_wrong
        );
        assert_eq!(loaded.sound_effects, defaults.sound_effects);
    }

    #[test]
    fn persisted_json_round_trips_through_load() {
        let mut s = default_settings(&meta());
        s.mode = QuizMode::Practice;
        s.practice_config.retry_on_wrong = true;
        s.version = 0;
        let raw = to_persisted_json(&s).unwrap();
        let loaded = load(Some(&raw), &meta());
        assert!(loaded.can_retry_on_wrong());
        assert_eq!(loaded.version, SETTINGS_VERSION);
    }

    #[test]
    fn derived_queries() {
        let mut s = default_settings(&meta());
        s.auto_advance = true;
        assert!(s.should_auto_advance());
        assert!(s.can_review_before_submit());
        assert!(!s.should_show_explanation());
        assert_eq!(s.calculate_total_time(4), 900);

        s.mode = QuizMode::Practice;
        assert!(s.should_show_instant_feedback());
        assert!(!s.should_auto_advance());
        assert_eq!(s.calculate_total_time(4), 120);
        s.practice_config.time_per_question = 0;
        assert_eq!(s.calculate_total_time(4), 0);
    }

    #[test]
    fn shuffle_is_opt_in() {
        let mut s = default_settings(&meta());
        let original: Vec<_> = (0..20).map(|i| multiple(&format!("q{i}"), "a")).collect();
        let mut rng = StdRng::seed_from_u64(7);

        let mut untouched = original.clone();
        shuffle_questions(&s, &mut untouched, &mut rng);
        assert_eq!(untouched, original);

        s.shuffle_questions = true;
        let mut shuffled = original.clone();
        shuffle_questions(&s, &mut shuffled, &mut rng);
        assert_eq!(shuffled.len(), original.len());
        assert_ne!(shuffled, original);
        let mut ids: Vec<_> = shuffled.iter().map(|q| q.id.clone()).collect();
        ids.sort();
        let mut expected: Vec<_> = original.iter().map(|q| q.id.clone()).collect();
        expected.sort();
        assert_eq!(ids, expected);
    }
}
