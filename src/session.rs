use crate::error::EngineError;
use crate::evaluator::{score, ScoreSummary};
use crate::events::{SessionEvent, TimerScope};
use crate::feedback::FeedbackTracker;
use crate::models::{AnswerMap, AnswerValue, Question, Quiz, QuizMeta};
use crate::settings::{shuffle_answers, shuffle_questions, QuizMode, QuizSettings};
use crate::timer::{Countdown, ExamTimer, PracticeTimer, TickOutcome, TimerPhase, TimerView};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttemptResult {
    pub attempt_id: Uuid,
    pub quiz_id: String,
    pub answers: AnswerMap,
    pub score: ScoreSummary,
    pub time_spent_seconds: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerUpdate {
    Stored,
    Locked,
    Ignored,
}

#[derive(Debug, Clone)]
enum ActiveTimer {
    Exam(ExamTimer),
    Practice(PracticeTimer),
}

impl ActiveTimer {
    fn for_settings(settings: &QuizSettings, meta: &QuizMeta) -> Self {
        match settings.mode {
            QuizMode::Exam => ActiveTimer::Exam(ExamTimer::new(settings, meta)),
            QuizMode::Practice => ActiveTimer::Practice(PracticeTimer::new(settings)),
        }
    }

    fn countdown(&self) -> &Countdown {
        match self {
            ActiveTimer::Exam(t) => t.countdown(),
            ActiveTimer::Practice(t) => t.countdown(),
        }
    }

    fn countdown_mut(&mut self) -> &mut Countdown {
        match self {
            ActiveTimer::Exam(t) => t.countdown_mut(),
            ActiveTimer::Practice(t) => t.countdown_mut(),
        }
    }

    fn scope(&self) -> TimerScope {
        match self {
            ActiveTimer::Exam(_) => TimerScope::Exam,
            ActiveTimer::Practice(_) => TimerScope::Question,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionController {
    attempt_id: Uuid,
    meta: QuizMeta,
    settings: QuizSettings,
    questions: Vec<Question>,
    current_index: usize,
    answers: AnswerMap,
    is_completed: bool,
    started_at: DateTime<Utc>,
    result: Option<AttemptResult>,
    timer: ActiveTimer,
    feedback: FeedbackTracker,
    pending_auto_advance: bool,
    advance_epoch: u64,
    timing_epoch: u64,
    outbox: Vec<SessionEvent>,
}

impl SessionController {
    pub fn new(quiz: Quiz, settings: QuizSettings) -> Result<Self, EngineError> {
        Self::with_rng(quiz, settings, &mut rand::thread_rng())
    }

    pub fn with_rng<R: Rng + ?Sized>(
        quiz: Quiz,
        settings: QuizSettings,
        rng: &mut R,
    ) -> Result<Self, EngineError> {
        if quiz.questions.is_empty() {
            return Err(EngineError::NotReady);
        }
        let meta = quiz.meta();
        let mut questions = quiz.questions;
        shuffle_questions(&settings, &mut questions, rng);
        for question in questions.iter_mut() {
            shuffle_answers(&settings, question, rng);
        }

        let mut timer = ActiveTimer::for_settings(&settings, &meta);
        match &mut timer {
            ActiveTimer::Exam(t) => t.countdown_mut().start(),
            ActiveTimer::Practice(t) => t.enter_question(),
        }
        let feedback = FeedbackTracker::new(&settings);
        let attempt_id = Uuid::new_v4();
        info!(
            %attempt_id,
            quiz_id = %meta.id,
            mode = ?settings.mode,
            questions = questions.len(),
            "quiz session started"
        );

        Ok(Self {
            attempt_id,
            meta,
            settings,
            questions,
            current_index: 0,
            answers: AnswerMap::new(),
            is_completed: false,
            started_at: Utc::now(),
            result: None,
            timer,
            feedback,
            pending_auto_advance: false,
            advance_epoch: 0,
            timing_epoch: 0,
            outbox: Vec::new(),
        })
    }

    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    pub fn settings(&self) -> &QuizSettings {
        &self.settings
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_question(&self) -> &Question {
        &self.questions[self.current_index]
    }

    pub fn answers(&self) -> &AnswerMap {
        &self.answers
    }

    pub fn answer(&self, question_id: &str) -> Option<&AnswerValue> {
        self.answers.get(question_id)
    }

    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    pub fn result(&self) -> Option<&AttemptResult> {
        self.result.as_ref()
    }

    pub fn feedback(&self) -> &FeedbackTracker {
        &self.feedback
    }

    pub fn timer_scope(&self) -> TimerScope {
        self.timer.scope()
    }

    pub fn timer_phase(&self) -> TimerPhase {
        self.timer.countdown().phase()
    }

    pub fn timer_view(&self) -> TimerView {
        self.timer.countdown().view()
    }

    pub fn progress(&self) -> f64 {
        (self.current_index + 1) as f64 * 100.0 / self.questions.len() as f64
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    fn position(&self, question_id: &str) -> Result<usize, EngineError> {
        self.questions
            .iter()
            .position(|q| q.id == question_id)
            .ok_or_else(|| EngineError::UnknownQuestion(question_id.to_string()))
    }

    fn bump_timing(&mut self) {
        self.timing_epoch += 1;
    }

    /// Changes whenever what is being timed changes; the runtime reschedules
    /// its tick task on every change.
    pub fn timing_epoch(&self) -> u64 {
        self.timing_epoch
    }

    pub fn advance_epoch(&self) -> u64 {
        self.advance_epoch
    }

    fn request_auto_advance(&mut self) {
        self.pending_auto_advance = true;
        self.advance_epoch += 1;
    }

    fn cancel_auto_advance(&mut self) {
        self.pending_auto_advance = false;
        self.advance_epoch += 1;
    }

    pub fn needs_ticks(&self) -> bool {
        !self.is_completed && self.timer.countdown().is_running()
    }

    pub fn update_answer(
        &mut self,
        question_id: &str,
        value: Option<AnswerValue>,
    ) -> Result<AnswerUpdate, EngineError> {
        let idx = self.position(question_id)?;
        if self.is_completed {
            return Ok(AnswerUpdate::Ignored);
        }
        let q_type = self.questions[idx].q_type;
        if let Some(v) = &value {
            if !q_type.accepts(v) {
                return Err(EngineError::AnswerShape {
                    question_id: question_id.to_string(),
                    expected: q_type.expected_shape(),
                });
            }
        }
        if self.feedback.is_locked(question_id) {
            debug!(question_id, "answer locked by feedback");
            return Ok(AnswerUpdate::Locked);
        }

        match &value {
            Some(v) => {
                self.answers.insert(question_id.to_string(), v.clone());
            }
            None => {
                self.answers.remove(question_id);
            }
        }
        self.outbox.push(SessionEvent::AnswerChanged {
            question_id: question_id.to_string(),
            answer: value.clone(),
        });

        if value.is_some() && q_type.is_simple() {
            if self.feedback.is_enabled() {
                self.grade(idx);
            } else if self.settings.should_auto_advance() {
                self.request_auto_advance();
            }
        }
        Ok(AnswerUpdate::Stored)
    }

    pub fn check_answer(&mut self, question_id: &str) -> Result<Option<bool>, EngineError> {
        let idx = self.position(question_id)?;
        if self.is_completed || !self.feedback.is_enabled() {
            return Ok(None);
        }
        Ok(self.grade(idx))
    }

    fn grade(&mut self, idx: usize) -> Option<bool> {
        let question = &self.questions[idx];
        let verdict = self
            .feedback
            .record(question, self.answers.get(&question.id))?;
        let question_id = question.id.clone();
        self.outbox.push(SessionEvent::FeedbackChanged {
            question_id,
            is_correct: Some(verdict),
        });
        if idx == self.current_index {
            self.pause_practice_timer();
        }
        Some(verdict)
    }

    fn pause_practice_timer(&mut self) {
        if let ActiveTimer::Practice(t) = &mut self.timer {
            if t.countdown_mut().pause() {
                self.bump_timing();
            }
        }
    }

    pub fn retry(&mut self, question_id: &str) -> Result<bool, EngineError> {
        let idx = self.position(question_id)?;
        if self.is_completed || !self.feedback.clear_for_retry(question_id) {
            return Ok(false);
        }
        self.answers.remove(question_id);
        self.cancel_auto_advance();
        self.outbox.push(SessionEvent::FeedbackChanged {
            question_id: question_id.to_string(),
            is_correct: None,
        });
        self.outbox.push(SessionEvent::AnswerChanged {
            question_id: question_id.to_string(),
            answer: None,
        });
        if idx == self.current_index {
            if let ActiveTimer::Practice(t) = &mut self.timer {
                t.enter_question();
                self.bump_timing();
            }
        }
        debug!(question_id, "question reset for retry");
        Ok(true)
    }

    pub fn tick(&mut self) -> TickOutcome {
        if self.is_completed {
            return TickOutcome::Ignored;
        }
        let scope = self.timer.scope();
        let outcome = self.timer.countdown_mut().tick();
        match outcome {
            TickOutcome::Ignored => {}
            TickOutcome::Ticked { remaining } => {
                self.outbox.push(SessionEvent::TimerTick { scope, remaining });
            }
            TickOutcome::Expired => {
                self.outbox.push(SessionEvent::TimerTick {
                    scope,
                    remaining: 0,
                });
                self.bump_timing();
                match scope {
                    TimerScope::Exam => {
                        info!(attempt_id = %self.attempt_id, "exam time expired");
                        self.outbox.push(SessionEvent::TimeExpired {
                            scope,
                            question_id: None,
                        });
                        self.complete_quiz();
                    }
                    TimerScope::Question => self.expire_current_question(),
                }
            }
        }
        outcome
    }

    fn expire_current_question(&mut self) {
        let question = &self.questions[self.current_index];
        let question_id = question.id.clone();
        info!(attempt_id = %self.attempt_id, %question_id, "question time expired");
        let forced = self.feedback.force_incorrect(question);
        self.outbox.push(SessionEvent::TimeExpired {
            scope: TimerScope::Question,
            question_id: Some(question_id.clone()),
        });
        if forced {
            self.outbox.push(SessionEvent::FeedbackChanged {
                question_id,
                is_correct: Some(false),
            });
        }
        if self.settings.auto_advance {
            self.request_auto_advance();
        }
    }

    pub fn pause(&mut self) -> bool {
        if self.is_completed || !self.timer.countdown_mut().pause() {
            return false;
        }
        self.bump_timing();
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.is_completed || !self.timer.countdown_mut().resume() {
            return false;
        }
        self.bump_timing();
        true
    }

    pub fn set_current_question(&mut self, index: usize) -> bool {
        if index >= self.questions.len() || index == self.current_index {
            return false;
        }
        self.current_index = index;
        self.cancel_auto_advance();
        // the exam clock keeps running across questions
        if !self.is_completed && self.arm_practice_timer() {
            self.bump_timing();
        }
        self.outbox.push(SessionEvent::QuestionChanged { index });
        true
    }

    fn arm_practice_timer(&mut self) -> bool {
        let ActiveTimer::Practice(t) = &mut self.timer else {
            return false;
        };
        t.enter_question();
        if self.feedback.is_locked(&self.questions[self.current_index].id) {
            t.countdown_mut().pause();
        }
        true
    }

    /// Applies settings changed mid-attempt. Feedback locks survive while
    /// instant feedback stays on; the timer is rebuilt only when the mode,
    /// the time limit or the feedback discipline changed.
    pub fn reload_settings(&mut self, settings: QuizSettings) {
        if self.is_completed {
            self.settings = settings;
            return;
        }
        let rearm = timer_changed(&self.settings, &settings);
        self.feedback.reconfigure(&settings);
        if rearm || !settings.auto_advance {
            self.cancel_auto_advance();
        }
        self.settings = settings;
        if rearm {
            self.timer = ActiveTimer::for_settings(&self.settings, &self.meta);
            if let ActiveTimer::Exam(t) = &mut self.timer {
                t.countdown_mut().start();
            }
            self.arm_practice_timer();
            self.bump_timing();
        }
        info!(
            attempt_id = %self.attempt_id,
            mode = ?self.settings.mode,
            timer_rebuilt = rearm,
            "settings reloaded"
        );
    }

    /// Stops the clock for good when the learner leaves the attempt.
    pub fn halt_timer(&mut self) -> bool {
        self.cancel_auto_advance();
        if self.timer.countdown_mut().pause() {
            self.bump_timing();
            return true;
        }
        debug!(
            attempt_id = %self.attempt_id,
            phase = ?self.timer_phase(),
            "clock already stopped"
        );
        false
    }

    pub fn complete_quiz(&mut self) -> bool {
        if self.is_completed {
            return false;
        }
        self.is_completed = true;
        self.cancel_auto_advance();
        self.bump_timing();

        let completed_at = Utc::now();
        let time_spent_seconds = (completed_at - self.started_at).num_seconds().max(0) as u64;
        let result = AttemptResult {
            attempt_id: self.attempt_id,
            quiz_id: self.meta.id.clone(),
            answers: self.answers.clone(),
            score: score(&self.questions, &self.answers),
            time_spent_seconds,
            started_at: self.started_at,
            completed_at,
        };
        info!(
            attempt_id = %self.attempt_id,
            correct = result.score.correct,
            total = result.score.total,
            time_spent_seconds,
            "quiz completed"
        );
        self.outbox.push(SessionEvent::Completed {
            result: result.clone(),
        });
        self.result = Some(result);
        true
    }

    fn is_answered(&self, question: &Question) -> bool {
        self.answers
            .get(&question.id)
            .map(|a| !a.is_empty())
            .unwrap_or(false)
    }

    pub fn get_unanswered_questions(&self) -> Vec<&Question> {
        self.questions
            .iter()
            .filter(|q| !self.is_answered(q))
            .collect()
    }

    pub fn get_answered_questions(&self) -> Vec<&Question> {
        self.questions
            .iter()
            .filter(|q| self.is_answered(q))
            .collect()
    }

    pub fn take_auto_advance(&mut self) -> bool {
        std::mem::take(&mut self.pending_auto_advance)
    }

    pub fn has_pending_auto_advance(&self) -> bool {
        self.pending_auto_advance
    }

    pub(crate) fn push_event(&mut self, event: SessionEvent) {
        self.outbox.push(event);
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.outbox)
    }
}

fn timer_changed(old: &QuizSettings, new: &QuizSettings) -> bool {
    if old.mode != new.mode
        || old.should_show_instant_feedback() != new.should_show_instant_feedback()
    {
        return true;
    }
    match new.mode {
        QuizMode::Exam => old.exam_config.total_time != new.exam_config.total_time,
        QuizMode::Practice => {
            old.practice_config.time_per_question != new.practice_config.time_per_question
        }
    }
}
