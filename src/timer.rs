//! Countdown state machines for the two timing disciplines.
//!
//! Both timers are driven by explicit [`Countdown::tick`] calls, one per elapsed
//! second; scheduling those calls is the runtime's job. A countdown with no limit
//! stays [`TimerPhase::Idle`] forever and every tick is ignored.

use crate::models::QuizMeta;
use crate::settings::QuizSettings;
use serde::Serialize;

pub const RUNNING_OUT_SECS: u32 = 60;
pub const CRITICAL_SECS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TimerPhase {
    Idle,
    Running { remaining: u32 },
    Paused { remaining: u32 },
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Ignored,
    Ticked { remaining: u32 },
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Countdown {
    limit: Option<u32>,
    phase: TimerPhase,
}

impl Countdown {
    pub fn new(limit: Option<u32>) -> Self {
        Self {
            limit: limit.filter(|secs| *secs > 0),
            phase: TimerPhase::Idle,
        }
    }

    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    pub fn phase(&self) -> TimerPhase {
        self.phase
    }

    pub fn start(&mut self) {
        self.phase = match self.limit {
            Some(secs) => TimerPhase::Running { remaining: secs },
            None => TimerPhase::Idle,
        };
    }

    pub fn stop(&mut self) {
        self.phase = TimerPhase::Idle;
    }

    pub fn pause(&mut self) -> bool {
        match self.phase {
            TimerPhase::Running { remaining } => {
                self.phase = TimerPhase::Paused { remaining };
                true
            }
            _ => false,
        }
    }

    pub fn resume(&mut self) -> bool {
        match self.phase {
            TimerPhase::Paused { remaining } => {
                self.phase = TimerPhase::Running { remaining };
                true
            }
            _ => false,
        }
    }

    pub fn tick(&mut self) -> TickOutcome {
        match self.phase {
            TimerPhase::Running { remaining } if remaining <= 1 => {
                self.phase = TimerPhase::Expired;
                TickOutcome::Expired
            }
            TimerPhase::Running { remaining } => {
                self.phase = TimerPhase::Running {
                    remaining: remaining - 1,
                };
                TickOutcome::Ticked {
                    remaining: remaining - 1,
                }
            }
            _ => TickOutcome::Ignored,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.phase, TimerPhase::Running { .. })
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.phase, TimerPhase::Paused { .. })
    }

    pub fn is_expired(&self) -> bool {
        self.phase == TimerPhase::Expired
    }

    /// Seconds left, `None` when the countdown is unlimited or not armed.
    pub fn remaining(&self) -> Option<u32> {
        match self.phase {
            TimerPhase::Running { remaining } | TimerPhase::Paused { remaining } => {
                Some(remaining)
            }
            TimerPhase::Expired => Some(0),
            TimerPhase::Idle => None,
        }
    }

    pub fn view(&self) -> TimerView {
        TimerView::new(self.remaining(), self.limit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamTimer {
    countdown: Countdown,
}

impl ExamTimer {
    /// `examConfig.totalTime` wins, then the quiz duration, else unlimited.
    pub fn new(settings: &QuizSettings, meta: &QuizMeta) -> Self {
        let minutes = match settings.exam_config.total_time {
            0 => meta.duration_minutes,
            configured => configured,
        };
        Self {
            countdown: Countdown::new(Some(minutes.saturating_mul(60))),
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.countdown.limit().is_none()
    }

    pub fn countdown(&self) -> &Countdown {
        &self.countdown
    }

    pub fn countdown_mut(&mut self) -> &mut Countdown {
        &mut self.countdown
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PracticeTimer {
    countdown: Countdown,
}

impl PracticeTimer {
    pub fn new(settings: &QuizSettings) -> Self {
        Self {
            countdown: Countdown::new(Some(settings.practice_config.time_per_question)),
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.countdown.limit().is_none()
    }

    pub fn enter_question(&mut self) {
        self.countdown.start();
    }

    pub fn countdown(&self) -> &Countdown {
        &self.countdown
    }

    pub fn countdown_mut(&mut self) -> &mut Countdown {
        &mut self.countdown
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerView {
    pub remaining: Option<u32>,
    pub formatted: String,
    pub is_running_out: bool,
    pub is_critical: bool,
    pub percentage: f64,
}

impl TimerView {
    fn new(remaining: Option<u32>, limit: Option<u32>) -> Self {
        let formatted = match remaining {
            Some(secs) => format!("{:02}:{:02}", secs / 60, secs % 60),
            None => "--:--".to_string(),
        };
        let percentage = match (remaining, limit) {
            (Some(left), Some(total)) if total > 0 => f64::from(left) * 100.0 / f64::from(total),
            _ => 100.0,
        };
        Self {
            remaining,
            formatted,
            is_running_out: remaining.map(|s| s <= RUNNING_OUT_SECS).unwrap_or(false),
            is_critical: remaining.map(|s| s <= CRITICAL_SECS).unwrap_or(false),
            percentage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{default_settings, QuizMode};

    fn meta(duration_minutes: u32) -> QuizMeta {
        QuizMeta {
            id: "quiz-1".into(),
            duration_minutes,
            has_explanations: false,
        }
    }

    #[test]
    fn exam_timer_falls_back_to_quiz_duration() {
        let mut settings = default_settings(&meta(10));
        settings.exam_config.total_time = 0;
        let mut timer = ExamTimer::new(&settings, &meta(10));
        timer.countdown_mut().start();
        assert_eq!(timer.countdown().remaining(), Some(600));

        settings.exam_config.total_time = 2;
        let mut timer = ExamTimer::new(&settings, &meta(10));
        timer.countdown_mut().start();
        assert_eq!(timer.countdown().remaining(), Some(120));
    }

    #[test]
    fn unlimited_exam_never_expires() {
        let mut settings = default_settings(&meta(0));
        settings.exam_config.total_time = 0;
        let mut timer = ExamTimer::new(&settings, &meta(0));
        timer.countdown_mut().start();
        assert!(timer.is_unlimited());
        for _ in 0..100_000 {
            assert_eq!(timer.countdown_mut().tick(), TickOutcome::Ignored);
        }
        assert_eq!(timer.countdown().view().formatted, "--:--");
    }

    #[test]
    fn expires_exactly_once() {
        let mut c = Countdown::new(Some(3));
        c.start();
        assert_eq!(c.tick(), TickOutcome::Ticked { remaining: 2 });
        assert_eq!(c.tick(), TickOutcome::Ticked { remaining: 1 });
        assert_eq!(c.tick(), TickOutcome::Expired);
        assert_eq!(c.tick(), TickOutcome::Ignored);
        assert!(c.is_expired());
        assert!(!c.resume());
    }

    #[test]
    fn pause_keeps_remaining() {
        let mut c = Countdown::new(Some(5));
        assert_eq!(c.tick(), TickOutcome::Ignored);
        c.start();
        c.tick();
        assert!(c.pause());
        assert_eq!(c.tick(), TickOutcome::Ignored);
        assert_eq!(c.phase(), TimerPhase::Paused { remaining: 4 });
        assert!(c.resume());
        assert_eq!(c.tick(), TickOutcome::Ticked { remaining: 3 });
    }

    #[test]
    fn practice_timer_rearms_per_question() {
        let mut settings = default_settings(&meta(0));
        settings.mode = QuizMode::Practice;
        let mut timer = PracticeTimer::new(&settings);
        assert_eq!(timer.countdown().phase(), TimerPhase::Idle);
        timer.enter_question();
        for _ in 0..10 {
            timer.countdown_mut().tick();
        }
        assert_eq!(timer.countdown().remaining(), Some(20));
        timer.enter_question();
        assert_eq!(timer.countdown().remaining(), Some(30));

        settings.practice_config.time_per_question = 0;
        let mut disabled = PracticeTimer::new(&settings);
        disabled.enter_question();
        assert!(disabled.is_disabled());
        assert_eq!(disabled.countdown().phase(), TimerPhase::Idle);
    }

    #[test]
    fn view_formats_and_flags() {
        let mut c = Countdown::new(Some(100));
        c.start();
        let view = c.view();
        assert_eq!(view.formatted, "01:40");
        assert!(!view.is_running_out);
        for _ in 0..95 {
            c.tick();
        }
        let view = c.view();
        assert_eq!(view.formatted, "00:05");
        assert!(view.is_running_out);
        assert!(view.is_critical);
        assert!((view.percentage - 5.0).abs() < f64::EPSILON);
    }
}
