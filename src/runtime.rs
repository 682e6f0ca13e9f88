//! Tokio driver for a session.
//!
//! The whole attempt lives on one task; hosts talk to it through
//! [`SessionHandle`]. The once-per-second tick is a separate repeating task that
//! is aborted and respawned whenever the session reports a new timing epoch,
//! and every tick carries the generation it was spawned with so a late tick from
//! a cancelled task is dropped.

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::events::EventSink;
use crate::models::{AnswerMap, AnswerValue};
use crate::navigation::{ConfirmGate, NavigationController};
use crate::session::SessionController;
use crate::settings::QuizSettings;
use crate::timer::{TimerPhase, TimerView};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "command",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum Command {
    Answer {
        question_id: String,
        value: Option<AnswerValue>,
    },
    Check {
        question_id: String,
    },
    Retry {
        question_id: String,
    },
    Next,
    Previous,
    GoTo {
        index: usize,
    },
    Submit,
    ConfirmSubmit,
    CancelGate,
    Exit,
    ConfirmExit,
    Pause,
    Resume,
    ReloadSettings {
        settings: QuizSettings,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub current_index: usize,
    pub answers: AnswerMap,
    pub is_completed: bool,
    pub is_exited: bool,
    pub timer_phase: TimerPhase,
    pub timer: TimerView,
    pub gate: Option<ConfirmGate>,
    pub unanswered: Vec<String>,
    pub progress: f64,
}

impl SessionSnapshot {
    fn capture(nav: &NavigationController) -> Self {
        let session = nav.session();
        Self {
            current_index: session.current_index(),
            answers: session.answers().clone(),
            is_completed: session.is_completed(),
            is_exited: nav.is_exited(),
            timer_phase: session.timer_phase(),
            timer: session.timer_view(),
            gate: nav.gate().cloned(),
            unanswered: session
                .get_unanswered_questions()
                .iter()
                .map(|q| q.id.clone())
                .collect(),
            progress: session.progress(),
        }
    }
}

enum Request {
    Command(Command),
    Snapshot(oneshot::Sender<SessionSnapshot>),
    Shutdown,
}

enum Internal {
    Tick { generation: u64 },
    AutoAdvance { generation: u64 },
}

/// Owns the repeating tick task and the delayed auto-advance task. Each is
/// cancelled when its epoch in the session moves on.
struct TickScheduler {
    period: Duration,
    advance_delay: Duration,
    tx: mpsc::UnboundedSender<Internal>,
    ticker: Option<JoinHandle<()>>,
    advance: Option<JoinHandle<()>>,
    generation: u64,
    advance_generation: u64,
    epoch: Option<u64>,
    advance_epoch: Option<u64>,
}

impl TickScheduler {
    fn new(config: &EngineConfig, tx: mpsc::UnboundedSender<Internal>) -> Self {
        Self {
            period: config.tick_period,
            advance_delay: config.auto_advance_delay,
            tx,
            ticker: None,
            advance: None,
            generation: 0,
            advance_generation: 0,
            epoch: None,
            advance_epoch: None,
        }
    }

    fn cancel_ticker(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
        self.generation += 1;
    }

    fn cancel_advance(&mut self) {
        if let Some(handle) = self.advance.take() {
            handle.abort();
        }
        self.advance_generation += 1;
    }

    fn cancel(&mut self) {
        self.cancel_ticker();
        self.cancel_advance();
    }

    fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }

    fn is_current_advance(&self, generation: u64) -> bool {
        generation == self.advance_generation
    }

    fn sync(&mut self, nav: &NavigationController) {
        let session = nav.session();
        let exited = nav.is_exited();
        let epoch = session.timing_epoch();
        if self.epoch != Some(epoch) || exited {
            self.epoch = Some(epoch);
            self.cancel_ticker();
            if session.needs_ticks() && !exited {
                self.spawn_ticker();
            }
        }
        let advance_epoch = session.advance_epoch();
        if self.advance_epoch != Some(advance_epoch) || exited {
            self.advance_epoch = Some(advance_epoch);
            self.cancel_advance();
        }
        if session.has_pending_auto_advance() && self.advance.is_none() && !exited {
            self.spawn_advance();
        }
    }

    fn spawn_ticker(&mut self) {
        let tx = self.tx.clone();
        let period = self.period;
        let generation = self.generation;
        self.ticker = Some(tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if tx.send(Internal::Tick { generation }).is_err() {
                    break;
                }
            }
        }));
    }

    fn spawn_advance(&mut self) {
        let tx = self.tx.clone();
        let delay = self.advance_delay;
        let generation = self.advance_generation;
        self.advance = Some(tokio::spawn(async move {
            sleep(delay).await;
            if tx.send(Internal::AutoAdvance { generation }).is_err() {
                debug!(generation, "auto-advance dropped, driver gone");
            }
        }));
    }
}

impl Drop for TickScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn apply(nav: &mut NavigationController, command: Command) {
    if nav.is_exited() {
        debug!(?command, "command ignored after exit");
        return;
    }
    let result = match command {
        Command::Answer { question_id, value } => nav
            .session_mut()
            .update_answer(&question_id, value)
            .map(|_| ()),
        Command::Check { question_id } => {
            nav.session_mut().check_answer(&question_id).map(|_| ())
        }
        Command::Retry { question_id } => nav.session_mut().retry(&question_id).map(|_| ()),
        Command::Next => {
            nav.go_to_next();
            Ok(())
        }
        Command::Previous => {
            nav.go_to_previous();
            Ok(())
        }
        Command::GoTo { index } => {
            nav.go_to_question(index);
            Ok(())
        }
        Command::Submit => {
            nav.handle_submit_quiz();
            Ok(())
        }
        Command::ConfirmSubmit => {
            nav.confirm_submit();
            Ok(())
        }
        Command::CancelGate => {
            nav.cancel_gate();
            Ok(())
        }
        Command::Exit => {
            nav.handle_exit_quiz();
            Ok(())
        }
        Command::ConfirmExit => {
            nav.confirm_exit();
            Ok(())
        }
        Command::Pause => {
            nav.session_mut().pause();
            Ok(())
        }
        Command::Resume => {
            nav.session_mut().resume();
            Ok(())
        }
        Command::ReloadSettings { settings } => {
            nav.session_mut().reload_settings(settings);
            Ok(())
        }
    };
    if let Err(err) = result {
        warn!(code = err.code(), "command rejected: {}", err);
    }
}

fn flush(nav: &mut NavigationController, sink: &dyn EventSink) {
    for event in nav.session_mut().drain_events() {
        sink.emit(&event);
    }
}

async fn drive(
    mut nav: NavigationController,
    sink: Arc<dyn EventSink>,
    config: EngineConfig,
    mut requests: mpsc::Receiver<Request>,
) -> NavigationController {
    let (internal_tx, mut internal_rx) = mpsc::unbounded_channel();
    let mut scheduler = TickScheduler::new(&config, internal_tx);
    flush(&mut nav, sink.as_ref());
    scheduler.sync(&nav);

    loop {
        tokio::select! {
            request = requests.recv() => match request {
                Some(Request::Command(command)) => apply(&mut nav, command),
                Some(Request::Snapshot(reply)) => {
                    let _ = reply.send(SessionSnapshot::capture(&nav));
                    continue;
                }
                Some(Request::Shutdown) | None => break,
            },
            Some(internal) = internal_rx.recv() => match internal {
                Internal::Tick { generation } => {
                    if !scheduler.is_current(generation) {
                        debug!(generation, "stale tick dropped");
                        continue;
                    }
                    nav.session_mut().tick();
                }
                Internal::AutoAdvance { generation } => {
                    if !scheduler.is_current_advance(generation) {
                        debug!(generation, "stale auto-advance dropped");
                        continue;
                    }
                    scheduler.advance = None;
                    nav.apply_auto_advance();
                }
            },
        }
        flush(&mut nav, sink.as_ref());
        scheduler.sync(&nav);
    }

    scheduler.cancel();
    nav
}

pub struct SessionHandle {
    tx: mpsc::Sender<Request>,
    task: JoinHandle<NavigationController>,
}

impl SessionHandle {
    pub fn spawn(
        session: SessionController,
        sink: Arc<dyn EventSink>,
        config: EngineConfig,
    ) -> Self {
        let (tx, rx) = mpsc::channel(64);
        let nav = NavigationController::new(session);
        let task = tokio::spawn(drive(nav, sink, config, rx));
        Self { tx, task }
    }

    pub async fn send(&self, command: Command) -> Result<(), EngineError> {
        self.tx
            .send(Request::Command(command))
            .await
            .map_err(|_| EngineError::Runtime("command channel closed".into()))
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request::Snapshot(reply))
            .await
            .map_err(|_| EngineError::Runtime("command channel closed".into()))?;
        rx.await
            .map_err(|_| EngineError::Runtime("snapshot dropped".into()))
    }

    pub async fn shutdown(self) -> Result<NavigationController, EngineError> {
        let _ = self.tx.send(Request::Shutdown).await;
        self.task
            .await
            .map_err(|err| EngineError::Runtime(err.to_string()))
    }
}
