use crate::events::SessionEvent;
use crate::session::SessionController;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "gate", rename_all = "snake_case")]
pub enum ConfirmGate {
    Submit,
    SubmitWithUnanswered { unanswered: Vec<String> },
    Exit,
}

#[derive(Debug, Clone)]
pub struct NavigationController {
    session: SessionController,
    gate: Option<ConfirmGate>,
    exited: bool,
}

impl NavigationController {
    pub fn new(session: SessionController) -> Self {
        Self {
            session,
            gate: None,
            exited: false,
        }
    }

    pub fn session(&self) -> &SessionController {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionController {
        &mut self.session
    }

    pub fn into_session(self) -> SessionController {
        self.session
    }

    pub fn gate(&self) -> Option<&ConfirmGate> {
        self.gate.as_ref()
    }

    pub fn is_exited(&self) -> bool {
        self.exited
    }

    pub fn is_first_question(&self) -> bool {
        self.session.current_index() == 0
    }

    pub fn is_last_question(&self) -> bool {
        self.session.current_index() + 1 == self.session.len()
    }

    pub fn go_to_next(&mut self) -> bool {
        if self.exited || self.is_last_question() {
            return false;
        }
        let next = self.session.current_index() + 1;
        self.session.set_current_question(next)
    }

    pub fn go_to_previous(&mut self) -> bool {
        if self.exited {
            return false;
        }
        match self.session.current_index().checked_sub(1) {
            Some(prev) => self.session.set_current_question(prev),
            None => false,
        }
    }

    pub fn go_to_question(&mut self, index: usize) -> bool {
        if self.exited {
            return false;
        }
        self.session.set_current_question(index)
    }

    pub fn apply_auto_advance(&mut self) -> bool {
        if !self.session.take_auto_advance() {
            return false;
        }
        self.go_to_next()
    }

    pub fn handle_submit_quiz(&mut self) -> Option<&ConfirmGate> {
        if self.exited || self.session.is_completed() {
            return None;
        }
        let unanswered: Vec<String> = self
            .session
            .get_unanswered_questions()
            .iter()
            .map(|q| q.id.clone())
            .collect();
        self.session.push_event(SessionEvent::SubmitRequested {
            has_unanswered: !unanswered.is_empty(),
            unanswered: unanswered.clone(),
        });
        self.gate = Some(if unanswered.is_empty() {
            ConfirmGate::Submit
        } else {
            ConfirmGate::SubmitWithUnanswered { unanswered }
        });
        self.gate.as_ref()
    }

    pub fn confirm_submit(&mut self) -> bool {
        match self.gate {
            Some(ConfirmGate::Submit) | Some(ConfirmGate::SubmitWithUnanswered { .. }) => {
                self.gate = None;
                self.session.complete_quiz()
            }
            _ => false,
        }
    }

    pub fn handle_exit_quiz(&mut self) -> bool {
        if self.exited {
            return false;
        }
        self.session.push_event(SessionEvent::ExitRequested);
        self.gate = Some(ConfirmGate::Exit);
        true
    }

    /// Leaves the attempt. The clock stops; nothing is graded or completed.
    pub fn confirm_exit(&mut self) -> bool {
        if self.gate != Some(ConfirmGate::Exit) {
            return false;
        }
        self.gate = None;
        self.exited = true;
        self.session.halt_timer();
        info!(attempt_id = %self.session.attempt_id(), "quiz exited without submitting");
        true
    }

    pub fn cancel_gate(&mut self) {
        self.gate = None;
    }
}
