pub mod config;
pub mod error;
pub mod evaluator;
pub mod events;
pub mod feedback;
pub mod models;
pub mod navigation;
pub mod runtime;
pub mod session;
pub mod settings;
pub mod timer;

use crate::error::EngineError;
use crate::models::{validate_quiz, Quiz};
use crate::session::SessionController;

pub fn open_session(
    quiz: Quiz,
    persisted_settings: Option<&str>,
) -> Result<SessionController, EngineError> {
    let settings = settings::load(persisted_settings, &quiz.meta());
    SessionController::new(quiz, settings)
}

/// Like [`open_session`], but rejects content problems up front with
/// [`EngineError::InvalidQuiz`].
pub fn open_validated_session(
    quiz: Quiz,
    persisted_settings: Option<&str>,
) -> Result<SessionController, EngineError> {
    if quiz.questions.is_empty() {
        return Err(EngineError::NotReady);
    }
    validate_quiz(&quiz).map_err(EngineError::InvalidQuiz)?;
    open_session(quiz, persisted_settings)
}
