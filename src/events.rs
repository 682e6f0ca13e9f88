use crate::models::AnswerValue;
use crate::session::AttemptResult;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimerScope {
    Exam,
    Question,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "event",
    content = "payload",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum SessionEvent {
    AnswerChanged {
        question_id: String,
        answer: Option<AnswerValue>,
    },
    FeedbackChanged {
        question_id: String,
        is_correct: Option<bool>,
    },
    TimerTick {
        scope: TimerScope,
        remaining: u32,
    },
    TimeExpired {
        scope: TimerScope,
        question_id: Option<String>,
    },
    QuestionChanged {
        index: usize,
    },
    SubmitRequested {
        has_unanswered: bool,
        unanswered: Vec<String>,
    },
    ExitRequested,
    Completed {
        result: AttemptResult,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event: String,
    pub payload: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
}

impl EventEnvelope {
    pub fn wrap(event: &SessionEvent) -> serde_json::Result<Self> {
        let mut value = serde_json::to_value(event)?;
        let name = value
            .get("event")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let payload = value
            .get_mut("payload")
            .map(Value::take)
            .unwrap_or(Value::Null);
        Ok(Self {
            event: name,
            payload,
            ts: Some(Utc::now().to_rfc3339()),
        })
    }
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: &SessionEvent);
}

#[derive(Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<EventEnvelope>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }
}

impl EventSink for BroadcastSink {
    fn emit(&self, event: &SessionEvent) {
        match EventEnvelope::wrap(event) {
            // no subscribers is fine
            Ok(envelope) => {
                let _ = self.tx.send(envelope);
            }
            Err(err) => tracing::warn!("failed to encode session event: {}", err),
        }
    }
}
