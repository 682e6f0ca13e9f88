use anyhow::Context;
use quiz_engine::config::EngineConfig;
use quiz_engine::error::EngineError;
use quiz_engine::events::BroadcastSink;
use quiz_engine::models::Quiz;
use quiz_engine::open_validated_session;
use quiz_engine::runtime::{Command, SessionHandle};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let mut args = std::env::args().skip(1);
    let quiz_path = args
        .next()
        .context("usage: quiz_engine <quiz.json> [settings.json]")?;
    let raw_quiz = std::fs::read_to_string(&quiz_path)
        .with_context(|| format!("reading {}", quiz_path))?;
    let quiz: Quiz = serde_json::from_str(&raw_quiz).context("parsing quiz")?;

    // unreadable settings fall back to defaults, same as a corrupt blob
    let raw_settings = args.next().and_then(|path| std::fs::read_to_string(path).ok());
    let session = match open_validated_session(quiz, raw_settings.as_deref()) {
        Ok(session) => session,
        Err(err @ EngineError::InvalidQuiz(_)) => {
            for detail in err.details() {
                warn!(field = %detail.field, "quiz content: {}", detail.issue);
            }
            return Err(err.into());
        }
        Err(err) => return Err(err.into()),
    };

    let script: Vec<Command> = match std::env::var("QUIZ_SCRIPT") {
        Ok(path) if !path.trim().is_empty() => {
            let raw = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path))?;
            serde_json::from_str(&raw).context("parsing script")?
        }
        _ => Vec::new(),
    };
    let step_delay = std::env::var("QUIZ_SCRIPT_STEP_MILLIS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or_default();

    let config = EngineConfig::from_env();
    let sink = BroadcastSink::new(config.event_capacity);
    let mut events = sink.subscribe();
    let forward_task = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(envelope) => match serde_json::to_string(&envelope) {
                    Ok(json) => info!(target: "quiz_engine::events", "{}", json),
                    Err(err) => warn!("failed to encode event envelope: {}", err),
                },
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event log lagging"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let handle = SessionHandle::spawn(session, Arc::new(sink), config);
    for command in script {
        handle.send(command).await?;
        tokio::time::sleep(step_delay).await;
    }

    let snapshot = handle.snapshot().await?;
    let nav = handle.shutdown().await?;
    // the driver owned the last sender, so the forwarder drains and stops
    let _ = forward_task.await;
    match nav.session().result() {
        Some(result) => println!("{}", serde_json::to_string_pretty(result)?),
        None => println!("{}", serde_json::to_string_pretty(&snapshot)?),
    }
    Ok(())
}
