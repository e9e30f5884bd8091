use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::{chat::ChatMessage, game::GameState};

/// Everything the front end needs to know to re-render.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    #[serde(rename_all = "camelCase")]
    SessionStarted { game_id: String },
    /// The held state was swapped for a new one.
    #[serde(rename_all = "camelCase")]
    StateReplaced { state: Arc<GameState> },
    #[serde(rename_all = "camelCase")]
    SelectionChanged { origin: Option<String> },
    #[serde(rename_all = "camelCase")]
    Analysis { text: String },
    #[serde(rename_all = "camelCase")]
    Chat { message: ChatMessage },
    /// A normalized, user-facing failure message.
    #[serde(rename_all = "camelCase")]
    Error { message: String },
    AutoplayStarted,
    #[serde(rename_all = "camelCase")]
    AutoplayStopped { reason: String },
    #[serde(rename_all = "camelCase")]
    SessionEnded { game_id: String },
}

/// Sending half of the event stream towards the front end.
#[derive(Debug, Clone)]
pub struct EventSink(mpsc::UnboundedSender<SessionEvent>);

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self(tx), rx)
    }

    pub fn emit(&self, event: SessionEvent) {
        if let Err(e) = self.0.send(event) {
            tracing::error!("Failed to emit event to frontend: {}", e);
        }
    }
}
