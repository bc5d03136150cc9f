//! Turn Model
//!
//! A turn is one user utterance and the assistant reply it produced. This
//! module holds the records a turn leaves behind and the events it emits
//! while it runs.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The three sequential stages of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    SpeechToText,
    Agent,
    TextToSpeech,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::SpeechToText => write!(f, "stt"),
            Stage::Agent => write!(f, "agent"),
            Stage::TextToSpeech => write!(f, "tts"),
        }
    }
}

/// Something a running turn wants delivered to the client, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    Status(String),
    Error(String),
    UserTranscript(String),
    AiResponse(String),
    Audio(Bytes),
}

/// Where turn events go. Implemented by the connection layer.
///
/// An `Err` means the client can no longer be reached; the turn stops.
#[async_trait]
pub trait TurnSink: Send {
    async fn send(&mut self, event: TurnEvent) -> anyhow::Result<()>;
}

/// One prior exchange handed to the agent as conversation context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub user_transcript: String,
    pub ai_response: String,
}

/// The immutable record of a finished turn, handed to the conversation store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedTurn {
    pub session_id: String,
    pub user_transcript: String,
    pub ai_response: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl CompletedTurn {
    pub fn exchange(&self) -> Exchange {
        Exchange {
            user_transcript: self.user_transcript.clone(),
            ai_response: self.ai_response.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::SpeechToText.to_string(), "stt");
        assert_eq!(Stage::Agent.to_string(), "agent");
        assert_eq!(Stage::TextToSpeech.to_string(), "tts");
    }

    #[test]
    fn test_completed_turn_exchange() {
        let now = Utc::now();
        let turn = CompletedTurn {
            session_id: "abc".to_string(),
            user_transcript: "hello".to_string(),
            ai_response: "hi there".to_string(),
            started_at: now,
            ended_at: now,
        };
        let exchange = turn.exchange();
        assert_eq!(exchange.user_transcript, "hello");
        assert_eq!(exchange.ai_response, "hi there");
    }
}
