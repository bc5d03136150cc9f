//! Turn Pipeline
//!
//! Runs one utterance through speech-to-text, the agent and text-to-speech,
//! strictly in that order, stopping at the first failure. Events are pushed
//! to the caller's [`TurnSink`] as soon as they are known; synthesized audio
//! is forwarded chunk by chunk, never buffered to completion.

use crate::{
    agent::ConversationAgent,
    stt::SpeechToText,
    tts::TextToSpeech,
    turn::{CompletedTurn, Exchange, Stage, TurnEvent, TurnSink},
};
use bytes::Bytes;
use chrono::Utc;
use futures::StreamExt;
use std::{future::Future, sync::Arc, time::Duration};
use tracing::{info, instrument};

pub const STATUS_PROCESSING: &str = "Processing...";
pub const STATUS_THINKING: &str = "Thinking...";
pub const STATUS_NO_SPEECH: &str = "No speech detected";
pub const STATUS_READY: &str = "Ready";

/// Upper bounds for each stage. The speech bound applies to every awaited
/// audio chunk rather than the whole synthesis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageTimeouts {
    pub stt: Duration,
    pub agent: Duration,
    pub tts: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            stt: Duration::from_secs(30),
            agent: Duration::from_secs(60),
            tts: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{stage} stage failed: {reason}")]
    Stage { stage: Stage, reason: String },
    #[error("{stage} stage timed out after {}s", .limit.as_secs_f32())]
    Timeout { stage: Stage, limit: Duration },
    #[error("client connection lost")]
    ClientGone,
}

impl PipelineError {
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Stage { stage, .. } | PipelineError::Timeout { stage, .. } => {
                Some(*stage)
            }
            PipelineError::ClientGone => None,
        }
    }

    /// The message shown to the user for this failure.
    pub fn client_message(&self) -> String {
        match self {
            PipelineError::Stage { stage, .. } => {
                let what = match stage {
                    Stage::SpeechToText => "Failed to transcribe audio.",
                    Stage::Agent => "Failed to generate a response.",
                    Stage::TextToSpeech => "Failed to synthesize speech.",
                };
                format!("{} (step: {})", what, stage)
            }
            PipelineError::Timeout { stage, .. } => {
                format!("The service took too long to respond. (step: {})", stage)
            }
            PipelineError::ClientGone => "Client disconnected.".to_string(),
        }
    }
}

pub struct TurnPipeline {
    stt: Arc<dyn SpeechToText>,
    agent: Arc<dyn ConversationAgent>,
    tts: Arc<dyn TextToSpeech>,
    timeouts: StageTimeouts,
}

impl TurnPipeline {
    pub fn new(
        stt: Arc<dyn SpeechToText>,
        agent: Arc<dyn ConversationAgent>,
        tts: Arc<dyn TextToSpeech>,
    ) -> Self {
        Self {
            stt,
            agent,
            tts,
            timeouts: StageTimeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: StageTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Runs one turn.
    ///
    /// Returns `Ok(None)` when the utterance held no speech; in that case
    /// neither the agent nor speech synthesis is called.
    #[instrument(name = "turn", skip_all, fields(bytes = audio.len()))]
    pub async fn run(
        &self,
        session_id: &str,
        audio: Bytes,
        history: &[Exchange],
        sink: &mut dyn TurnSink,
    ) -> Result<Option<CompletedTurn>, PipelineError> {
        let started_at = Utc::now();
        emit(sink, TurnEvent::Status(STATUS_PROCESSING.to_string())).await?;

        let transcript = timed(
            Stage::SpeechToText,
            self.timeouts.stt,
            self.stt.transcribe(audio),
        )
        .await?;
        if transcript.trim().is_empty() {
            info!("Empty transcript; skipping agent and speech synthesis");
            emit(sink, TurnEvent::Status(STATUS_NO_SPEECH.to_string())).await?;
            return Ok(None);
        }
        info!(transcript = %transcript, "Transcription complete");
        emit(sink, TurnEvent::UserTranscript(transcript.clone())).await?;
        emit(sink, TurnEvent::Status(STATUS_THINKING.to_string())).await?;

        let reply = timed(
            Stage::Agent,
            self.timeouts.agent,
            self.agent.respond(&transcript, history),
        )
        .await?;
        info!(chars = reply.len(), "Agent reply ready");
        emit(sink, TurnEvent::AiResponse(reply.clone())).await?;

        let mut audio = timed(
            Stage::TextToSpeech,
            self.timeouts.tts,
            self.tts.synthesize(&reply),
        )
        .await?;
        let mut chunks = 0usize;
        loop {
            match tokio::time::timeout(self.timeouts.tts, audio.next()).await {
                Err(_) => {
                    return Err(PipelineError::Timeout {
                        stage: Stage::TextToSpeech,
                        limit: self.timeouts.tts,
                    });
                }
                Ok(None) => break,
                Ok(Some(Err(e))) => {
                    return Err(PipelineError::Stage {
                        stage: Stage::TextToSpeech,
                        reason: format!("{:#}", e),
                    });
                }
                Ok(Some(Ok(chunk))) => {
                    chunks += 1;
                    emit(sink, TurnEvent::Audio(chunk)).await?;
                }
            }
        }
        info!(chunks, "Audio streamed");

        Ok(Some(CompletedTurn {
            session_id: session_id.to_string(),
            user_transcript: transcript,
            ai_response: reply,
            started_at,
            ended_at: Utc::now(),
        }))
    }
}

async fn emit(sink: &mut dyn TurnSink, event: TurnEvent) -> Result<(), PipelineError> {
    sink.send(event)
        .await
        .map_err(|_| PipelineError::ClientGone)
}

async fn timed<T>(
    stage: Stage,
    limit: Duration,
    call: impl Future<Output = anyhow::Result<T>>,
) -> Result<T, PipelineError> {
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(PipelineError::Stage {
            stage,
            reason: format!("{:#}", e),
        }),
        Err(_) => Err(PipelineError::Timeout { stage, limit }),
    }
}
