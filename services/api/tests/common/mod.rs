#![allow(dead_code)]

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, stream};
use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};
use voxrelay_api::{
    router::create_router,
    state::{AppState, SessionSettings},
};
use voxrelay_core::{
    agent::ConversationAgent,
    pipeline::TurnPipeline,
    store::ConversationStore,
    stt::SpeechToText,
    tts::{AudioStream, TextToSpeech},
    turn::{CompletedTurn, Exchange},
};

pub struct FakeStt {
    pub transcript: Option<String>,
    pub delay: Duration,
}

impl FakeStt {
    pub fn hearing(text: &str) -> Self {
        Self {
            transcript: Some(text.to_string()),
            delay: Duration::ZERO,
        }
    }

    pub fn broken() -> Self {
        Self {
            transcript: None,
            delay: Duration::ZERO,
        }
    }
}

#[async_trait]
impl SpeechToText for FakeStt {
    async fn transcribe(&self, _audio: Bytes) -> Result<String> {
        tokio::time::sleep(self.delay).await;
        self.transcript
            .clone()
            .ok_or_else(|| anyhow!("transcription API returned 500"))
    }
}

#[derive(Default)]
pub struct FakeAgent {
    pub reply: String,
    pub seen_history: Mutex<Vec<Vec<Exchange>>>,
}

impl FakeAgent {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ConversationAgent for FakeAgent {
    async fn respond(&self, _transcript: &str, history: &[Exchange]) -> Result<String> {
        self.seen_history.lock().unwrap().push(history.to_vec());
        Ok(self.reply.clone())
    }
}

pub struct FakeTts {
    pub chunks: Vec<&'static str>,
    /// Keep the stream open after the last chunk instead of ending it.
    pub stall: bool,
}

impl FakeTts {
    pub fn speaking(chunks: &[&'static str]) -> Self {
        Self {
            chunks: chunks.to_vec(),
            stall: false,
        }
    }

    pub fn stalling_after(chunks: &[&'static str]) -> Self {
        Self {
            stall: true,
            ..Self::speaking(chunks)
        }
    }
}

#[async_trait]
impl TextToSpeech for FakeTts {
    async fn synthesize(&self, _text: &str) -> Result<AudioStream> {
        let chunks: Vec<Result<Bytes>> = self
            .chunks
            .iter()
            .map(|c| Ok(Bytes::from_static(c.as_bytes())))
            .collect();
        let audio = stream::iter(chunks);
        if self.stall {
            Ok(audio.chain(stream::pending()).boxed())
        } else {
            Ok(audio.boxed())
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    pub turns: Mutex<Vec<CompletedTurn>>,
    pub broken: bool,
}

impl MemoryStore {
    pub fn turns(&self) -> Vec<CompletedTurn> {
        self.turns.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn record(&self, turn: &CompletedTurn) -> Result<()> {
        if self.broken {
            bail!("database is down");
        }
        self.turns.lock().unwrap().push(turn.clone());
        Ok(())
    }

    async fn recent(&self, session_id: &str, limit: i64) -> Result<Vec<CompletedTurn>> {
        if self.broken {
            bail!("database is down");
        }
        if limit < 0 {
            bail!("LIMIT must not be negative");
        }
        let matching: Vec<_> = self
            .turns()
            .into_iter()
            .filter(|t| t.session_id == session_id)
            .collect();
        let skip = matching.len().saturating_sub(limit as usize);
        Ok(matching.into_iter().skip(skip).collect())
    }

    async fn health_check(&self) -> bool {
        !self.broken
    }
}

pub fn turn(session_id: &str, user: &str, reply: &str) -> CompletedTurn {
    let now = chrono::Utc::now();
    CompletedTurn {
        session_id: session_id.to_string(),
        user_transcript: user.to_string(),
        ai_response: reply.to_string(),
        started_at: now,
        ended_at: now,
    }
}

pub fn app_state(
    stt: FakeStt,
    agent: Arc<FakeAgent>,
    store: Arc<MemoryStore>,
    settings: SessionSettings,
) -> Arc<AppState> {
    app_state_with_tts(stt, agent, store, settings, FakeTts::speaking(&["aa", "bb"]))
}

pub fn app_state_with_tts(
    stt: FakeStt,
    agent: Arc<FakeAgent>,
    store: Arc<MemoryStore>,
    settings: SessionSettings,
    tts: FakeTts,
) -> Arc<AppState> {
    let pipeline = TurnPipeline::new(Arc::new(stt), agent, Arc::new(tts));
    Arc::new(AppState::new(store, Arc::new(pipeline), settings))
}

/// Serves the full router on an ephemeral port.
pub async fn spawn_app(state: Arc<AppState>) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}
