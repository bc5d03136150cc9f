//! In-memory doubles for the turn stages, shared by the unit tests.

use crate::{
    agent::ConversationAgent,
    store::ConversationStore,
    stt::SpeechToText,
    tts::{AudioStream, TextToSpeech},
    turn::{CompletedTurn, Exchange, TurnEvent, TurnSink},
};
use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, stream};
use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

#[derive(Clone)]
pub enum SttOutcome {
    Text(String),
    Fail(String),
    Stall,
}

/// Replays scripted outcomes; the last one repeats once the script runs out.
pub struct FakeStt {
    script: Mutex<VecDeque<SttOutcome>>,
}

impl FakeStt {
    pub fn scripted(outcomes: Vec<SttOutcome>) -> Self {
        Self {
            script: Mutex::new(outcomes.into()),
        }
    }

    pub fn returning(text: &str) -> Self {
        Self::scripted(vec![SttOutcome::Text(text.to_string())])
    }

    pub fn failing(reason: &str) -> Self {
        Self::scripted(vec![SttOutcome::Fail(reason.to_string())])
    }

    pub fn stalling() -> Self {
        Self::scripted(vec![SttOutcome::Stall])
    }

    fn next(&self) -> SttOutcome {
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script.front().cloned().unwrap_or(SttOutcome::Stall)
        }
    }
}

#[async_trait]
impl SpeechToText for FakeStt {
    async fn transcribe(&self, _audio: Bytes) -> Result<String> {
        match self.next() {
            SttOutcome::Text(text) => Ok(text),
            SttOutcome::Fail(reason) => Err(anyhow!(reason)),
            SttOutcome::Stall => std::future::pending().await,
        }
    }
}

pub struct FakeAgent {
    reply: Result<String, String>,
    calls: AtomicUsize,
    seen_history: Mutex<Vec<Vec<Exchange>>>,
}

impl FakeAgent {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            calls: AtomicUsize::new(0),
            seen_history: Mutex::new(vec![]),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            reply: Err(reason.to_string()),
            ..Self::replying("")
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The history passed on each call, in call order.
    pub fn seen_history(&self) -> Vec<Vec<Exchange>> {
        self.seen_history.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConversationAgent for FakeAgent {
    async fn respond(&self, _transcript: &str, history: &[Exchange]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_history.lock().unwrap().push(history.to_vec());
        match &self.reply {
            Ok(reply) => Ok(reply.clone()),
            Err(reason) => bail!("{}", reason),
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum StreamEnd {
    Done,
    Fail,
    Stall,
}

pub struct FakeTts {
    chunks: Vec<&'static str>,
    fail_open: bool,
    end: StreamEnd,
    calls: AtomicUsize,
}

impl FakeTts {
    pub fn with_chunks(chunks: &[&'static str]) -> Self {
        Self {
            chunks: chunks.to_vec(),
            fail_open: false,
            end: StreamEnd::Done,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_to_open() -> Self {
        Self {
            fail_open: true,
            ..Self::with_chunks(&[])
        }
    }

    /// The stream yields an error after its chunks.
    pub fn then_failing(mut self) -> Self {
        self.end = StreamEnd::Fail;
        self
    }

    /// The stream never ends after its chunks.
    pub fn then_stalling(mut self) -> Self {
        self.end = StreamEnd::Stall;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextToSpeech for FakeTts {
    async fn synthesize(&self, _text: &str) -> Result<AudioStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_open {
            bail!("TTS API returned 500 Internal Server Error");
        }
        let chunks = stream::iter(
            self.chunks
                .iter()
                .map(|c| Ok(Bytes::from_static(c.as_bytes())))
                .collect::<Vec<_>>(),
        );
        Ok(match self.end {
            StreamEnd::Done => chunks.boxed(),
            StreamEnd::Fail => chunks
                .chain(stream::once(async { Err(anyhow!("connection reset")) }))
                .boxed(),
            StreamEnd::Stall => chunks.chain(stream::pending()).boxed(),
        })
    }
}

/// Records every event. Clones share the same log.
#[derive(Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<TurnEvent>>>,
    closed: bool,
}

impl RecordingSink {
    pub fn closed() -> Self {
        Self {
            closed: true,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<TurnEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn audio_chunks(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, TurnEvent::Audio(_)))
            .count()
    }
}

#[async_trait]
impl TurnSink for RecordingSink {
    async fn send(&mut self, event: TurnEvent) -> Result<()> {
        if self.closed {
            bail!("socket closed");
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    turns: Mutex<Vec<CompletedTurn>>,
    pub fail_record: bool,
    pub fail_recent: bool,
}

impl MemoryStore {
    pub fn with_turns(turns: Vec<CompletedTurn>) -> Self {
        Self {
            turns: Mutex::new(turns),
            ..Self::default()
        }
    }

    /// A store whose writes fail.
    pub fn failing_record() -> Self {
        Self {
            fail_record: true,
            ..Self::default()
        }
    }

    /// A store whose history reads fail.
    pub fn failing_recent() -> Self {
        Self {
            fail_recent: true,
            ..Self::default()
        }
    }

    pub fn turns(&self) -> Vec<CompletedTurn> {
        self.turns.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn record(&self, turn: &CompletedTurn) -> Result<()> {
        if self.fail_record {
            bail!("connection refused");
        }
        self.turns.lock().unwrap().push(turn.clone());
        Ok(())
    }

    async fn recent(&self, session_id: &str, limit: i64) -> Result<Vec<CompletedTurn>> {
        if self.fail_recent {
            bail!("connection refused");
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
        !self.fail_record
    }
}

pub fn completed(session_id: &str, user: &str, reply: &str) -> CompletedTurn {
    let now = chrono::Utc::now();
    CompletedTurn {
        session_id: session_id.to_string(),
        user_transcript: user.to_string(),
        ai_response: reply.to_string(),
        started_at: now,
        ended_at: now,
    }
}
