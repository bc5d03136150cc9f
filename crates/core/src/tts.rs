//! Text-to-Speech
//!
//! Synthesizes the assistant's reply and exposes the audio as a lazy,
//! finite stream of byte chunks so the client can start playback before
//! synthesis finishes.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt, stream};
use serde::Serialize;
use std::pin::Pin;
use tracing::{debug, info};

/// Longest input the speech endpoint accepts in one request.
pub const MAX_TTS_INPUT_CHARS: usize = 4096;

/// Default size of each outbound audio frame.
pub const DEFAULT_CHUNK_SIZE: usize = 6 * 1024;

/// A non-restartable stream of synthesized audio.
pub type AudioStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

#[async_trait]
pub trait TextToSpeech: Send + Sync {
    /// Starts synthesis. Returns once the provider has accepted the request;
    /// audio arrives through the returned stream.
    async fn synthesize(&self, text: &str) -> Result<AudioStream>;
}

/// Voice and encoding settings for the OpenAI speech endpoint.
#[derive(Debug, Clone)]
pub struct SpeechSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub voice: String,
    pub format: String,
    pub speed: f32,
    pub chunk_size: usize,
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
    speed: f32,
}

/// A `TextToSpeech` that streams from `POST {base_url}/audio/speech`.
#[derive(Clone)]
pub struct OpenAiSpeech {
    http: reqwest::Client,
    settings: SpeechSettings,
}

impl OpenAiSpeech {
    pub fn new(http: reqwest::Client, settings: SpeechSettings) -> Self {
        Self { http, settings }
    }

    async fn open_segment(&self, text: String) -> Result<AudioStream> {
        let s = &self.settings;
        info!(chars = text.len(), model = %s.model, voice = %s.voice, "Requesting speech synthesis");

        let url = format!("{}/audio/speech", s.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(url)
            .bearer_auth(&s.api_key)
            .json(&SpeechRequest {
                model: &s.model,
                input: &text,
                voice: &s.voice,
                response_format: &s.format,
                speed: s.speed,
            })
            .send()
            .await
            .context("Speech request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Speech API returned {}: {}", status, body);
        }

        Ok(Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(anyhow::Error::from)),
        ))
    }
}

#[async_trait]
impl TextToSpeech for OpenAiSpeech {
    async fn synthesize(&self, text: &str) -> Result<AudioStream> {
        let mut segments = segment_text(text, MAX_TTS_INPUT_CHARS).into_iter();
        let first = segments.next().context("Nothing to synthesize")?;

        // The first request is made eagerly so a rejected request fails the
        // call itself rather than the stream.
        let head = self.open_segment(first).await?;

        let this = self.clone();
        let tail = stream::iter(segments)
            .then(move |segment| {
                let this = this.clone();
                async move { this.open_segment(segment).await }
            })
            .map(|opened| match opened {
                Ok(audio) => audio,
                Err(e) => Box::pin(stream::once(async move { Err(e) })) as AudioStream,
            })
            .flatten();

        Ok(rechunk(head.chain(tail), self.settings.chunk_size))
    }
}

/// Re-cuts a byte stream into frames of exactly `chunk_size` bytes; only the
/// last frame may be shorter. The stream ends after the first error.
pub fn rechunk<S>(inner: S, chunk_size: usize) -> AudioStream
where
    S: Stream<Item = Result<Bytes>> + Send + 'static,
{
    let chunk_size = chunk_size.max(1);
    let state = (Box::pin(inner), BytesMut::new(), false);

    Box::pin(stream::unfold(
        state,
        move |(mut inner, mut buf, mut done)| async move {
            loop {
                if buf.len() >= chunk_size {
                    let frame = buf.split_to(chunk_size).freeze();
                    return Some((Ok(frame), (inner, buf, done)));
                }
                if done {
                    if buf.is_empty() {
                        return None;
                    }
                    let frame = buf.split().freeze();
                    return Some((Ok(frame), (inner, buf, done)));
                }
                match inner.next().await {
                    Some(Ok(bytes)) => {
                        debug!(bytes = bytes.len(), "Received synthesized audio");
                        buf.extend_from_slice(&bytes);
                    }
                    Some(Err(e)) => {
                        buf.clear();
                        return Some((Err(e), (inner, buf, true)));
                    }
                    None => done = true,
                }
            }
        },
    ))
}

/// Splits `text` into trimmed segments of at most `max_chars` characters,
/// cutting after a sentence end where possible, then at whitespace.
pub fn segment_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut segments = Vec::new();
    let mut rest = text.trim();

    while !rest.is_empty() {
        if rest.chars().count() <= max_chars {
            segments.push(rest.to_string());
            break;
        }

        let window_end = rest
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let window = &rest[..window_end];

        let cut = window
            .rfind(['.', '!', '?', '\n'])
            .map(|i| i + 1)
            .or_else(|| window.rfind(char::is_whitespace))
            .filter(|&i| i > 0)
            .unwrap_or(window_end);

        let segment = rest[..cut].trim();
        if !segment.is_empty() {
            segments.push(segment.to_string());
        }
        rest = rest[cut..].trim_start();
    }

    segments
}
