//! Speech-to-Text
//!
//! Turns one complete recorded utterance into a transcript using any
//! OpenAI-compatible transcription endpoint (Groq, OpenAI, ...).

use anyhow::{Context, Result, bail};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{AudioInput, CreateTranscriptionRequestArgs},
};
use async_trait::async_trait;
use bytes::Bytes;
use tracing::info;

/// Maximum utterance size accepted for transcription (25 MiB).
pub const MAX_STT_INPUT_BYTES: usize = 25 * 1024 * 1024;

/// Transcribes raw audio bytes into text.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Returns the trimmed transcript. An empty string means nothing was said.
    async fn transcribe(&self, audio: Bytes) -> Result<String>;
}

/// A `SpeechToText` backed by a Whisper-style transcription API.
pub struct WhisperTranscriber {
    client: Client<OpenAIConfig>,
    model: String,
    language: String,
}

impl WhisperTranscriber {
    pub fn new(config: OpenAIConfig, model: String, language: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
            language,
        }
    }
}

#[async_trait]
impl SpeechToText for WhisperTranscriber {
    async fn transcribe(&self, audio: Bytes) -> Result<String> {
        if audio.len() > MAX_STT_INPUT_BYTES {
            bail!(
                "audio exceeds maximum size: {} bytes (limit: {} bytes)",
                audio.len(),
                MAX_STT_INPUT_BYTES
            );
        }

        info!(bytes = audio.len(), model = %self.model, "Sending audio for transcription");
        let request = CreateTranscriptionRequestArgs::default()
            .file(AudioInput::from_vec_u8("audio.wav".to_string(), audio.to_vec()))
            .model(&self.model)
            .language(&self.language)
            .build()?;

        let response = self
            .client
            .audio()
            .transcribe(request)
            .await
            .context("Transcription request failed")?;

        Ok(response.text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_oversized_audio_is_rejected_before_any_request() {
        // Points at a closed port: reaching the network would fail differently.
        let config = OpenAIConfig::new()
            .with_api_key("test")
            .with_api_base("http://127.0.0.1:9");
        let stt = WhisperTranscriber::new(config, "whisper".into(), "en".into());

        let audio = Bytes::from(vec![0u8; MAX_STT_INPUT_BYTES + 1]);
        let err = stt.transcribe(audio).await.unwrap_err();
        assert!(err.to_string().contains("exceeds maximum size"));
    }
}
