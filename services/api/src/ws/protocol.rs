//! Wire format between the browser client and the relay.
//!
//! Client to server: one binary frame per recorded utterance. Server to
//! client: binary frames carry audio to play; text frames carry a tag prefix
//! followed directly by the payload.

use axum::extract::ws::Message;
use voxrelay_core::turn::TurnEvent;

pub const STATUS_TAG: &str = "STATUS:";
pub const ERROR_TAG: &str = "ERROR:";
pub const USER_TRANSCRIPT_TAG: &str = "USER_TRANSCRIPT:";
pub const AI_RESPONSE_TAG: &str = "AI_RESPONSE:";

pub const BUSY_MESSAGE: &str = "Still processing the previous message";

pub fn already_connected(session_id: &str) -> String {
    format!("Session {} is already connected", session_id)
}

/// Encodes a turn event as a WebSocket frame.
pub fn frame(event: TurnEvent) -> Message {
    let text = match event {
        TurnEvent::Audio(chunk) => return Message::Binary(chunk),
        TurnEvent::Status(s) => format!("{}{}", STATUS_TAG, s),
        TurnEvent::Error(s) => format!("{}{}", ERROR_TAG, s),
        TurnEvent::UserTranscript(s) => format!("{}{}", USER_TRANSCRIPT_TAG, s),
        TurnEvent::AiResponse(s) => format!("{}{}", AI_RESPONSE_TAG, s),
    };
    Message::Text(text.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn text_of(message: Message) -> String {
        match message {
            Message::Text(text) => text.to_string(),
            other => panic!("expected a text frame, got {:?}", other),
        }
    }

    #[test]
    fn test_text_frames_are_tag_prefixed() {
        assert_eq!(
            text_of(frame(TurnEvent::Status("Ready".into()))),
            "STATUS:Ready"
        );
        assert_eq!(
            text_of(frame(TurnEvent::Error("Failed to transcribe audio. (step: stt)".into()))),
            "ERROR:Failed to transcribe audio. (step: stt)"
        );
        assert_eq!(
            text_of(frame(TurnEvent::UserTranscript("hello".into()))),
            "USER_TRANSCRIPT:hello"
        );
        assert_eq!(
            text_of(frame(TurnEvent::AiResponse("hi there".into()))),
            "AI_RESPONSE:hi there"
        );
    }

    #[test]
    fn test_payload_keeps_colons_and_newlines() {
        assert_eq!(
            text_of(frame(TurnEvent::AiResponse("Note: line one\nline two".into()))),
            "AI_RESPONSE:Note: line one\nline two"
        );
    }

    #[test]
    fn test_audio_is_a_binary_frame() {
        let chunk = Bytes::from_static(&[0xff, 0xf1, 0x50]);
        match frame(TurnEvent::Audio(chunk.clone())) {
            Message::Binary(data) => assert_eq!(data, chunk),
            other => panic!("expected a binary frame, got {:?}", other),
        }
    }

    #[test]
    fn test_already_connected_message() {
        assert_eq!(already_connected("abc"), "Session abc is already connected");
    }
}
