//! API and Database Models
//!
//! This module defines the data structures used for database mapping with
//! `sqlx` and for generating OpenAPI documentation with `utoipa`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use voxrelay_core::turn::CompletedTurn;

/// One row of the `conversations` table.
#[derive(FromRow, Debug, Clone)]
pub struct ConversationRecord {
    pub id: i64,
    pub session_id: String,
    pub user_transcript: Option<String>,
    pub ai_response: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<ConversationRecord> for CompletedTurn {
    fn from(record: ConversationRecord) -> Self {
        let started_at = record.started_at.unwrap_or(record.created_at);
        CompletedTurn {
            session_id: record.session_id,
            user_transcript: record.user_transcript.unwrap_or_default(),
            ai_response: record.ai_response.unwrap_or_default(),
            started_at,
            ended_at: record.ended_at.unwrap_or(started_at),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct HistoryItem {
    #[schema(example = "What's the weather in Paris?")]
    pub user_transcript: String,
    pub ai_response: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl From<CompletedTurn> for HistoryItem {
    fn from(turn: CompletedTurn) -> Self {
        Self {
            user_transcript: turn.user_transcript,
            ai_response: turn.ai_response,
            started_at: turn.started_at,
            ended_at: turn.ended_at,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct HistoryResponse {
    pub session_id: String,
    pub history: Vec<HistoryItem>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct HealthChecks {
    pub database_connected: bool,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub checks: HealthChecks,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}
