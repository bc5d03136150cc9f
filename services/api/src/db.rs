//! Data Access Layer
//!
//! Conversation logging on PostgreSQL. Queries are checked at runtime so the
//! crate builds without a live database.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, warn};
use voxrelay_core::{store::ConversationStore, turn::CompletedTurn};

use crate::models::ConversationRecord;

/// A wrapper around the `PgPool` to provide a clear data access interface.
#[derive(Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    /// Creates a new `Db` instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs all pending `sqlx` migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Retrieves the last `limit` rows of a session, ordered chronologically.
    pub async fn recent_records(&self, session_id: &str, limit: i64) -> Result<Vec<ConversationRecord>> {
        let records = sqlx::query_as::<_, ConversationRecord>(
            r#"
            SELECT id, session_id, user_transcript, ai_response, started_at, ended_at, created_at
            FROM (
                SELECT id, session_id, user_transcript, ai_response, started_at, ended_at, created_at
                FROM conversations
                WHERE session_id = $1
                ORDER BY id DESC
                LIMIT $2
            ) AS latest
            ORDER BY id ASC
            "#,
        )
        .bind(session_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load conversation history")?;
        Ok(records)
    }
}

#[async_trait]
impl ConversationStore for Db {
    async fn record(&self, turn: &CompletedTurn) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO conversations (session_id, user_transcript, ai_response, started_at, ended_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&turn.session_id)
        .bind(&turn.user_transcript)
        .bind(&turn.ai_response)
        .bind(turn.started_at)
        .bind(turn.ended_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert conversation turn")?;
        debug!(session_id = %turn.session_id, "Conversation turn inserted");
        Ok(())
    }

    async fn recent(&self, session_id: &str, limit: i64) -> Result<Vec<CompletedTurn>> {
        let records = self.recent_records(session_id, limit).await?;
        Ok(records.into_iter().map(CompletedTurn::from).collect())
    }

    async fn health_check(&self) -> bool {
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Database health check failed");
                false
            }
        }
    }
}
