use crate::turn::CompletedTurn;
use anyhow::Result;
use async_trait::async_trait;

/// Append-only persistence for finished turns.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Writes one record for a finished turn. Never updates prior records.
    async fn record(&self, turn: &CompletedTurn) -> Result<()>;

    /// Returns the last `limit` turns of a session, oldest first.
    async fn recent(&self, session_id: &str, limit: i64) -> Result<Vec<CompletedTurn>>;

    /// Returns `true` if the backing store answers a trivial query.
    async fn health_check(&self) -> bool;
}

/// Converts a history length into a SQL `LIMIT`, saturating at `i64::MAX`.
pub fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}
