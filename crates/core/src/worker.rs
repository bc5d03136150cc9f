//! Per-session turn worker.
//!
//! Owns a session's conversation history and drains its queue of utterances
//! one at a time, so turns of the same session never overlap. Aborting the
//! task that runs [`TurnWorker::run`] cancels the in-flight turn.

use crate::{
    pipeline::{PipelineError, STATUS_READY, TurnPipeline},
    store::{ConversationStore, limit_param},
    turn::{CompletedTurn, Exchange, TurnEvent, TurnSink},
};
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Instrument, error, info, warn};

pub struct TurnWorker {
    pipeline: Arc<TurnPipeline>,
    store: Arc<dyn ConversationStore>,
    session_id: String,
    history: Vec<Exchange>,
    history_limit: usize,
}

impl TurnWorker {
    pub fn new(
        pipeline: Arc<TurnPipeline>,
        store: Arc<dyn ConversationStore>,
        session_id: impl Into<String>,
        history_limit: usize,
    ) -> Self {
        Self {
            pipeline,
            store,
            session_id: session_id.into(),
            history: Vec::new(),
            history_limit,
        }
    }

    /// Seeds the history from earlier turns of this session. A store failure
    /// leaves the history empty.
    pub async fn preload_history(&mut self) {
        match self
            .store
            .recent(&self.session_id, limit_param(self.history_limit))
            .await
        {
            Ok(turns) => {
                info!(turns = turns.len(), "Loaded conversation history");
                self.history = turns.iter().map(CompletedTurn::exchange).collect();
            }
            Err(e) => {
                warn!(error = %e, "Could not load conversation history; starting empty");
                self.history.clear();
            }
        }
    }

    pub fn history(&self) -> &[Exchange] {
        &self.history
    }

    /// Runs queued utterances until the queue closes or the client is gone.
    /// Every turn that reaches the client ends with a ready status.
    pub async fn run<S: TurnSink>(mut self, mut utterances: mpsc::Receiver<Bytes>, mut sink: S) {
        while let Some(audio) = utterances.recv().await {
            match self
                .pipeline
                .run(&self.session_id, audio, &self.history, &mut sink)
                .await
            {
                Ok(Some(turn)) => {
                    self.remember(turn.exchange());
                    self.log_turn(turn);
                }
                Ok(None) => {}
                Err(PipelineError::ClientGone) => {
                    info!("Client gone; stopping turn worker");
                    return;
                }
                Err(e) => {
                    error!(stage = ?e.stage(), error = %e, "Turn failed");
                    if sink.send(TurnEvent::Error(e.client_message())).await.is_err() {
                        return;
                    }
                }
            }
            if sink
                .send(TurnEvent::Status(STATUS_READY.to_string()))
                .await
                .is_err()
            {
                return;
            }
        }
        info!("Utterance queue closed; turn worker done");
    }

    fn remember(&mut self, exchange: Exchange) {
        self.history.push(exchange);
        let excess = self.history.len().saturating_sub(self.history_limit);
        self.history.drain(..excess);
    }

    /// Persists the turn in the background; failures are logged only.
    fn log_turn(&self, turn: CompletedTurn) {
        let store = self.store.clone();
        tokio::spawn(
            async move {
                match store.record(&turn).await {
                    Ok(()) => info!("Turn logged"),
                    Err(e) => error!(error = %e, "Failed to log turn"),
                }
            }
            .in_current_span(),
        );
    }
}
