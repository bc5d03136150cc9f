//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared
//! resources: the conversation store, the turn pipeline and the registry of
//! connected sessions.

use crate::{config::Config, ws::registry::SessionRegistry};
use std::{sync::Arc, time::Duration};
use voxrelay_core::{pipeline::TurnPipeline, store::ConversationStore};

/// Per-connection limits applied by the WebSocket handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionSettings {
    pub history_limit: usize,
    pub max_queued_turns: usize,
    /// How often the server pings an otherwise quiet client.
    pub ping_interval: Duration,
    /// A connection with no inbound frames for this long is dropped.
    pub idle_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            history_limit: 20,
            max_queued_turns: 1,
            ping_interval: Duration::from_secs(20),
            idle_timeout: Duration::from_secs(40),
        }
    }
}

impl From<&Config> for SessionSettings {
    fn from(config: &Config) -> Self {
        Self {
            history_limit: config.history_limit,
            max_queued_turns: config.max_queued_turns,
            ping_interval: config.ws_ping_interval,
            idle_timeout: config.ws_idle_timeout,
        }
    }
}

/// The shared application state, created once at startup and passed to all handlers.
pub struct AppState {
    pub store: Arc<dyn ConversationStore>,
    pub pipeline: Arc<TurnPipeline>,
    pub sessions: Arc<SessionRegistry>,
    pub settings: SessionSettings,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        pipeline: Arc<TurnPipeline>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            store,
            pipeline,
            sessions: Arc::new(SessionRegistry::default()),
            settings,
        }
    }
}
