//! Manages the WebSocket connection lifecycle for one voice session.

use super::protocol::{self, BUSY_MESSAGE};
use crate::{handlers::validate_session_id, state::AppState};
use anyhow::Result;
use async_trait::async_trait;
use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use std::sync::Arc;
use tokio::{
    sync::{Mutex, mpsc, mpsc::error::TrySendError},
    time::{self, Instant, MissedTickBehavior},
};
use tracing::{Instrument, debug, info, info_span, instrument, warn};
use voxrelay_core::{
    pipeline::STATUS_READY,
    turn::{TurnEvent, TurnSink},
    worker::TurnWorker,
};

type SocketTx = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    if let Err(e) = validate_session_id(&session_id) {
        return e.into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, session_id, state))
}

/// Delivers turn events to the client over the shared socket writer.
pub struct WsSink {
    socket_tx: SocketTx,
}

impl WsSink {
    fn new(socket_tx: SocketTx) -> Self {
        Self { socket_tx }
    }
}

#[async_trait]
impl TurnSink for WsSink {
    async fn send(&mut self, event: TurnEvent) -> Result<()> {
        send_event(&self.socket_tx, event).await
    }
}

async fn send_event(socket_tx: &SocketTx, event: TurnEvent) -> Result<()> {
    socket_tx.lock().await.send(protocol::frame(event)).await?;
    Ok(())
}

/// Main handler for an individual WebSocket connection.
///
/// Registers the session, starts its turn worker and feeds it utterances
/// until the client goes away. The client is pinged while connected; a
/// connection with no inbound traffic for the idle timeout counts as gone.
/// Leaving this function aborts the worker and unregisters the session.
#[instrument(name = "ws_session", skip(socket, state))]
async fn handle_socket(socket: WebSocket, session_id: String, state: Arc<AppState>) {
    let (socket_tx, mut socket_rx) = socket.split();
    let socket_tx: SocketTx = Arc::new(Mutex::new(socket_tx));

    let Some(_registration) = state.sessions.register(&session_id) else {
        warn!("Session already connected; rejecting new connection");
        let mut sink = socket_tx.lock().await;
        let _ = sink
            .send(protocol::frame(TurnEvent::Error(protocol::already_connected(
                &session_id,
            ))))
            .await;
        let _ = sink.close().await;
        return;
    };
    info!("New WebSocket connection");

    let mut worker = TurnWorker::new(
        state.pipeline.clone(),
        state.store.clone(),
        session_id.clone(),
        state.settings.history_limit,
    );
    worker.preload_history().await;

    if send_event(&socket_tx, TurnEvent::Status(STATUS_READY.to_string()))
        .await
        .is_err()
    {
        info!("Client left before the session was ready");
        return;
    }

    let (utterance_tx, utterance_rx) = mpsc::channel(state.settings.max_queued_turns.max(1));
    let worker_task = tokio::spawn(
        worker
            .run(utterance_rx, WsSink::new(socket_tx.clone()))
            .instrument(info_span!("turn_worker")),
    );

    let idle_timeout = state.settings.idle_timeout;
    let mut keepalive = time::interval_at(
        Instant::now() + state.settings.ping_interval,
        state.settings.ping_interval,
    );
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut deadline = Instant::now() + idle_timeout;

    loop {
        let msg_result = tokio::select! {
            msg = socket_rx.next() => match msg {
                Some(msg) => msg,
                None => break,
            },
            _ = keepalive.tick() => {
                let ping = async {
                    socket_tx.lock().await.send(Message::Ping(Bytes::new())).await
                };
                match time::timeout(idle_timeout, ping).await {
                    Ok(Ok(())) => continue,
                    _ => {
                        warn!("Could not ping client; closing session");
                        break;
                    }
                }
            }
            _ = time::sleep_until(deadline) => {
                warn!(idle_secs = idle_timeout.as_secs(), "Client went silent; closing session");
                break;
            }
        };
        deadline = Instant::now() + idle_timeout;

        match msg_result {
            Ok(Message::Binary(audio)) => {
                if audio.is_empty() {
                    warn!("Ignoring empty audio frame");
                    continue;
                }
                info!(bytes = audio.len(), "Received utterance");
                match utterance_tx.try_send(audio) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        warn!("Turn queue full; rejecting utterance");
                        if send_event(&socket_tx, TurnEvent::Error(BUSY_MESSAGE.to_string()))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(TrySendError::Closed(_)) => {
                        warn!("Turn worker stopped; closing session");
                        break;
                    }
                }
            }
            Ok(Message::Text(_)) => debug!("Ignoring text frame from client"),
            Ok(Message::Close(_)) => {
                info!("Client sent close frame");
                break;
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => {}
            Err(e) => {
                warn!(error = %e, "Error receiving from client WebSocket");
                break;
            }
        }
    }

    worker_task.abort();
    info!("WebSocket connection closed and session terminated");
}
