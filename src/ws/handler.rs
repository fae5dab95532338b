//! WebSocket upgrade handler and per-connection session

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::lifecycle::{ConnectionPhase, Lifecycle};
use crate::game::player::PlayerInput;
use crate::game::store::PlayerStore;
use crate::util::shutdown::Shutdown;
use crate::ws::protocol::ClientMsg;
use crate::ws::registry::OutboundFrame;

/// Frames buffered per connection before broadcasts start timing out
const OUTBOUND_QUEUE: usize = 32;

/// How long the writer gets to flush and close after the session ends
const WRITER_GRACE: Duration = Duration::from_secs(1);

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (ws_sink, ws_stream) = socket.split();
    run_session(
        state.lifecycle.clone(),
        ws_sink,
        ws_stream,
        state.shutdown.clone(),
    )
    .await;
}

/// What a single inbound frame did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Input(PlayerInput),
    Ping,
    /// Malformed, unknown, or for a player that no longer exists
    Ignored,
}

/// Parses one connection's inbound frames and writes that player's input
pub struct ProtocolHandler {
    id: Uuid,
    store: Arc<PlayerStore>,
}

impl ProtocolHandler {
    pub fn new(id: Uuid, store: Arc<PlayerStore>) -> Self {
        Self { id, store }
    }

    pub fn handle_text(&self, text: &str) -> FrameOutcome {
        let msg = match serde_json::from_str::<ClientMsg>(text) {
            Ok(msg) => msg,
            Err(e) => {
                debug!(player_id = %self.id, error = %e, "Discarding malformed message");
                return FrameOutcome::Ignored;
            }
        };

        match msg {
            ClientMsg::Input { left, right, up } => {
                let input = PlayerInput { left, right, up };
                if self.store.apply_input(&self.id, input, Instant::now()) {
                    FrameOutcome::Input(input)
                } else {
                    debug!(player_id = %self.id, "Input for removed player");
                    FrameOutcome::Ignored
                }
            }
            ClientMsg::Ping => {
                trace!(player_id = %self.id, "Ping");
                FrameOutcome::Ping
            }
            ClientMsg::Unknown => {
                debug!(player_id = %self.id, "Discarding unknown message type");
                FrameOutcome::Ignored
            }
        }
    }
}

/// Tears the connection down if the session exits without calling `finish`,
/// including when it unwinds.
struct ConnectionGuard {
    id: Uuid,
    lifecycle: Arc<Lifecycle>,
    finished: bool,
}

impl ConnectionGuard {
    fn finish(mut self) -> ConnectionPhase {
        self.finished = true;
        self.lifecycle.disconnect(&self.id)
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if !self.finished {
            warn!(player_id = %self.id, "Session ended abnormally");
            self.lifecycle.disconnect(&self.id);
        }
    }
}

/// Drive one connection from welcome to teardown.
///
/// Reads frames until the client closes, the transport errors, the player is
/// evicted (the writer exits once its queue closes) or shutdown is requested.
pub async fn run_session<Si, St>(
    lifecycle: Arc<Lifecycle>,
    ws_sink: Si,
    mut ws_stream: St,
    mut shutdown: Shutdown,
) -> ConnectionPhase
where
    Si: Sink<Message> + Unpin + Send + 'static,
    Si::Error: Display + Send,
    St: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let mut phase = ConnectionPhase::Connecting;
    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE);

    let id = match lifecycle.connect(outbound_tx) {
        Ok(id) => id,
        Err(e) => {
            warn!(error = %e, "Connection refused");
            return ConnectionPhase::Disconnected;
        }
    };
    let guard = ConnectionGuard {
        id,
        lifecycle: lifecycle.clone(),
        finished: false,
    };
    phase = transition(id, phase, ConnectionPhase::Active);

    let mut writer = tokio::spawn(write_loop(id, ws_sink, outbound_rx));
    let mut writer_done = false;
    let handler = ProtocolHandler::new(id, lifecycle.store().clone());

    loop {
        tokio::select! {
            _ = shutdown.wait() => {
                debug!(player_id = %id, "Closing session for shutdown");
                break;
            }
            _ = &mut writer => {
                writer_done = true;
                break;
            }
            frame = ws_stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    handler.handle_text(&text);
                }
                Some(Ok(Message::Binary(_))) => {
                    debug!(player_id = %id, "Received binary message, ignoring");
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                Some(Ok(Message::Close(_))) | None => {
                    debug!(player_id = %id, "Client closed connection");
                    break;
                }
                Some(Err(e)) => {
                    warn!(player_id = %id, error = %e, "WebSocket error");
                    break;
                }
            }
        }
    }

    phase = transition(id, phase, guard.finish());

    if !writer_done {
        if tokio::time::timeout(WRITER_GRACE, &mut writer).await.is_err() {
            writer.abort();
        }
    }

    phase
}

fn transition(id: Uuid, from: ConnectionPhase, to: ConnectionPhase) -> ConnectionPhase {
    debug!(player_id = %id, ?from, ?to, "Connection phase");
    if to.is_terminal() {
        info!(player_id = %id, phase = ?to, "WebSocket connection closed");
    }
    to
}

/// Forward queued frames to the socket; close it once the queue closes
async fn write_loop<Si>(id: Uuid, mut ws_sink: Si, mut outbound: mpsc::Receiver<OutboundFrame>)
where
    Si: Sink<Message> + Unpin,
    Si::Error: Display,
{
    while let Some(frame) = outbound.recv().await {
        if let Err(e) = ws_sink.send(Message::Text(frame.to_string())).await {
            debug!(player_id = %id, error = %e, "WebSocket send failed");
            return;
        }
    }
    let _ = ws_sink.send(Message::Close(None)).await;
}
