use axum::{
    extract::{ws::Message, ws::WebSocket, State, WebSocketUpgrade},
    response::IntoResponse,
};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::sync::Arc;
use pipesock_hub::Frame;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::app::AppState;

/// Why a subscriber session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Peer sent a close frame or the stream ended.
    PeerClosed,
    /// Reading from the socket failed.
    TransportError,
    /// Writing a frame to the socket failed.
    SendFailed,
    /// The hub dropped this subscriber (slow or shut down).
    Dropped,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::PeerClosed => "peer_closed",
            CloseReason::TransportError => "transport_error",
            CloseReason::SendFailed => "send_failed",
            CloseReason::Dropped => "dropped",
        }
    }
}

/// Axum handler — upgrades HTTP to WebSocket at GET /ws.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| run_session(socket, state))
}

/// One subscriber, from accept to close.
///
/// Registering hands the hub the sending half of this session's outbound
/// queue; the hub puts the history replay (if any) first, then one frame per
/// flush. The session only forwards that queue to the socket.
async fn run_session(socket: WebSocket, state: Arc<AppState>) {
    let (tx, rx) = mpsc::channel(state.config.hub.subscriber_queue);
    let id = match state.hub.register(tx).await {
        Ok(id) => id,
        Err(e) => {
            warn!(error = %e, "rejecting subscriber");
            return;
        }
    };
    info!(subscriber = %id, "subscriber connected");

    let (sink, stream) = socket.split();
    let reason = forward(sink, stream, rx).await;

    state.hub.unregister(id).await;
    info!(subscriber = %id, reason = reason.as_str(), "subscriber disconnected");
}

/// Push queued frames to the peer until either side goes away.
///
/// Inbound frames carry no meaning in this protocol; they are read only to
/// notice close and transport errors.
pub(crate) async fn forward<S, R, E>(
    mut sink: S,
    mut stream: R,
    mut outbound: mpsc::Receiver<Frame>,
) -> CloseReason
where
    S: Sink<Message> + Unpin,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: std::fmt::Display,
{
    loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(frame) => {
                    if sink.send(Message::Text((&*frame).into())).await.is_err() {
                        return CloseReason::SendFailed;
                    }
                }
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    return CloseReason::Dropped;
                }
            },

            msg = stream.next() => match msg {
                Some(Ok(Message::Ping(data))) => {
                    let _ = sink.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) | None => return CloseReason::PeerClosed,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(error = %e, "websocket read failed");
                    return CloseReason::TransportError;
                }
            },
        }
    }
}
