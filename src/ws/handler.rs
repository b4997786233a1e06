//! WebSocket upgrade handler and session plumbing

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{ArenaCommand, ClientHandle};
use crate::util::rate_limit::PlayerRateLimiter;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Unicast queue depth per connection; overflow drops rather than blocks
const CLIENT_QUEUE_DEPTH: usize = 64;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (client_tx, client_rx) = mpsc::channel::<ServerMsg>(CLIENT_QUEUE_DEPTH);
    let (reply_tx, reply_rx) = oneshot::channel();

    let command_tx = state.arena.command_sender();
    let connect = ArenaCommand::Connect {
        client: ClientHandle::new(client_tx.clone()),
        reply: reply_tx,
    };
    if command_tx.send(connect).await.is_err() {
        warn!("Arena unavailable, dropping connection");
        return;
    }
    let Ok(entity_id) = reply_rx.await else {
        warn!("Arena dropped the connect reply");
        return;
    };

    info!(entity_id = %entity_id, "New WebSocket connection");

    let snapshot_rx = state.arena.subscribe();
    let (ws_sink, ws_stream) = socket.split();

    // Writer task: broadcast snapshots + targeted messages -> WebSocket
    let writer_handle = tokio::spawn(write_session(entity_id, ws_sink, snapshot_rx, client_rx));

    // Reader loop: WebSocket -> arena commands
    read_session(entity_id, ws_stream, &command_tx, &client_tx).await;

    // Reader finished: tear the entity down and stop the writer
    let _ = command_tx.send(ArenaCommand::Disconnect { entity_id }).await;
    writer_handle.abort();

    info!(entity_id = %entity_id, "WebSocket connection closed");
}

/// Forward snapshots and unicast messages to the socket until either side
/// closes
async fn write_session(
    entity_id: Uuid,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut snapshot_rx: broadcast::Receiver<ServerMsg>,
    mut client_rx: mpsc::Receiver<ServerMsg>,
) {
    loop {
        let msg = tokio::select! {
            unicast = client_rx.recv() => match unicast {
                Some(msg) => msg,
                None => break,
            },
            snapshot = snapshot_rx.recv() => match snapshot {
                Ok(msg) => msg,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // Snapshots are droppable; the next one is complete.
                    debug!(entity_id = %entity_id, skipped = n, "Client lagged, skipping snapshots");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        };

        if send_msg(&mut ws_sink, &msg).await.is_err() {
            debug!(entity_id = %entity_id, "WebSocket send failed");
            break;
        }
    }
}

/// Parse inbound messages into arena commands; pings are answered here
async fn read_session(
    entity_id: Uuid,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    command_tx: &mpsc::Sender<ArenaCommand>,
    client_tx: &mpsc::Sender<ServerMsg>,
) {
    let rate_limiter = PlayerRateLimiter::new();

    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                let msg = match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(entity_id = %entity_id, error = %e, "Failed to parse client message");
                        continue;
                    }
                };

                match msg {
                    ClientMsg::Input { code } => {
                        if !rate_limiter.check_input() {
                            warn!(entity_id = %entity_id, "Rate limited input message");
                            continue;
                        }
                        if command_tx
                            .send(ArenaCommand::Input { entity_id, code })
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    ClientMsg::Nickname { name } => {
                        if command_tx
                            .send(ArenaCommand::Nickname { entity_id, name })
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    ClientMsg::Ping { t } => {
                        // latency probe; answered without a trip through the arena
                        let _ = client_tx.try_send(ServerMsg::Pong { t });
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(entity_id = %entity_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(entity_id = %entity_id, "Client initiated close");
                break;
            }
            Err(e) => {
                debug!(entity_id = %entity_id, error = %e, "WebSocket error");
                break;
            }
        }
    }
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
