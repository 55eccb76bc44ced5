use crate::errors::EngineResult;
use crate::state::{AppState, ClientCommand, WsMessage};
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (sender, receiver) = socket.split();
    serve_client(sender, receiver, state).await;
}

/// Drive one client: snapshot first, then notifications out and commands in.
/// Returns once either direction is done; the other direction is aborted.
async fn serve_client<S, R>(mut sender: S, mut receiver: R, state: Arc<AppState>)
where
    S: Sink<Message> + Unpin + Send + 'static,
    R: Stream<Item = Result<Message, axum::Error>> + Unpin + Send + 'static,
{
    // Subscribe before reading the snapshot so nothing published in between is lost.
    let mut rx = state.ws_tx.subscribe();

    // Send initial snapshot
    if !send_snapshot(&mut sender, &state).await {
        return;
    }

    // Forward notifications to this client
    let send_state = state.clone();
    let mut send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ws_msg) => {
                    if !send_json(&mut sender, &ws_msg).await {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    // Missed some deltas; a fresh snapshot supersedes them.
                    tracing::warn!(skipped, "ws client lagged, resending snapshot");
                    if !send_snapshot(&mut sender, &send_state).await {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Client edits go straight to the engine; the results come back as notifications
    let command_tx = state.command_tx.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => match parse_command(text.as_str()) {
                    Ok(cmd) => {
                        if command_tx.send(cmd.into()).await.is_err() {
                            tracing::warn!("engine gone, closing ws client");
                            break;
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "ignoring malformed ws command"),
                },
                Ok(Message::Close(_)) | Err(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either side to finish, then stop the other
    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }
}

async fn send_snapshot<S>(sender: &mut S, state: &AppState) -> bool
where
    S: Sink<Message> + Unpin,
{
    let snapshot = state.snapshot_rx.borrow().clone();
    send_json(sender, &WsMessage::Snapshot(Box::new(snapshot))).await
}

async fn send_json<S, T>(sender: &mut S, value: &T) -> bool
where
    S: Sink<Message> + Unpin,
    T: serde::Serialize,
{
    match serde_json::to_string(value) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize ws message");
            true
        }
    }
}

fn parse_command(text: &str) -> EngineResult<ClientCommand> {
    let cmd: ClientCommand = serde_json::from_str(text)?;
    if let ClientCommand::SetParams(patch) = &cmd {
        patch.validate()?;
    }
    Ok(cmd)
}
