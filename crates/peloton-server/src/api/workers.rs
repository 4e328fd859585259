//! Worker WebSocket: chunks out, partial results in.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use peloton_core::protocol::{decode, encode};
use peloton_core::{PartialResult, WorkerTask};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::state::{AppState, WorkerHandle};

/// Handler for worker WebSocket connections.
pub async fn worker_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sink, mut stream) = socket.split();
    let (outbox, mut outbox_rx) = mpsc::unbounded_channel::<WorkerTask>();

    let worker_id = state.ids().next_worker();
    state.workers().register(WorkerHandle {
        id: worker_id,
        outbox,
    });
    tracing::info!(
        "{} connected ({} workers available)",
        worker_id,
        state.workers().len()
    );

    let mut writer = tokio::spawn(async move {
        while let Some(task) = outbox_rx.recv().await {
            let text = match encode(&task) {
                Ok(text) => text,
                Err(err) => {
                    tracing::warn!("Failed to encode worker task: {}", err);
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => match decode::<PartialResult>(&text) {
                        Ok(partial) => {
                            let client_id = partial.client_id;
                            let route_id = partial.chunk.route_id();
                            if !state.deliver_partial(partial) {
                                tracing::debug!(
                                    "Dropping partial of {} from {}: {} is gone",
                                    route_id,
                                    worker_id,
                                    client_id
                                );
                            }
                        }
                        Err(err) => {
                            tracing::warn!("{} sent an unreadable result: {}", worker_id, err);
                        }
                    },
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
            _ = &mut writer => break,
        }
    }

    state.workers().remove(worker_id);
    writer.abort();
    tracing::info!(
        "{} disconnected ({} workers available)",
        worker_id,
        state.workers().len()
    );
}
