//! Client WebSocket: uploads, service requests and route results.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use peloton_core::gpx_io::parse_gpx_str;
use peloton_core::protocol::{decode, encode};
use peloton_core::{
    ClientId, ClientRequest, PelotonError, ServerMessage, ServiceRequest, UserStatistics,
};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::loops::collector_loop::run_collector_loop;
use crate::state::{AppState, ClientHandle};

/// Handler for client WebSocket connections.
pub async fn client_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// What the master knows about one client connection.
#[derive(Debug)]
struct Session {
    client_id: ClientId,
    user: Option<String>,
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sink, mut stream) = socket.split();
    let (outbox, mut outbox_rx) = mpsc::unbounded_channel::<Vec<ServerMessage>>();
    let (results, results_rx) = mpsc::unbounded_channel();

    let client_id = state.register_client(ClientHandle {
        outbox: outbox.clone(),
        results,
    });
    tracing::info!("{} connected", client_id);

    // Sole writer for this socket; a batch is written without interleaving.
    let writer = tokio::spawn(async move {
        while let Some(batch) = outbox_rx.recv().await {
            for message in batch {
                let text = match encode(&message) {
                    Ok(text) => text,
                    Err(err) => {
                        tracing::warn!("Failed to encode client message: {}", err);
                        continue;
                    }
                };
                if sink.send(Message::Text(text)).await.is_err() {
                    return;
                }
            }
        }
        let _ = sink.close().await;
    });

    let mut collector = tokio::spawn(run_collector_loop(
        state.clone(),
        client_id,
        outbox.clone(),
        results_rx,
    ));
    let mut session = Session {
        client_id,
        user: None,
    };

    let collector_finished = loop {
        tokio::select! {
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        handle_request(&state, &mut session, &outbox, &text).await;
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break None,
                    Some(Ok(_)) => {}
                }
            }
            joined = &mut collector => break Some(joined),
        }
    };

    // Closing the result channel lets the collector drain and return.
    state.remove_client(client_id);
    let joined = match collector_finished {
        Some(joined) => joined,
        None => collector.await,
    };
    match joined {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::error!("{} collector failed: {}", client_id, err),
        Err(err) => tracing::error!("{} collector panicked: {}", client_id, err),
    }

    drop(outbox);
    let _ = writer.await;
    tracing::info!("{} disconnected", client_id);
}

async fn handle_request(
    state: &AppState,
    session: &mut Session,
    outbox: &mpsc::UnboundedSender<Vec<ServerMessage>>,
    text: &str,
) {
    let request = match decode::<ClientRequest>(text) {
        Ok(request) => request,
        Err(err) => {
            reply(outbox, vec![ServerMessage::error(format!("invalid request: {err}"))]);
            return;
        }
    };

    match request {
        ClientRequest::Hello { user } => match non_empty(Some(user)) {
            Some(user) => {
                tracing::debug!("{} identified as {}", session.client_id, user);
                session.user = Some(user);
            }
            None => reply(outbox, vec![ServerMessage::error("user must not be empty")]),
        },
        ClientRequest::Upload { user, gpx } => {
            if let Err(message) = accept_upload(state, session, user, &gpx) {
                reply(outbox, vec![ServerMessage::error(message)]);
            }
        }
        ClientRequest::Service { service } => {
            let Some(user) = session.user.clone() else {
                reply(
                    outbox,
                    vec![ServerMessage::error("identify with hello or an upload first")],
                );
                return;
            };
            reply(outbox, service_reply(state, &user, service).await);
        }
    }
}

fn accept_upload(
    state: &AppState,
    session: &mut Session,
    user: Option<String>,
    gpx: &str,
) -> Result<(), String> {
    let doc = parse_gpx_str(gpx).map_err(|e| e.to_string())?;
    let user = upload_user(user, doc.creator).map_err(|e| e.to_string())?;
    session.user = Some(user.clone());

    let route = state.build_route(session.client_id, &user, doc.waypoints);
    tracing::info!(
        "Accepted {} from {} ({}): {} waypoints, {} segments matched",
        route.id(),
        user,
        session.client_id,
        route.waypoints.len(),
        route.segments.len()
    );
    state.enqueue_route(route).map_err(|e| e.to_string())
}

async fn service_reply(state: &AppState, user: &str, service: ServiceRequest) -> Vec<ServerMessage> {
    let store = state.store();
    match service {
        ServiceRequest::Statistics => {
            let user_stats = store
                .user_statistics(user)
                .await
                .unwrap_or_else(|| UserStatistics::new(user));
            vec![
                ServerMessage::UserStatistics(user_stats),
                ServerMessage::GlobalStatistics(store.global().await),
            ]
        }
        ServiceRequest::Leaderboard => {
            vec![ServerMessage::Leaderboards(store.attempted_by(user).await)]
        }
    }
}

fn reply(outbox: &mpsc::UnboundedSender<Vec<ServerMessage>>, batch: Vec<ServerMessage>) {
    let _ = outbox.send(batch);
}

/// The explicit user wins over the GPX creator; an upload naming neither is
/// rejected even when the session already identified someone.
fn upload_user(explicit: Option<String>, creator: Option<String>) -> Result<String, PelotonError> {
    non_empty(explicit)
        .or_else(|| non_empty(creator))
        .ok_or_else(|| PelotonError::parse("upload names no user"))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_user_overrides_creator() {
        let user = upload_user(Some(" userB ".into()), Some("userA".into())).unwrap();
        assert_eq!(user, "userB");
        let user = upload_user(Some("".into()), Some("userA".into())).unwrap();
        assert_eq!(user, "userA");
    }

    #[test]
    fn upload_without_any_user_is_a_parse_error() {
        let err = upload_user(None, Some("  ".into())).unwrap_err();
        assert!(matches!(err, PelotonError::Parse(_)));
        assert!(err.to_string().contains("names no user"));
    }
}
