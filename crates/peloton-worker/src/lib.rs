//! Peloton worker.
//!
//! Connects to the master, computes statistics for every chunk it receives
//! and sends the partial results back over the same connection.

pub mod backoff;
pub mod config;

use anyhow::{bail, Result};
use futures_util::{SinkExt, StreamExt};
use peloton_core::protocol::{decode, encode};
use peloton_core::{map_chunk, PartialResult, WorkerTask};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::backoff::Backoff;
pub use crate::config::WorkerConfig;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connect to the master and serve chunks until the connection closes or
/// `shutdown` fires.
///
/// Only the initial connection is retried. A connection that drops after it
/// was established ends the worker.
pub async fn run_worker(config: &WorkerConfig, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
    let socket = tokio::select! {
        _ = shutdown.recv() => return Ok(()),
        socket = connect_with_backoff(config) => socket?,
    };
    tracing::info!("Connected to master at {}", config.master_url);
    serve(socket, shutdown).await
}

async fn connect_with_backoff(config: &WorkerConfig) -> Result<Socket> {
    let mut backoff = Backoff::new(config.backoff_base(), config.backoff_max());
    loop {
        match connect_async(config.master_url.as_str()).await {
            Ok((socket, _)) => return Ok(socket),
            Err(err) => {
                let delay = backoff.fail();
                if config.connect_attempts > 0 && backoff.attempts() >= config.connect_attempts {
                    bail!(
                        "could not reach master at {} after {} attempts: {}",
                        config.master_url,
                        backoff.attempts(),
                        err
                    );
                }
                tracing::warn!(
                    "Master at {} unreachable: {} (retrying in {:?})",
                    config.master_url,
                    err,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

async fn serve(socket: Socket, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
    let (mut sink, mut stream) = socket.split();
    let (results_tx, mut results_rx) = mpsc::unbounded_channel::<PartialResult>();

    // Sole writer; map tasks finishing together never interleave frames.
    let writer = tokio::spawn(async move {
        while let Some(result) = results_rx.recv().await {
            let text = encode(&result)?;
            sink.send(Message::Text(text)).await?;
        }
        let _ = sink.close().await;
        Ok::<_, anyhow::Error>(())
    });

    let outcome = loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Worker shutting down");
                break Ok(());
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => match decode::<WorkerTask>(&text) {
                        Ok(task) => spawn_map(task, results_tx.clone()),
                        Err(err) => tracing::warn!("Ignoring unreadable task: {}", err),
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!("Master closed the connection");
                        break Ok(());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => break Err(err.into()),
                }
            }
        }
    };

    drop(results_tx);
    match writer.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::debug!("Writer stopped: {}", err),
        Err(err) => tracing::error!("Writer panicked: {}", err),
    }
    outcome
}

/// Run the map phase for one chunk off the async runtime.
fn spawn_map(task: WorkerTask, results: mpsc::UnboundedSender<PartialResult>) {
    let WorkerTask::Chunk { client_id, chunk } = task;
    tokio::task::spawn_blocking(move || {
        let route_id = chunk.route_id();
        let index = chunk.index;
        match map_chunk(&chunk) {
            Ok(stats) => {
                tracing::debug!("Mapped {} chunk {}", route_id, index);
                let _ = results.send(PartialResult {
                    client_id,
                    chunk,
                    stats,
                });
            }
            Err(err) => {
                tracing::error!("Mapping {} chunk {} failed: {}", route_id, index, err);
            }
        }
    });
}
