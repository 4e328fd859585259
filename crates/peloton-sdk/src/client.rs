//! WebSocket client for the peloton master.

use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use peloton_core::protocol::{decode, encode};
use peloton_core::{
    ClientRequest, GlobalStatistics, SegmentLeaderboard, ServerMessage, ServiceRequest,
    UserStatistics,
};
use std::path::Path;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::report::{unexpected, RouteReport, SdkError};

/// One client session with the master.
///
/// Requests are answered in the order they are sent, so each call waits for
/// its own reply before returning.
pub struct PelotonClient {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl PelotonClient {
    /// Connect to a master. `base_url` may be an `http(s)://` or `ws(s)://`
    /// address; the client endpoint path is appended.
    pub async fn connect(base_url: &str) -> Result<Self> {
        let url = client_endpoint(base_url);
        tracing::debug!("Connecting to {}", url);
        let (socket, _) = connect_async(url.as_str()).await?;
        Ok(Self { socket })
    }

    /// Identify this session's user without uploading.
    pub async fn hello(&mut self, user: &str) -> Result<()> {
        self.send(&ClientRequest::Hello {
            user: user.to_string(),
        })
        .await
    }

    /// Upload a GPX document and wait for its route result.
    ///
    /// `user` overrides the document's creator attribute.
    pub async fn upload(&mut self, user: Option<&str>, gpx: &str) -> Result<RouteReport> {
        self.send(&ClientRequest::Upload {
            user: user.map(str::to_string),
            gpx: gpx.to_string(),
        })
        .await?;

        let mut messages = Vec::with_capacity(4);
        for _ in 0..4 {
            let message = self.recv().await?;
            if let ServerMessage::Error { message } = message {
                return Err(SdkError::Server(message).into());
            }
            messages.push(message);
        }
        Ok(RouteReport::from_messages(messages)?)
    }

    pub async fn upload_file(&mut self, user: Option<&str>, path: &Path) -> Result<RouteReport> {
        let gpx = tokio::fs::read_to_string(path).await?;
        self.upload(user, &gpx).await
    }

    /// Lifetime totals of this session's user, then of everyone.
    pub async fn statistics(&mut self) -> Result<(UserStatistics, GlobalStatistics)> {
        self.send(&ClientRequest::Service {
            service: ServiceRequest::Statistics,
        })
        .await?;
        let user = match self.recv().await? {
            ServerMessage::UserStatistics(stats) => stats,
            other => return Err(unexpected("user_statistics", other).into()),
        };
        let global = match self.recv().await? {
            ServerMessage::GlobalStatistics(stats) => stats,
            other => return Err(unexpected("global_statistics", other).into()),
        };
        Ok((user, global))
    }

    /// Every leaderboard this session's user appears on.
    pub async fn leaderboards(&mut self) -> Result<Vec<SegmentLeaderboard>> {
        self.send(&ClientRequest::Service {
            service: ServiceRequest::Leaderboard,
        })
        .await?;
        match self.recv().await? {
            ServerMessage::Leaderboards(boards) => Ok(boards),
            other => Err(unexpected("leaderboards", other).into()),
        }
    }

    pub async fn close(mut self) -> Result<()> {
        self.socket.close(None).await?;
        Ok(())
    }

    async fn send(&mut self, request: &ClientRequest) -> Result<()> {
        self.socket.send(Message::Text(encode(request)?)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<ServerMessage> {
        while let Some(msg) = self.socket.next().await {
            match msg? {
                Message::Text(text) => return Ok(decode(&text)?),
                Message::Close(_) => break,
                _ => {}
            }
        }
        Err(SdkError::Closed.into())
    }
}

fn client_endpoint(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_string()
    };
    if base.ends_with("/v1/clients") {
        base
    } else {
        format!("{base}/v1/clients")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_accepts_http_and_ws_bases() {
        assert_eq!(client_endpoint("http://localhost:3000"), "ws://localhost:3000/v1/clients");
        assert_eq!(client_endpoint("https://example.org/"), "wss://example.org/v1/clients");
        assert_eq!(
            client_endpoint("ws://10.0.0.2:3000/v1/clients"),
            "ws://10.0.0.2:3000/v1/clients"
        );
    }
}
