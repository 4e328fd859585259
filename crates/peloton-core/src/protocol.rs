//! Logical messages exchanged between clients, the master and workers.
//!
//! Each message travels as one JSON text frame.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ids::ClientId;
use crate::leaderboard::SegmentLeaderboard;
use crate::models::{ActivityStats, Chunk};
use crate::statistics::{GlobalStatistics, RouteOutcome, UserStatistics};

/// Service names a client can ask for besides uploading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceRequest {
    #[serde(rename = "STATISTICS")]
    Statistics,
    #[serde(rename = "LEADERBOARD")]
    Leaderboard,
}

/// Client → master.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientRequest {
    /// Identify the connection's user without uploading.
    Hello { user: String },
    /// Raw GPX text. `user` overrides the GPX creator attribute.
    Upload {
        #[serde(default)]
        user: Option<String>,
        gpx: String,
    },
    Service { service: ServiceRequest },
}

/// Master → client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    Activity(ActivityStats),
    UserStatistics(UserStatistics),
    GlobalStatistics(GlobalStatistics),
    Leaderboards(Vec<SegmentLeaderboard>),
    Error { message: String },
}

impl ServerMessage {
    /// The fixed four-message reply for a completed route.
    pub fn route_result(outcome: RouteOutcome) -> Vec<ServerMessage> {
        vec![
            ServerMessage::Activity(outcome.activity),
            ServerMessage::UserStatistics(outcome.user),
            ServerMessage::GlobalStatistics(outcome.global),
            ServerMessage::Leaderboards(outcome.leaderboards),
        ]
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}

/// Master → worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum WorkerTask {
    Chunk { client_id: ClientId, chunk: Chunk },
}

/// Worker → master.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialResult {
    pub client_id: ClientId,
    pub chunk: Chunk,
    pub stats: ActivityStats,
}

pub fn encode<T: Serialize>(message: &T) -> Result<String> {
    Ok(serde_json::to_string(message)?)
}

pub fn decode<'a, T: Deserialize<'a>>(text: &'a str) -> Result<T> {
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::RouteId;

    #[test]
    fn service_names_match_wire_format() {
        let json = encode(&ClientRequest::Service {
            service: ServiceRequest::Leaderboard,
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"service","data":{"service":"LEADERBOARD"}}"#);
    }

    #[test]
    fn upload_user_is_optional() {
        let req: ClientRequest = decode(r#"{"type":"upload","data":{"gpx":"<gpx/>"}}"#).unwrap();
        assert_eq!(
            req,
            ClientRequest::Upload {
                user: None,
                gpx: "<gpx/>".to_string()
            }
        );
    }

    #[test]
    fn route_result_has_fixed_order() {
        let outcome = RouteOutcome {
            activity: ActivityStats::new(RouteId(1)),
            user: UserStatistics::new("fay"),
            global: GlobalStatistics::default(),
            leaderboards: Vec::new(),
        };
        let messages = ServerMessage::route_result(outcome);
        assert!(matches!(messages[0], ServerMessage::Activity(_)));
        assert!(matches!(messages[1], ServerMessage::UserStatistics(_)));
        assert!(matches!(messages[2], ServerMessage::GlobalStatistics(_)));
        assert!(matches!(messages[3], ServerMessage::Leaderboards(_)));
        assert_eq!(messages.len(), 4);
    }

    #[test]
    fn unknown_message_is_json_error() {
        let err = decode::<ClientRequest>(r#"{"type":"dance"}"#).unwrap_err();
        assert!(matches!(err, crate::error::PelotonError::Json(_)));
    }
}
