//! Typed views of the master's replies.

use peloton_core::{
    ActivityStats, GlobalStatistics, SegmentLeaderboard, ServerMessage, UserStatistics,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("master reported an error: {0}")]
    Server(String),

    #[error("expected {expected} message, got {got}")]
    UnexpectedMessage { expected: &'static str, got: String },

    #[error("connection closed before the reply was complete")]
    Closed,
}

/// Everything the master sends back for one uploaded route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteReport {
    pub activity: ActivityStats,
    pub user: UserStatistics,
    pub global: GlobalStatistics,
    /// Leaderboards of the segments this route went through.
    pub leaderboards: Vec<SegmentLeaderboard>,
}

impl RouteReport {
    /// Assemble a report from the four result messages, in wire order.
    pub fn from_messages(messages: Vec<ServerMessage>) -> Result<Self, SdkError> {
        let mut messages = messages.into_iter();
        let activity = match next(&mut messages)? {
            ServerMessage::Activity(stats) => stats,
            other => return Err(unexpected("activity", other)),
        };
        let user = match next(&mut messages)? {
            ServerMessage::UserStatistics(stats) => stats,
            other => return Err(unexpected("user_statistics", other)),
        };
        let global = match next(&mut messages)? {
            ServerMessage::GlobalStatistics(stats) => stats,
            other => return Err(unexpected("global_statistics", other)),
        };
        let leaderboards = match next(&mut messages)? {
            ServerMessage::Leaderboards(boards) => boards,
            other => return Err(unexpected("leaderboards", other)),
        };
        Ok(Self {
            activity,
            user,
            global,
            leaderboards,
        })
    }
}

fn next(messages: &mut impl Iterator<Item = ServerMessage>) -> Result<ServerMessage, SdkError> {
    match messages.next() {
        Some(ServerMessage::Error { message }) => Err(SdkError::Server(message)),
        Some(message) => Ok(message),
        None => Err(SdkError::Closed),
    }
}

pub(crate) fn unexpected(expected: &'static str, got: ServerMessage) -> SdkError {
    match got {
        ServerMessage::Error { message } => SdkError::Server(message),
        other => SdkError::UnexpectedMessage {
            expected,
            got: kind(&other).to_string(),
        },
    }
}

fn kind(message: &ServerMessage) -> &'static str {
    match message {
        ServerMessage::Activity(_) => "activity",
        ServerMessage::UserStatistics(_) => "user_statistics",
        ServerMessage::GlobalStatistics(_) => "global_statistics",
        ServerMessage::Leaderboards(_) => "leaderboards",
        ServerMessage::Error { .. } => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peloton_core::RouteId;

    fn result_messages() -> Vec<ServerMessage> {
        vec![
            ServerMessage::Activity(ActivityStats::new(RouteId(3))),
            ServerMessage::UserStatistics(UserStatistics::new("ann")),
            ServerMessage::GlobalStatistics(GlobalStatistics::default()),
            ServerMessage::Leaderboards(Vec::new()),
        ]
    }

    #[test]
    fn assembles_four_messages() {
        let report = RouteReport::from_messages(result_messages()).unwrap();
        assert_eq!(report.activity.route_id, RouteId(3));
        assert_eq!(report.user.user, "ann");
    }

    #[test]
    fn wrong_order_is_rejected() {
        let mut messages = result_messages();
        messages.swap(1, 2);
        let err = RouteReport::from_messages(messages).unwrap_err();
        assert!(matches!(
            err,
            SdkError::UnexpectedMessage {
                expected: "user_statistics",
                ..
            }
        ));
    }

    #[test]
    fn server_error_surfaces() {
        let err = RouteReport::from_messages(vec![ServerMessage::error("bad gpx")]).unwrap_err();
        assert!(matches!(err, SdkError::Server(m) if m == "bad gpx"));
    }

    #[test]
    fn short_reply_is_closed() {
        let mut messages = result_messages();
        messages.truncate(2);
        assert!(matches!(
            RouteReport::from_messages(messages),
            Err(SdkError::Closed)
        ));
    }
}
