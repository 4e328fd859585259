pub mod aggregation;
pub mod chunking;
pub mod error;
pub mod gpx_io;
pub mod ids;
pub mod leaderboard;
pub mod mapper;
pub mod matching;
pub mod models;
pub mod protocol;
pub mod reducer;
pub mod spatial;
pub mod statistics;

pub use aggregation::RouteAggregator;
pub use chunking::{split_route, ChunkPlan};
pub use error::{PelotonError, Result};
pub use ids::{ClientId, IdAllocator, RouteId, SegmentId, WorkerId};
pub use leaderboard::{LeaderboardEntry, SegmentLeaderboard};
pub use mapper::map_chunk;
pub use matching::{find_subsequence, match_segments};
pub use models::{
    ActivityStats, Chunk, ChunkSegment, MatchedSegment, Route, RouteHeader, Segment,
    SegmentActivityStats, SegmentRef, Waypoint,
};
pub use protocol::{ClientRequest, PartialResult, ServerMessage, ServiceRequest, WorkerTask};
pub use reducer::{reduce, Partial};
pub use spatial::{distance_km, elapsed_minutes, elevation_gain};
pub use statistics::{GlobalStatistics, RouteOutcome, StatisticsLedger, Totals, UserStatistics};
