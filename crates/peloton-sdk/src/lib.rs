//! Peloton SDK - upload routes and query statistics
//!
//! Provides a small async API over the master's client WebSocket.

pub mod client;
pub mod report;

pub use client::PelotonClient;
pub use report::{RouteReport, SdkError};
