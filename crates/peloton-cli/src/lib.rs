//! Peloton CLI - upload rides and read statistics from a master.
//!
//! The `peloton` binary wraps the SDK; this library holds the pieces worth
//! testing on their own: text rendering and synthetic ride generation.

pub mod render;
pub mod sim;

pub use render::{render_leaderboards, render_report, render_statistics};
