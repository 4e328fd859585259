//! Background loops for continuous processing.

pub mod collector_loop;
pub mod dispatch_loop;
