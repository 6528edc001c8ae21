//! Turning key events into sessions. Everything here is synchronous and owned by the
//! controller, one event at a time.

pub mod accumulator;
pub mod stats;
