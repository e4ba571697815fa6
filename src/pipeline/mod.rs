//! Structured log pipeline.
//!
//! - Formatter: renders a record as a text line or a JSON object
//! - Sinks: console (always) and CloudWatch Logs (production, opt-in)
//! - Logger: level filter and fan-out to every sink

mod cloudwatch;
mod format;
mod logger;
mod sink;

pub use cloudwatch::*;
pub use format::*;
pub use logger::*;
pub use sink::*;

#[cfg(test)]
pub(crate) use sink::testing;
