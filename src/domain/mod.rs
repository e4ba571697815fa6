//! Domain types for the log harness.
//!
//! Severity levels and the record shape every sink receives.

mod level;
mod record;

pub use level::*;
pub use record::*;
