//! Source discovery engine.
//!
//! - `probe` - running and interpreting a candidate binary
//! - `formats` - static format tables for binaries that cannot list formats
//! - `engine` - candidate enumeration and ranking

mod engine;
pub mod formats;
pub mod probe;

pub use engine::{select_best, DiscoveryEngine};
pub use probe::{Candidate, ProbeState, Prober};
