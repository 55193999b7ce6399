//! PSU power-state bridging.
//!
//! - `matcher`: compiles the configured on/off responses
//! - `classifier`: classifies inbound status payloads
//! - `controller`: owns the held status and drives the channel

pub mod classifier;
pub mod controller;
pub mod matcher;

pub use classifier::{Classification, classify};
pub use controller::{PsuStatus, StatusController};
pub use matcher::{CompiledMatcher, MatcherWarning, ResponseSpec, compile};
