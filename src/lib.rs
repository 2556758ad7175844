//! Telemetry reassembly for the rig dashboard.
//!
//! Sensor threads on the rig send overlapping chunks of multi-channel telemetry.
//! [`stream::TelemetryAggregator`] stitches them into one bounded, spike-free,
//! baseline-corrected buffer per sensor and hands back a [`stream::Projection`] for
//! the chart. [`session::Session`] drives it from the websocket's text protocol.
pub mod config;
pub mod session;
pub mod stream;
pub mod wire;
pub use config::AggregatorConfig;
pub use session::{Session, SessionEvent};
pub use stream::{Projection, SampleChunk, TelemetryAggregator, TelemetryError};
