// src/stream/mod.rs
pub mod aggregator;
pub mod buffer;
pub mod calibration;
pub mod chunk;
pub mod error;
pub mod overlay;
pub mod plot;
pub mod projection;
pub mod source;
pub mod spike;
pub use aggregator::{SensorRecord, TelemetryAggregator};
pub use buffer::{MergeOutcome, SensorBuffer};
pub use calibration::Calibration;
pub use chunk::{SampleChunk, TIME_CHANNEL};
pub use error::TelemetryError;
pub use overlay::{BiotacOverlay, BIOTAC_SENSOR};
pub use plot::{render_projection_png, PlotStyle};
pub use projection::{ChannelSeries, Extent, Projection};
pub use source::{ChunkSource, ManualSource, SimulatedSource, SimulationSettings};
pub use spike::{filter_spikes, SpikeReport};
