use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::stream::{SampleChunk, TelemetryError};

/// Chunk tagged with the sensor it belongs to.
pub type SensorChunk = (String, SampleChunk);

/// Something that can yield sensor chunks on demand.
pub trait ChunkSource {
    fn next_chunk(&mut self) -> Result<Option<SensorChunk>, TelemetryError>;
}
/// In-memory source useful for tests and deterministic playback.
pub struct ManualSource {
    queue: VecDeque<SensorChunk>,
}
impl ManualSource {
    pub fn new(chunks: impl IntoIterator<Item = SensorChunk>) -> Self {
        Self {
            queue: chunks.into_iter().collect(),
        }
    }
}
impl ChunkSource for ManualSource {
    fn next_chunk(&mut self) -> Result<Option<SensorChunk>, TelemetryError> {
        Ok(self.queue.pop_front())
    }
}
/// Shape of the synthetic stream produced by [`SimulatedSource`].
#[derive(Clone, Debug)]
pub struct SimulationSettings {
    pub sensors: Vec<String>,
    pub channels: Vec<String>,
    /// Chunks to emit in total, spread round-robin over the sensors.
    pub chunks: usize,
    pub samples_per_chunk: usize,
    /// Samples each chunk repeats from the end of the previous one.
    pub overlap: usize,
    /// Integer ticks between samples; times are `tick / tick_scale`.
    pub ticks_per_sample: i64,
    pub tick_scale: f64,
    pub spike_probability: f64,
    pub seed: u64,
}
impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            sensors: vec!["teensy".into()],
            channels: vec!["x".into(), "y".into(), "z".into()],
            chunks: 100,
            // long enough for a lone +1000 spike to clear the default threshold
            samples_per_chunk: 500,
            overlap: 50,
            ticks_per_sample: 10,
            tick_scale: 1000.0,
            spike_probability: 0.0005,
            seed: 7,
        }
    }
}
struct SimulatedSensor {
    name: String,
    next_tick: i64,
    levels: Vec<f64>,
}
/// Random-walk telemetry on a discretized clock, with overlapping chunks and rare
/// spikes, mimicking what the rig's sensor threads send.
pub struct SimulatedSource {
    settings: SimulationSettings,
    sensors: Vec<SimulatedSensor>,
    emitted: usize,
    rng: StdRng,
}
impl SimulatedSource {
    pub fn new(settings: SimulationSettings) -> Self {
        let mut rng = StdRng::seed_from_u64(settings.seed);
        let sensors = settings
            .sensors
            .iter()
            .map(|name| SimulatedSensor {
                name: name.clone(),
                next_tick: 0,
                levels: settings
                    .channels
                    .iter()
                    .map(|_| rng.gen_range(-50.0..50.0))
                    .collect(),
            })
            .collect();
        Self {
            settings,
            sensors,
            emitted: 0,
            rng,
        }
    }
}
impl ChunkSource for SimulatedSource {
    fn next_chunk(&mut self) -> Result<Option<SensorChunk>, TelemetryError> {
        let Self {
            settings,
            sensors,
            emitted,
            rng,
        } = self;
        if *emitted >= settings.chunks || sensors.is_empty() {
            return Ok(None);
        }
        let idx = *emitted % sensors.len();
        let sensor = &mut sensors[idx];
        *emitted += 1;
        let step = settings.ticks_per_sample;
        let overlap = if sensor.next_tick == 0 { 0 } else { settings.overlap };
        let start = (sensor.next_tick - overlap as i64 * step).max(0);
        let ticks: Vec<i64> = (0..settings.samples_per_chunk as i64)
            .map(|i| start + i * step)
            .collect();
        let mut chunk =
            SampleChunk::new(ticks.iter().map(|t| *t as f64 / settings.tick_scale).collect());
        for (name, level) in settings.channels.iter().zip(sensor.levels.iter_mut()) {
            let values = ticks
                .iter()
                .map(|_| {
                    *level += rng.gen_range(-0.5..0.5);
                    if rng.gen_bool(settings.spike_probability) {
                        *level + 1000.0
                    } else {
                        *level
                    }
                })
                .collect();
            chunk.channels.insert(name.clone(), values);
        }
        sensor.next_tick = ticks.last().map(|t| t + step).unwrap_or(start);
        Ok(Some((sensor.name.clone(), chunk)))
    }
}
