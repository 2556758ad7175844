use std::collections::BTreeMap;

use log::{debug, warn};

use crate::config::AggregatorConfig;
use crate::stream::source::ChunkSource;
use crate::stream::spike::filter_spikes;
use crate::stream::{
    Calibration, MergeOutcome, Projection, SampleChunk, SensorBuffer, TelemetryError,
};

/// Everything the aggregator owns for one sensor.
#[derive(Clone, Debug, Default)]
pub struct SensorRecord {
    pub buffer: SensorBuffer,
    pub calibration: Calibration,
    pub chunks_merged: u64,
    pub chunks_rejected: u64,
    pub spikes_corrected: u64,
    pub boundary_spikes: u64,
    pub clock_restarts: u64,
    pub last_outcome: Option<MergeOutcome>,
}
/// Per-sensor reassembly: spike filter, merge, calibrate, trim, project.
///
/// Sensors never share state; a record is created on a sensor's first valid chunk
/// and lives until [`TelemetryAggregator::reset`].
pub struct TelemetryAggregator {
    config: AggregatorConfig,
    sensors: BTreeMap<String, SensorRecord>,
}
impl TelemetryAggregator {
    pub fn new(config: AggregatorConfig) -> Result<Self, TelemetryError> {
        config.validate()?;
        Ok(Self {
            config,
            sensors: BTreeMap::new(),
        })
    }
    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }
    /// Runs one chunk through the pipeline. On error the sensor's state is exactly
    /// as it was before the call.
    pub fn ingest(
        &mut self,
        sensor_id: &str,
        mut chunk: SampleChunk,
    ) -> Result<Projection, TelemetryError> {
        if let Err(err) = chunk.validate() {
            warn!("rejected chunk for {sensor_id}: {err}");
            if let Some(record) = self.sensors.get_mut(sensor_id) {
                record.chunks_rejected += 1;
            }
            return Err(err);
        }
        let config = self.config;
        let report = filter_spikes(&mut chunk, config.spike_threshold);
        let record = self.sensors.entry(sensor_id.to_owned()).or_default();
        let outcome = match record
            .buffer
            .merge(chunk, &record.calibration, config.overlap_tolerance)
        {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!("rejected chunk for {sensor_id}: {err}");
                record.chunks_rejected += 1;
                return Err(err);
            }
        };
        if let MergeOutcome::Restarted { discarded } = outcome {
            warn!("{sensor_id}: producer clock restarted, discarded {discarded} buffered samples");
            record.clock_restarts += 1;
        }
        if report.boundary_spike {
            warn!("{sensor_id}: spike on first sample left uncorrected");
            record.boundary_spikes += 1;
        }
        if !report.corrected.is_empty() {
            debug!(
                "{sensor_id}: corrected spikes at rows {:?}",
                report.corrected
            );
            record.spikes_corrected += report.corrected.len() as u64;
        }
        record
            .calibration
            .calibrate(&record.buffer, config.window_duration);
        let trimmed = record.buffer.trim(config.window_duration);
        if trimmed > 0 {
            debug!("{sensor_id}: trimmed {trimmed} samples outside the window");
        }
        record.chunks_merged += 1;
        record.last_outcome = Some(outcome);
        Ok(Projection::from_buffer(
            &record.buffer,
            record.calibration.range(),
        ))
    }
    /// Pulls one chunk from `source` and ingests it. `Ok(None)` once the source is
    /// exhausted.
    pub fn pump_once<S: ChunkSource>(
        &mut self,
        source: &mut S,
    ) -> Result<Option<(String, Projection)>, TelemetryError> {
        let Some((sensor, chunk)) = source.next_chunk()? else {
            return Ok(None);
        };
        let projection = self.ingest(&sensor, chunk)?;
        Ok(Some((sensor, projection)))
    }
    /// Projection of the current buffer without ingesting anything.
    pub fn latest_projection(&self, sensor_id: &str) -> Option<Projection> {
        self.sensors
            .get(sensor_id)
            .map(|r| Projection::from_buffer(&r.buffer, r.calibration.range()))
    }
    pub fn record(&self, sensor_id: &str) -> Option<&SensorRecord> {
        self.sensors.get(sensor_id)
    }
    pub fn buffer(&self, sensor_id: &str) -> Option<&SensorBuffer> {
        self.sensors.get(sensor_id).map(|r| &r.buffer)
    }
    pub fn calibration(&self, sensor_id: &str) -> Option<&Calibration> {
        self.sensors.get(sensor_id).map(|r| &r.calibration)
    }
    pub fn sensors(&self) -> impl Iterator<Item = &str> {
        self.sensors.keys().map(String::as_str)
    }
    /// Drops every sensor record, as on reconnect.
    pub fn reset(&mut self) {
        self.sensors.clear();
    }
    /// Drops one sensor's record, buffer and calibration included. Returns whether
    /// the sensor was known.
    pub fn reset_sensor(&mut self, sensor_id: &str) -> bool {
        self.sensors.remove(sensor_id).is_some()
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::source::ManualSource;
    fn aggregator() -> TelemetryAggregator {
        TelemetryAggregator::new(AggregatorConfig::default()).unwrap()
    }
    fn ramp(start: i32, end: i32, value: impl Fn(f64) -> f64) -> SampleChunk {
        let time: Vec<f64> = (start..=end).map(f64::from).collect();
        let x = time.iter().map(|t| value(*t)).collect();
        SampleChunk::new(time).with_channel("x", x)
    }
    #[test]
    fn first_chunk_becomes_buffer_then_overlap_replaces_tail() {
        let mut agg = aggregator();
        let first = SampleChunk::new(vec![0.0, 1.0, 2.0]).with_channel("x", vec![10.0, 20.0, 30.0]);
        agg.ingest("s", first.clone()).unwrap();
        let buffer = agg.buffer("s").unwrap();
        assert_eq!(buffer.time(), first.time.as_slice());
        assert_eq!(buffer.channel("x").unwrap(), first.channel("x").unwrap());
        let projection = agg
            .ingest(
                "s",
                SampleChunk::new(vec![1.0, 2.0, 3.0]).with_channel("x", vec![21.0, 31.0, 41.0]),
            )
            .unwrap();
        let buffer = agg.buffer("s").unwrap();
        assert_eq!(buffer.time(), &[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(buffer.channel("x").unwrap(), &[10.0, 21.0, 31.0, 41.0]);
        assert_eq!(projection.extent.x_max, 3.0);
        assert_eq!(projection.extent.y_min, 10.0);
        assert_eq!(projection.extent.y_max, 41.0);
    }
    #[test]
    fn window_holds_after_every_ingest() {
        let mut agg = aggregator();
        for k in 0..10 {
            let start = k * 4;
            agg.ingest("s", ramp(start, start + 5, |t| t.sin())).unwrap();
            let buffer = agg.buffer("s").unwrap();
            assert!(buffer.span() <= 10.0, "span {} after chunk {k}", buffer.span());
            assert!(buffer.time().windows(2).all(|w| w[0] < w[1]));
        }
    }
    #[test]
    fn baseline_is_set_once_and_subtracted_from_later_chunks() {
        let mut agg = aggregator();
        agg.ingest("s", ramp(0, 5, |_| 3.0)).unwrap();
        assert!(!agg.calibration("s").unwrap().is_calibrated("x"));
        agg.ingest("s", ramp(6, 11, |_| 3.0)).unwrap();
        let calibration = agg.calibration("s").unwrap();
        assert_eq!(calibration.baseline("x"), 3.0);
        assert_eq!(calibration.range(), 0.75);
        agg.ingest("s", ramp(12, 17, |_| 9.0)).unwrap();
        assert_eq!(agg.calibration("s").unwrap().baseline("x"), 3.0);
        let buffer = agg.buffer("s").unwrap();
        let x = buffer.channel("x").unwrap();
        assert_eq!(*x.last().unwrap(), 6.0);
    }
    #[test]
    fn calibration_survives_trim() {
        let mut agg = aggregator();
        agg.ingest("s", ramp(0, 11, |t| t)).unwrap();
        let buffer = agg.buffer("s").unwrap();
        assert_eq!(buffer.time()[0], 2.0);
        assert!(buffer.span() <= 10.0);
        // mean of the second half of [0..=11], computed before the trim
        assert_eq!(agg.calibration("s").unwrap().baseline("x"), 8.5);
        agg.ingest("s", ramp(12, 13, |t| t)).unwrap();
        assert_eq!(agg.calibration("s").unwrap().baseline("x"), 8.5);
    }
    #[test]
    fn malformed_chunk_keeps_previous_state() {
        let mut agg = aggregator();
        agg.ingest("s", ramp(0, 3, |t| t)).unwrap();
        let before = agg.latest_projection("s").unwrap();
        let bad = SampleChunk::new(vec![4.0, 5.0]).with_channel("x", vec![1.0]);
        let err = agg.ingest("s", bad).unwrap_err();
        assert!(err.is_malformed_chunk());
        assert_eq!(agg.latest_projection("s").unwrap(), before);
        assert_eq!(agg.record("s").unwrap().chunks_rejected, 1);
        assert!(agg.ingest("fresh", SampleChunk::new(vec![])).is_err());
        assert!(agg.record("fresh").is_none());
    }
    #[test]
    fn sensors_are_independent() {
        let mut agg = aggregator();
        agg.ingest("a", ramp(0, 2, |t| t)).unwrap();
        agg.ingest("b", ramp(100, 101, |t| -t)).unwrap();
        assert_eq!(agg.buffer("a").unwrap().len(), 3);
        assert_eq!(agg.buffer("b").unwrap().time(), &[100.0, 101.0]);
        assert_eq!(agg.sensors().collect::<Vec<_>>(), vec!["a", "b"]);
        agg.reset();
        assert!(agg.buffer("a").is_none());
    }
    #[test]
    fn restarted_clock_shows_new_data() {
        let mut agg = aggregator();
        agg.ingest("s", ramp(121, 130, |t| t)).unwrap();
        let projection = agg.ingest("s", ramp(0, 4, |_| 1.0)).unwrap();
        let record = agg.record("s").unwrap();
        assert_eq!(record.last_outcome, Some(MergeOutcome::Restarted { discarded: 10 }));
        assert_eq!(record.clock_restarts, 1);
        assert_eq!(record.buffer.time(), &[0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(projection.extent.x_max, 4.0);
        agg.ingest("s", ramp(3, 6, |_| 2.0)).unwrap();
        assert_eq!(agg.buffer("s").unwrap().time().last(), Some(&6.0));
    }
    #[test]
    fn reset_sensor_accepts_new_channel_set() {
        let mut agg = aggregator();
        agg.ingest("a", ramp(0, 2, |t| t)).unwrap();
        agg.ingest("b", ramp(0, 2, |t| t)).unwrap();
        let renamed = SampleChunk::new(vec![3.0]).with_channel("y", vec![1.0]);
        assert!(matches!(
            agg.ingest("a", renamed.clone()),
            Err(TelemetryError::ChannelSetMismatch { .. })
        ));
        assert!(agg.reset_sensor("a"));
        assert!(!agg.reset_sensor("missing"));
        agg.ingest("a", renamed).unwrap();
        assert_eq!(agg.buffer("a").unwrap().channel_names().collect::<Vec<_>>(), vec!["y"]);
        assert_eq!(agg.buffer("b").unwrap().len(), 3);
    }
    #[test]
    fn spike_is_repaired_before_merge() {
        let config = AggregatorConfig {
            spike_threshold: 2.0,
            ..AggregatorConfig::default()
        };
        let mut agg = TelemetryAggregator::new(config).unwrap();
        let chunk = SampleChunk::new(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
            .with_channel("x", vec![1.0, 1.0, 1.0, 1.0, 100.0, 1.0, 1.0]);
        agg.ingest("s", chunk).unwrap();
        assert_eq!(agg.buffer("s").unwrap().channel("x").unwrap()[4], 1.0);
        assert_eq!(agg.record("s").unwrap().spikes_corrected, 1);
    }
    #[test]
    fn pump_once_drains_source() {
        let mut agg = aggregator();
        let mut source = ManualSource::new(vec![("s".to_owned(), ramp(0, 2, |t| t))]);
        let (sensor, projection) = agg.pump_once(&mut source).unwrap().unwrap();
        assert_eq!(sensor, "s");
        assert_eq!(projection.len(), 3);
        assert!(agg.pump_once(&mut source).unwrap().is_none());
    }
}
