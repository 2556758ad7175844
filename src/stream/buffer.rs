use std::collections::BTreeMap;

use log::debug;

use crate::stream::{Calibration, SampleChunk, TelemetryError};

/// How an incoming chunk was stitched onto the buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The buffer was empty and the chunk became the buffer.
    Initialized,
    /// The chunk's first timestamp was found at this buffer index; everything from
    /// there on was replaced by the chunk.
    Overlap { at: usize },
    /// The chunk starts after the buffer's last sample and was appended.
    Appended,
    /// The chunk started inside the buffer without matching a timestamp. Its
    /// samples at or before the buffer's last timestamp were dropped.
    Late { dropped: usize },
    /// The chunk started before the buffer's first sample, so the producer's clock
    /// restarted. The old history was discarded and the chunk became the buffer.
    Restarted { discarded: usize },
}
/// Accumulated, deduplicated history for one sensor.
///
/// The time axis is strictly ascending and every channel has exactly one value per
/// timestamp.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SensorBuffer {
    time: Vec<f64>,
    channels: BTreeMap<String, Vec<f64>>,
}
impl SensorBuffer {
    pub fn time(&self) -> &[f64] {
        &self.time
    }
    pub fn channels(&self) -> &BTreeMap<String, Vec<f64>> {
        &self.channels
    }
    pub fn channel(&self, name: &str) -> Option<&[f64]> {
        self.channels.get(name).map(Vec::as_slice)
    }
    pub fn channel_names(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }
    pub fn len(&self) -> usize {
        self.time.len()
    }
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
    /// `t[last] - t[first]`, zero for an empty buffer.
    pub fn span(&self) -> f64 {
        match (self.time.first(), self.time.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        }
    }
    /// Merges a spike-filtered chunk, subtracting the current baselines from it.
    ///
    /// Either the whole chunk is applied or, on error, nothing is.
    ///
    /// The channel set is fixed by the first chunk. A chunk carrying any other set
    /// fails with [`TelemetryError::ChannelSetMismatch`] for as long as the buffer
    /// lives, so a producer that changes its channels needs its sensor reset.
    pub fn merge(
        &mut self,
        mut chunk: SampleChunk,
        calibration: &Calibration,
        tolerance: f64,
    ) -> Result<MergeOutcome, TelemetryError> {
        chunk.validate()?;
        if !self.is_empty() && !chunk.channels.keys().eq(self.channels.keys()) {
            return Err(TelemetryError::ChannelSetMismatch {
                expected: join_names(self.channels.keys()),
                actual: join_names(chunk.channels.keys()),
            });
        }
        chunk.dedup_time();
        for (name, values) in chunk.channels.iter_mut() {
            let baseline = calibration.baseline(name);
            if baseline != 0.0 {
                values.iter_mut().for_each(|v| *v -= baseline);
            }
        }
        if self.is_empty() {
            self.time = chunk.time;
            self.channels = chunk.channels;
            debug!("buffer initialized with {} samples", self.len());
            return Ok(MergeOutcome::Initialized);
        }
        let first = chunk.time[0];
        if let Some(at) = self.find_time(first, tolerance) {
            self.truncate(at);
            self.extend(chunk);
            debug!("chunk overlaps buffer at index {at}");
            return Ok(MergeOutcome::Overlap { at });
        }
        let last = self.time[self.len() - 1];
        if first > last {
            self.extend(chunk);
            debug!("chunk appended after {last}");
            return Ok(MergeOutcome::Appended);
        }
        if first < self.time[0] {
            let discarded = self.len();
            self.time = chunk.time;
            self.channels = chunk.channels;
            debug!("clock restarted at {first}: discarded {discarded} buffered samples");
            return Ok(MergeOutcome::Restarted { discarded });
        }
        let dropped = chunk
            .time
            .iter()
            .position(|t| *t > last + tolerance)
            .unwrap_or(chunk.len());
        if dropped < chunk.len() {
            chunk.time.drain(..dropped);
            for values in chunk.channels.values_mut() {
                values.drain(..dropped);
            }
            self.extend(chunk);
        }
        debug!("late chunk starting at {first}: dropped {dropped} stale samples");
        Ok(MergeOutcome::Late { dropped })
    }
    /// Drops leading samples until the span is at most `window`. The newest sample
    /// always survives. Returns how many samples were removed.
    pub fn trim(&mut self, window: f64) -> usize {
        if self.span() <= window {
            return 0;
        }
        let cutoff = self.time[self.len() - 1] - window;
        let start = self
            .time
            .iter()
            .position(|t| *t > cutoff)
            .unwrap_or(self.len() - 1);
        self.time.drain(..start);
        for values in self.channels.values_mut() {
            values.drain(..start);
        }
        start
    }
    fn find_time(&self, t: f64, tolerance: f64) -> Option<usize> {
        if tolerance == 0.0 {
            self.time.iter().position(|x| *x == t)
        } else {
            self.time.iter().position(|x| (*x - t).abs() <= tolerance)
        }
    }
    fn truncate(&mut self, len: usize) {
        self.time.truncate(len);
        for values in self.channels.values_mut() {
            values.truncate(len);
        }
    }
    fn extend(&mut self, chunk: SampleChunk) {
        self.time.extend(chunk.time);
        for (name, values) in chunk.channels {
            if let Some(existing) = self.channels.get_mut(&name) {
                existing.extend(values);
            }
        }
    }
}
fn join_names<'a>(names: impl Iterator<Item = &'a String>) -> String {
    names.map(String::as_str).collect::<Vec<_>>().join(", ")
}
