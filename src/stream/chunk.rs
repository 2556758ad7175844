use std::collections::BTreeMap;

use crate::stream::TelemetryError;

/// Reserved channel key carrying the shared time axis.
pub const TIME_CHANNEL: &str = "t";

/// One inbound multi-channel payload for a single sensor.
///
/// Every channel shares `time`; a chunk is only usable once [`SampleChunk::validate`]
/// has accepted it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SampleChunk {
    pub time: Vec<f64>,
    pub channels: BTreeMap<String, Vec<f64>>,
}
impl SampleChunk {
    pub fn new(time: Vec<f64>) -> Self {
        Self {
            time,
            channels: BTreeMap::new(),
        }
    }
    /// Builder-style helper, mostly for tests and simulated sources.
    pub fn with_channel(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.channels.insert(name.into(), values);
        self
    }
    /// Builds a chunk from a name -> values map that still contains the time axis
    /// under [`TIME_CHANNEL`].
    pub fn from_named(mut named: BTreeMap<String, Vec<f64>>) -> Result<Self, TelemetryError> {
        let time = named
            .remove(TIME_CHANNEL)
            .ok_or(TelemetryError::MissingTimeAxis(TIME_CHANNEL))?;
        let chunk = Self {
            time,
            channels: named,
        };
        chunk.validate()?;
        Ok(chunk)
    }
    pub fn validate(&self) -> Result<(), TelemetryError> {
        if self.time.is_empty() {
            return Err(TelemetryError::EmptyChunk);
        }
        if let Some(index) = self.time.iter().position(|t| !t.is_finite()) {
            return Err(TelemetryError::NonFinite {
                channel: TIME_CHANNEL.to_owned(),
                index,
            });
        }
        if let Some(index) = self.time.windows(2).position(|w| w[1] < w[0]) {
            return Err(TelemetryError::TimeNotMonotonic { index: index + 1 });
        }
        for (name, values) in &self.channels {
            if name == TIME_CHANNEL {
                return Err(TelemetryError::MalformedFrame(format!(
                    "\"{TIME_CHANNEL}\" used as a data channel"
                )));
            }
            if values.len() != self.time.len() {
                return Err(TelemetryError::LengthMismatch {
                    channel: name.clone(),
                    expected: self.time.len(),
                    actual: values.len(),
                });
            }
            if let Some(index) = values.iter().position(|v| !v.is_finite()) {
                return Err(TelemetryError::NonFinite {
                    channel: name.clone(),
                    index,
                });
            }
        }
        Ok(())
    }
    pub fn len(&self) -> usize {
        self.time.len()
    }
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }
    pub fn first_time(&self) -> Option<f64> {
        self.time.first().copied()
    }
    pub fn last_time(&self) -> Option<f64> {
        self.time.last().copied()
    }
    pub fn channel(&self, name: &str) -> Option<&[f64]> {
        self.channels.get(name).map(Vec::as_slice)
    }
    /// Collapses runs of equal timestamps, keeping the last sample of each run.
    pub(crate) fn dedup_time(&mut self) {
        if self.time.windows(2).all(|w| w[0] != w[1]) {
            return;
        }
        let keep: Vec<bool> = (0..self.time.len())
            .map(|i| i + 1 == self.time.len() || self.time[i] != self.time[i + 1])
            .collect();
        retain_by_mask(&mut self.time, &keep);
        for values in self.channels.values_mut() {
            retain_by_mask(values, &keep);
        }
    }
}
fn retain_by_mask(values: &mut Vec<f64>, keep: &[bool]) {
    let mut idx = 0;
    values.retain(|_| {
        let kept = keep[idx];
        idx += 1;
        kept
    });
}
