use std::collections::BTreeMap;

use log::info;

use crate::stream::spike::mean;
use crate::stream::SensorBuffer;

/// Per-sensor zero offsets and the rendering-scale hint derived from them.
///
/// A channel's baseline is written once, the first time the buffer spans more than
/// the window, and is then subtracted from every later merged sample.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Calibration {
    baselines: BTreeMap<String, f64>,
    range: f64,
}
impl Calibration {
    pub fn new() -> Self {
        Self::default()
    }
    /// Offset for `channel`, zero until it has been calibrated.
    pub fn baseline(&self, channel: &str) -> f64 {
        self.baselines.get(channel).copied().unwrap_or(0.0)
    }
    pub fn is_calibrated(&self, channel: &str) -> bool {
        self.baselines.contains_key(channel)
    }
    pub fn baselines(&self) -> &BTreeMap<String, f64> {
        &self.baselines
    }
    /// Largest `max |value| / 4` seen while calibrating; never decreases.
    pub fn range(&self) -> f64 {
        self.range
    }
    /// Sets the baseline of every not-yet-calibrated channel once `buffer` spans more
    /// than `window`. Returns the channels calibrated by this call.
    pub fn calibrate(&mut self, buffer: &SensorBuffer, window: f64) -> Vec<String> {
        if buffer.span() <= window {
            return Vec::new();
        }
        let half = buffer.len() / 2;
        let mut newly_set = Vec::new();
        for (name, values) in buffer.channels() {
            if self.baselines.contains_key(name) {
                continue;
            }
            let baseline = mean(&values[half..]);
            let peak = values.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
            self.range = self.range.max(peak / 4.0);
            info!(
                "calibrated channel {name}: baseline {baseline:.4}, range {:.4}",
                self.range
            );
            self.baselines.insert(name.clone(), baseline);
            newly_set.push(name.clone());
        }
        newly_set
    }
}
