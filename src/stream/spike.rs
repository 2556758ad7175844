//! Single-sample outlier repair, applied to each chunk before it is merged.
//!
//! Statistics are computed per channel over the chunk alone:
//! - a sample is a spike when `|value - mean| > threshold * stddev` (population stddev);
//! - the union of spike indices across channels is repaired row-wise, copying the
//!   previous row into the spike row for every data channel so channels stay aligned;
//! - a spike on the first row has no predecessor and is left as it is.

use std::collections::BTreeSet;

use crate::stream::SampleChunk;

/// What the filter did to one chunk.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpikeReport {
    /// Row indices that were overwritten from their predecessor.
    pub corrected: Vec<usize>,
    /// A spike was found on row 0 and left uncorrected.
    pub boundary_spike: bool,
}
impl SpikeReport {
    pub fn is_clean(&self) -> bool {
        self.corrected.is_empty() && !self.boundary_spike
    }
}
/// Arithmetic mean; zero for an empty slice.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}
/// Population standard deviation; zero for an empty slice.
pub fn std_dev(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mean = mean(data);
    let variance = data
        .iter()
        .map(|v| {
            let delta = v - mean;
            delta * delta
        })
        .sum::<f64>()
        / data.len() as f64;
    variance.sqrt()
}
/// Row indices at which any data channel deviates more than `threshold` standard
/// deviations from its own mean. Sorted ascending.
pub fn detect_spikes(chunk: &SampleChunk, threshold: f64) -> Vec<usize> {
    let mut rows = BTreeSet::new();
    for values in chunk.channels.values() {
        let mean = mean(values);
        let limit = threshold * std_dev(values);
        rows.extend(
            values
                .iter()
                .enumerate()
                .filter(|(_, v)| (*v - mean).abs() > limit)
                .map(|(i, _)| i),
        );
    }
    rows.into_iter().collect()
}
/// Repairs spikes in place. Rows are processed in ascending order, so a run of
/// consecutive spikes all take the last good row before the run.
pub fn filter_spikes(chunk: &mut SampleChunk, threshold: f64) -> SpikeReport {
    let mut report = SpikeReport::default();
    for row in detect_spikes(chunk, threshold) {
        if row == 0 {
            report.boundary_spike = true;
            continue;
        }
        for values in chunk.channels.values_mut() {
            values[row] = values[row - 1];
        }
        report.corrected.push(row);
    }
    report
}
