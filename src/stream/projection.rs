use serde::Serialize;

use crate::stream::spike::mean;
use crate::stream::SensorBuffer;

/// Axis-aligned bounds of a projection: rebased time on x, channel values on y.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Extent {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}
impl Extent {
    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }
    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }
}
/// One renderable curve.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChannelSeries {
    pub name: String,
    /// `(time, value)` with time re-based so the buffer starts at zero.
    pub points: Vec<(f64, f64)>,
}
impl ChannelSeries {
    pub fn mean(&self) -> f64 {
        let values: Vec<f64> = self.points.iter().map(|(_, v)| *v).collect();
        mean(&values)
    }
}
/// Render-ready snapshot of a sensor buffer handed to the chart collaborator.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Projection {
    pub series: Vec<ChannelSeries>,
    pub extent: Extent,
    /// Scale hint from calibration; zero until the sensor has been calibrated.
    pub calibration_range: f64,
}
impl Projection {
    pub fn from_buffer(buffer: &SensorBuffer, calibration_range: f64) -> Self {
        let origin = buffer.time().first().copied().unwrap_or(0.0);
        let rebased: Vec<f64> = buffer.time().iter().map(|t| t - origin).collect();
        let mut y_min = f64::INFINITY;
        let mut y_max = f64::NEG_INFINITY;
        let series: Vec<ChannelSeries> = buffer
            .channels()
            .iter()
            .map(|(name, values)| {
                for v in values {
                    y_min = y_min.min(*v);
                    y_max = y_max.max(*v);
                }
                ChannelSeries {
                    name: name.clone(),
                    points: rebased.iter().copied().zip(values.iter().copied()).collect(),
                }
            })
            .collect();
        if y_min > y_max {
            y_min = 0.0;
            y_max = 0.0;
        }
        Self {
            series,
            extent: Extent {
                x_min: 0.0,
                x_max: rebased.last().copied().unwrap_or(0.0),
                y_min,
                y_max,
            },
            calibration_range,
        }
    }
    pub fn series(&self, name: &str) -> Option<&ChannelSeries> {
        self.series.iter().find(|s| s.name == name)
    }
    pub fn len(&self) -> usize {
        self.series.first().map(|s| s.points.len()).unwrap_or(0)
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{Calibration, SampleChunk};
    #[test]
    fn rebases_time_and_bounds_values() {
        let mut buffer = SensorBuffer::default();
        buffer
            .merge(
                SampleChunk::new(vec![5.0, 6.0, 7.5])
                    .with_channel("x", vec![1.0, -2.0, 3.0])
                    .with_channel("y", vec![10.0, 0.0, 4.0]),
                &Calibration::new(),
                0.0,
            )
            .unwrap();
        let projection = Projection::from_buffer(&buffer, 0.0);
        assert_eq!(
            projection.series("x").unwrap().points,
            vec![(0.0, 1.0), (1.0, -2.0), (2.5, 3.0)]
        );
        assert_eq!(
            projection.extent,
            Extent {
                x_min: 0.0,
                x_max: 2.5,
                y_min: -2.0,
                y_max: 10.0
            }
        );
        assert_eq!(projection.len(), 3);
        // projecting does not touch the buffer
        assert_eq!(buffer.time(), &[5.0, 6.0, 7.5]);
    }
    #[test]
    fn time_only_buffer_has_flat_extent() {
        let mut buffer = SensorBuffer::default();
        buffer
            .merge(SampleChunk::new(vec![1.0, 2.0]), &Calibration::new(), 0.0)
            .unwrap();
        let projection = Projection::from_buffer(&buffer, 0.0);
        assert!(projection.series.is_empty());
        assert_eq!(projection.extent.height(), 0.0);
        assert_eq!(projection.extent.width(), 1.0);
    }
}
