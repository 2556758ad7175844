//! Schematic overlay for the BioTac fingertip: four electrode groups drawn with
//! an opacity proportional to their calibrated mean.

use serde::Serialize;

use crate::stream::Projection;

/// Sensor id that gets the overlay.
pub const BIOTAC_SENSOR: &str = "biotac";
/// Electrode group channels, in overlay order: top, bottom, left, right.
pub const BIOTAC_ELECTRODES: [&str; 4] = ["et", "eb", "el", "er"];

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct BiotacOverlay {
    /// Opacity in `[0, 1]` per electrode group, same order as [`BIOTAC_ELECTRODES`].
    pub opacities: [f64; 4],
}
impl BiotacOverlay {
    /// `|mean| / calibration_range`, clamped. All zero before calibration; a missing
    /// electrode channel reads as zero.
    pub fn from_projection(projection: &Projection) -> Self {
        let range = projection.calibration_range;
        let mut opacities = [0.0; 4];
        if range > 0.0 {
            for (slot, name) in opacities.iter_mut().zip(BIOTAC_ELECTRODES) {
                if let Some(series) = projection.series(name) {
                    *slot = (series.mean().abs() / range).clamp(0.0, 1.0);
                }
            }
        }
        Self { opacities }
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::projection::{ChannelSeries, Extent};
    fn projection(range: f64) -> Projection {
        let series = |name: &str, v: f64| ChannelSeries {
            name: name.to_owned(),
            points: vec![(0.0, v), (1.0, v)],
        };
        Projection {
            series: vec![
                series("et", 1.0),
                series("eb", -2.0),
                series("el", 8.0),
                series("pdc", 100.0),
            ],
            extent: Extent {
                x_min: 0.0,
                x_max: 1.0,
                y_min: -2.0,
                y_max: 100.0,
            },
            calibration_range: range,
        }
    }
    #[test]
    fn opacities_follow_calibrated_means() {
        let overlay = BiotacOverlay::from_projection(&projection(4.0));
        assert_eq!(overlay.opacities, [0.25, 0.5, 1.0, 0.0]);
    }
    #[test]
    fn uncalibrated_sensor_is_transparent() {
        let overlay = BiotacOverlay::from_projection(&projection(0.0));
        assert_eq!(overlay.opacities, [0.0; 4]);
    }
}
