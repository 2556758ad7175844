use std::io::Cursor;

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use plotters::prelude::LineSeries;
use plotters::prelude::*;

use crate::stream::error::TelemetryError;
use crate::stream::Projection;

#[derive(Clone, Debug)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,
    pub background: RGBColor,
    pub palette: Vec<RGBColor>,
}
impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            background: WHITE,
            // dashboard legend colours
            palette: vec![RED, GREEN, BLUE, BLACK],
        }
    }
}
/// Draws every channel curve of `projection` inside its extent, with a legend,
/// and returns the PNG bytes.
pub fn render_projection_png(
    projection: &Projection,
    caption: &str,
    style: PlotStyle,
) -> Result<Vec<u8>, TelemetryError> {
    if projection.is_empty() {
        return Err(TelemetryError::Plot("projection has no samples".into()));
    }
    let mut buffer = vec![0u8; (style.width * style.height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let extent = projection.extent;
        let x_bounds = if extent.width() <= f64::EPSILON {
            (extent.x_min, extent.x_min + 1.0)
        } else {
            (extent.x_min, extent.x_max)
        };
        let y_bounds = if extent.height() <= f64::EPSILON {
            (extent.y_min - 1.0, extent.y_max + 1.0)
        } else {
            (extent.y_min, extent.y_max)
        };
        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .caption(caption, ("sans-serif", 20).into_font().color(&BLACK))
            .set_label_area_size(LabelAreaPosition::Left, 45)
            .set_label_area_size(LabelAreaPosition::Bottom, 40)
            .build_cartesian_2d(x_bounds.0..x_bounds.1, y_bounds.0..y_bounds.1)?;
        chart
            .configure_mesh()
            .light_line_style(&BLACK.mix(0.1))
            .draw()?;
        for (idx, series) in projection.series.iter().enumerate() {
            let color = style.palette[idx % style.palette.len()];
            chart
                .draw_series(LineSeries::new(series.points.iter().copied(), &color))?
                .label(series.name.clone())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &color));
        }
        chart
            .configure_series_labels()
            .border_style(&BLACK.mix(0.2))
            .background_style(&style.background.mix(0.8))
            .draw()?;
        root.present()?;
    }
    encode_png(&buffer, style.width, style.height)
}
fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>, TelemetryError> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| TelemetryError::Plot("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    let dynamic = DynamicImage::ImageRgb8(image);
    dynamic.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}
