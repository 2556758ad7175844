// src/main.rs
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use rigtelemetry::stream::{
    render_projection_png, ChunkSource, PlotStyle, SimulatedSource, SimulationSettings,
};
use rigtelemetry::{AggregatorConfig, Projection, Session, SessionEvent, TelemetryAggregator};

#[derive(Parser)]
#[command(name = "rigtelemetry", version, about = "Rig telemetry reassembly")]
struct Cli {
    /// JSON file with aggregator settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Write the latest projection of each sensor as <sensor>.png here
    #[arg(long, global = true)]
    png_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}
#[derive(Subcommand)]
enum Commands {
    /// Feed recorded websocket lines ("-" for stdin) through a session
    Replay { input: String },
    /// Aggregate a synthetic overlapping stream
    Simulate {
        #[arg(long, value_delimiter = ',', default_value = "teensy")]
        sensors: Vec<String>,
        #[arg(long, default_value_t = 100)]
        chunks: usize,
        #[arg(long, default_value_t = 500)]
        samples_per_chunk: usize,
        #[arg(long, default_value_t = 50)]
        overlap: usize,
        #[arg(long, default_value_t = 0.0005)]
        spike_probability: f64,
        #[arg(long, default_value_t = 7)]
        seed: u64,
    },
}
fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AggregatorConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AggregatorConfig::default(),
    };
    if let Some(dir) = &cli.png_dir {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    match cli.command {
        Commands::Replay { input } => replay(&input, config, cli.png_dir.as_deref()),
        Commands::Simulate {
            sensors,
            chunks,
            samples_per_chunk,
            overlap,
            spike_probability,
            seed,
        } => {
            if !(0.0..=1.0).contains(&spike_probability) {
                bail!("spike probability must be within [0, 1], got {spike_probability}");
            }
            let settings = SimulationSettings {
                sensors,
                chunks,
                samples_per_chunk,
                overlap: overlap.min(samples_per_chunk.saturating_sub(1)),
                tick_scale: config.tick_scale,
                spike_probability,
                seed,
                ..SimulationSettings::default()
            };
            simulate(settings, config, cli.png_dir.as_deref())
        }
    }
}
fn replay(input: &str, config: AggregatorConfig, png_dir: Option<&Path>) -> Result<()> {
    let reader: Box<dyn BufRead> = if input == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        Box::new(BufReader::new(
            File::open(input).with_context(|| format!("opening {input}"))?,
        ))
    };
    let mut session = Session::new(config)?;
    for (lineno, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading line {}", lineno + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        match session.handle_line(&line, Instant::now()) {
            Ok(SessionEvent::Projection {
                sensor,
                frame_number,
                projection,
                overlay,
            }) => {
                summarize(&sensor, &projection);
                if let Some(overlay) = overlay {
                    info!("{sensor} frame {frame_number} overlay {:?}", overlay.opacities);
                }
                let tic = Instant::now();
                write_png(png_dir, &sensor, &projection)?;
                session.record_draw(&sensor, tic.elapsed());
            }
            Ok(SessionEvent::Image { sensor, frame_number, .. }) => {
                info!("{sensor} frame {frame_number}: image frame passed through");
            }
            Ok(SessionEvent::Rejected {
                sensor,
                frame_number,
                reason,
            }) => warn!("{sensor} frame {frame_number} rejected: {reason}"),
            Ok(_) => {}
            Err(err) => warn!("line {}: {err}", lineno + 1),
        }
    }
    let reports = session.timing_reports();
    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}
fn simulate(
    settings: SimulationSettings,
    config: AggregatorConfig,
    png_dir: Option<&Path>,
) -> Result<()> {
    let mut source = SimulatedSource::new(settings);
    let mut aggregator = TelemetryAggregator::new(config)?;
    while let Some((sensor, chunk)) = source.next_chunk()? {
        match aggregator.ingest(&sensor, chunk) {
            Ok(projection) => summarize(&sensor, &projection),
            Err(err) => warn!("{sensor}: {err}"),
        }
    }
    for sensor in aggregator.sensors() {
        let Some(record) = aggregator.record(sensor) else {
            continue;
        };
        println!(
            "{sensor}: merged {} rejected {} spikes {} (+{} at chunk start) span {:.3} baselines {:?}",
            record.chunks_merged,
            record.chunks_rejected,
            record.spikes_corrected,
            record.boundary_spikes,
            record.buffer.span(),
            record.calibration.baselines(),
        );
        if let Some(projection) = aggregator.latest_projection(sensor) {
            write_png(png_dir, sensor, &projection)?;
        }
    }
    Ok(())
}
fn summarize(sensor: &str, projection: &Projection) {
    let extent = projection.extent;
    info!(
        "{sensor}: {} samples, x [{:.3}, {:.3}] y [{:.3}, {:.3}] range {:.3}",
        projection.len(),
        extent.x_min,
        extent.x_max,
        extent.y_min,
        extent.y_max,
        projection.calibration_range
    );
}
fn write_png(dir: Option<&Path>, sensor: &str, projection: &Projection) -> Result<()> {
    let Some(dir) = dir else {
        return Ok(());
    };
    if projection.is_empty() {
        return Ok(());
    }
    let png = render_projection_png(projection, sensor, PlotStyle::default())?;
    let path = dir.join(format!("{sensor}.png"));
    fs::write(&path, png).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
