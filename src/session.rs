//! Connection-scoped glue between the websocket protocol and the aggregator,
//! plus the frame timing bookkeeping the dashboard's demo mode reports.

use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde::Serialize;

use crate::config::AggregatorConfig;
use crate::stream::{BiotacOverlay, Projection, TelemetryAggregator, TelemetryError, BIOTAC_SENSOR};
use crate::wire::{self, FrameEvent, FramePayload, WireMessage};

const TIMING_HISTORY: usize = 512;

#[derive(Clone, Copy, Debug)]
struct FrameTiming {
    frame_number: u64,
    arrived: Instant,
}
/// Arrival and draw timings for one sensor, bounded to the most recent frames.
#[derive(Clone, Debug, Default)]
pub struct FrameTimings {
    frames: VecDeque<FrameTiming>,
    draws: VecDeque<Duration>,
    received: u64,
}
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct FpsReport {
    /// Frames the producer generated per second, from frame-number deltas.
    pub real_fps: f64,
    /// Frames that actually reached the dashboard per second.
    pub shown_fps: f64,
    pub mean_draw_ms: Option<f64>,
}
impl FrameTimings {
    pub fn record_frame(&mut self, frame_number: u64, arrived: Instant) {
        if self.frames.len() == TIMING_HISTORY {
            self.frames.pop_front();
        }
        self.frames.push_back(FrameTiming {
            frame_number,
            arrived,
        });
        self.received += 1;
    }
    pub fn record_draw(&mut self, elapsed: Duration) {
        if self.draws.len() == TIMING_HISTORY {
            self.draws.pop_front();
        }
        self.draws.push_back(elapsed);
    }
    pub fn received(&self) -> u64 {
        self.received
    }
    pub fn last_frame_number(&self) -> Option<u64> {
        self.frames.back().map(|f| f.frame_number)
    }
    /// `None` until at least two frames spanning a non-zero interval are recorded.
    pub fn report(&self) -> Option<FpsReport> {
        let first = self.frames.front()?;
        let last = self.frames.back()?;
        let elapsed = last.arrived.duration_since(first.arrived).as_secs_f64();
        if elapsed <= 0.0 {
            return None;
        }
        let frame_delta = last.frame_number.saturating_sub(first.frame_number) as f64;
        let mean_draw_ms = if self.draws.is_empty() {
            None
        } else {
            let total: Duration = self.draws.iter().sum();
            Some(total.as_secs_f64() * 1000.0 / self.draws.len() as f64)
        };
        Some(FpsReport {
            real_fps: frame_delta / elapsed,
            shown_fps: self.frames.len() as f64 / elapsed,
            mean_draw_ms,
        })
    }
}
/// What the session produced for one inbound line.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    Connected { connection_id: String },
    Projection {
        sensor: String,
        frame_number: u64,
        projection: Projection,
        overlay: Option<BiotacOverlay>,
    },
    Image {
        sensor: String,
        frame_number: u64,
        data_url: String,
    },
    /// The frame was unusable; the sensor's previous projection still stands.
    Rejected {
        sensor: String,
        frame_number: u64,
        reason: String,
    },
    Control { verb: String, body: String },
}
/// One dashboard connection. A `hello` starts a new session and clears all
/// telemetry state.
pub struct Session {
    aggregator: TelemetryAggregator,
    connection_id: Option<String>,
    timings: BTreeMap<String, FrameTimings>,
}
impl Session {
    pub fn new(config: AggregatorConfig) -> Result<Self, TelemetryError> {
        Ok(Self {
            aggregator: TelemetryAggregator::new(config)?,
            connection_id: None,
            timings: BTreeMap::new(),
        })
    }
    pub fn aggregator(&self) -> &TelemetryAggregator {
        &self.aggregator
    }
    pub fn connection_id(&self) -> Option<&str> {
        self.connection_id.as_deref()
    }
    pub fn timings(&self, sensor: &str) -> Option<&FrameTimings> {
        self.timings.get(sensor)
    }
    pub fn timing_reports(&self) -> BTreeMap<String, FpsReport> {
        self.timings
            .iter()
            .filter_map(|(sensor, t)| t.report().map(|r| (sensor.clone(), r)))
            .collect()
    }
    pub fn reset(&mut self) {
        self.aggregator.reset();
        self.timings.clear();
    }
    /// Handles one websocket line. Lines that cannot be parsed at all are errors;
    /// bad telemetry inside a well-formed frame becomes [`SessionEvent::Rejected`].
    pub fn handle_line(&mut self, line: &str, now: Instant) -> Result<SessionEvent, TelemetryError> {
        match wire::parse_line(line)? {
            WireMessage::Hello { connection_id } => {
                info!("new session {connection_id}");
                self.reset();
                self.connection_id = Some(connection_id.clone());
                Ok(SessionEvent::Connected { connection_id })
            }
            WireMessage::Frame(frame) => Ok(self.handle_frame(frame, now)),
            WireMessage::Control { verb, body } => {
                debug!("control message {verb}");
                if verb == "start" {
                    self.restart_sensor(body.trim());
                }
                Ok(SessionEvent::Control { verb, body })
            }
        }
    }
    pub fn handle_frame(&mut self, frame: FrameEvent, now: Instant) -> SessionEvent {
        self.timings
            .entry(frame.sensor.clone())
            .or_default()
            .record_frame(frame.frame_number, now);
        let tick_scale = self.aggregator.config().tick_scale;
        let decoded = frame
            .decode(tick_scale)
            .and_then(|payload| match payload {
                FramePayload::Image(data_url) => Ok(SessionEvent::Image {
                    sensor: frame.sensor.clone(),
                    frame_number: frame.frame_number,
                    data_url,
                }),
                FramePayload::Telemetry(chunk) => {
                    let projection = self.aggregator.ingest(&frame.sensor, chunk)?;
                    let overlay = (frame.sensor == BIOTAC_SENSOR)
                        .then(|| BiotacOverlay::from_projection(&projection));
                    Ok(SessionEvent::Projection {
                        sensor: frame.sensor.clone(),
                        frame_number: frame.frame_number,
                        projection,
                        overlay,
                    })
                }
            });
        decoded.unwrap_or_else(|err| {
            warn!(
                "frame {} from {} not applied: {err}",
                frame.frame_number, frame.sensor
            );
            SessionEvent::Rejected {
                sensor: frame.sensor.clone(),
                frame_number: frame.frame_number,
                reason: err.to_string(),
            }
        })
    }
    /// A started service brings a fresh clock, frame counter and possibly a new
    /// channel set, so its sensor starts over.
    fn restart_sensor(&mut self, sensor: &str) {
        let known = self.aggregator.reset_sensor(sensor);
        self.timings.remove(sensor);
        if known {
            info!("{sensor} started: telemetry state cleared");
        }
    }
    /// Records how long the renderer took to draw a sensor's latest projection.
    pub fn record_draw(&mut self, sensor: &str, elapsed: Duration) {
        self.timings
            .entry(sensor.to_owned())
            .or_default()
            .record_draw(elapsed);
    }
}
