//! Text protocol spoken by the rig's websocket.
//!
//! Every message is one line, `<verb> <args...>`. Sensor frames look like
//! `kick <sensor> <frame number> <payload>` where the payload is either a PNG data
//! URL or a JSON object of channel name -> fixed-point integer ticks.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::stream::{SampleChunk, TelemetryError};

const IMAGE_PREFIX: &str = "data:image/png";
const CONTROL_VERBS: [&str; 8] = [
    "msg", "prompt", "panic", "flow", "start", "stop", "diskfree", "location",
];

#[derive(Clone, Debug, PartialEq)]
pub enum WireMessage {
    /// Server greeting carrying this connection's id; starts a new session.
    Hello { connection_id: String },
    Frame(FrameEvent),
    /// Dashboard traffic that never touches telemetry state.
    Control { verb: String, body: String },
}
/// One `kick` message, payload not yet decoded.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameEvent {
    pub sensor: String,
    pub frame_number: u64,
    pub payload: String,
}
#[derive(Clone, Debug, PartialEq)]
pub enum FramePayload {
    /// Camera frames go straight to the renderer.
    Image(String),
    Telemetry(SampleChunk),
}
impl FrameEvent {
    pub fn is_image(&self) -> bool {
        self.payload.starts_with(IMAGE_PREFIX)
    }
    pub fn decode(&self, tick_scale: f64) -> Result<FramePayload, TelemetryError> {
        if self.is_image() {
            return Ok(FramePayload::Image(self.payload.clone()));
        }
        decode_telemetry(&self.payload, tick_scale).map(FramePayload::Telemetry)
    }
}
pub fn parse_line(line: &str) -> Result<WireMessage, TelemetryError> {
    let line = line.trim_end_matches(['\r', '\n']);
    let (verb, rest) = line.split_once(' ').unwrap_or((line, ""));
    match verb {
        "hello" => {
            let connection_id = rest.split_whitespace().next().unwrap_or_default();
            if connection_id.is_empty() {
                return Err(TelemetryError::MalformedFrame(
                    "hello without connection id".into(),
                ));
            }
            Ok(WireMessage::Hello {
                connection_id: connection_id.to_owned(),
            })
        }
        "kick" => {
            let mut parts = rest.splitn(3, ' ');
            let (Some(sensor), Some(frame), Some(payload)) =
                (parts.next(), parts.next(), parts.next())
            else {
                return Err(TelemetryError::MalformedFrame(format!(
                    "kick needs sensor, frame number and payload: {}",
                    preview(line)
                )));
            };
            let frame_number = frame.parse().map_err(|_| {
                TelemetryError::MalformedFrame(format!("bad frame number {frame:?}"))
            })?;
            Ok(WireMessage::Frame(FrameEvent {
                sensor: sensor.to_owned(),
                frame_number,
                payload: payload.to_owned(),
            }))
        }
        v if CONTROL_VERBS.contains(&v) => Ok(WireMessage::Control {
            verb: v.to_owned(),
            body: rest.to_owned(),
        }),
        _ => Err(TelemetryError::MalformedFrame(format!(
            "unknown message: {}",
            preview(line)
        ))),
    }
}
/// Decodes a JSON telemetry payload, dividing every tick by `tick_scale`.
///
/// Ticks are integers on the wire, so equal ticks always decode to bit-identical
/// times and overlap lookup can compare timestamps exactly.
pub fn decode_telemetry(payload: &str, tick_scale: f64) -> Result<SampleChunk, TelemetryError> {
    let raw: BTreeMap<String, Vec<Value>> = serde_json::from_str(payload)?;
    let mut named = BTreeMap::new();
    for (name, values) in raw {
        let decoded = values
            .iter()
            .enumerate()
            .map(|(index, v)| {
                if let Some(tick) = v.as_i64() {
                    Ok(tick as f64 / tick_scale)
                } else if let Some(x) = v.as_f64() {
                    Ok(x / tick_scale)
                } else {
                    Err(TelemetryError::NonNumeric {
                        channel: name.clone(),
                        index,
                    })
                }
            })
            .collect::<Result<Vec<f64>, _>>()?;
        named.insert(name, decoded);
    }
    SampleChunk::from_named(named)
}
fn preview(line: &str) -> &str {
    match line.char_indices().nth(50) {
        Some((idx, _)) => &line[..idx],
        None => line,
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn parses_telemetry_kick() {
        let msg = parse_line(r#"kick teensy 12 {"t":[0,1000,2000],"x":[10000,-500,3]}"#).unwrap();
        let WireMessage::Frame(frame) = msg else {
            panic!("expected frame");
        };
        assert_eq!(frame.sensor, "teensy");
        assert_eq!(frame.frame_number, 12);
        let FramePayload::Telemetry(chunk) = frame.decode(1000.0).unwrap() else {
            panic!("expected telemetry");
        };
        assert_eq!(chunk.time, vec![0.0, 1.0, 2.0]);
        assert_eq!(chunk.channel("x").unwrap(), &[10.0, -0.5, 0.003]);
    }
    #[test]
    fn image_payload_bypasses_decoding() {
        let msg = parse_line("kick bluefox 3 data:image/png;base64,AAAA").unwrap();
        let WireMessage::Frame(frame) = msg else {
            panic!("expected frame");
        };
        assert!(frame.is_image());
        assert_eq!(
            frame.decode(1000.0).unwrap(),
            FramePayload::Image("data:image/png;base64,AAAA".into())
        );
    }
    #[test]
    fn non_numeric_values_are_rejected() {
        let err = decode_telemetry(r#"{"t":[0,1],"x":[1,"oops"]}"#, 1000.0).unwrap_err();
        assert!(matches!(err, TelemetryError::NonNumeric { index: 1, .. }));
        let err = decode_telemetry(r#"{"x":[1]}"#, 1000.0).unwrap_err();
        assert!(matches!(err, TelemetryError::MissingTimeAxis(_)));
        let err = decode_telemetry("not json", 1000.0).unwrap_err();
        assert!(matches!(err, TelemetryError::MalformedFrame(_)));
    }
    #[test]
    fn equal_ticks_decode_to_equal_times() {
        let a = decode_telemetry(r#"{"t":[1700,1720]}"#, 1000.0).unwrap();
        let b = decode_telemetry(r#"{"t":[1720,1740]}"#, 1000.0).unwrap();
        assert_eq!(a.time[1].to_bits(), b.time[0].to_bits());
    }
    #[test]
    fn control_and_hello_messages() {
        assert_eq!(
            parse_line("hello 42").unwrap(),
            WireMessage::Hello {
                connection_id: "42".into()
            }
        );
        assert_eq!(
            parse_line("start teensy").unwrap(),
            WireMessage::Control {
                verb: "start".into(),
                body: "teensy".into()
            }
        );
        assert!(parse_line("kick teensy").is_err());
        assert!(parse_line("kick teensy x {}").is_err());
        assert!(parse_line("bogus").is_err());
    }
}
