use thiserror::Error;
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("chunk has no time axis channel \"{0}\"")]
    MissingTimeAxis(&'static str),
    #[error("chunk has an empty time axis")]
    EmptyChunk,
    #[error("channel {channel} has {actual} samples, time axis has {expected}")]
    LengthMismatch {
        channel: String,
        expected: usize,
        actual: usize,
    },
    #[error("time axis decreases at index {index}")]
    TimeNotMonotonic { index: usize },
    #[error("channel set mismatch: buffer has [{expected}], chunk has [{actual}]")]
    ChannelSetMismatch { expected: String, actual: String },
    #[error("channel {channel} contains a non-finite value at index {index}")]
    NonFinite { channel: String, index: usize },
    #[error("channel {channel} contains a non-numeric value at index {index}")]
    NonNumeric { channel: String, index: usize },
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to render plot: {0}")]
    Plot(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
impl TelemetryError {
    /// True for errors that mean the inbound chunk itself was unusable.
    pub fn is_malformed_chunk(&self) -> bool {
        matches!(
            self,
            TelemetryError::MissingTimeAxis(_)
                | TelemetryError::EmptyChunk
                | TelemetryError::LengthMismatch { .. }
                | TelemetryError::TimeNotMonotonic { .. }
                | TelemetryError::ChannelSetMismatch { .. }
                | TelemetryError::NonFinite { .. }
                | TelemetryError::NonNumeric { .. }
                | TelemetryError::MalformedFrame(_)
        )
    }
}
impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for TelemetryError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        TelemetryError::Plot(format!("{value:?}"))
    }
}
impl From<image::ImageError> for TelemetryError {
    fn from(value: image::ImageError) -> Self {
        TelemetryError::Plot(value.to_string())
    }
}
impl From<serde_json::Error> for TelemetryError {
    fn from(value: serde_json::Error) -> Self {
        TelemetryError::MalformedFrame(value.to_string())
    }
}
