//! Error types for device configuration
//!
//! `RecorderError` covers everything that can go wrong during an exchange with
//! the device. Domain violations are split out into `ValidationError` so callers
//! can tell "the value was bad" apart from "the device misbehaved".

/// Error type for re.corder operations
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("No MIDI port found matching pattern: {0}")]
    NoMatchingPort(String),

    #[error("No SysEx response from device")]
    NoSysexResponse,

    /// Device replied with a failure status, or with something that did not
    /// echo the command. The raw reply payload is kept for diagnostics.
    #[error("{message}")]
    FailedRequest { message: String, payload: Vec<u8> },

    #[error("Invalid value: {0}")]
    Validation(#[from] ValidationError),

    #[error("MIDI connection error: {0}")]
    Connection(String),

    #[error("MIDI transport error: {0}")]
    Transport(String),
}

impl RecorderError {
    /// Build a `FailedRequest` carrying the raw reply payload
    pub fn failed(message: impl Into<String>, payload: &[u8]) -> Self {
        Self::FailedRequest {
            message: message.into(),
            payload: payload.to_vec(),
        }
    }

    /// Raw reply payload, if the device answered at all
    pub fn payload(&self) -> Option<&[u8]> {
        match self {
            Self::FailedRequest { payload, .. } => Some(payload),
            _ => None,
        }
    }
}

/// A field value outside its admissible domain
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Bad MIDI channel: {0} (expected 1-16)")]
    MidiChannel(u8),

    #[error("Bad threshold value: {0} (expected 601-16383)")]
    Threshold(u16),

    #[error("Bad velocity value: {0} (expected 0-127)")]
    Velocity(u8),

    #[error("Bad CC controller: {0} (expected 0-127)")]
    ControllerNumber(u8),

    #[error("Bad accelerometer smoothing value: {0} (expected 0-4)")]
    Smoothing(u8),

    #[error("Unknown {kind}: {name}")]
    UnknownName { kind: &'static str, name: String },

    #[error("Bad fingering chart length: {0} (expected 1-62 entries)")]
    ChartLength(usize),

    #[error("Bad fingering: {0}")]
    Fingering(String),

    #[error("Bad note: {0}")]
    Note(String),

    #[error("Bad packed fingering record: {0}")]
    Record(String),

    #[error("Bad keyboard chart: {0}")]
    KeyboardChart(String),

    #[error("Chart does not match user mode {0}")]
    ChartMode(String),
}

pub type Result<T> = std::result::Result<T, RecorderError>;
