//! # Error Types
//!
//! Every failure in the tuner core is local and recoverable: a bad sample is
//! dropped, a bad lookup leaves the session as it was. Nothing here is fatal
//! to the process.

use thiserror::Error;

/// Errors raised by the note resolver, the profile table and the session.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TunerError {
    /// A frequency sample that is zero, negative, NaN or infinite.
    #[error("invalid frequency: {0} Hz")]
    InvalidFrequency(f64),

    /// A reference pitch (A4) that is not a positive finite number,
    /// or a user entry outside the accepted range.
    #[error("invalid reference pitch: {0} Hz")]
    InvalidReferencePitch(f64),

    /// Lookup of an instrument id that is not in the profile table.
    #[error("unknown instrument: {0}")]
    UnknownInstrument(String),

    #[error("string index {index} out of range for {instrument} ({count} strings)")]
    InvalidStringIndex {
        instrument: String,
        index: usize,
        count: usize,
    },

    /// The audio device could not be opened (no microphone, no output).
    #[error("audio unavailable: {0}")]
    AudioUnavailable(String),
}

/// Errors raised while loading or saving persisted settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Invalid(#[from] TunerError),
}
