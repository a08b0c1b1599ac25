// tuner-core/src/lib.rs

//! The core logic for the Soundwise instrument tuner.
//! This crate resolves detected frequencies to notes, runs the string-by-string
//! tuning state machine, and provides the audio plumbing (microphone analysis,
//! reference tones) behind small traits. It is completely headless
//! and contains no GUI code.

pub mod analyzer;
pub mod audio;
pub mod debounce;
pub mod error;
pub mod feedback;
pub mod fft;
pub mod instrument;
pub mod pitch;
pub mod session;
pub mod settings;
pub mod tuning;

pub use error::{SettingsError, TunerError};
pub use instrument::{InstrumentProfile, StringTarget, TargetScaling, get_profile};
pub use session::{Advance, SessionConfig, TuningMode, TuningSession, TuningState};
pub use tuning::{NoteSample, ReferencePitch, resolve_note};
