//! # Musical Tuning Module
//!
//! Maps a detected frequency to the nearest equal-tempered note and its
//! deviation in cents, relative to a configurable reference pitch (A4).
//!
//! ## Numbering
//! - Notes are numbered in semitones with the MIDI origin: A4 = 69, C4 = 60
//! - `name = CHROMATIC_NAMES[note_index mod 12]`
//! - `octave = floor(note_index / 12) - 1`
//!
//! ## Rounding
//! Both the semitone offset and the cents value round half away from zero.
//! Cents always land in `[-50, 50)`: a value that would round to +50 is
//! expressed as -50 against the next note up, so a frequency exactly between
//! two notes resolves to the upper one.

use serde::{Deserialize, Serialize};

use crate::error::TunerError;

/// Semitone number of A4 in the absolute numbering.
pub const A4_NOTE_INDEX: i32 = 69;

/// Conventional concert pitch.
pub const DEFAULT_REFERENCE_HZ: f64 = 440.0;

/// The twelve chromatic note names, starting at C.
pub const CHROMATIC_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// The frequency assigned to A4. Always positive and finite.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct ReferencePitch(f64);

impl ReferencePitch {
    /// Validates and wraps a reference pitch in Hz.
    pub fn new(hz: f64) -> Result<Self, TunerError> {
        if hz.is_finite() && hz > 0.0 {
            Ok(Self(hz))
        } else {
            Err(TunerError::InvalidReferencePitch(hz))
        }
    }

    pub fn hz(self) -> f64 {
        self.0
    }
}

impl Default for ReferencePitch {
    fn default() -> Self {
        Self(DEFAULT_REFERENCE_HZ)
    }
}

impl TryFrom<f64> for ReferencePitch {
    type Error = TunerError;

    fn try_from(hz: f64) -> Result<Self, Self::Error> {
        Self::new(hz)
    }
}

impl From<ReferencePitch> for f64 {
    fn from(pitch: ReferencePitch) -> Self {
        pitch.0
    }
}

impl std::fmt::Display for ReferencePitch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} Hz", self.0)
    }
}

/// One resolved analysis frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteSample {
    /// The frequency this sample was resolved from, in Hz.
    pub frequency_hz: f64,
    /// Absolute semitone number (A4 = 69).
    pub note_index: i32,
    /// Chromatic name without octave, e.g. "C#".
    pub name: &'static str,
    pub octave: i32,
    /// Signed deviation from the equal-tempered note, in `[-50, 50)`.
    pub cents_offset: i32,
}

impl NoteSample {
    /// Builds the sample shown while a reference tone is playing: the note
    /// nearest to `frequency_hz`, reported with no deviation.
    pub fn reference_tone(frequency_hz: f64, reference: ReferencePitch) -> Result<Self, TunerError> {
        let mut sample = resolve_note(frequency_hz, reference)?;
        sample.cents_offset = 0;
        Ok(sample)
    }

    /// Note name with octave, e.g. "A4" or "C#3".
    pub fn label(&self) -> String {
        format!("{}{}", self.name, self.octave)
    }
}

/// Resolves a frequency to the nearest equal-tempered note.
///
/// # Arguments
/// * `frequency_hz` - Detected frequency, must be positive and finite
/// * `reference` - Frequency of A4
///
/// # Returns
/// * `Ok(sample)` - Note, octave and cents deviation
/// * `Err(TunerError::InvalidFrequency)` - Non-positive or non-finite input
pub fn resolve_note(frequency_hz: f64, reference: ReferencePitch) -> Result<NoteSample, TunerError> {
    if !frequency_hz.is_finite() || frequency_hz <= 0.0 {
        return Err(TunerError::InvalidFrequency(frequency_hz));
    }

    // Subtracting logs stays finite where the ratio would underflow or overflow.
    let semitones = 12.0 * (frequency_hz.log2() - reference.hz().log2());
    if !semitones.is_finite() {
        return Err(TunerError::InvalidFrequency(frequency_hz));
    }
    let nearest = semitones.round();
    let mut cents_offset = (100.0 * (semitones - nearest)).round() as i32;
    let mut note_index = (nearest as i32)
        .checked_add(A4_NOTE_INDEX)
        .ok_or(TunerError::InvalidFrequency(frequency_hz))?;

    // Keep cents in [-50, 50) by moving the boundary onto the note index.
    if cents_offset >= 50 {
        note_index = note_index
            .checked_add(1)
            .ok_or(TunerError::InvalidFrequency(frequency_hz))?;
        cents_offset -= 100;
    }

    let (name, octave) = note_name_and_octave(note_index);
    Ok(NoteSample {
        frequency_hz,
        note_index,
        name,
        octave,
        cents_offset,
    })
}

/// Equal-tempered frequency of `note_index` for the given reference.
pub fn standard_frequency(note_index: i32, reference: ReferencePitch) -> f64 {
    reference.hz() * 2.0_f64.powf((f64::from(note_index) - f64::from(A4_NOTE_INDEX)) / 12.0)
}

/// Calculates the deviation from a target frequency in cents.
///
/// Positive values are sharp, negative values are flat. 100 cents make a
/// semitone, 1200 an octave.
pub fn calculate_cents_deviation(freq: f64, target_freq: f64) -> f64 {
    1200.0 * (freq / target_freq).log2()
}

/// Chromatic name and octave of an absolute note index.
pub fn note_name_and_octave(note_index: i32) -> (&'static str, i32) {
    let name = CHROMATIC_NAMES[note_index.rem_euclid(12) as usize];
    let octave = note_index.div_euclid(12) - 1;
    (name, octave)
}
