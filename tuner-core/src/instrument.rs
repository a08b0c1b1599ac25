//! # Instrument Profile Table
//!
//! Static, read-only string tables for the supported instruments. Target
//! frequencies are the equal-tempered values at A4 = 440 Hz, listed low to
//! high in the order a player tunes them.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::TunerError;
use crate::tuning::{DEFAULT_REFERENCE_HZ, ReferencePitch};

/// Instrument selected when nothing else is configured.
pub const DEFAULT_INSTRUMENT: &str = "guitar";

/// A single string and the pitch it should be tuned to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StringTarget {
    /// Label shown on the string button, e.g. "E (Low)".
    pub label: &'static str,
    /// Scientific note name, e.g. "E2".
    pub note: &'static str,
    /// Target frequency at A4 = 440 Hz.
    pub target_frequency_hz: f64,
}

/// How string targets react to a reference pitch other than 440 Hz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetScaling {
    /// Use the table values as they are.
    #[default]
    Fixed,
    /// Scale every target by `reference / 440`.
    FollowReference,
}

impl StringTarget {
    /// Target frequency under the given reference pitch and scaling policy.
    pub fn target_frequency(&self, reference: ReferencePitch, scaling: TargetScaling) -> f64 {
        match scaling {
            TargetScaling::Fixed => self.target_frequency_hz,
            TargetScaling::FollowReference => {
                self.target_frequency_hz * reference.hz() / DEFAULT_REFERENCE_HZ
            }
        }
    }

    /// The label without its "(Low)"/"(High)" qualifier.
    pub fn display_note(&self) -> &'static str {
        self.label.split(' ').next().unwrap_or(self.label)
    }
}

/// An instrument and its strings, ordered low to high.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentProfile {
    pub id: &'static str,
    pub display_name: &'static str,
    pub strings: Vec<StringTarget>,
}

impl InstrumentProfile {
    pub fn string(&self, index: usize) -> Option<&StringTarget> {
        self.strings.get(index)
    }

    pub fn string_count(&self) -> usize {
        self.strings.len()
    }

    pub fn last_index(&self) -> usize {
        self.strings.len().saturating_sub(1)
    }
}

const fn target(label: &'static str, note: &'static str, target_frequency_hz: f64) -> StringTarget {
    StringTarget {
        label,
        note,
        target_frequency_hz,
    }
}

static PROFILES: Lazy<Vec<InstrumentProfile>> = Lazy::new(|| {
    vec![
        InstrumentProfile {
            id: "guitar",
            display_name: "Guitar",
            strings: vec![
                target("E (Low)", "E2", 82.41),
                target("A", "A2", 110.00),
                target("D", "D3", 146.83),
                target("G", "G3", 196.00),
                target("B", "B3", 246.94),
                target("E (High)", "E4", 329.63),
            ],
        },
        InstrumentProfile {
            id: "ukulele",
            display_name: "Ukulele",
            strings: vec![
                target("G", "G3", 196.00),
                target("C", "C4", 261.63),
                target("E", "E4", 329.63),
                target("A", "A4", 440.00),
            ],
        },
    ]
});

/// All profiles in display order.
pub fn profiles() -> &'static [InstrumentProfile] {
    &PROFILES
}

/// Looks up a profile by id.
///
/// # Returns
/// * `Ok(profile)` - The static profile
/// * `Err(TunerError::UnknownInstrument)` - No profile has this id
pub fn get_profile(id: &str) -> Result<&'static InstrumentProfile, TunerError> {
    PROFILES
        .iter()
        .find(|profile| profile.id == id)
        .ok_or_else(|| TunerError::UnknownInstrument(id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuning::resolve_note;

    #[test]
    fn guitar_has_six_strings_low_to_high() {
        let guitar = get_profile("guitar").unwrap();
        let labels: Vec<_> = guitar.strings.iter().map(|s| s.label).collect();
        assert_eq!(labels, ["E (Low)", "A", "D", "G", "B", "E (High)"]);
        assert!(
            guitar
                .strings
                .windows(2)
                .all(|w| w[0].target_frequency_hz < w[1].target_frequency_hz)
        );
        assert_eq!(guitar.last_index(), 5);
    }

    #[test]
    fn ukulele_starts_on_g() {
        let ukulele = get_profile("ukulele").unwrap();
        assert_eq!(ukulele.string_count(), 4);
        assert_eq!(ukulele.strings[0].label, "G");
        assert_eq!(ukulele.strings[0].target_frequency_hz, 196.0);
        assert_eq!(ukulele.strings[3].target_frequency_hz, 440.0);
    }

    #[test]
    fn unknown_instrument_is_rejected() {
        assert_eq!(
            get_profile("kazoo"),
            Err(TunerError::UnknownInstrument("kazoo".to_string()))
        );
    }

    #[test]
    fn table_notes_match_their_frequencies() {
        let reference = ReferencePitch::default();
        for profile in profiles() {
            for string in &profile.strings {
                let sample = resolve_note(string.target_frequency_hz, reference).unwrap();
                assert_eq!(sample.label(), string.note, "{} {}", profile.id, string.label);
                assert_eq!(sample.cents_offset, 0);
            }
        }
    }

    #[test]
    fn fixed_targets_ignore_reference() {
        let a_string = &get_profile("guitar").unwrap().strings[1];
        let reference = ReferencePitch::new(442.0).unwrap();
        assert_eq!(a_string.target_frequency(reference, TargetScaling::Fixed), 110.0);
    }

    #[test]
    fn following_targets_scale_with_reference() {
        let a_string = &get_profile("guitar").unwrap().strings[1];
        let reference = ReferencePitch::new(442.0).unwrap();
        let scaled = a_string.target_frequency(reference, TargetScaling::FollowReference);
        assert!((scaled - 110.5).abs() < 1e-9);
    }

    #[test]
    fn display_note_strips_qualifier() {
        let guitar = get_profile("guitar").unwrap();
        assert_eq!(guitar.strings[0].display_note(), "E");
        assert_eq!(guitar.strings[5].display_note(), "E");
        assert_eq!(guitar.strings[1].display_note(), "A");
    }
}
