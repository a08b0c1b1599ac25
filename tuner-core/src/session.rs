//! # Tuning Session
//!
//! The state machine behind the tuner screen. It consumes one frequency
//! sample at a time, decides when the selected string is in tune, holds that
//! result for a debounce period and then moves on to the next string.
//!
//! ## States
//! - `Listening`: comparing each sample against the selected string
//! - `InTune`: a sample landed within tolerance; the hold timer is running and
//!   further samples cannot cancel or retrigger it
//! - `Advancing`: the hold expired; the session moves to the next string (or
//!   wraps to the first and reports completion) and returns to `Listening`.
//!   This state only lasts for the call that advances; callers observe it as
//!   the returned [`Advance`]
//!
//! Manual mode bypasses detection entirely: selecting a string plays its
//! reference tone and nothing ever advances on its own.
//!
//! The session has exactly one owner. Time is passed in with every call.

use std::time::{Duration, Instant};

use log::{debug, info};

use crate::debounce::{DebounceTimer, IN_TUNE_HOLD};
use crate::error::TunerError;
use crate::feedback::{AudibleFeedback, Notifier};
use crate::instrument::{self, DEFAULT_INSTRUMENT, InstrumentProfile, StringTarget, TargetScaling};
use crate::tuning::{self, NoteSample, ReferencePitch};

/// Maximum distance from the target, in Hz, that counts as in tune.
pub const IN_TUNE_TOLERANCE_HZ: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TuningMode {
    /// Live detection with automatic advance.
    #[default]
    Auto,
    /// Reference tones only.
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuningState {
    Listening,
    InTune,
    Advancing,
}

/// Report of one pass through `Advancing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advance {
    pub from: usize,
    pub to: usize,
    /// The last string was tuned and the selection wrapped to the first.
    pub completed: bool,
}

/// Everything needed to open a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub instrument: String,
    pub mode: TuningMode,
    pub reference_pitch: ReferencePitch,
    pub target_scaling: TargetScaling,
    pub tolerance_hz: f64,
    pub hold: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            instrument: DEFAULT_INSTRUMENT.to_string(),
            mode: TuningMode::Auto,
            reference_pitch: ReferencePitch::default(),
            target_scaling: TargetScaling::Fixed,
            tolerance_hz: IN_TUNE_TOLERANCE_HZ,
            hold: IN_TUNE_HOLD,
        }
    }
}

pub struct TuningSession {
    profile: &'static InstrumentProfile,
    selected_string_index: usize,
    mode: TuningMode,
    state: TuningState,
    is_in_tune: bool,
    last_sample: Option<NoteSample>,
    reference_pitch: ReferencePitch,
    target_scaling: TargetScaling,
    tolerance_hz: f64,
    timer: DebounceTimer,
    feedback: Box<dyn AudibleFeedback>,
    notifier: Box<dyn Notifier>,
}

impl std::fmt::Debug for TuningSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TuningSession")
            .field("instrument", &self.profile.id)
            .field("selected_string_index", &self.selected_string_index)
            .field("mode", &self.mode)
            .field("state", &self.state)
            .field("is_in_tune", &self.is_in_tune)
            .field("reference_pitch", &self.reference_pitch)
            .finish_non_exhaustive()
    }
}

impl TuningSession {
    /// Opens a session on the first string of the configured instrument.
    ///
    /// # Returns
    /// * `Err(TunerError::UnknownInstrument)` - The configured instrument is not in the table
    pub fn new(
        config: SessionConfig,
        feedback: Box<dyn AudibleFeedback>,
        notifier: Box<dyn Notifier>,
    ) -> Result<Self, TunerError> {
        let profile = instrument::get_profile(&config.instrument)?;
        info!(
            "[SESSION] Opened for {} at A4 = {}, mode {:?}",
            profile.id, config.reference_pitch, config.mode
        );
        Ok(Self {
            profile,
            selected_string_index: 0,
            mode: config.mode,
            state: TuningState::Listening,
            is_in_tune: false,
            last_sample: None,
            reference_pitch: config.reference_pitch,
            target_scaling: config.target_scaling,
            tolerance_hz: config.tolerance_hz,
            timer: DebounceTimer::new(config.hold),
            feedback,
            notifier,
        })
    }

    pub fn instrument_id(&self) -> &'static str {
        self.profile.id
    }

    pub fn profile(&self) -> &'static InstrumentProfile {
        self.profile
    }

    pub fn selected_string_index(&self) -> usize {
        self.selected_string_index
    }

    pub fn selected_string(&self) -> &'static StringTarget {
        &self.profile.strings[self.selected_string_index]
    }

    /// Target frequency of the selected string under the current reference.
    pub fn target_frequency(&self) -> f64 {
        self.selected_string()
            .target_frequency(self.reference_pitch, self.target_scaling)
    }

    pub fn mode(&self) -> TuningMode {
        self.mode
    }

    pub fn state(&self) -> TuningState {
        self.state
    }

    pub fn is_in_tune(&self) -> bool {
        self.is_in_tune
    }

    pub fn last_sample(&self) -> Option<&NoteSample> {
        self.last_sample.as_ref()
    }

    pub fn reference_pitch(&self) -> ReferencePitch {
        self.reference_pitch
    }

    pub fn target_scaling(&self) -> TargetScaling {
        self.target_scaling
    }

    /// Time left on the in-tune hold, if it is running.
    pub fn hold_remaining(&self, now: Instant) -> Option<Duration> {
        self.timer.remaining(now)
    }

    /// Feeds one detected frequency into the session.
    ///
    /// An expired hold is processed before the sample, so a sample never
    /// observes a stale `InTune` state.
    ///
    /// # Returns
    /// * `Ok(Some(advance))` - The hold expired and the selection moved
    /// * `Ok(None)` - Sample processed, no advance
    /// * `Err(TunerError::InvalidFrequency)` - Sample discarded, state untouched
    pub fn on_frequency(&mut self, frequency_hz: f64, now: Instant) -> Result<Option<Advance>, TunerError> {
        let sample = tuning::resolve_note(frequency_hz, self.reference_pitch)?;
        let advance = self.tick(now);

        if self.mode == TuningMode::Manual {
            return Ok(advance);
        }

        self.last_sample = Some(sample);
        if self.state == TuningState::Listening {
            let target = self.target_frequency();
            if (frequency_hz - target).abs() <= self.tolerance_hz {
                self.enter_in_tune(now);
            }
        }
        Ok(advance)
    }

    /// Processes hold expiry. Call regularly between samples.
    pub fn tick(&mut self, now: Instant) -> Option<Advance> {
        if self.state == TuningState::InTune && self.timer.fire(now) {
            Some(self.advance())
        } else {
            None
        }
    }

    /// Selects a string by index.
    ///
    /// Any running hold is dropped. In Manual mode the string's reference tone
    /// starts and `last_sample` shows the target with zero deviation.
    pub fn select_string(&mut self, index: usize) -> Result<(), TunerError> {
        let Some(string) = self.profile.string(index) else {
            return Err(TunerError::InvalidStringIndex {
                instrument: self.profile.id.to_string(),
                index,
                count: self.profile.string_count(),
            });
        };

        self.reset_detection();
        self.selected_string_index = index;
        debug!("[SESSION] Selected string {} ({})", index, string.label);

        if self.mode == TuningMode::Manual {
            let frequency = self.target_frequency();
            self.feedback.play_reference_tone(frequency);
            self.last_sample = Some(NoteSample::reference_tone(frequency, self.reference_pitch)?);
        }
        Ok(())
    }

    pub fn set_mode(&mut self, mode: TuningMode) {
        if mode == self.mode {
            return;
        }
        if self.mode == TuningMode::Manual {
            self.feedback.stop_reference_tone();
        }
        self.reset_detection();
        self.mode = mode;
        info!("[SESSION] Mode changed to {:?}", mode);
    }

    /// Switches instrument and returns to its first string.
    ///
    /// The last sample is cleared since it belongs to the old instrument.
    /// On `UnknownInstrument` the session is left exactly as it was.
    pub fn set_instrument(&mut self, id: &str) -> Result<(), TunerError> {
        let profile = instrument::get_profile(id)?;
        if self.mode == TuningMode::Manual {
            self.feedback.stop_reference_tone();
        }
        self.reset_detection();
        self.last_sample = None;
        self.profile = profile;
        self.selected_string_index = 0;
        info!("[SESSION] Instrument changed to {}", profile.id);
        Ok(())
    }

    /// Takes effect from the next sample; the selected string is kept.
    pub fn set_reference_pitch(&mut self, reference_pitch: ReferencePitch) {
        self.reference_pitch = reference_pitch;
        info!("[SESSION] Reference pitch set to {}", reference_pitch);
    }

    pub fn set_target_scaling(&mut self, target_scaling: TargetScaling) {
        self.target_scaling = target_scaling;
        debug!("[SESSION] Target scaling set to {:?}", target_scaling);
    }

    /// Ends the session: drops any pending hold and silences the tone.
    pub fn close(mut self) {
        self.timer.cancel();
        self.feedback.stop_reference_tone();
        info!("[SESSION] Closed");
    }

    fn enter_in_tune(&mut self, now: Instant) {
        let label = self.selected_string().label;
        debug!("[SESSION] Listening -> InTune on {}", label);
        self.state = TuningState::InTune;
        self.is_in_tune = true;
        self.feedback.play_in_tune_sound();
        self.notifier.notify_in_tune(label);
        self.timer.start(now);
    }

    fn advance(&mut self) -> Advance {
        self.state = TuningState::Advancing;
        let from = self.selected_string_index;
        let completed = from >= self.profile.last_index();

        if completed {
            info!("[SESSION] All {} strings tuned", self.profile.string_count());
            self.notifier.notify_tuning_complete();
            self.selected_string_index = 0;
        } else {
            self.selected_string_index += 1;
        }

        debug!("[SESSION] Advancing {} -> {}", from, self.selected_string_index);
        self.state = TuningState::Listening;
        self.is_in_tune = false;

        Advance {
            from,
            to: self.selected_string_index,
            completed,
        }
    }

    fn reset_detection(&mut self) {
        self.timer.cancel();
        self.state = TuningState::Listening;
        self.is_in_tune = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::{ChannelNotifier, Notification};
    use crossbeam_channel::Receiver;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    enum Sound {
        InTune,
        Tone(f64),
        Stop,
    }

    #[derive(Clone, Default)]
    struct RecordingFeedback(Arc<Mutex<Vec<Sound>>>);

    impl RecordingFeedback {
        fn sounds(&self) -> Vec<Sound> {
            self.0.lock().unwrap().clone()
        }
    }

    impl AudibleFeedback for RecordingFeedback {
        fn play_in_tune_sound(&mut self) {
            self.0.lock().unwrap().push(Sound::InTune);
        }

        fn play_reference_tone(&mut self, frequency_hz: f64) {
            self.0.lock().unwrap().push(Sound::Tone(frequency_hz));
        }

        fn stop_reference_tone(&mut self) {
            self.0.lock().unwrap().push(Sound::Stop);
        }
    }

    fn session_with(
        config: SessionConfig,
    ) -> (TuningSession, RecordingFeedback, Receiver<Notification>) {
        let feedback = RecordingFeedback::default();
        let (notifier, notifications) = ChannelNotifier::new();
        let session =
            TuningSession::new(config, Box::new(feedback.clone()), Box::new(notifier)).unwrap();
        (session, feedback, notifications)
    }

    fn guitar_session() -> (TuningSession, RecordingFeedback, Receiver<Notification>) {
        session_with(SessionConfig::default())
    }

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn starts_listening_on_first_string() {
        let (session, _, _) = guitar_session();
        assert_eq!(session.state(), TuningState::Listening);
        assert_eq!(session.selected_string_index(), 0);
        assert_eq!(session.target_frequency(), 82.41);
        assert!(!session.is_in_tune());
        assert!(session.last_sample().is_none());
    }

    #[test]
    fn unknown_configured_instrument_fails() {
        let feedback = RecordingFeedback::default();
        let (notifier, _) = ChannelNotifier::new();
        let config = SessionConfig {
            instrument: "kazoo".to_string(),
            ..SessionConfig::default()
        };
        let result = TuningSession::new(config, Box::new(feedback), Box::new(notifier));
        assert!(matches!(result, Err(TunerError::UnknownInstrument(_))));
    }

    #[test]
    fn sample_within_tolerance_enters_in_tune_once() {
        let (mut session, feedback, notifications) = guitar_session();
        let start = Instant::now();

        session.on_frequency(82.9, start).unwrap();
        assert_eq!(session.state(), TuningState::InTune);
        assert!(session.is_in_tune());
        assert_eq!(session.hold_remaining(start), Some(IN_TUNE_HOLD));

        // Jitter while held does not retrigger the cue or the timer.
        session.on_frequency(82.5, start + ms(50)).unwrap();
        session.on_frequency(83.0, start + ms(100)).unwrap();

        assert_eq!(feedback.sounds(), vec![Sound::InTune]);
        assert_eq!(
            notifications.try_iter().collect::<Vec<_>>(),
            vec![Notification::InTune("E (Low)".to_string())]
        );
        assert_eq!(session.hold_remaining(start + ms(100)), Some(IN_TUNE_HOLD - ms(100)));
    }

    #[test]
    fn tolerance_boundary_is_inclusive() {
        let (mut session, _, _) = guitar_session();
        session.select_string(1).unwrap();
        assert_eq!(session.target_frequency(), 110.0);

        session.on_frequency(111.01, Instant::now()).unwrap();
        assert_eq!(session.state(), TuningState::Listening);
        session.on_frequency(108.99, Instant::now()).unwrap();
        assert_eq!(session.state(), TuningState::Listening);

        session.on_frequency(111.0, Instant::now()).unwrap();
        assert_eq!(session.state(), TuningState::InTune);

        let (mut session, _, _) = guitar_session();
        session.select_string(1).unwrap();
        session.on_frequency(109.0, Instant::now()).unwrap();
        assert_eq!(session.state(), TuningState::InTune);
    }

    #[test]
    fn sample_outside_tolerance_keeps_listening() {
        let (mut session, feedback, _) = guitar_session();
        session.on_frequency(83.5, Instant::now()).unwrap();
        assert_eq!(session.state(), TuningState::Listening);
        assert!(!session.is_in_tune());
        assert!(feedback.sounds().is_empty());
        assert_eq!(session.last_sample().unwrap().label(), "E2");
    }

    #[test]
    fn hold_expiry_advances_to_next_string() {
        let (mut session, _, _) = guitar_session();
        let start = Instant::now();
        session.on_frequency(82.41, start).unwrap();

        assert_eq!(session.tick(start + ms(2999)), None);
        let advance = session.tick(start + ms(3000));
        assert_eq!(
            advance,
            Some(Advance {
                from: 0,
                to: 1,
                completed: false
            })
        );
        assert_eq!(session.state(), TuningState::Listening);
        assert!(!session.is_in_tune());
        assert_eq!(session.target_frequency(), 110.0);
    }

    #[test]
    fn transient_hit_does_not_advance_before_hold_elapses() {
        let (mut session, _, _) = guitar_session();
        session.select_string(1).unwrap();
        let start = Instant::now();

        session.on_frequency(110.2, start).unwrap();
        session.on_frequency(150.0, start + ms(46)).unwrap();

        assert_eq!(session.tick(start + ms(100)), None);
        assert_eq!(session.tick(start + ms(2900)), None);
        assert_eq!(session.selected_string_index(), 1);

        // Once in tune, the hold runs regardless of later samples.
        assert!(session.tick(start + ms(3000)).is_some());
        assert_eq!(session.selected_string_index(), 2);
    }

    #[test]
    fn expiry_is_processed_before_the_next_sample() {
        let (mut session, _, _) = guitar_session();
        let start = Instant::now();
        session.on_frequency(82.41, start).unwrap();

        // First sample after the hold: advance, then evaluate against string 1.
        let advance = session.on_frequency(110.0, start + ms(3100)).unwrap();
        assert_eq!(advance.map(|a| a.to), Some(1));
        assert_eq!(session.state(), TuningState::InTune);
    }

    #[test]
    fn last_string_wraps_and_reports_completion() {
        let (mut session, _, notifications) = guitar_session();
        session.select_string(5).unwrap();
        let start = Instant::now();

        session.on_frequency(329.63, start).unwrap();
        let advance = session.tick(start + IN_TUNE_HOLD).unwrap();

        assert!(advance.completed);
        assert_eq!(advance.from, 5);
        assert_eq!(session.selected_string_index(), 0);

        let received: Vec<_> = notifications.try_iter().collect();
        assert_eq!(
            received,
            vec![
                Notification::InTune("E (High)".to_string()),
                Notification::TuningComplete
            ]
        );
    }

    #[test]
    fn invalid_sample_leaves_state_untouched() {
        let (mut session, _, _) = guitar_session();
        let start = Instant::now();
        session.on_frequency(100.0, start).unwrap();
        let before = session.last_sample().cloned();

        for bad in [0.0, -82.41, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                session.on_frequency(bad, start),
                Err(TunerError::InvalidFrequency(_))
            ));
        }
        assert_eq!(session.last_sample().cloned(), before);
        assert_eq!(session.state(), TuningState::Listening);
    }

    #[test]
    fn switching_instrument_resets_to_first_string() {
        let (mut session, _, _) = guitar_session();
        let start = Instant::now();
        session.select_string(3).unwrap();
        session.on_frequency(196.0, start).unwrap();
        assert_eq!(session.state(), TuningState::InTune);

        session.set_instrument("ukulele").unwrap();
        assert_eq!(session.instrument_id(), "ukulele");
        assert_eq!(session.selected_string_index(), 0);
        assert_eq!(session.state(), TuningState::Listening);
        assert_eq!(session.target_frequency(), 196.0);

        // The old hold was cancelled with the switch.
        assert_eq!(session.tick(start + IN_TUNE_HOLD), None);
    }

    #[test]
    fn unknown_instrument_keeps_session() {
        let (mut session, _, _) = guitar_session();
        session.select_string(2).unwrap();

        assert_eq!(
            session.set_instrument("kazoo"),
            Err(TunerError::UnknownInstrument("kazoo".to_string()))
        );
        assert_eq!(session.instrument_id(), "guitar");
        assert_eq!(session.selected_string_index(), 2);
    }

    #[test]
    fn out_of_range_string_is_rejected() {
        let (mut session, _, _) = guitar_session();
        session.select_string(4).unwrap();
        assert!(matches!(
            session.select_string(6),
            Err(TunerError::InvalidStringIndex { index: 6, count: 6, .. })
        ));
        assert_eq!(session.selected_string_index(), 4);
    }

    #[test]
    fn manual_mode_plays_reference_and_never_advances() {
        let (mut session, feedback, notifications) = guitar_session();
        session.set_mode(TuningMode::Manual);
        session.select_string(1).unwrap();

        let sample = session.last_sample().unwrap();
        assert_eq!(sample.frequency_hz, 110.0);
        assert_eq!(sample.cents_offset, 0);
        assert_eq!(sample.label(), "A2");
        assert!(!session.is_in_tune());

        let start = Instant::now();
        session.on_frequency(110.0, start).unwrap();
        assert_eq!(session.state(), TuningState::Listening);
        assert_eq!(session.tick(start + IN_TUNE_HOLD * 2), None);
        assert_eq!(session.selected_string_index(), 1);

        assert_eq!(feedback.sounds(), vec![Sound::Tone(110.0)]);
        assert!(notifications.try_iter().next().is_none());
    }

    #[test]
    fn manual_instrument_switch_clears_old_reference_sample() {
        let (mut session, feedback, _) = guitar_session();
        session.set_mode(TuningMode::Manual);
        session.select_string(4).unwrap();
        assert_eq!(session.last_sample().unwrap().label(), "B3");

        session.set_instrument("ukulele").unwrap();
        assert!(session.last_sample().is_none());
        assert_eq!(session.selected_string_index(), 0);
        assert_eq!(feedback.sounds(), vec![Sound::Tone(246.94), Sound::Stop]);
    }

    #[test]
    fn leaving_manual_mode_stops_tone() {
        let (mut session, feedback, _) = guitar_session();
        session.set_mode(TuningMode::Manual);
        session.select_string(0).unwrap();
        session.set_mode(TuningMode::Auto);
        session.set_mode(TuningMode::Auto);

        assert_eq!(feedback.sounds(), vec![Sound::Tone(82.41), Sound::Stop]);
    }

    #[test]
    fn entering_manual_mode_cancels_hold() {
        let (mut session, _, _) = guitar_session();
        let start = Instant::now();
        session.on_frequency(82.41, start).unwrap();
        session.set_mode(TuningMode::Manual);

        assert!(!session.is_in_tune());
        assert_eq!(session.tick(start + IN_TUNE_HOLD), None);
        assert_eq!(session.selected_string_index(), 0);
    }

    #[test]
    fn reference_change_keeps_selection_and_fixed_targets() {
        let (mut session, _, _) = guitar_session();
        session.select_string(1).unwrap();
        session.set_reference_pitch(ReferencePitch::new(442.0).unwrap());

        assert_eq!(session.selected_string_index(), 1);
        assert_eq!(session.target_frequency(), 110.0);

        session.on_frequency(110.0, Instant::now()).unwrap();
        assert_eq!(session.last_sample().unwrap().cents_offset, -8);
    }

    #[test]
    fn following_reference_moves_targets() {
        let (mut session, _, _) = session_with(SessionConfig {
            target_scaling: TargetScaling::FollowReference,
            reference_pitch: ReferencePitch::new(442.0).unwrap(),
            ..SessionConfig::default()
        });
        session.select_string(1).unwrap();
        assert!((session.target_frequency() - 110.5).abs() < 1e-9);

        // 109.4 Hz is within 1 Hz of the fixed target but not the scaled one.
        session.on_frequency(109.4, Instant::now()).unwrap();
        assert_eq!(session.state(), TuningState::Listening);
    }

    #[test]
    fn close_silences_tone() {
        let (mut session, feedback, _) = guitar_session();
        session.set_mode(TuningMode::Manual);
        session.select_string(2).unwrap();
        session.close();
        assert_eq!(feedback.sounds(), vec![Sound::Tone(146.83), Sound::Stop]);
    }
}
