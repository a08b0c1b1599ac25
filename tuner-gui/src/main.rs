//! # Soundwise Tuner - Instrument Tuning GUI
//!
//! The desktop front end for the Soundwise tuner. It owns one tuning session
//! and feeds it the frequencies coming off the microphone, while the user
//! picks an instrument, a string, the reference pitch and Auto/Manual mode.
//!
//! ## Architecture
//! - **Main Thread**: Iced GUI application and the tuning session
//! - **Analyzer Thread**: microphone capture and YIN pitch detection
//! - **Output Thread**: reference tone and in-tune chime
//! - **Communication**: Crossbeam channels for samples and notifications
//! - **Updates**: 60 FPS ticks drain the channels and drive the hold timer

mod ui;

use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use iced::{Element, Subscription, Task, Theme};
use log::{debug, error, info, warn};
use soundwise_core::analyzer::{FrequencyAnalyzer, MicrophoneAnalyzer};
use soundwise_core::audio::TonePlayer;
use soundwise_core::feedback::{AudibleFeedback, ChannelNotifier, Notification, SilentFeedback};
use soundwise_core::instrument::{self, DEFAULT_INSTRUMENT};
use soundwise_core::settings::{self, JsonSettingsStore, SettingsStore, TunerSettings};
use soundwise_core::{SessionConfig, TargetScaling, TunerError, TuningMode, TuningSession};
use ui::main_display::{TunerView, create_main_view};

/// How long a notification stays on screen.
const BANNER_DURATION: Duration = Duration::from_millis(3000);

/// Main entry point for the Soundwise tuner.
///
/// Initializes logging, opens the session from stored settings and runs the
/// Iced application with a dark theme and continuous updates.
pub fn main() -> iced::Result {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("[MAIN] Starting Soundwise tuner...");

    let app = match TunerApp::new() {
        Ok(app) => app,
        Err(e) => {
            error!("[MAIN] Could not open tuning session: {}", e);
            std::process::exit(1);
        }
    };

    let result = iced::application("Soundwise Tuner", TunerApp::update, TunerApp::view)
        .subscription(TunerApp::subscription)
        .theme(TunerApp::theme)
        .run_with(move || (app, Task::none()));
    info!("[MAIN] Application finished with result: {:?}", result);
    result
}

/// Application message types for the Iced GUI framework.
#[derive(Debug, Clone)]
pub enum Message {
    InstrumentSelected(&'static str),
    StringSelected(usize),
    AutoModeToggled(bool),
    FollowReferenceToggled(bool),
    ReferenceInputChanged(String),
    ReferenceSubmitted,

    // Continuous update message
    Tick,
}

/// A notification on screen until `expires`.
#[derive(Debug, Clone)]
struct Banner {
    text: String,
    expires: Instant,
}

struct TunerApp {
    session: TuningSession,
    analyzer: MicrophoneAnalyzer,
    samples: Receiver<f64>,
    notifications: Receiver<Notification>,

    settings_store: JsonSettingsStore,
    settings: TunerSettings,
    reference_input: String,
    reference_error: Option<String>,

    banner: Option<Banner>,
    audio_status: Option<String>,
}

impl TunerApp {
    /// Loads settings, opens the audio devices and starts listening.
    ///
    /// Missing audio devices are not fatal: without output the tuner is
    /// silent, without input it stays usable in Manual mode.
    fn new() -> Result<Self, TunerError> {
        let settings_store = JsonSettingsStore::from_env();
        let mut settings = settings_store.load().unwrap_or_else(|e| {
            warn!("[MAIN] Ignoring unreadable settings at {}: {}", settings_store.path().display(), e);
            TunerSettings::default()
        });
        if let Err(e) = instrument::get_profile(&settings.instrument) {
            warn!("[MAIN] {}; falling back to {}", e, DEFAULT_INSTRUMENT);
            settings.instrument = DEFAULT_INSTRUMENT.to_string();
        }

        let feedback: Box<dyn AudibleFeedback> = match TonePlayer::start() {
            Ok(player) => Box::new(player),
            Err(e) => {
                warn!("[MAIN] Reference tones disabled: {}", e);
                Box::new(SilentFeedback)
            }
        };
        let (notifier, notifications) = ChannelNotifier::new();
        let session = TuningSession::new(SessionConfig::from(&settings), feedback, Box::new(notifier))?;

        let (sample_tx, samples) = crossbeam_channel::unbounded();
        let mut analyzer = MicrophoneAnalyzer::new();
        let audio_status = match analyzer.start(sample_tx) {
            Ok(()) => None,
            Err(e) => {
                error!("[MAIN] Microphone unavailable: {}", e);
                Some(format!("Microphone unavailable: {e}. Manual mode still works."))
            }
        };

        info!("[MAIN] TunerApp created for {}", session.instrument_id());
        Ok(Self {
            reference_input: format!("{}", settings.reference_pitch.hz()),
            session,
            analyzer,
            samples,
            notifications,
            settings_store,
            settings,
            reference_error: None,
            banner: None,
            audio_status,
        })
    }

    /// Handles application state updates based on incoming messages.
    fn update(&mut self, message: Message) {
        match message {
            Message::Tick => self.process_tick(Instant::now()),
            Message::InstrumentSelected(id) => match self.session.set_instrument(id) {
                Ok(()) => {
                    self.settings.instrument = id.to_string();
                    self.banner = None;
                    self.persist();
                }
                Err(e) => warn!("[MAIN] {}", e),
            },
            Message::StringSelected(index) => {
                if let Err(e) = self.session.select_string(index) {
                    warn!("[MAIN] {}", e);
                }
                self.banner = None;
            }
            Message::AutoModeToggled(auto) => {
                let mode = if auto { TuningMode::Auto } else { TuningMode::Manual };
                self.session.set_mode(mode);
                self.settings.auto_mode = auto;
                self.banner = None;
                self.persist();
            }
            Message::FollowReferenceToggled(follow) => {
                let scaling = if follow {
                    TargetScaling::FollowReference
                } else {
                    TargetScaling::Fixed
                };
                self.session.set_target_scaling(scaling);
                self.settings.target_scaling = scaling;
                self.persist();
            }
            Message::ReferenceInputChanged(input) => {
                self.reference_input = input;
                self.reference_error = None;
            }
            Message::ReferenceSubmitted => match settings::parse_reference_input(&self.reference_input) {
                Ok(reference) => {
                    self.session.set_reference_pitch(reference);
                    self.settings.reference_pitch = reference;
                    self.reference_input = format!("{}", reference.hz());
                    if let Err(e) = self.settings_store.set_reference_pitch(reference) {
                        warn!("[MAIN] Could not save reference pitch: {}", e);
                    }
                }
                Err(_) => {
                    self.reference_error = Some(format!(
                        "A4 must be between {} and {} Hz",
                        settings::MIN_REFERENCE_HZ,
                        settings::MAX_REFERENCE_HZ
                    ));
                }
            },
        }
    }

    /// Drains analyzer samples and notifications, then drives the hold timer.
    fn process_tick(&mut self, now: Instant) {
        for frequency in self.samples.try_iter() {
            match self.session.on_frequency(frequency, now) {
                Ok(Some(advance)) => debug!("[MAIN] Advanced {:?}", advance),
                Ok(None) => {}
                Err(e) => debug!("[MAIN] Discarded sample: {}", e),
            }
        }
        if let Some(advance) = self.session.tick(now) {
            debug!("[MAIN] Advanced {:?}", advance);
        }

        for notification in self.notifications.try_iter() {
            self.banner = Some(Banner {
                text: notification.message(),
                expires: now + BANNER_DURATION,
            });
        }
        if self.banner.as_ref().is_some_and(|banner| banner.expires <= now) {
            self.banner = None;
        }
    }

    fn persist(&mut self) {
        if let Err(e) = self.settings_store.save(&self.settings) {
            warn!("[MAIN] Could not save settings: {}", e);
        }
    }

    /// Renders the main application interface.
    ///
    /// Delegates all UI rendering to the main_display module.
    fn view(&self) -> Element<'_, Message> {
        create_main_view(TunerView {
            reference_input: &self.reference_input,
            reference_error: self.reference_error.as_deref(),
            reference_hz: self.session.reference_pitch().hz(),
            auto_mode: self.session.mode() == TuningMode::Auto,
            follow_reference: self.session.target_scaling() == TargetScaling::FollowReference,
            instrument_id: self.session.instrument_id(),
            strings: &self.session.profile().strings,
            selected_string: self.session.selected_string_index(),
            target_hz: self.session.target_frequency(),
            sample: self.session.last_sample(),
            in_tune: self.session.is_in_tune(),
            banner: self.banner.as_ref().map(|banner| banner.text.as_str()),
            audio_status: self.audio_status.as_deref(),
        })
    }

    /// Fires every 16ms (60 FPS) to poll the analyzer and drive the hold timer.
    fn subscription(&self) -> Subscription<Message> {
        iced::time::every(Duration::from_millis(16)).map(|_| Message::Tick)
    }

    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

impl Drop for TunerApp {
    fn drop(&mut self) {
        info!("[MAIN] Shutting down audio...");
        self.analyzer.stop();
    }
}
