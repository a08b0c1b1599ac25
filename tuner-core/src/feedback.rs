//! # Feedback and Notification Seams
//!
//! The session never plays audio or shows messages itself. It calls out to
//! an [`AudibleFeedback`] and a [`Notifier`], which the front end provides.

use crossbeam_channel::{Receiver, Sender};
use log::debug;

/// Sounds the tuner makes.
pub trait AudibleFeedback: Send {
    /// One-shot cue when a string comes into tune.
    fn play_in_tune_sound(&mut self);
    /// Starts (or retunes) the continuous reference tone.
    fn play_reference_tone(&mut self, frequency_hz: f64);
    fn stop_reference_tone(&mut self);
}

/// Messages the tuner shows.
pub trait Notifier: Send {
    fn notify_in_tune(&mut self, string_label: &str);
    fn notify_tuning_complete(&mut self);
}

/// A notification as delivered over a [`ChannelNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    InTune(String),
    TuningComplete,
}

impl Notification {
    /// The user-facing text.
    pub fn message(&self) -> String {
        match self {
            Notification::InTune(label) => format!("{label} is in tune!"),
            Notification::TuningComplete => {
                "Tuning Complete! All strings are now in tune!".to_string()
            }
        }
    }
}

/// Forwards notifications over a crossbeam channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: Sender<Notification>,
}

impl ChannelNotifier {
    /// Creates a notifier and the receiver that drains it.
    pub fn new() -> (Self, Receiver<Notification>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        (Self { sender }, receiver)
    }

    fn send(&self, notification: Notification) {
        // A dropped receiver means nobody is looking; nothing to report.
        if self.sender.send(notification).is_err() {
            debug!("[NOTIFY] receiver dropped, notification discarded");
        }
    }
}

impl Notifier for ChannelNotifier {
    fn notify_in_tune(&mut self, string_label: &str) {
        self.send(Notification::InTune(string_label.to_string()));
    }

    fn notify_tuning_complete(&mut self) {
        self.send(Notification::TuningComplete);
    }
}

/// Feedback for hosts without an audio output device.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentFeedback;

impl AudibleFeedback for SilentFeedback {
    fn play_in_tune_sound(&mut self) {}

    fn play_reference_tone(&mut self, _frequency_hz: f64) {}

    fn stop_reference_tone(&mut self) {}
}
