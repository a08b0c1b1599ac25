//! # Frequency Analyzer
//!
//! The source of live frequency estimates. The session only consumes the
//! numbers; where they come from is behind [`FrequencyAnalyzer`].

use crossbeam_channel::Sender;
use log::{debug, info, warn};

use crate::audio::{self, AudioWorker};
use crate::error::TunerError;
use crate::pitch::{DEFAULT_AMPLITUDE_THRESHOLD, FRAME_SIZE, YinDetector};

/// Frames buffered between the audio callback and the detector.
const FRAME_QUEUE: usize = 8;

/// Anything that can deliver one frequency estimate per analysis frame.
pub trait FrequencyAnalyzer {
    /// Starts delivering estimates (Hz) into `sink`.
    ///
    /// # Returns
    /// * `Err(TunerError::AudioUnavailable)` - The input could not be opened; nothing will be delivered
    fn start(&mut self, sink: Sender<f64>) -> Result<(), TunerError>;

    /// Stops delivery and releases the input.
    fn stop(&mut self);

    fn is_running(&self) -> bool;
}

/// Live analyzer on the default microphone using YIN.
#[derive(Debug)]
pub struct MicrophoneAnalyzer {
    amplitude_threshold: f32,
    worker: Option<AudioWorker>,
}

impl MicrophoneAnalyzer {
    pub fn new() -> Self {
        Self::with_amplitude_threshold(DEFAULT_AMPLITUDE_THRESHOLD)
    }

    /// `amplitude_threshold` is the frame RMS below which nothing is reported.
    pub fn with_amplitude_threshold(amplitude_threshold: f32) -> Self {
        Self {
            amplitude_threshold,
            worker: None,
        }
    }
}

impl Default for MicrophoneAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrequencyAnalyzer for MicrophoneAnalyzer {
    fn start(&mut self, sink: Sender<f64>) -> Result<(), TunerError> {
        if self.worker.is_some() {
            return Ok(());
        }

        let amplitude_threshold = self.amplitude_threshold;
        let (worker, sample_rate) = AudioWorker::spawn("pitch-analyzer", move |ready, shutdown| {
            let (frame_tx, frame_rx) = crossbeam_channel::bounded::<Vec<f32>>(FRAME_QUEUE);

            let (stream, sample_rate) = match audio::start_audio_capture(frame_tx, FRAME_SIZE) {
                Ok(opened) => opened,
                Err(e) => {
                    let _ = ready.send(Err(e.to_string()));
                    return;
                }
            };
            let _ = ready.send(Ok(sample_rate));

            let mut detector = YinDetector::new(sample_rate, FRAME_SIZE, amplitude_threshold);
            loop {
                crossbeam_channel::select! {
                    recv(frame_rx) -> msg => match msg {
                        Ok(frame) => {
                            if let Some(frequency) = detector.detect(&frame) {
                                if sink.send(f64::from(frequency)).is_err() {
                                    debug!("[ANALYZER] Sample receiver dropped");
                                    break;
                                }
                            }
                        }
                        Err(_) => {
                            warn!("[ANALYZER] Audio channel closed");
                            break;
                        }
                    },
                    recv(shutdown) -> _ => break,
                }
            }
            drop(stream);
        })?;

        info!("[ANALYZER] Listening at {} Hz, {} samples per frame", sample_rate, FRAME_SIZE);
        self.worker = Some(worker);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.stop();
            info!("[ANALYZER] Stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.worker.is_some()
    }
}

impl Drop for MicrophoneAnalyzer {
    fn drop(&mut self) {
        self.stop();
    }
}
