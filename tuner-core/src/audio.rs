//! # Audio Device Module
//!
//! Real-time audio through CPAL (Cross-Platform Audio Library), in both
//! directions:
//! - Input: the default microphone, mixed to mono and sliced into fixed
//!   analysis frames
//! - Output: a sine reference tone and a short in-tune chime
//!
//! Streams are opened and kept on dedicated worker threads. Callers talk to
//! them through channels and atomics only.

use std::f32::consts::TAU;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample};
use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, info, warn};

use crate::error::TunerError;
use crate::feedback::AudibleFeedback;

/// How long a worker may take to open its device before giving up.
pub const DEVICE_OPEN_TIMEOUT: Duration = Duration::from_secs(5);

const CHIME_FREQUENCY_HZ: f32 = 880.0;
const CHIME_SECONDS: f32 = 0.25;
const TONE_AMPLITUDE: f32 = 0.2;
const CHIME_AMPLITUDE: f32 = 0.3;

/// A worker thread that owns an audio stream until told to shut down.
#[derive(Debug)]
pub struct AudioWorker {
    shutdown_tx: Sender<()>,
    thread_handle: Option<JoinHandle<()>>,
}

impl AudioWorker {
    /// Spawns a worker and waits for it to report whether its device opened.
    ///
    /// `body` opens the device, reports the sample rate through `ready`, and
    /// then runs until `shutdown` fires.
    pub fn spawn<F>(name: &str, body: F) -> Result<(Self, u32), TunerError>
    where
        F: FnOnce(Sender<Result<u32, String>>, Receiver<()>) + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);

        let thread_handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(ready_tx, shutdown_rx))
            .map_err(|e| TunerError::AudioUnavailable(e.to_string()))?;

        let mut worker = Self {
            shutdown_tx,
            thread_handle: Some(thread_handle),
        };

        match ready_rx.recv_timeout(DEVICE_OPEN_TIMEOUT) {
            Ok(Ok(sample_rate)) => Ok((worker, sample_rate)),
            Ok(Err(message)) => {
                worker.stop();
                Err(TunerError::AudioUnavailable(message))
            }
            Err(_) => {
                // The thread is stuck inside the driver; detach rather than join.
                worker.thread_handle.take();
                Err(TunerError::AudioUnavailable(format!(
                    "{name} did not open its device in time"
                )))
            }
        }
    }

    /// Signals shutdown and waits for the thread to release its stream.
    pub fn stop(&mut self) {
        let _ = self.shutdown_tx.try_send(());
        if let Some(handle) = self.thread_handle.take() {
            let name = handle.thread().name().unwrap_or("audio").to_string();
            if handle.join().is_err() {
                error!("[AUDIO] {} worker panicked", name);
            } else {
                debug!("[AUDIO] {} worker finished", name);
            }
        }
    }
}

impl Drop for AudioWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Opens the default input device and streams mono frames of `frame_size`
/// samples into `sender`.
///
/// Frames are dropped rather than queued when the receiver falls behind.
///
/// # Returns
/// * `Ok((stream, sample_rate))` - Running stream; drop it to stop capture
/// * `Err(e)` - No input device or no usable configuration
pub fn start_audio_capture(sender: Sender<Vec<f32>>, frame_size: usize) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))?;
    info!("[AUDIO] Using input device: {}", device.name()?);

    let supported = device.default_input_config()?;
    let sample_rate = supported.sample_rate().0;
    let format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();
    info!(
        "[AUDIO] Capture config: {} Hz, {} ch, {:?}",
        sample_rate, config.channels, format
    );

    let stream = match format {
        SampleFormat::F32 => build_input::<f32>(&device, &config, sender, frame_size)?,
        SampleFormat::I16 => build_input::<i16>(&device, &config, sender, frame_size)?,
        SampleFormat::U16 => build_input::<u16>(&device, &config, sender, frame_size)?,
        other => bail!("Unsupported input sample format {other:?}"),
    };
    stream.play()?;

    Ok((stream, sample_rate))
}

fn build_input<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sender: Sender<Vec<f32>>,
    frame_size: usize,
) -> Result<cpal::Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = usize::from(config.channels.max(1));
    let mut pending: Vec<f32> = Vec::with_capacity(frame_size * 2);

    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            pending.extend(data.chunks(channels).map(|frame| {
                frame.iter().map(|&s| f32::from_sample(s)).sum::<f32>() / frame.len() as f32
            }));

            while pending.len() >= frame_size {
                let frame = pending[..frame_size].to_vec();
                let _ = sender.try_send(frame);
                pending.drain(..frame_size);
            }
        },
        |err| error!("[AUDIO] Input stream error: {}", err),
        None,
    )?;
    Ok(stream)
}

/// Parameters shared between a [`TonePlayer`] and its audio callback.
#[derive(Debug)]
struct ToneControl {
    frequency_bits: AtomicU32,
    tone_on: AtomicBool,
    chime_remaining: AtomicU32,
}

impl ToneControl {
    fn frequency(&self) -> f32 {
        f32::from_bits(self.frequency_bits.load(Ordering::Relaxed))
    }

    /// Claims up to `frames` chime samples for one callback and returns the
    /// count that was pending before the claim.
    ///
    /// The decrement is a compare-and-swap, so a chime restarted while the
    /// callback runs is never overwritten.
    fn claim_chime(&self, frames: u32) -> u32 {
        self.chime_remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |remaining| {
                (remaining > 0).then(|| remaining.saturating_sub(frames))
            })
            .unwrap_or(0)
    }

    fn restart_chime(&self, samples: u32) {
        self.chime_remaining.store(samples, Ordering::Release);
    }
}

/// Plays the reference tone and the in-tune chime on the default output.
#[derive(Debug)]
pub struct TonePlayer {
    control: Arc<ToneControl>,
    sample_rate: u32,
    worker: AudioWorker,
}

impl TonePlayer {
    /// Opens the default output device on a worker thread.
    ///
    /// # Returns
    /// * `Err(TunerError::AudioUnavailable)` - No output device could be opened
    pub fn start() -> Result<Self, TunerError> {
        let control = Arc::new(ToneControl {
            frequency_bits: AtomicU32::new(440.0_f32.to_bits()),
            tone_on: AtomicBool::new(false),
            chime_remaining: AtomicU32::new(0),
        });

        let worker_control = Arc::clone(&control);
        let (worker, sample_rate) = AudioWorker::spawn("tone-output", move |ready, shutdown| {
            match open_output(worker_control) {
                Ok((stream, sample_rate)) => {
                    let _ = ready.send(Ok(sample_rate));
                    let _ = shutdown.recv();
                    if let Err(e) = stream.pause() {
                        warn!("[AUDIO] Error pausing output stream: {}", e);
                    }
                }
                Err(e) => {
                    let _ = ready.send(Err(e.to_string()));
                }
            }
        })?;

        Ok(Self {
            control,
            sample_rate,
            worker,
        })
    }

    pub fn stop(&mut self) {
        self.worker.stop();
    }
}

impl AudibleFeedback for TonePlayer {
    fn play_in_tune_sound(&mut self) {
        let samples = (self.sample_rate as f32 * CHIME_SECONDS) as u32;
        self.control.restart_chime(samples);
    }

    fn play_reference_tone(&mut self, frequency_hz: f64) {
        self.control
            .frequency_bits
            .store((frequency_hz as f32).to_bits(), Ordering::Relaxed);
        self.control.tone_on.store(true, Ordering::Relaxed);
    }

    fn stop_reference_tone(&mut self) {
        self.control.tone_on.store(false, Ordering::Relaxed);
    }
}

fn open_output(control: Arc<ToneControl>) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow!("No output device available"))?;
    info!("[AUDIO] Using output device: {}", device.name()?);

    let supported = device.default_output_config()?;
    let sample_rate = supported.sample_rate().0;
    let format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();

    let stream = match format {
        SampleFormat::F32 => build_output::<f32>(&device, &config, control)?,
        SampleFormat::I16 => build_output::<i16>(&device, &config, control)?,
        SampleFormat::U16 => build_output::<u16>(&device, &config, control)?,
        other => bail!("Unsupported output sample format {other:?}"),
    };
    stream.play()?;

    Ok((stream, sample_rate))
}

fn build_output<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    control: Arc<ToneControl>,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = usize::from(config.channels.max(1));
    let sample_rate = config.sample_rate.0 as f32;
    let chime_length = sample_rate * CHIME_SECONDS;
    let mut tone_phase = 0.0_f32;
    let mut chime_phase = 0.0_f32;

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let tone_on = control.tone_on.load(Ordering::Relaxed);
            let tone_step = TAU * control.frequency() / sample_rate;
            let chime_step = TAU * CHIME_FREQUENCY_HZ / sample_rate;
            let frames = u32::try_from(data.len() / channels).unwrap_or(u32::MAX);
            let mut chime_remaining = control.claim_chime(frames);

            for frame in data.chunks_mut(channels) {
                let mut value = 0.0;
                if tone_on {
                    value += TONE_AMPLITUDE * tone_phase.sin();
                    tone_phase = (tone_phase + tone_step) % TAU;
                }
                if chime_remaining > 0 {
                    let envelope = chime_remaining as f32 / chime_length;
                    value += CHIME_AMPLITUDE * envelope * chime_phase.sin();
                    chime_phase = (chime_phase + chime_step) % TAU;
                    chime_remaining -= 1;
                }
                frame.fill(T::from_sample(value));
            }
        },
        |err| error!("[AUDIO] Output stream error: {}", err),
        None,
    )?;
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn control() -> ToneControl {
        ToneControl {
            frequency_bits: AtomicU32::new(440.0_f32.to_bits()),
            tone_on: AtomicBool::new(false),
            chime_remaining: AtomicU32::new(0),
        }
    }

    #[test]
    fn chime_is_consumed_across_callbacks() {
        let control = control();
        control.restart_chime(1000);

        assert_eq!(control.claim_chime(512), 1000);
        assert_eq!(control.claim_chime(512), 488);
        assert_eq!(control.claim_chime(512), 0);
        assert_eq!(control.chime_remaining.load(Ordering::Acquire), 0);
    }

    #[test]
    fn chime_restarted_during_callback_is_kept() {
        let control = control();

        // Callback claims an idle chime, then the session fires a new one
        // before the callback returns.
        assert_eq!(control.claim_chime(512), 0);
        control.restart_chime(11_025);
        assert_eq!(control.chime_remaining.load(Ordering::Acquire), 11_025);
        assert_eq!(control.claim_chime(512), 11_025);
        assert_eq!(control.chime_remaining.load(Ordering::Acquire), 11_025 - 512);
    }

    #[test]
    fn failed_device_open_is_reported_as_unavailable() {
        let result = AudioWorker::spawn("failing-device", |ready, _shutdown| {
            let _ = ready.send(Err("no device".to_string()));
        });
        match result {
            Err(TunerError::AudioUnavailable(message)) => assert_eq!(message, "no device"),
            other => panic!("expected AudioUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn opened_worker_reports_sample_rate_and_stops() {
        let (mut worker, sample_rate) = AudioWorker::spawn("fake-device", |ready, shutdown| {
            let _ = ready.send(Ok(48_000));
            let _ = shutdown.recv();
        })
        .unwrap();
        assert_eq!(sample_rate, 48_000);
        worker.stop();
        assert!(worker.thread_handle.is_none());
    }
}
