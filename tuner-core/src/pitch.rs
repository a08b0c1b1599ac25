//! # Pitch Detection Module
//!
//! YIN fundamental-frequency estimation over fixed-size frames. The
//! difference function is derived from an FFT cross-correlation, so a
//! 4096-sample frame costs a few transforms rather than millions of
//! multiply-adds.
//!
//! ## Steps
//! - Noise gate on frame RMS
//! - Difference function `d(τ) = e₀ + e_τ − 2·r(τ)`
//! - Cumulative mean normalization
//! - First dip under the clarity threshold, followed down to its minimum
//! - Parabolic interpolation for sub-sample period accuracy

use crate::fft::{self, WindowCorrelator};

/// Samples per analysis frame.
pub const FRAME_SIZE: usize = 4096;

/// Frames quieter than this RMS level are treated as silence.
pub const DEFAULT_AMPLITUDE_THRESHOLD: f32 = 0.01;

/// Normalized difference a dip must reach to count as periodic.
const CLARITY_THRESHOLD: f32 = 0.1;

/// Lowest frequency worth reporting.
const MIN_FREQUENCY_HZ: f32 = 20.0;

#[derive(Debug)]
pub struct YinDetector {
    sample_rate: u32,
    amplitude_threshold: f32,
    correlator: WindowCorrelator,
    frame: Vec<f32>,
    correlation: Vec<f32>,
    difference: Vec<f32>,
}

impl YinDetector {
    pub fn new(sample_rate: u32, frame_size: usize, amplitude_threshold: f32) -> Self {
        let window = frame_size / 2;
        Self {
            sample_rate,
            amplitude_threshold,
            correlator: WindowCorrelator::new(frame_size, window),
            frame: Vec::with_capacity(frame_size),
            correlation: Vec::with_capacity(window),
            difference: vec![0.0; window],
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frame_size(&self) -> usize {
        self.correlator.frame_size()
    }

    /// Estimates the fundamental frequency of one frame.
    ///
    /// # Returns
    /// * `Some(frequency)` - Detected frequency in Hz
    /// * `None` - Silence, noise, wrong frame length or no clear period
    pub fn detect(&mut self, signal: &[f32]) -> Option<f32> {
        if signal.len() != self.frame_size() {
            return None;
        }

        self.frame.clear();
        self.frame.extend_from_slice(signal);
        fft::remove_dc_offset(&mut self.frame);

        if fft::rms(&self.frame) < self.amplitude_threshold {
            return None;
        }

        self.fill_difference();
        let period = self.find_period()?;
        let frequency = self.sample_rate as f32 / period;

        (frequency.is_finite() && frequency > MIN_FREQUENCY_HZ).then_some(frequency)
    }

    /// Cumulative-mean-normalized difference function into `self.difference`.
    fn fill_difference(&mut self) {
        let window = self.correlator.window();
        self.correlator.correlate(&self.frame, &mut self.correlation);

        let frame = &self.frame;
        let head_energy = self.correlation[0];
        let mut lag_energy = head_energy;

        self.difference[0] = 1.0;
        let mut running_sum = 0.0;
        for tau in 1..window {
            // Slide the energy of frame[tau..tau + window].
            lag_energy += frame[tau + window - 1].powi(2) - frame[tau - 1].powi(2);
            let d = (head_energy + lag_energy - 2.0 * self.correlation[tau]).max(0.0);

            running_sum += d;
            self.difference[tau] = if running_sum > 0.0 {
                d * tau as f32 / running_sum
            } else {
                1.0
            };
        }
    }

    /// Interpolated period in samples, if the frame is clearly periodic.
    fn find_period(&self) -> Option<f32> {
        let d = &self.difference;
        let window = d.len();

        let mut tau = (2..window).find(|&tau| d[tau] < CLARITY_THRESHOLD)?;
        while tau + 1 < window && d[tau + 1] < d[tau] {
            tau += 1;
        }
        if tau + 1 >= window {
            return None;
        }

        let (y1, y2, y3) = (d[tau - 1], d[tau], d[tau + 1]);
        let curvature = y1 - 2.0 * y2 + y3;
        let shift = if curvature.abs() > f32::EPSILON {
            (y1 - y3) / (2.0 * curvature)
        } else {
            0.0
        };
        Some(tau as f32 + shift)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: u32 = 44_100;

    fn sine(freq: f32, amplitude: f32) -> Vec<f32> {
        (0..FRAME_SIZE)
            .map(|i| {
                amplitude
                    * (2.0 * std::f32::consts::PI * freq * i as f32 / SAMPLE_RATE as f32).sin()
            })
            .collect()
    }

    fn detector() -> YinDetector {
        YinDetector::new(SAMPLE_RATE, FRAME_SIZE, DEFAULT_AMPLITUDE_THRESHOLD)
    }

    #[test]
    fn detects_guitar_string_frequencies() {
        let mut yin = detector();
        for freq in [82.41, 110.0, 146.83, 196.0, 246.94, 329.63, 440.0] {
            let detected = yin.detect(&sine(freq, 0.5)).expect("tone should be detected");
            assert!(
                (detected - freq).abs() < 0.5,
                "expected {freq} Hz, detected {detected} Hz"
            );
        }
    }

    #[test]
    fn ignores_silence() {
        let mut yin = detector();
        assert_eq!(yin.detect(&vec![0.0; FRAME_SIZE]), None);
        assert_eq!(yin.detect(&sine(110.0, 0.001)), None);
    }

    #[test]
    fn rejects_wrong_frame_length() {
        let mut yin = detector();
        assert_eq!(yin.detect(&sine(110.0, 0.5)[..1024]), None);
    }

    #[test]
    fn harmonics_keep_the_fundamental() {
        let mut yin = detector();
        let fundamental = sine(110.0, 0.4);
        let second = sine(220.0, 0.3);
        let third = sine(330.0, 0.2);
        let tone: Vec<f32> = fundamental
            .iter()
            .zip(&second)
            .zip(&third)
            .map(|((a, b), c)| a + b + c)
            .collect();

        let detected = yin.detect(&tone).unwrap();
        assert!((detected - 110.0).abs() < 0.5, "detected {detected} Hz");
    }
}
