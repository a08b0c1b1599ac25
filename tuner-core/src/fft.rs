//! # FFT Correlation Module
//!
//! Computes the lagged cross-correlation the YIN difference function needs
//! in `O(n log n)` instead of `O(n²)`, using RustFFT. Plans and scratch
//! buffers are allocated once per frame size and reused for every frame.

use std::sync::Arc;

use rustfft::{Fft, FftPlanner, num_complex::Complex};

/// Removes the DC offset from a signal by making its average value zero.
pub fn remove_dc_offset(signal: &mut [f32]) {
    if signal.is_empty() {
        return;
    }
    let avg = signal.iter().sum::<f32>() / signal.len() as f32;
    if avg.abs() > 1e-6 {
        signal.iter_mut().for_each(|sample| *sample -= avg);
    }
}

/// Root-mean-square level of a frame.
pub fn rms(signal: &[f32]) -> f32 {
    if signal.is_empty() {
        return 0.0;
    }
    (signal.iter().map(|s| s * s).sum::<f32>() / signal.len() as f32).sqrt()
}

/// Correlates the first `window` samples of a frame against the whole frame.
///
/// For lag `tau < window` the result is `Σ x[i]·x[i + tau]` over `i < window`.
pub struct WindowCorrelator {
    frame_size: usize,
    window: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    head: Vec<Complex<f32>>,
    full: Vec<Complex<f32>>,
}

impl std::fmt::Debug for WindowCorrelator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowCorrelator")
            .field("frame_size", &self.frame_size)
            .field("window", &self.window)
            .finish()
    }
}

impl WindowCorrelator {
    /// # Arguments
    /// * `frame_size` - Samples per frame
    /// * `window` - Correlation window; lags `0..window` are produced. Must not exceed `frame_size / 2`.
    pub fn new(frame_size: usize, window: usize) -> Self {
        debug_assert!(window <= frame_size / 2);
        // Indices i + tau stay below frame_size, so a transform of at least
        // frame_size points never wraps.
        let transform_size = frame_size.next_power_of_two();
        let mut planner = FftPlanner::new();
        Self {
            frame_size,
            window,
            forward: planner.plan_fft_forward(transform_size),
            inverse: planner.plan_fft_inverse(transform_size),
            head: vec![Complex::default(); transform_size],
            full: vec![Complex::default(); transform_size],
        }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Writes the correlation for lags `0..window` into `out`.
    ///
    /// `frame` must hold exactly `frame_size` samples.
    pub fn correlate(&mut self, frame: &[f32], out: &mut Vec<f32>) {
        debug_assert_eq!(frame.len(), self.frame_size);
        let transform_size = self.head.len();

        for (i, slot) in self.head.iter_mut().enumerate() {
            let value = if i < self.window { frame[i] } else { 0.0 };
            *slot = Complex::new(value, 0.0);
        }
        for (i, slot) in self.full.iter_mut().enumerate() {
            let value = frame.get(i).copied().unwrap_or(0.0);
            *slot = Complex::new(value, 0.0);
        }

        self.forward.process(&mut self.head);
        self.forward.process(&mut self.full);

        // conj(H)·F in the frequency domain is the cross-correlation in time.
        for (h, f) in self.head.iter_mut().zip(self.full.iter()) {
            *h = h.conj() * f;
        }
        self.inverse.process(&mut self.head);

        let scale = 1.0 / transform_size as f32;
        out.clear();
        out.extend(self.head[..self.window].iter().map(|c| c.re * scale));
    }
}
