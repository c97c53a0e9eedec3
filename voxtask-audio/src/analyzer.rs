//! Spectral analysis over the live sample stream.
//!
//! Produces one [`AudioFrame`] per processing tick: RMS volume over the
//! rolling window plus exponentially smoothed FFT magnitude bins.

use std::collections::VecDeque;
use std::sync::Arc;

use rustfft::{Fft, FftPlanner, num_complex::Complex};

use crate::types::AudioFrame;

/// Analysis tuning. The defaults come from common speech-capture setups;
/// treat them as configuration, not contracts.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// FFT window size in samples. Power of two.
    pub window_size: usize,
    /// Per-bin smoothing between frames: 0.0 keeps only the new frame,
    /// values toward 1.0 favor the previous one.
    pub smoothing: f32,
    /// Sample rate of the incoming stream.
    pub sample_rate: u32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            window_size: 2048,
            smoothing: 0.3,
            sample_rate: 16_000,
        }
    }
}

/// Rolling-window spectral analyzer. Pure math over pushed samples; all
/// state is the window itself plus the smoothed bins.
pub struct SpectralAnalyzer {
    config: AnalyzerConfig,
    fft: Arc<dyn Fft<f32>>,
    hann: Vec<f32>,
    window: VecDeque<f32>,
    smoothed: Vec<f32>,
}

impl SpectralAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        let n = config.window_size;
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(n);
        let hann = (0..n)
            .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (n - 1) as f32).cos()))
            .collect();

        Self {
            fft,
            hann,
            window: VecDeque::with_capacity(n),
            smoothed: vec![0.0; n / 2],
            config,
        }
    }

    /// Feed captured samples into the rolling window. The window is bounded
    /// by the FFT size; older samples fall off the front.
    pub fn push_samples(&mut self, samples: &[f32]) {
        for &sample in samples {
            if self.window.len() == self.config.window_size {
                self.window.pop_front();
            }
            self.window.push_back(sample);
        }
    }

    /// Compute the frame for the current window contents.
    ///
    /// Until a full window has been buffered only the volume is fresh; the
    /// bins keep their last (initially zero) values.
    pub fn analyze_frame(&mut self) -> AudioFrame {
        let volume = self.rms().clamp(0.0, 1.0);

        if self.window.len() < self.config.window_size {
            return AudioFrame {
                volume,
                frequency_bins: self.smoothed.clone(),
            };
        }

        let mut buffer: Vec<Complex<f32>> = self
            .window
            .iter()
            .zip(self.hann.iter())
            .map(|(&sample, &weight)| Complex::new(sample * weight, 0.0))
            .collect();
        self.fft.process(&mut buffer);

        let n = self.config.window_size as f32;
        let tau = self.config.smoothing;
        for (k, slot) in self.smoothed.iter_mut().enumerate() {
            let magnitude = buffer[k].norm() * 2.0 / n;
            *slot = tau * *slot + (1.0 - tau) * magnitude;
        }

        AudioFrame {
            volume,
            frequency_bins: self.smoothed.clone(),
        }
    }

    /// Frequency width of one bin in Hz.
    pub fn bin_width_hz(&self) -> f32 {
        self.config.sample_rate as f32 / self.config.window_size as f32
    }

    fn rms(&self) -> f32 {
        if self.window.is_empty() {
            return 0.0;
        }
        let sum_squares: f32 = self.window.iter().map(|s| s * s).sum();
        (sum_squares / self.window.len() as f32).sqrt()
    }
}
