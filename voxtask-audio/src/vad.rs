//! Adaptive voice activity detection.
//!
//! Classifies analyzer frames as speech or silence against a threshold that
//! tracks background noise, and accumulates speech/silence phase durations
//! for the session controller. Speech requires both enough volume over the
//! noise-adapted threshold and a speech-shaped spectrum, so keyboard thumps
//! and hum don't trigger capture.

use std::collections::VecDeque;
use std::time::Duration;

use tracing::debug;

use crate::types::{AudioFrame, VadSnapshot};

/// Frequency band treated as human speech, in Hz.
const SPEECH_BAND_HZ: (f32, f32) = (300.0, 3400.0);

/// Band-to-total energy ratio above which a frame looks like speech.
const BAND_RATIO_THRESHOLD: f32 = 0.3;

/// Recent volume samples kept for the noise-floor estimate.
const NOISE_WINDOW: usize = 100;

/// Recent classifications kept for the confidence estimate.
const HISTORY_WINDOW: usize = 20;

#[derive(Debug, Clone)]
pub struct VadConfig {
    /// Detection sensitivity, 1 (least) to 5 (most). Higher values lower
    /// the speech threshold.
    pub sensitivity: u8,
    /// Sample rate the analyzed frames were computed at.
    pub sample_rate: u32,
    /// FFT window the frames were computed with; maps bins to frequencies.
    pub window_size: usize,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            sensitivity: 3,
            sample_rate: 16_000,
            window_size: 2048,
        }
    }
}

/// Speech boundary crossed while processing a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadTransition {
    SpeechStart,
    SpeechEnd,
}

pub struct AdaptiveVad {
    config: VadConfig,
    noise_samples: VecDeque<f32>,
    history: VecDeque<bool>,
    state: VadSnapshot,
}

impl AdaptiveVad {
    pub fn new(config: VadConfig) -> Self {
        let sensitivity = config.sensitivity.clamp(1, 5);
        Self {
            config: VadConfig {
                sensitivity,
                ..config
            },
            noise_samples: VecDeque::with_capacity(NOISE_WINDOW),
            history: VecDeque::with_capacity(HISTORY_WINDOW),
            state: VadSnapshot::default(),
        }
    }

    /// Classify one frame and advance the active phase duration by `elapsed`.
    pub fn process_frame(&mut self, frame: &AudioFrame, elapsed: Duration) -> Option<VadTransition> {
        let volume = frame.volume.clamp(0.0, 1.0);
        let noise_floor = self.noise_floor();
        let threshold = self.threshold(noise_floor);
        let is_speech = volume > threshold && self.looks_like_speech(frame, noise_floor);

        self.history.push_back(is_speech);
        if self.history.len() > HISTORY_WINDOW {
            self.history.pop_front();
        }

        // Only silence-classified frames feed the noise estimate, so the
        // speaker's own voice can never raise the floor.
        if !is_speech {
            self.noise_samples.push_back(volume);
            if self.noise_samples.len() > NOISE_WINDOW {
                self.noise_samples.pop_front();
            }
        }

        let was_speaking = self.state.is_speaking;
        self.state.is_speaking = is_speech;
        self.state.volume = volume;
        self.state.confidence = self.confidence();
        self.state.background_noise = self.noise_floor();

        let transition = match (was_speaking, is_speech) {
            (false, true) => {
                debug!(volume, threshold, "speech started");
                self.state.silence_duration = Duration::ZERO;
                Some(VadTransition::SpeechStart)
            }
            (true, false) => {
                debug!(
                    spoke_ms = self.state.speech_duration.as_millis() as u64,
                    "speech ended"
                );
                self.state.speech_duration = Duration::ZERO;
                Some(VadTransition::SpeechEnd)
            }
            _ => None,
        };

        if is_speech {
            self.state.speech_duration += elapsed;
        } else {
            self.state.silence_duration += elapsed;
        }

        transition
    }

    /// Current state. Reset to the zero snapshot when capture stops.
    pub fn snapshot(&self) -> &VadSnapshot {
        &self.state
    }

    /// The speech threshold the next frame will be judged against.
    pub fn current_threshold(&self) -> f32 {
        self.threshold(self.noise_floor())
    }

    /// Return to the zero state.
    pub fn reset(&mut self) {
        self.noise_samples.clear();
        self.history.clear();
        self.state = VadSnapshot::default();
    }

    fn threshold(&self, noise_floor: f32) -> f32 {
        let base = 0.01 + f32::from(5 - self.config.sensitivity) * 0.005;
        (base + (2.0 * noise_floor).max(0.005)).min(0.08)
    }

    /// Mean of the quietest 20% of recent silence-classified volumes.
    fn noise_floor(&self) -> f32 {
        if self.noise_samples.is_empty() {
            return 0.0;
        }
        let mut sorted: Vec<f32> = self.noise_samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let take = (sorted.len() / 5).max(1);
        sorted[..take].iter().sum::<f32>() / take as f32
    }

    /// Fraction of recent frames classified as speech, doubled and capped.
    /// Smooths single-frame jitter at speech boundaries.
    fn confidence(&self) -> f32 {
        if self.history.is_empty() {
            return 0.0;
        }
        let speech = self.history.iter().filter(|&&s| s).count() as f32;
        (2.0 * speech / self.history.len() as f32).min(1.0)
    }

    fn looks_like_speech(&self, frame: &AudioFrame, noise_floor: f32) -> bool {
        let bins = &frame.frequency_bins;
        if bins.is_empty() {
            // No spectral data: degrade to "no speech" rather than guess.
            return false;
        }

        let bin_width = self.config.sample_rate as f32 / self.config.window_size as f32;
        let lo = (SPEECH_BAND_HZ.0 / bin_width).floor() as usize;
        let hi = (((SPEECH_BAND_HZ.1 / bin_width).ceil() as usize) + 1).min(bins.len());
        if lo >= hi {
            return false;
        }

        let total: f32 = bins.iter().map(|m| m * m).sum();
        if total <= f32::EPSILON {
            return false;
        }
        let band: f32 = bins[lo..hi].iter().map(|m| m * m).sum();
        let ratio = band / total;
        let band_level = (band / (hi - lo) as f32).sqrt();

        ratio > BAND_RATIO_THRESHOLD || band_level > 3.0 * noise_floor
    }
}
