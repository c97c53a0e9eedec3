//! Microphone capture via cpal.
//!
//! Each `start` spawns a thread that owns the cpal stream (`cpal::Stream`
//! is not `Send`); the stream lives until the returned [`SampleStream`] is
//! closed or dropped. Samples are downmixed to mono and resampled to the
//! pipeline rate before they leave the audio callback.

use std::sync::mpsc as std_mpsc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, StreamConfig};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::error::VoiceError;
use crate::traits::{AudioCapture, CaptureConfig, SampleStream, StreamGuard};
use crate::utils::resample_to_16khz;

/// Default-input-device microphone backend.
pub struct CpalAudioCapture;

impl CpalAudioCapture {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CpalAudioCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioCapture for CpalAudioCapture {
    fn start(&mut self, config: &CaptureConfig) -> Result<SampleStream, VoiceError> {
        let target_rate = config.sample_rate;
        let (sample_tx, sample_rx) = mpsc::unbounded_channel::<Vec<f32>>();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<(), VoiceError>>();

        std::thread::spawn(move || {
            let host = cpal::default_host();
            let Some(device) = host.default_input_device() else {
                let _ = ready_tx.send(Err(VoiceError::DeviceUnavailable(
                    "no input device".into(),
                )));
                return;
            };

            match open_stream(&device, target_rate, sample_tx) {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    // The stream must outlive this scope; it is dropped (and
                    // the device released) when the guard signals stop.
                    let _keepalive = stream;
                    let _ = stop_rx.recv();
                    info!("microphone capture stopped");
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            }
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(VoiceError::DeviceUnavailable(
                    "capture thread failed to start".into(),
                ));
            }
        }

        let guard = StreamGuard::new(move || {
            let _ = stop_tx.send(());
        });
        Ok(SampleStream::new(target_rate, sample_rx, guard))
    }
}

fn open_stream(
    device: &Device,
    target_rate: u32,
    sample_tx: mpsc::UnboundedSender<Vec<f32>>,
) -> Result<cpal::Stream, VoiceError> {
    let supported: Vec<_> = device
        .supported_input_configs()
        .map_err(|e| VoiceError::PermissionDenied(format!("input configs unavailable: {e}")))?
        .filter(|c| c.channels() <= 2)
        .collect();

    let chosen = supported
        .iter()
        .find(|c| c.sample_format() == SampleFormat::F32)
        .or_else(|| supported.first())
        .ok_or_else(|| VoiceError::UnsupportedEnvironment("no usable input config".into()))?;

    let desired = cpal::SampleRate(target_rate);
    let sample_rate = if chosen.min_sample_rate() <= desired && desired <= chosen.max_sample_rate()
    {
        desired
    } else {
        chosen.min_sample_rate()
    };
    let channels = chosen.channels();
    let stream_config = StreamConfig {
        channels,
        sample_rate,
        buffer_size: cpal::BufferSize::Default,
    };
    let source_rate = sample_rate.0;

    let stream = match chosen.sample_format() {
        SampleFormat::F32 => build_stream::<f32>(
            device, &stream_config, channels, source_rate, target_rate, sample_tx, |s| s,
        ),
        SampleFormat::I16 => build_stream::<i16>(
            device, &stream_config, channels, source_rate, target_rate, sample_tx,
            |s| f32::from(s) / i16::MAX as f32,
        ),
        SampleFormat::U16 => build_stream::<u16>(
            device, &stream_config, channels, source_rate, target_rate, sample_tx,
            |s| (f32::from(s) - 32_768.0) / 32_767.0,
        ),
        SampleFormat::I32 => build_stream::<i32>(
            device, &stream_config, channels, source_rate, target_rate, sample_tx,
            |s| s as f32 / i32::MAX as f32,
        ),
        SampleFormat::F64 => build_stream::<f64>(
            device, &stream_config, channels, source_rate, target_rate, sample_tx,
            |s| s as f32,
        ),
        other => Err(VoiceError::UnsupportedEnvironment(format!(
            "sample format {other:?}"
        ))),
    }?;

    stream
        .play()
        .map_err(|e| VoiceError::DeviceUnavailable(format!("stream start: {e}")))?;
    info!(rate = source_rate, channels, "microphone capture running");
    Ok(stream)
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    channels: u16,
    source_rate: u32,
    target_rate: u32,
    sample_tx: mpsc::UnboundedSender<Vec<f32>>,
    convert: impl Fn(T) -> f32 + Send + 'static,
) -> Result<cpal::Stream, VoiceError>
where
    T: cpal::Sample + cpal::SizedSample + Send + 'static,
{
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let mono = downmix(data, channels, &convert);
                let batch = if source_rate == target_rate {
                    mono
                } else {
                    resample_to_16khz(&mono, source_rate)
                };
                if sample_tx.send(batch).is_err() {
                    warn!("capture stream consumer dropped");
                }
            },
            |e| error!("input stream error: {e}"),
            None,
        )
        .map_err(map_build_error)
}

fn downmix<T: Copy>(data: &[T], channels: u16, convert: &impl Fn(T) -> f32) -> Vec<f32> {
    if channels <= 1 {
        return data.iter().map(|&s| convert(s)).collect();
    }
    data.chunks(channels as usize)
        .map(|frame| frame.iter().map(|&s| convert(s)).sum::<f32>() / frame.len() as f32)
        .collect()
}

fn map_build_error(e: cpal::BuildStreamError) -> VoiceError {
    match e {
        cpal::BuildStreamError::DeviceNotAvailable => {
            VoiceError::DeviceUnavailable("input device disappeared".into())
        }
        cpal::BuildStreamError::StreamConfigNotSupported => {
            VoiceError::UnsupportedEnvironment("requested stream config rejected".into())
        }
        other => VoiceError::PermissionDenied(other.to_string()),
    }
}
