/// Nearest-sample resampling to the 16 kHz rate the transcription engine
/// and analysis pipeline expect.
pub fn resample_to_16khz(samples: &[f32], source_rate: u32) -> Vec<f32> {
    if source_rate == 16_000 || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = source_rate as f64 / 16_000.0;
    let output_len = (samples.len() as f64 / ratio) as usize;

    (0..output_len)
        .map(|i| {
            let src = (i as f64 * ratio) as usize;
            samples.get(src).copied().unwrap_or(0.0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_at_16khz() {
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(resample_to_16khz(&samples, 16_000), samples);
    }

    #[test]
    fn halves_sample_count_from_32khz() {
        let samples: Vec<f32> = (0..64).map(|i| i as f32).collect();
        let out = resample_to_16khz(&samples, 32_000);
        assert_eq!(out.len(), 32);
        assert_eq!(out[1], 2.0);
    }

    #[test]
    fn empty_input_stays_empty() {
        assert!(resample_to_16khz(&[], 48_000).is_empty());
    }
}
