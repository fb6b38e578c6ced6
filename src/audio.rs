//! Raw backend output → canonical PCM.
//!
//! Backends hand back whatever their graph produced. [`normalize`] checks it
//! is a single 1-D waveform, converts it to clipped float32 and carries the
//! backend's declared sample rate along. Nothing here resamples.

use crate::error::{TtsError, TtsResult};

/// Sample storage as produced by a backend.
#[derive(Debug, Clone, PartialEq)]
pub enum RawSamples {
    F32(Vec<f32>),
    F64(Vec<f64>),
    I16(Vec<i16>),
    I32(Vec<i32>),
}

impl RawSamples {
    pub fn len(&self) -> usize {
        match self {
            RawSamples::F32(v) => v.len(),
            RawSamples::F64(v) => v.len(),
            RawSamples::I16(v) => v.len(),
            RawSamples::I32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Untouched inference output: flat samples plus the tensor shape they came in.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAudio {
    pub shape: Vec<usize>,
    pub samples: RawSamples,
}

impl RawAudio {
    /// A 1-D float waveform.
    pub fn mono(samples: Vec<f32>) -> Self {
        Self { shape: vec![samples.len()], samples: RawSamples::F32(samples) }
    }

    pub fn new(shape: Vec<usize>, samples: RawSamples) -> Self {
        Self { shape, samples }
    }
}

/// Mono float32 samples in [-1, 1] at a fixed rate.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalPcm {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl CanonicalPcm {
    /// 16-bit samples for PCM containers, see [`to_i16_sample`].
    pub fn to_i16(&self) -> Vec<i16> {
        self.samples.iter().copied().map(to_i16_sample).collect()
    }

    /// Little-endian 16-bit body (`audio/L16`).
    pub fn to_s16le_bytes(&self) -> Vec<u8> {
        self.samples
            .iter()
            .flat_map(|&s| to_i16_sample(s).to_le_bytes())
            .collect()
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Float → 16-bit scale-and-clip law.
///
/// Positive samples scale by 32767 and negative ones by 32768, so the full
/// range maps `1.0 → 32767`, `-1.0 → -32768`, `0.0 → 0`. The product is
/// rounded half away from zero and clamped, so out-of-range input saturates
/// instead of wrapping.
pub fn to_i16_sample(sample: f32) -> i16 {
    if sample.is_nan() {
        return 0;
    }
    let scale = if sample >= 0.0 { i16::MAX as f32 } else { -(i16::MIN as f32) };
    (sample * scale).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Validate and convert raw backend output.
pub fn normalize(raw: RawAudio, sample_rate: u32) -> TtsResult<CanonicalPcm> {
    if raw.shape.len() != 1 || raw.shape[0] != raw.samples.len() {
        return Err(TtsError::UnexpectedAudioShape(raw.shape));
    }

    let samples: Vec<f32> = match raw.samples {
        RawSamples::F32(v) => v,
        RawSamples::F64(v) => v.into_iter().map(|s| s as f32).collect(),
        RawSamples::I16(v) => v.into_iter().map(|s| s as f32 / 32_768.0).collect(),
        RawSamples::I32(v) => v.into_iter().map(|s| (s as f64 / 2_147_483_648.0) as f32).collect(),
    };

    let samples = samples
        .into_iter()
        .map(|s| if s.is_finite() { s.clamp(-1.0, 1.0) } else { 0.0 })
        .collect();

    Ok(CanonicalPcm { samples, sample_rate })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_i16_law_endpoints() {
        assert_eq!(to_i16_sample(1.0), 32767);
        assert_eq!(to_i16_sample(-1.0), -32768);
        assert_eq!(to_i16_sample(0.0), 0);
        assert_eq!(to_i16_sample(-0.0), 0);
    }

    #[test]
    fn test_i16_law_rounding() {
        // 0.5 * 32767 = 16383.5 → rounds away from zero
        assert_eq!(to_i16_sample(0.5), 16384);
        assert_eq!(to_i16_sample(-0.5), -16384);
        assert_eq!(to_i16_sample(1.0 / 32767.0), 1);
        assert_eq!(to_i16_sample(0.4 / 32767.0), 0);
    }

    #[test]
    fn test_i16_law_clamps() {
        assert_eq!(to_i16_sample(1.5), 32767);
        assert_eq!(to_i16_sample(-3.0), -32768);
        assert_eq!(to_i16_sample(f32::INFINITY), 32767);
        assert_eq!(to_i16_sample(f32::NEG_INFINITY), -32768);
        assert_eq!(to_i16_sample(f32::NAN), 0);
    }

    #[test]
    fn test_normalize_clips_and_keeps_rate() {
        let pcm = normalize(RawAudio::mono(vec![0.25, 2.0, -2.0, f32::NAN]), 16_000).unwrap();
        assert_eq!(pcm.samples, vec![0.25, 1.0, -1.0, 0.0]);
        assert_eq!(pcm.sample_rate, 16_000);
        assert_eq!(pcm.to_i16(), vec![8192, 32767, -32768, 0]);
    }

    #[test]
    fn test_normalize_rejects_non_1d() {
        let raw = RawAudio::new(vec![2, 2], RawSamples::F32(vec![0.0; 4]));
        assert!(matches!(normalize(raw, 24_000), Err(TtsError::UnexpectedAudioShape(s)) if s == vec![2, 2]));

        let raw = RawAudio::new(vec![1, 4], RawSamples::F32(vec![0.0; 4]));
        assert!(matches!(normalize(raw, 24_000), Err(TtsError::UnexpectedAudioShape(_))));

        let raw = RawAudio::new(vec![], RawSamples::F32(vec![0.0]));
        assert!(matches!(normalize(raw, 24_000), Err(TtsError::UnexpectedAudioShape(_))));
    }

    #[test]
    fn test_normalize_converts_to_float() {
        let raw = RawAudio::new(vec![3], RawSamples::I16(vec![16_384, -32_768, 0]));
        assert_eq!(normalize(raw, 24_000).unwrap().samples, vec![0.5, -1.0, 0.0]);

        let raw = RawAudio::new(vec![2], RawSamples::F64(vec![0.125, -0.5]));
        assert_eq!(normalize(raw, 24_000).unwrap().samples, vec![0.125, -0.5]);

        let raw = RawAudio::new(vec![1], RawSamples::I32(vec![i32::MIN]));
        assert_eq!(normalize(raw, 24_000).unwrap().samples, vec![-1.0]);
    }

    #[test]
    fn test_s16le_bytes() {
        let pcm = CanonicalPcm { samples: vec![1.0, -1.0], sample_rate: 24_000 };
        assert_eq!(pcm.to_s16le_bytes(), vec![0xFF, 0x7F, 0x00, 0x80]);
        assert_eq!(pcm.duration_secs(), 2.0 / 24_000.0);
    }
}
