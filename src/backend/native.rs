//! Native tensor backend: the Kokoro/StyleTTS graph fed positionally.
//!
//! The three model inputs are bound in graph order:
//!
//! | Position | Shape          | dtype   |
//! |----------|----------------|---------|
//! | 0        | `[1, seq_len]` | int64   |
//! | 1        | `[1, 256]`     | float32 |
//! | 2        | `[1]`          | float32 |

use crate::{
    audio::{RawAudio, RawSamples},
    error::{TtsError, TtsResult},
    voicepack::Style,
};

use super::{
    session::{ids_tensor, speed_tensor, style_tensor, OrtModel},
    squeeze_batch, Backend, BackendConfig, BackendKind, DEFAULT_SAMPLE_RATE,
};

pub struct NativeTensorBackend {
    model: OrtModel,
}

impl NativeTensorBackend {
    pub fn load(config: &BackendConfig) -> TtsResult<Self> {
        let model = OrtModel::load(&config.model_path, config.intra_threads)?;
        model.expect_inputs(3)?;
        Ok(Self { model })
    }
}

impl Backend for NativeTensorBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Native
    }

    fn sample_rate(&self) -> u32 {
        DEFAULT_SAMPLE_RATE
    }

    fn infer(&self, tokens: &[i64], style: &Style, speed: f32) -> TtsResult<RawAudio> {
        let names = self.model.input_names();
        let inputs = vec![
            (names[0].clone(), ids_tensor(tokens)?),
            (names[1].clone(), style_tensor(style)?),
            (names[2].clone(), speed_tensor(speed)?),
        ];

        let (shape, data) = self.model.run(inputs)?;
        if data.is_empty() {
            return Err(TtsError::inference(format!(
                "{} returned an empty waveform",
                self.model.path().display()
            )));
        }
        Ok(RawAudio::new(squeeze_batch(&shape), RawSamples::F32(data)))
    }
}
