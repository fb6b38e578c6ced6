//! Sequence-model backend: decoder graph, greedy ids, vocoder graph.
//!
//! `model_path` names a directory holding two graphs:
//!
//! | File           | Inputs                         | Output                 |
//! |----------------|--------------------------------|------------------------|
//! | `decoder.onnx` | `[1, seq_len]` int64 tokens    | `[1, steps, vocab]` logits |
//! | `vocoder.onnx` | ids, `[1, 256]` style, `[1]` speed | `[1, samples]` waveform |
//!
//! Decoding is a single greedy pass: argmax over the vocabulary at each step,
//! pad steps dropped, no sampling.

use std::path::Path;

use crate::{
    audio::{RawAudio, RawSamples},
    error::{TtsError, TtsResult},
    voicepack::Style,
};

use super::{
    session::{ids_tensor, speed_tensor, style_tensor, OrtModel},
    squeeze_batch, Backend, BackendConfig, BackendKind, DEFAULT_SAMPLE_RATE,
};

const DECODER_FILE: &str = "decoder.onnx";
const VOCODER_FILE: &str = "vocoder.onnx";
const PAD_ID: i64 = 0;

pub struct SequenceModelBackend {
    decoder: OrtModel,
    vocoder: OrtModel,
}

impl SequenceModelBackend {
    pub fn load(config: &BackendConfig) -> TtsResult<Self> {
        let dir: &Path = &config.model_path;
        if !dir.is_dir() {
            return Err(TtsError::ModelNotFound(dir.join(DECODER_FILE)));
        }
        let decoder = OrtModel::load(&dir.join(DECODER_FILE), config.intra_threads)?;
        decoder.expect_inputs(1)?;
        let vocoder = OrtModel::load(&dir.join(VOCODER_FILE), config.intra_threads)?;
        vocoder.expect_inputs(3)?;
        Ok(Self { decoder, vocoder })
    }
}

impl Backend for SequenceModelBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Sequence
    }

    fn sample_rate(&self) -> u32 {
        DEFAULT_SAMPLE_RATE
    }

    fn infer(&self, tokens: &[i64], style: &Style, speed: f32) -> TtsResult<RawAudio> {
        let decoder_input = self.decoder.input_names()[0].clone();
        let (shape, logits) = self.decoder.run(vec![(decoder_input, ids_tensor(tokens)?)])?;
        let ids = greedy_decode(&shape, &logits)?;
        if ids.is_empty() {
            return Err(TtsError::inference("decoder produced only padding"));
        }
        tracing::debug!(input = tokens.len(), decoded = ids.len(), "Greedy decode done");

        let mut padded = Vec::with_capacity(ids.len() + 2);
        padded.push(PAD_ID);
        padded.extend_from_slice(&ids);
        padded.push(PAD_ID);

        let names = self.vocoder.input_names();
        let (shape, data) = self.vocoder.run(vec![
            (names[0].clone(), ids_tensor(&padded)?),
            (names[1].clone(), style_tensor(style)?),
            (names[2].clone(), speed_tensor(speed)?),
        ])?;
        if data.is_empty() {
            return Err(TtsError::inference("vocoder returned an empty waveform"));
        }
        Ok(RawAudio::new(squeeze_batch(&shape), RawSamples::F32(data)))
    }
}

/// Argmax over the last axis of `[1, steps, vocab]` or `[steps, vocab]` logits.
///
/// Steps whose best id is the pad id are dropped. Ties go to the lowest id.
pub fn greedy_decode(shape: &[usize], logits: &[f32]) -> TtsResult<Vec<i64>> {
    let (steps, vocab) = match shape {
        [1, steps, vocab] | [steps, vocab] => (*steps, *vocab),
        _ => return Err(TtsError::inference(format!("unexpected logits shape {shape:?}"))),
    };
    if vocab == 0 || steps.checked_mul(vocab) != Some(logits.len()) {
        return Err(TtsError::inference(format!(
            "logits shape {shape:?} does not match {} values",
            logits.len()
        )));
    }

    let ids = logits
        .chunks_exact(vocab)
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0usize, f32::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
                .0 as i64
        })
        .filter(|&id| id != PAD_ID)
        .collect();
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greedy_picks_argmax_and_drops_pad() {
        #[rustfmt::skip]
        let logits = vec![
            0.1, 0.9, 0.0,   // 1
            0.8, 0.1, 0.1,   // pad
            0.0, 0.2, 0.7,   // 2
        ];
        assert_eq!(greedy_decode(&[1, 3, 3], &logits).unwrap(), vec![1, 2]);
        assert_eq!(greedy_decode(&[3, 3], &logits).unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_greedy_ties_go_low() {
        assert_eq!(greedy_decode(&[1, 1, 3], &[0.0, 0.5, 0.5]).unwrap(), vec![1]);
    }

    #[test]
    fn test_greedy_single_step() {
        assert_eq!(greedy_decode(&[1, 1, 4], &[0.0, 0.1, 0.2, 0.9]).unwrap(), vec![3]);
        assert_eq!(greedy_decode(&[1, 4], &[0.0, 0.7, 0.2, 0.1]).unwrap(), vec![1]);
    }

    #[test]
    fn test_greedy_all_pad_is_empty() {
        assert!(greedy_decode(&[2, 2], &[1.0, 0.0, 1.0, 0.0]).unwrap().is_empty());
    }

    #[test]
    fn test_greedy_rejects_bad_shapes() {
        assert!(greedy_decode(&[4], &[0.0; 4]).is_err());
        assert!(greedy_decode(&[1, 2, 3], &[0.0; 5]).is_err());
        assert!(greedy_decode(&[2, 0], &[]).is_err());
        assert!(greedy_decode(&[2, 2, 2], &[0.0; 8]).is_err());
    }
}
