//! Graph-runtime backend: inputs bound by the names the graph declares.
//!
//! Exported graphs disagree on naming (`input_ids` vs `tokens`, `style` vs
//! `ref_s`) and on which inputs exist at all. Binding is resolved once at
//! construction; a graph that declares something we cannot feed is rejected
//! there instead of on the first request.

use crate::{
    audio::{RawAudio, RawSamples},
    error::{TtsError, TtsResult},
    voicepack::Style,
};

use super::{
    session::{ids_tensor, speed_tensor, style_tensor, NamedInput, OrtModel},
    squeeze_batch, Backend, BackendConfig, BackendKind,
};

/// Logical input a declared graph input is fed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    Tokens,
    Style,
    Speed,
}

impl Slot {
    pub(crate) fn for_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "input_ids" | "tokens" | "input" | "text" => Some(Slot::Tokens),
            "style" | "ref_s" | "voice" | "speaker_embedding" => Some(Slot::Style),
            "speed" | "rate" => Some(Slot::Speed),
            _ => None,
        }
    }
}

/// Pair each declared input with its slot, or explain why the graph can't be fed.
pub(crate) fn bind_inputs(declared: &[String]) -> Result<Vec<(String, Slot)>, String> {
    let mut bindings = Vec::with_capacity(declared.len());
    for name in declared {
        let slot = Slot::for_name(name).ok_or_else(|| format!("unrecognised graph input '{name}'"))?;
        if bindings.iter().any(|(_, s)| *s == slot) {
            return Err(format!("graph input '{name}' duplicates {slot:?}"));
        }
        bindings.push((name.clone(), slot));
    }
    if !bindings.iter().any(|(_, s)| *s == Slot::Tokens) {
        return Err(format!("graph declares no token input (inputs: {declared:?})"));
    }
    Ok(bindings)
}

pub struct GraphRuntimeBackend {
    model: OrtModel,
    bindings: Vec<(String, Slot)>,
    sample_rate: u32,
}

impl GraphRuntimeBackend {
    pub fn load(config: &BackendConfig) -> TtsResult<Self> {
        let model = OrtModel::load(&config.model_path, config.intra_threads)?;
        let bindings = bind_inputs(model.input_names()).map_err(|reason| TtsError::ModelLoad {
            path: config.model_path.clone(),
            reason,
        })?;
        if config.sample_rate == 0 {
            return Err(TtsError::ModelLoad {
                path: config.model_path.clone(),
                reason: "declared sample rate must be positive".into(),
            });
        }
        tracing::debug!(bindings = ?bindings, sample_rate = config.sample_rate, "Graph inputs bound");
        Ok(Self { model, bindings, sample_rate: config.sample_rate })
    }
}

impl Backend for GraphRuntimeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Graph
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn infer(&self, tokens: &[i64], style: &Style, speed: f32) -> TtsResult<RawAudio> {
        let inputs = self
            .bindings
            .iter()
            .map(|(name, slot)| {
                let value = match slot {
                    Slot::Tokens => ids_tensor(tokens)?,
                    Slot::Style => style_tensor(style)?,
                    Slot::Speed => speed_tensor(speed)?,
                };
                Ok((name.clone(), value))
            })
            .collect::<TtsResult<Vec<NamedInput>>>()?;

        let (shape, data) = self.model.run(inputs)?;
        if data.is_empty() {
            return Err(TtsError::inference("graph returned an empty waveform"));
        }
        Ok(RawAudio::new(squeeze_batch(&shape), RawSamples::F32(data)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_bind_kokoro_names() {
        let b = bind_inputs(&names(&["tokens", "style", "speed"])).unwrap();
        assert_eq!(
            b.iter().map(|(_, s)| *s).collect::<Vec<_>>(),
            vec![Slot::Tokens, Slot::Style, Slot::Speed]
        );
    }

    #[test]
    fn test_bind_tokens_only() {
        let b = bind_inputs(&names(&["input"])).unwrap();
        assert_eq!(b, vec![("input".to_string(), Slot::Tokens)]);
    }

    #[test]
    fn test_bind_keeps_graph_order() {
        let b = bind_inputs(&names(&["ref_s", "input_ids", "speed"])).unwrap();
        assert_eq!(b[0], ("ref_s".to_string(), Slot::Style));
        assert_eq!(b[1], ("input_ids".to_string(), Slot::Tokens));
    }

    #[test]
    fn test_bind_rejects_unknown_or_missing() {
        assert!(bind_inputs(&names(&["input_ids", "attention_mask"])).is_err());
        assert!(bind_inputs(&names(&["style", "speed"])).is_err());
        assert!(bind_inputs(&names(&["tokens", "input_ids"])).is_err());
        assert!(bind_inputs(&[]).is_err());
    }
}
