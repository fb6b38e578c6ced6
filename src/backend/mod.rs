//! Inference backends behind one `infer(tokens, style, speed)` contract.
//!
//! | Kind       | Type                     | Input packaging                         | Rate      |
//! |------------|--------------------------|-----------------------------------------|-----------|
//! | `native`   | [`NativeTensorBackend`]  | positional `[input_ids, style, speed]`  | 24 kHz    |
//! | `graph`    | [`GraphRuntimeBackend`]  | bound by the graph's declared input names | configured |
//! | `sequence` | [`SequenceModelBackend`] | decoder → greedy ids → vocoder          | 24 kHz    |
//!
//! The variant is chosen once, from configuration, via [`load_backend`].
//! Loaded weights are read-only afterwards; each backend serialises its own
//! `Session::run` calls and nothing else.

use std::{fmt, path::PathBuf, str::FromStr, sync::Arc};

use crate::{audio::RawAudio, error::TtsResult, voicepack::Style};

mod graph;
mod native;
mod sequence;
mod session;

pub use graph::GraphRuntimeBackend;
pub use native::NativeTensorBackend;
pub use sequence::{greedy_decode, SequenceModelBackend};

/// Output rate of the native-tensor and sequence-model variants.
pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;

/// A loaded model plus its inference entry point.
pub trait Backend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Rate of the waveform returned by [`Backend::infer`].
    fn sample_rate(&self) -> u32;

    /// Run one synthesis. Every failure comes back as [`crate::TtsError::Inference`].
    fn infer(&self, tokens: &[i64], style: &Style, speed: f32) -> TtsResult<RawAudio>;
}

/// Backend variant, selected at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    Native,
    Graph,
    Sequence,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "native" | "torch" | "tensor" => Ok(Self::Native),
            "graph" | "onnx" => Ok(Self::Graph),
            "sequence" | "seq2seq" | "transformers" => Ok(Self::Sequence),
            _ => Err(format!("unknown backend '{s}' (expected native, graph or sequence)")),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackendKind::Native => "native",
            BackendKind::Graph => "graph",
            BackendKind::Sequence => "sequence",
        })
    }
}

/// Everything needed to construct a backend.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// Model file (`native`, `graph`) or model directory (`sequence`).
    pub model_path: PathBuf,
    /// Declared output rate; only the `graph` variant honours it.
    pub sample_rate: u32,
    /// ONNX Runtime intra-op threads; `None` keeps the runtime default.
    pub intra_threads: Option<usize>,
}

impl BackendConfig {
    pub fn new(kind: BackendKind, model_path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            model_path: model_path.into(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            intra_threads: None,
        }
    }
}

/// Construct the configured backend. This is the only expensive, blocking step.
pub fn load_backend(config: &BackendConfig) -> TtsResult<Arc<dyn Backend>> {
    tracing::info!(kind = %config.kind, model = %config.model_path.display(), "Loading backend");
    let backend: Arc<dyn Backend> = match config.kind {
        BackendKind::Native => Arc::new(NativeTensorBackend::load(config)?),
        BackendKind::Graph => Arc::new(GraphRuntimeBackend::load(config)?),
        BackendKind::Sequence => Arc::new(SequenceModelBackend::load(config)?),
    };
    Ok(backend)
}

/// Drop leading unit axes so a `[1, T]` batch becomes the `[T]` waveform.
pub(crate) fn squeeze_batch(shape: &[usize]) -> Vec<usize> {
    let mut dims = shape;
    while dims.len() > 1 && dims[0] == 1 {
        dims = &dims[1..];
    }
    dims.to_vec()
}
