//! Flags shared by the `kokorotts` and `kokorotts-server` binaries (`cli` feature).
//!
//! [`ModelArgs`] describes which model, voices, tokenizer and transcoder to load;
//! both binaries flatten it into their own parser.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use crate::{
    backend::{load_backend, BackendConfig, BackendKind, DEFAULT_SAMPLE_RATE},
    encode::{FfmpegTranscoder, FormatEncoder},
    pipeline::SynthesisPipeline,
    tokenize::TokenizerKind,
    voicepack::VoicepackStore,
};

#[derive(Debug, Clone, Args)]
pub struct ModelArgs {
    /// native, graph or sequence
    #[arg(long, env = "TTS_BACKEND", default_value = "native")]
    pub backend: BackendKind,

    /// Model file, or model directory for the sequence backend.
    #[arg(long, env = "MODEL_PATH", default_value = "models/kokoro/kokoro-v0_19.onnx")]
    pub model_path: PathBuf,

    /// Voicepack directory or `.npz` catalog.
    #[arg(long, env = "VOICE_PATH", default_value = "models/kokoro/voices")]
    pub voice_path: PathBuf,

    #[arg(long, env = "DEFAULT_VOICE", default_value = "af_bella")]
    pub default_voice: String,

    /// Output rate declared by the graph backend.
    #[arg(long, env = "SAMPLE_RATE", default_value_t = DEFAULT_SAMPLE_RATE)]
    pub sample_rate: u32,

    /// codepoint or symbols
    #[arg(long, env = "TOKENIZER", default_value = "codepoint")]
    pub tokenizer: TokenizerKind,

    #[arg(long, env = "ORT_INTRA_THREADS")]
    pub intra_threads: Option<usize>,

    #[arg(long = "ffmpeg", env = "FFMPEG_PATH", default_value = "ffmpeg")]
    pub ffmpeg_path: PathBuf,
}

impl ModelArgs {
    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig {
            kind: self.backend,
            model_path: self.model_path.clone(),
            sample_rate: self.sample_rate,
            intra_threads: self.intra_threads,
        }
    }

    /// Load voices and model and assemble the pipeline. Blocking.
    pub fn build_pipeline(&self) -> Result<SynthesisPipeline> {
        let voices = VoicepackStore::open(&self.voice_path)
            .with_context(|| format!("Cannot load voicepacks from {}", self.voice_path.display()))?;
        info!(count = voices.len(), path = %self.voice_path.display(), "Voicepacks ready");

        let backend = load_backend(&self.backend_config())
            .with_context(|| format!("Cannot load {} backend", self.backend))?;

        let encoder = FormatEncoder::new(Arc::new(FfmpegTranscoder::new(&self.ffmpeg_path)));
        SynthesisPipeline::new(
            backend,
            Arc::new(voices),
            self.tokenizer.build(),
            encoder,
            self.default_voice.as_str(),
        )
        .context("Default voice is not available")
    }
}
