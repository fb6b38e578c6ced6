//! # kokorotts
//!
//! Kokoro text-to-speech behind one backend-agnostic synthesis pipeline,
//! plus an OpenAI-compatible HTTP server (`server` feature) and an offline `kokorotts`
//! command (`cli` feature).
//!
//! ## Quick start
//!
//! ```no_run
//! use std::{path::Path, sync::Arc};
//! use kokorotts::{
//!     load_backend, BackendConfig, BackendKind, FormatEncoder, SynthesisPipeline,
//!     SynthesisRequest, TokenizerKind, VoicepackStore,
//! };
//!
//! let backend = load_backend(&BackendConfig::new(
//!     BackendKind::Native,
//!     "models/kokoro/kokoro-v0_19.onnx",
//! )).unwrap();
//! let voices = VoicepackStore::load(Path::new("models/kokoro/voices")).unwrap();
//!
//! let pipeline = SynthesisPipeline::new(
//!     backend,
//!     Arc::new(voices),
//!     TokenizerKind::Codepoint.build(),
//!     FormatEncoder::default(),
//!     "af_bella",
//! ).unwrap();
//!
//! let out = pipeline
//!     .run(&SynthesisRequest::new("Hello from Rust!").voice("af_bella"))
//!     .unwrap();
//! std::fs::write("hello.wav", &out.audio).unwrap();
//! ```
//!
//! ## Pipeline
//! 1. **Validate**: empty text, unknown container, non-positive speed → 400-class errors.
//! 2. **Resolve voice**: unknown or empty names fall back to the default voice.
//! 3. **Tokenize**: code points, or Kokoro symbol ids for pre-phonemised IPA.
//! 4. **Infer**: one of three ONNX Runtime backends, picked at start-up.
//! 5. **Normalize**: 1-D check, float conversion, clip to [-1, 1].
//! 6. **Encode**: WAV/PCM in-process; mp3/ogg/flac/aac via `ffmpeg`.
//!
//! ## Backends
//! | `--backend` | Model path                          | Rate       |
//! |-------------|-------------------------------------|------------|
//! | `native`    | single `.onnx`, positional inputs   | 24 kHz     |
//! | `graph`     | single `.onnx`, inputs bound by name| configured |
//! | `sequence`  | dir with `decoder.onnx` + `vocoder.onnx` | 24 kHz |

pub mod audio;
pub mod backend;
pub mod encode;
pub mod error;
pub mod npz;
pub mod pipeline;
pub mod tokenize;
pub mod voicepack;

#[cfg(feature = "cli")]
pub mod cli;
#[cfg(feature = "cli")]
pub mod logging;
#[cfg(feature = "server")]
pub mod server;

// ─── Re-exports for convenience ─────────────────────────────────────────────

pub use audio::{CanonicalPcm, RawAudio, RawSamples};
pub use backend::{load_backend, Backend, BackendConfig, BackendKind, DEFAULT_SAMPLE_RATE};
pub use encode::{AudioFormat, FfmpegTranscoder, FormatEncoder, Transcoder};
pub use error::{TtsError, TtsResult};
pub use pipeline::{SynthesisPipeline, SynthesisRequest, SynthesisResult};
pub use tokenize::{Tokenizer, TokenizerKind};
pub use voicepack::{Style, Voicepack, VoicepackStore, STYLE_DIM};
