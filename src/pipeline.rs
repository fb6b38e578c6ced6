//! Synthesis pipeline: one request from text to encoded audio.
//!
//! Stages run in a fixed order and the first failure ends the request:
//!
//! 1. **Validate**: empty text, unknown `response_format`, bad speed.
//!    Nothing below is touched when this fails.
//! 2. **Resolve voice**: [`VoicepackStore::resolve`] with default fallback.
//! 3. **Tokenize**: the configured [`Tokenizer`].
//! 4. **Infer**: [`Backend::infer`]; the only blocking, expensive step.
//! 5. **Normalize**: [`audio::normalize`] at the backend's declared rate.
//! 6. **Encode**: [`FormatEncoder::encode`].
//!
//! A pipeline owns only shared, read-only collaborators, so one instance can
//! serve any number of concurrent requests.

use std::sync::Arc;

use tracing::{debug, error, info_span};

use crate::{
    audio::{self, CanonicalPcm},
    backend::{Backend, BackendKind},
    encode::{AudioFormat, FormatEncoder},
    error::{TtsError, TtsResult},
    tokenize::Tokenizer,
    voicepack::VoicepackStore,
};

/// One synthesis call.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    pub text: String,
    /// Voice name; `None` or empty selects the pipeline default.
    pub voice: Option<String>,
    /// Container name as received (`wav`, `mp3`, ...); parsed during validation.
    pub response_format: String,
    pub speed: f32,
}

impl Default for SynthesisRequest {
    fn default() -> Self {
        Self {
            text: String::new(),
            voice: None,
            response_format: AudioFormat::Wav.to_string(),
            speed: 1.0,
        }
    }
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), ..Self::default() }
    }

    pub fn voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.response_format = format.into();
        self
    }

    pub fn speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }
}

/// Encoded audio plus the PCM it was encoded from.
#[derive(Debug, Clone)]
pub struct SynthesisResult {
    pub pcm: CanonicalPcm,
    pub format: AudioFormat,
    pub audio: Vec<u8>,
    /// Voice actually used, after fallback.
    pub voice: String,
}

impl SynthesisResult {
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }
}

pub struct SynthesisPipeline {
    backend: Arc<dyn Backend>,
    voices: Arc<VoicepackStore>,
    tokenizer: Box<dyn Tokenizer>,
    encoder: FormatEncoder,
    default_voice: String,
}

impl SynthesisPipeline {
    /// Fails with [`TtsError::UnknownVoice`] when `default_voice` is not in `voices`.
    pub fn new(
        backend: Arc<dyn Backend>,
        voices: Arc<VoicepackStore>,
        tokenizer: Box<dyn Tokenizer>,
        encoder: FormatEncoder,
        default_voice: impl Into<String>,
    ) -> TtsResult<Self> {
        let default_voice = default_voice.into();
        if !voices.contains(&default_voice) {
            return Err(TtsError::UnknownVoice {
                requested: default_voice.clone(),
                default: default_voice,
            });
        }
        Ok(Self { backend, voices, tokenizer, encoder, default_voice })
    }

    pub fn default_voice(&self) -> &str {
        &self.default_voice
    }

    /// Loaded voice names, sorted.
    pub fn voices(&self) -> Vec<String> {
        self.voices.names()
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn sample_rate(&self) -> u32 {
        self.backend.sample_rate()
    }

    pub fn run(&self, request: &SynthesisRequest) -> TtsResult<SynthesisResult> {
        let span = info_span!(
            "synthesize",
            backend = %self.backend.kind(),
            format = %request.response_format,
            chars = request.text.chars().count(),
        );
        let _enter = span.enter();

        let format = validate(request)?;

        let voice = self.voices.resolve(request.voice.as_deref(), &self.default_voice)?;

        let tokens = self.tokenizer.tokenize(&request.text)?;
        debug!(voice = %voice.name, tokens = tokens.len(), "Tokenized");

        let raw = self.backend.infer(&tokens, &voice.style, request.speed).map_err(|e| {
            error!(voice = %voice.name, "Inference failed: {e}");
            match e {
                TtsError::Inference(_) => e,
                other => TtsError::inference(other.to_string()),
            }
        })?;

        let pcm = audio::normalize(raw, self.backend.sample_rate())?;
        debug!(samples = pcm.samples.len(), seconds = pcm.duration_secs(), "Normalized");

        let audio = self.encoder.encode(&pcm, format).inspect_err(|e| error!("{e}"))?;
        debug!(bytes = audio.len(), "Encoded");

        Ok(SynthesisResult { pcm, format, audio, voice: voice.name.clone() })
    }
}

/// Cheap request checks, in order: text, format, speed.
fn validate(request: &SynthesisRequest) -> TtsResult<AudioFormat> {
    if request.text.trim().is_empty() {
        return Err(TtsError::EmptyInput);
    }
    let format: AudioFormat = request.response_format.parse()?;
    if !(request.speed.is_finite() && request.speed > 0.0) {
        return Err(TtsError::InvalidSpeed(request.speed));
    }
    Ok(format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::RawAudio,
        encode::Transcoder,
        tokenize::CodepointTokenizer,
        voicepack::{Voicepack, STYLE_DIM},
    };
    use std::{
        path::Path,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
        time::SystemTime,
    };

    /// Echoes one sample per token and records the style it was given.
    struct MockBackend {
        calls: AtomicUsize,
        last_style: Mutex<Option<f32>>,
        fail: bool,
    }

    impl MockBackend {
        fn new() -> Arc<Self> {
            Arc::new(Self { calls: AtomicUsize::new(0), last_style: Mutex::new(None), fail: false })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self { calls: AtomicUsize::new(0), last_style: Mutex::new(None), fail: true })
        }
    }

    impl Backend for MockBackend {
        fn kind(&self) -> BackendKind {
            BackendKind::Native
        }

        fn sample_rate(&self) -> u32 {
            16_000
        }

        fn infer(&self, tokens: &[i64], style: &[f32; STYLE_DIM], _speed: f32) -> TtsResult<RawAudio> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_style.lock().unwrap() = Some(style[0]);
            if self.fail {
                return Err(TtsError::UnexpectedAudioShape(vec![0]));
            }
            Ok(RawAudio::mono(tokens.iter().map(|&t| (t % 7) as f32 / 10.0).collect()))
        }
    }

    struct NoTranscoder;

    impl Transcoder for NoTranscoder {
        fn transcode(&self, _: &Path, _: &Path, _: AudioFormat) -> anyhow::Result<()> {
            anyhow::bail!("no codec in tests")
        }
    }

    fn voice(name: &str, marker: f32) -> Voicepack {
        Voicepack {
            name: name.into(),
            style: [marker; STYLE_DIM],
            source_shape: vec![STYLE_DIM],
            loaded_at: SystemTime::now(),
        }
    }

    fn pipeline(backend: Arc<MockBackend>) -> SynthesisPipeline {
        let store = VoicepackStore::from_voicepacks([voice("af_bella", 1.0), voice("am_adam", 2.0)]);
        SynthesisPipeline::new(
            backend,
            Arc::new(store),
            Box::new(CodepointTokenizer),
            FormatEncoder::new(Arc::new(NoTranscoder)),
            "af_bella",
        )
        .unwrap()
    }

    #[test]
    fn test_wav_roundtrip_through_stages() {
        let backend = MockBackend::new();
        let p = pipeline(backend.clone());
        let out = p.run(&SynthesisRequest::new("Hello").voice("am_adam")).unwrap();

        assert_eq!(out.voice, "am_adam");
        assert_eq!(out.mime_type(), "audio/wav");
        assert_eq!(out.pcm.samples.len(), 5);
        assert_eq!(out.pcm.sample_rate, 16_000);
        assert_eq!(&out.audio[0..4], b"RIFF");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*backend.last_style.lock().unwrap(), Some(2.0));
    }

    #[test]
    fn test_empty_text_never_reaches_backend() {
        let backend = MockBackend::new();
        let p = pipeline(backend.clone());
        for text in ["", "   ", "\n\t"] {
            for format in ["wav", "mp3", "bogus"] {
                let err = p.run(&SynthesisRequest::new(text).format(format)).unwrap_err();
                assert!(matches!(err, TtsError::EmptyInput), "{text:?}/{format}: {err}");
            }
        }
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unsupported_format_never_reaches_backend() {
        let backend = MockBackend::new();
        let p = pipeline(backend.clone());
        let err = p.run(&SynthesisRequest::new("Hello").format("webm")).unwrap_err();
        assert!(matches!(err, TtsError::UnsupportedFormat(ref f) if f == "webm"));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_invalid_speed() {
        let backend = MockBackend::new();
        let p = pipeline(backend.clone());
        for speed in [0.0, -1.0, f32::NAN] {
            let err = p.run(&SynthesisRequest::new("Hello").speed(speed)).unwrap_err();
            assert!(matches!(err, TtsError::InvalidSpeed(_)));
        }
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unknown_voice_falls_back() {
        let backend = MockBackend::new();
        let p = pipeline(backend.clone());
        let out = p.run(&SynthesisRequest::new("Hi").voice("zz_nobody")).unwrap();
        assert_eq!(out.voice, "af_bella");
        assert_eq!(*backend.last_style.lock().unwrap(), Some(1.0));

        let out = p.run(&SynthesisRequest::new("Hi").voice("")).unwrap();
        assert_eq!(out.voice, "af_bella");
    }

    #[test]
    fn test_backend_errors_become_inference_errors() {
        let p = pipeline(MockBackend::failing());
        let err = p.run(&SynthesisRequest::new("Hello")).unwrap_err();
        assert!(matches!(err, TtsError::Inference(_)), "{err}");
    }

    #[test]
    fn test_encoding_failure_surfaces() {
        let p = pipeline(MockBackend::new());
        let err = p.run(&SynthesisRequest::new("Hello").format("mp3")).unwrap_err();
        assert!(matches!(err, TtsError::Encoding { ref format, .. } if format == "mp3"));
    }

    #[test]
    fn test_missing_default_voice_is_rejected() {
        let store = VoicepackStore::from_voicepacks([voice("am_adam", 2.0)]);
        let result = SynthesisPipeline::new(
            MockBackend::new(),
            Arc::new(store),
            Box::new(CodepointTokenizer),
            FormatEncoder::default(),
            "af_bella",
        );
        assert!(matches!(result, Err(TtsError::UnknownVoice { .. })));
    }

    #[test]
    fn test_voices_sorted() {
        let p = pipeline(MockBackend::new());
        assert_eq!(p.voices(), vec!["af_bella".to_string(), "am_adam".to_string()]);
        assert_eq!(p.default_voice(), "af_bella");
    }
}
