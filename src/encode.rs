//! Canonical PCM → container bytes.
//!
//! | Format | MIME           | Produced by              |
//! |--------|----------------|--------------------------|
//! | `wav`  | `audio/wav`    | in-process, [`hound`]    |
//! | `pcm`  | `audio/L16`    | in-process, raw s16le    |
//! | `mp3`  | `audio/mpeg`   | [`Transcoder`] (ffmpeg)  |
//! | `ogg`  | `audio/ogg`    | [`Transcoder`] (ffmpeg)  |
//! | `flac` | `audio/flac`   | [`Transcoder`] (ffmpeg)  |
//! | `aac`  | `audio/aac`    | [`Transcoder`] (ffmpeg, ADTS) |
//!
//! Compressed formats go through a WAV intermediate in a private temporary
//! directory that is removed whether or not the transcode succeeds.

use std::{
    fmt,
    io::Cursor,
    path::{Path, PathBuf},
    process::Command,
    str::FromStr,
    sync::Arc,
};

use anyhow::{bail, Context, Result};

use crate::{
    audio::CanonicalPcm,
    error::{TtsError, TtsResult},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AudioFormat {
    #[default]
    Wav,
    Mp3,
    Ogg,
    Flac,
    Aac,
    Pcm,
}

impl AudioFormat {
    pub const ALL: [AudioFormat; 6] = [
        AudioFormat::Wav,
        AudioFormat::Mp3,
        AudioFormat::Ogg,
        AudioFormat::Flac,
        AudioFormat::Aac,
        AudioFormat::Pcm,
    ];

    pub fn mime_type(self) -> &'static str {
        match self {
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Ogg => "audio/ogg",
            AudioFormat::Flac => "audio/flac",
            AudioFormat::Aac => "audio/aac",
            AudioFormat::Pcm => "audio/L16",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Ogg => "ogg",
            AudioFormat::Flac => "flac",
            AudioFormat::Aac => "aac",
            AudioFormat::Pcm => "pcm",
        }
    }

    /// Muxer name passed to `ffmpeg -f`.
    pub fn ffmpeg_muxer(self) -> &'static str {
        match self {
            AudioFormat::Aac => "adts",
            other => other.extension(),
        }
    }

    /// True for formats that need an external transcoder.
    pub fn needs_transcode(self) -> bool {
        !matches!(self, AudioFormat::Wav | AudioFormat::Pcm)
    }
}

impl FromStr for AudioFormat {
    type Err = TtsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wav" => Ok(AudioFormat::Wav),
            "mp3" => Ok(AudioFormat::Mp3),
            "ogg" | "opus" => Ok(AudioFormat::Ogg),
            "flac" => Ok(AudioFormat::Flac),
            "aac" => Ok(AudioFormat::Aac),
            "pcm" => Ok(AudioFormat::Pcm),
            _ => Err(TtsError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

// ─── Transcoding ─────────────────────────────────────────────────────────────

/// Converts a WAV file on disk into another container.
pub trait Transcoder: Send + Sync {
    fn transcode(&self, input: &Path, output: &Path, format: AudioFormat) -> Result<()>;
}

/// Shells out to `ffmpeg`.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    program: PathBuf,
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl Transcoder for FfmpegTranscoder {
    fn transcode(&self, input: &Path, output: &Path, format: AudioFormat) -> Result<()> {
        let out = Command::new(&self.program)
            .args(["-hide_banner", "-loglevel", "error", "-y", "-i"])
            .arg(input)
            .args(["-f", format.ffmpeg_muxer()])
            .arg(output)
            .output()
            .with_context(|| format!("Cannot run {}", self.program.display()))?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            bail!("{} exited with {}: {}", self.program.display(), out.status, stderr.trim());
        }
        Ok(())
    }
}

// ─── Encoder ─────────────────────────────────────────────────────────────────

/// Encodes [`CanonicalPcm`] into any [`AudioFormat`].
#[derive(Clone)]
pub struct FormatEncoder {
    transcoder: Arc<dyn Transcoder>,
    scratch_dir: Option<PathBuf>,
}

impl Default for FormatEncoder {
    fn default() -> Self {
        Self::new(Arc::new(FfmpegTranscoder::default()))
    }
}

impl FormatEncoder {
    pub fn new(transcoder: Arc<dyn Transcoder>) -> Self {
        Self { transcoder, scratch_dir: None }
    }

    /// Create transcode intermediates under `dir` instead of the system temp dir.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub fn encode(&self, pcm: &CanonicalPcm, format: AudioFormat) -> TtsResult<Vec<u8>> {
        let encoded = match format {
            AudioFormat::Wav => write_wav(pcm),
            AudioFormat::Pcm => Ok(pcm.to_s16le_bytes()),
            _ => self.transcode(pcm, format),
        };
        encoded.map_err(|e| TtsError::Encoding { format: format.to_string(), message: format!("{e:#}") })
    }

    fn transcode(&self, pcm: &CanonicalPcm, format: AudioFormat) -> Result<Vec<u8>> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("kokorotts-");
        let scratch = match &self.scratch_dir {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .context("Cannot create scratch directory")?;

        let input = scratch.path().join("in.wav");
        let output = scratch.path().join(format!("out.{}", format.extension()));
        std::fs::write(&input, write_wav(pcm)?).context("Cannot write WAV intermediate")?;

        self.transcoder.transcode(&input, &output, format)?;
        let bytes = std::fs::read(&output)
            .with_context(|| format!("Transcoder produced no {format} output"))?;
        tracing::debug!(%format, bytes = bytes.len(), "Transcoded");
        Ok(bytes)
    }
}

/// Mono 16-bit RIFF/WAVE at the PCM's own rate.
fn write_wav(pcm: &CanonicalPcm) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: pcm.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).context("Cannot start WAV stream")?;
        for s in pcm.to_i16() {
            writer.write_sample(s).context("WAV write error")?;
        }
        writer.finalize().context("WAV finalise error")?;
    }
    Ok(cursor.into_inner())
}
