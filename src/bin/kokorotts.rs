//! `kokorotts`: synthesise one utterance to a local audio file.
//!
//! ```text
//! kokorotts "Hello from Rust!" --voice af_bella --output hello.wav
//! kokorotts @chapter1.txt --voice ff_siwis --output chapter1.mp3 --speed 0.9
//! ```
//!
//! The container follows `--format`, or else the output file's extension.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;

use kokorotts::{cli::ModelArgs, logging, AudioFormat, SynthesisRequest};

#[derive(Debug, Parser)]
#[command(name = "kokorotts", version, about = "Synthesise speech to an audio file with Kokoro")]
struct Cli {
    /// Text to speak, or `@path` to read it from a file.
    text: String,

    /// Voice name; defaults to `--default-voice`.
    #[arg(long)]
    voice: Option<String>,

    #[arg(short, long, default_value = "output.wav")]
    output: PathBuf,

    /// wav, mp3, ogg, flac, aac or pcm.
    #[arg(long)]
    format: Option<String>,

    #[arg(long, default_value_t = 1.0)]
    speed: f32,

    #[arg(long)]
    debug: bool,

    #[command(flatten)]
    model: ModelArgs,
}

fn read_text(arg: &str) -> Result<String> {
    match arg.strip_prefix('@') {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Cannot read text from {path}"))
        }
        None => Ok(arg.to_string()),
    }
}

/// `--format` if given, else the output extension, else wav.
fn output_format(explicit: Option<&str>, output: &Path) -> String {
    explicit
        .map(str::to_string)
        .or_else(|| output.extension().and_then(|e| e.to_str()).map(str::to_string))
        .unwrap_or_else(|| AudioFormat::Wav.extension().to_string())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.debug, logging::LogFormat::Text);

    let text = read_text(&cli.text)?;
    let pipeline = cli.model.build_pipeline()?;

    // Unlike the server, an explicit voice that is not installed is an error.
    if let Some(voice) = cli.voice.as_deref() {
        let available = pipeline.voices();
        if !available.iter().any(|v| v == voice) {
            bail!("Voice '{voice}' not found; available: {}", available.join(", "));
        }
    }

    let mut request = SynthesisRequest::new(text)
        .format(output_format(cli.format.as_deref(), &cli.output))
        .speed(cli.speed);
    request.voice = cli.voice.clone();

    let result = pipeline.run(&request)?;
    std::fs::write(&cli.output, &result.audio)
        .with_context(|| format!("Cannot write {}", cli.output.display()))?;

    info!(
        voice = %result.voice,
        format = %result.format,
        seconds = result.pcm.duration_secs(),
        "Synthesis complete"
    );
    println!("Audio saved to {}", cli.output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format() {
        assert_eq!(output_format(None, Path::new("out.mp3")), "mp3");
        assert_eq!(output_format(Some("flac"), Path::new("out.mp3")), "flac");
        assert_eq!(output_format(None, Path::new("out")), "wav");
    }

    #[test]
    fn test_read_text_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("line.txt");
        std::fs::write(&path, "Hello from a file").unwrap();
        assert_eq!(read_text(&format!("@{}", path.display())).unwrap(), "Hello from a file");
        assert_eq!(read_text("plain").unwrap(), "plain");
        assert!(read_text("@/no/such/file.txt").is_err());
    }

    #[test]
    fn test_cli_parse() {
        let cli = Cli::try_parse_from(["kokorotts", "Hello", "--voice", "am_adam", "-o", "a.ogg", "--speed", "1.5"])
            .unwrap();
        assert_eq!(cli.text, "Hello");
        assert_eq!(cli.voice.as_deref(), Some("am_adam"));
        assert_eq!(cli.output, PathBuf::from("a.ogg"));
        assert_eq!(cli.speed, 1.5);
    }
}
