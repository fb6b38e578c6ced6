//! `kokorotts-server`: OpenAI-compatible `/v1/audio/speech` endpoint.
//!
//! ```text
//! API_KEY=... VOICE_PATH=models/kokoro/voices kokorotts-server --port 9090
//! curl -H "Authorization: Bearer $API_KEY" -H "Content-Type: application/json" \
//!      -d '{"input":"Hello","voice":"af_bella","response_format":"mp3"}' \
//!      http://localhost:9090/v1/audio/speech -o hello.mp3
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{debug, info};

use kokorotts::{
    logging,
    server::{self, AppState, ServerArgs},
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = ServerArgs::parse();
    logging::init_logging(args.debug, args.log_format);
    debug!(backend = ?args.model.backend, model = %args.model.model_path.display(), "Debug logging enabled");

    // Model and voicepacks load synchronously and abort start-up on failure.
    let state = tokio::task::spawn_blocking({
        let args = args.clone();
        move || AppState::from_args(&args)
    })
    .await
    .context("Start-up task panicked")??;
    info!(
        backend = %args.model.backend,
        default_voice = %args.model.default_voice,
        voices = state.pipeline.voices().len(),
        "Kokoro TTS initialised"
    );

    let listener = TcpListener::bind((args.host.as_str(), args.port))
        .await
        .with_context(|| format!("Cannot bind {}:{}", args.host, args.port))?;
    server::serve(listener, state).await
}
