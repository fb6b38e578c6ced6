//! Command-line / environment configuration for `kokorotts-server`.
//!
//! Every flag has an environment fallback, so a `.env`-style deployment
//! works without arguments.

use std::time::Duration;

use anyhow::{bail, Result};
use clap::{ArgAction, Parser};

use crate::{cli::ModelArgs, logging::LogFormat};

/// Value shipped in sample `.env` files; never accepted as a real key.
pub const PLACEHOLDER_API_KEY: &str = "your_api_key_here";

#[derive(Debug, Clone, Parser)]
#[command(name = "kokorotts-server", version, about = "OpenAI-compatible Kokoro text-to-speech server")]
pub struct ServerArgs {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 9090)]
    pub port: u16,

    #[command(flatten)]
    pub model: ModelArgs,

    #[arg(long, env = "API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long, env = "REQUIRE_API_KEY", default_value = "true", value_parser = parse_boolish, action = ArgAction::Set)]
    pub require_api_key: bool,

    #[arg(long, env = "INFER_TIMEOUT_SECS", default_value_t = 60)]
    pub infer_timeout_secs: u64,

    #[arg(long, env = "DEBUG", default_value = "false", value_parser = parse_boolish, action = ArgAction::Set)]
    pub debug: bool,

    #[arg(long, env = "LOG_FORMAT", value_enum, ignore_case = true, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl ServerArgs {
    pub fn infer_timeout(&self) -> Duration {
        Duration::from_secs(self.infer_timeout_secs)
    }

    /// The key requests must present, or `None` when auth is off.
    ///
    /// Fails when auth is on but the key is unset, blank or the placeholder.
    pub fn required_api_key(&self) -> Result<Option<String>> {
        if !self.require_api_key {
            return Ok(None);
        }
        match self.api_key.as_deref().map(str::trim) {
            None | Some("") => bail!("API_KEY must be set when REQUIRE_API_KEY is enabled"),
            Some(PLACEHOLDER_API_KEY) => {
                bail!("API_KEY is still the placeholder '{PLACEHOLDER_API_KEY}'; set a real key")
            }
            Some(key) => Ok(Some(key.to_string())),
        }
    }
}

/// Lenient boolean: `yes`/`y`/`true`/`t`/`1`/`on` and their negatives, any case.
pub fn parse_boolish(s: &str) -> Result<bool, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "yes" | "y" | "true" | "t" | "1" | "on" => Ok(true),
        "no" | "n" | "false" | "f" | "0" | "off" | "" => Ok(false),
        other => Err(format!("expected a boolean, got '{other}'")),
    }
}
