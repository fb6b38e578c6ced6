//! `tracing-subscriber` setup for the binaries (`cli` feature).

use clap::ValueEnum;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    #[value(alias = "pretty")]
    Text,
    /// One JSON object per event.
    Json,
}

/// Filter used when `RUST_LOG` is unset.
///
/// ONNX Runtime is chatty at info, so it is held one level below the crate.
pub fn default_directives(debug: bool) -> &'static str {
    if debug {
        "debug,ort=info"
    } else {
        "info,ort=warn"
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the `debug` switch.
///
/// A second call is a no-op. Closing pipeline spans are logged so each
/// synthesis reports its own duration.
pub fn init_logging(debug: bool, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(debug)));

    let text = (format == LogFormat::Text)
        .then(|| fmt::layer().with_target(debug).with_span_events(FmtSpan::CLOSE));
    let json = (format == LogFormat::Json).then(|| {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_span_events(FmtSpan::CLOSE)
    });

    let _ = tracing_subscriber::registry().with(filter).with(text).with(json).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_values() {
        assert_eq!(LogFormat::from_str("json", true).unwrap(), LogFormat::Json);
        assert_eq!(LogFormat::from_str("TEXT", true).unwrap(), LogFormat::Text);
        assert_eq!(LogFormat::from_str("pretty", true).unwrap(), LogFormat::Text);
        assert!(LogFormat::from_str("xml", true).is_err());
    }

    #[test]
    fn test_debug_raises_crate_level_only() {
        assert!(default_directives(true).starts_with("debug"));
        assert!(default_directives(false).starts_with("info"));
        assert!(default_directives(false).contains("ort=warn"));
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init_logging(false, LogFormat::Text);
        init_logging(true, LogFormat::Json);
    }
}
