//! Command-line demo: parse transcripts from stdin
//!
//! Each line is parsed with the built-in commands plus any configured custom
//! commands, and printed as JSON (`null` when nothing matches).
//!
//! Usage: `classvoice [CONFIG_PATH]`

use anyhow::Context;
use classvoice::commands::CommandParser;
use classvoice::config::{default_config_path, VoiceConfig};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

fn init_logging() {
    use tracing_subscriber::prelude::*;

    struct LocalTimer;
    impl tracing_subscriber::fmt::time::FormatTime for LocalTimer {
        fn format_time(
            &self,
            w: &mut tracing_subscriber::fmt::format::Writer<'_>,
        ) -> std::fmt::Result {
            write!(w, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
        }
    }

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_timer(LocalTimer);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("classvoice=info")),
        )
        .with(stderr_layer)
        .init();
}

fn main() -> anyhow::Result<()> {
    init_logging();

    let config_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);
    let config = VoiceConfig::load_from(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    let parser =
        CommandParser::from_config(&config.parser).context("Failed to build command parser")?;

    tracing::info!(
        "Loaded {} commands, reading transcripts from stdin",
        parser.commands().len()
    );

    let mut stdout = io::stdout().lock();
    for line in io::stdin().lock().lines() {
        let line = line.context("Failed to read from stdin")?;
        if line.trim().is_empty() {
            continue;
        }

        match parser.parse(&line) {
            Some(command) => writeln!(stdout, "{}", serde_json::to_string(&command)?)?,
            None => writeln!(stdout, "null")?,
        }
    }

    Ok(())
}
