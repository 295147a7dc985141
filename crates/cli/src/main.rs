use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{EnvFilter, filter::LevelFilter};

mod commands;
mod config;
mod utils;

use commands::Commands;

#[derive(Parser)]
#[command(version, about = "Talk APDU to smart cards over PC/SC")]
struct Cli {
    /// Reader to use (defaults to the configured reader, then the first one holding a card)
    #[arg(short, long, global = true)]
    reader: Option<String>,

    /// Path to a TOML config file (defaults to ~/.cardlink/cardlink.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug level output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> eyre::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let config = config::load_config(cli.config.as_deref())?;
    let reader = cli.reader.or_else(|| config.reader.clone());

    commands::run(cli.command, reader.as_deref(), &config)
}

fn setup_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(level))
        .with_ansi(true)
        .init();
}

/// `RUST_LOG` directives on top of a default of `level`
fn log_filter(level: tracing::Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy()
}

#[cfg(test)]
mod tests {
    use tracing::Level;
    use tracing_subscriber::layer::SubscriberExt;

    use super::*;

    fn enabled_with(level: Level) -> (bool, bool) {
        let subscriber = tracing_subscriber::registry().with(log_filter(level));
        tracing::subscriber::with_default(subscriber, || {
            (tracing::enabled!(Level::DEBUG), tracing::enabled!(Level::INFO))
        })
    }

    #[test]
    fn test_verbose_enables_debug() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        assert_eq!(enabled_with(Level::DEBUG), (true, true));
        assert_eq!(enabled_with(Level::INFO), (false, true));
    }
}
