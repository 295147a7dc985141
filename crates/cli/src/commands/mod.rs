use clap::Subcommand;
use cardlink_transport_pcsc::PcscDeviceManager;
use tracing::info;

mod card_operations;
mod monitor;

pub use card_operations::*;
pub use monitor::*;

use crate::config::CliConfig;
use crate::utils::reader;

/// Define subcommands for the CLI
#[derive(Subcommand)]
pub enum Commands {
    /// List available readers
    List,

    /// Show the ATR of the inserted card and identify it
    Atr,

    /// Identify a card from an ATR given in hex
    Identify {
        /// ATR, with or without spaces or hyphens
        #[arg(required = true)]
        atr: String,
    },

    /// Send a raw command APDU and print the response
    Send {
        /// Command APDU in hex (e.g. 00A4040008A000000003000000)
        #[arg(required = true)]
        apdu: String,
    },

    /// Verify PIN
    VerifyPin {
        /// PIN code
        #[arg(required = true)]
        pin: String,
    },

    /// Show the remaining PIN attempts reported by the card
    PinRetries,

    /// Watch readers for card insertion and removal
    Monitor {
        /// Readers to watch (defaults to every connected reader)
        readers: Vec<String>,

        /// Stop after this many seconds (runs until interrupted otherwise)
        #[arg(long)]
        seconds: Option<u64>,
    },
}

/// Execute a subcommand
pub fn run(command: Commands, reader_name: Option<&str>, config: &CliConfig) -> eyre::Result<()> {
    match command {
        Commands::Identify { atr } => identify_command(&atr),
        Commands::List => reader::list_readers(&manager(config)?),
        Commands::Monitor { readers, seconds } => monitor_command(&manager(config)?, readers, seconds),
        Commands::Atr => run_card_command(CardCommand::Atr, reader_name, config),
        Commands::Send { apdu } => run_card_command(CardCommand::Send { apdu }, reader_name, config),
        Commands::VerifyPin { pin } => {
            run_card_command(CardCommand::VerifyPin { pin }, reader_name, config)
        }
        Commands::PinRetries => run_card_command(CardCommand::PinRetries, reader_name, config),
    }
}

fn manager(config: &CliConfig) -> eyre::Result<PcscDeviceManager> {
    Ok(PcscDeviceManager::with_config(config.pcsc_config())?)
}

/// Subcommands that need a card session
enum CardCommand {
    Atr,
    Send { apdu: String },
    VerifyPin { pin: String },
    PinRetries,
}

fn run_card_command(
    command: CardCommand,
    reader_name: Option<&str>,
    config: &CliConfig,
) -> eyre::Result<()> {
    let manager = manager(config)?;
    let reader = reader::resolve_reader(&manager, reader_name)?;
    info!("Using reader: {}", reader.name());

    let transport = manager.open_reader(reader.name())?;

    match command {
        CardCommand::Atr => atr_command(&transport),
        CardCommand::Send { apdu } => send_command(transport, &apdu, config),
        CardCommand::VerifyPin { pin } => verify_pin_command(transport, &pin, config),
        CardCommand::PinRetries => pin_retries_command(transport, config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identify_runs_without_reader() {
        let config = CliConfig::default();
        let command = Commands::Identify {
            atr: "3B 67 00 00 00 73 C8 40 13 00 90 00".into(),
        };
        assert!(run(command, Some("No such reader"), &config).is_ok());

        let command = Commands::Identify { atr: "3B 6".into() };
        assert!(run(command, None, &config).is_err());
    }
}
