//! Zapdesk CLI: entry point.
//!
//! # Commands
//!
//! - `zapdesk serve`: run the `/api/whatsapp` HTTP API
//! - `zapdesk login`: pair this machine by scanning a QR code in the terminal
//! - `zapdesk send --to NUMBER --message TEXT`: send one message and exit
//! - `zapdesk status`: show configuration
//! - `zapdesk onboard`: initialize config and the credentials directory

mod gateway;
mod helpers;
mod login;
mod onboard;
mod send_cmd;
mod status;

use anyhow::Result;
use clap::{Parser, Subcommand};

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// 📱 Zapdesk: WhatsApp session gateway
#[derive(Parser)]
#[command(name = "zapdesk", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API backed by the shared WhatsApp session
    Serve {
        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,

        /// Emit logs as JSON lines
        #[arg(long, default_value_t = false)]
        json_logs: bool,
    },

    /// Pair with WhatsApp by scanning a QR code in the terminal
    Login {
        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Send a single message using stored credentials
    Send {
        /// Destination phone number or chat id
        #[arg(short, long)]
        to: String,

        /// Message text
        #[arg(short, long)]
        message: String,

        /// Seconds to wait for the session to become ready
        #[arg(long, default_value_t = 60)]
        wait_secs: u64,

        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Show configuration
    Status,

    /// Initialize configuration and the credentials directory
    Onboard,
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { logs, json_logs } => {
            init_logging(logs, "info", json_logs);
            gateway::run().await
        }
        Commands::Login { logs } => {
            init_logging(logs, "warn", false);
            login::run().await
        }
        Commands::Send {
            to,
            message,
            wait_secs,
            logs,
        } => {
            init_logging(logs, "warn", false);
            send_cmd::run(&to, &message, wait_secs).await
        }
        Commands::Status => status::run(),
        Commands::Onboard => onboard::run(),
    }
}

/// Initialize tracing/logging.
///
/// `RUST_LOG` takes precedence over `quiet_level` unless `verbose` is set.
fn init_logging(verbose: bool, quiet_level: &str, json: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("zapdesk=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(quiet_level))
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_send() {
        let cli = Cli::parse_from([
            "zapdesk",
            "send",
            "--to",
            "48999999999",
            "-m",
            "Olá",
            "--wait-secs",
            "5",
        ]);
        match cli.command {
            Commands::Send {
                to,
                message,
                wait_secs,
                logs,
            } => {
                assert_eq!(to, "48999999999");
                assert_eq!(message, "Olá");
                assert_eq!(wait_secs, 5);
                assert!(!logs);
            }
            _ => panic!("expected send command"),
        }
    }

    #[test]
    fn test_parse_serve_flags() {
        let cli = Cli::parse_from(["zapdesk", "serve", "--json-logs"]);
        assert!(matches!(
            cli.command,
            Commands::Serve {
                logs: false,
                json_logs: true
            }
        ));
    }
}
