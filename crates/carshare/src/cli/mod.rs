//! Command-line interface for carshare.
//!
//! This module provides the CLI structure for the `carshare` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    AuthCommand, ChatCommand, ConfigCommand, ListingArgs, ListingCommand, OutputFormat,
    QuoteCommand,
};

use crate::logging::Verbosity;

/// carshare - peer-to-peer car rentals backed by NFT listings
///
/// Create listings, chat with owners and price rentals against local or
/// fake adapters.
#[derive(Debug, Parser)]
#[command(name = "carshare")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create or check car listings
    #[command(subcommand)]
    Listing(ListingCommand),

    /// Chat with a car owner
    Chat(ChatCommand),

    /// Price a rental
    Quote(QuoteCommand),

    /// Identity provider helpers
    #[command(subcommand)]
    Auth(AuthCommand),

    /// View or check configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_name() {
        let cli = Cli::command();
        assert_eq!(cli.get_name(), "carshare");
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity_flags() {
        let cli = Cli::try_parse_from(["carshare", "-q", "config", "path"]).unwrap();
        assert_eq!(cli.verbosity(), Verbosity::Quiet);

        let cli = Cli::try_parse_from(["carshare", "-vv", "config", "path"]).unwrap();
        assert_eq!(cli.verbosity(), Verbosity::Trace);

        let cli = Cli::try_parse_from(["carshare", "config", "path"]).unwrap();
        assert_eq!(cli.verbosity(), Verbosity::Normal);
    }

    #[test]
    fn test_parse_listing_create() {
        let cli = Cli::try_parse_from([
            "carshare",
            "listing",
            "create",
            "--make",
            "Toyota",
            "--model",
            "Camry",
            "--year",
            "2020",
            "--price",
            "45",
            "--image",
            "front.png",
            "--image",
            "back.png",
            "--lat",
            "38.7",
            "--lon",
            "-9.1",
        ])
        .unwrap();
        let Command::Listing(ListingCommand::Create(args)) = cli.command else {
            panic!("expected listing create");
        };
        assert_eq!(args.make, "Toyota");
        assert_eq!(args.images.len(), 2);
        assert_eq!(args.lat, Some(38.7));
    }

    #[test]
    fn test_lat_requires_lon() {
        let result = Cli::try_parse_from([
            "carshare", "listing", "validate", "--make", "a", "--model", "b", "--year", "2020",
            "--price", "1", "--lat", "1.0",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_chat() {
        let cli = Cli::try_parse_from(["carshare", "chat", "-m", "hi", "-m", "price?"]).unwrap();
        let Command::Chat(chat) = cli.command else {
            panic!("expected chat");
        };
        assert_eq!(chat.messages, vec!["hi".to_string(), "price?".to_string()]);
    }

    #[test]
    fn test_parse_quote() {
        let cli = Cli::try_parse_from([
            "carshare",
            "quote",
            "--price",
            "45",
            "--start",
            "2025-03-01",
            "--end",
            "2025-03-04",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Quote(_)));
    }

    #[test]
    fn test_parse_quote_rejects_bad_date() {
        let result = Cli::try_parse_from([
            "carshare", "quote", "--price", "45", "--start", "March 1", "--end", "2025-03-04",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_with_config() {
        let cli =
            Cli::try_parse_from(["carshare", "-c", "/custom/config.toml", "config", "show"])
                .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }

    #[test]
    fn test_parse_auth_url() {
        let cli = Cli::try_parse_from(["carshare", "auth", "url"]).unwrap();
        assert!(matches!(cli.command, Command::Auth(AuthCommand::Url { .. })));
    }
}
