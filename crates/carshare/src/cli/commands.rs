//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Subcommand, ValueEnum};

use crate::error::Result;
use crate::listing::{Attachment, ListingDraft, Location};

/// Listing commands.
#[derive(Debug, Subcommand)]
pub enum ListingCommand {
    /// Upload, mint and add a listing
    Create(ListingArgs),

    /// Check a listing form without uploading anything
    Validate(ListingArgs),
}

/// The listing form.
#[derive(Debug, Args)]
pub struct ListingArgs {
    /// Manufacturer
    #[arg(long)]
    pub make: String,

    /// Model name
    #[arg(long)]
    pub model: String,

    /// Model year
    #[arg(long)]
    pub year: String,

    /// Daily price (e.g. 45 or 45.50)
    #[arg(long)]
    pub price: String,

    /// Description
    #[arg(short, long, default_value = "")]
    pub description: String,

    /// Pickup address
    #[arg(short, long, default_value = "")]
    pub address: String,

    /// Latitude of the pickup location
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    pub lat: Option<f64>,

    /// Longitude of the pickup location
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    pub lon: Option<f64>,

    /// Image file (repeat for more)
    #[arg(short, long = "image", value_name = "FILE")]
    pub images: Vec<PathBuf>,

    /// Insurance document
    #[arg(long, value_name = "FILE")]
    pub insurance: Option<PathBuf>,

    /// Registration document
    #[arg(long, value_name = "FILE")]
    pub registration: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

impl ListingArgs {
    /// Read the attachments and build the draft.
    ///
    /// # Errors
    ///
    /// Returns an error if an attachment cannot be read.
    pub fn to_draft(&self) -> Result<ListingDraft> {
        let mut location = Location::address(self.address.clone());
        if let (Some(lat), Some(lon)) = (self.lat, self.lon) {
            location = location.with_coordinates(lat, lon);
        }
        Ok(ListingDraft {
            make: self.make.clone(),
            model: self.model.clone(),
            year: self.year.clone(),
            description: self.description.clone(),
            price_per_day: self.price.clone(),
            location,
            images: self
                .images
                .iter()
                .map(Attachment::from_path)
                .collect::<Result<_>>()?,
            insurance: self.insurance.as_ref().map(Attachment::from_path).transpose()?,
            registration: self
                .registration
                .as_ref()
                .map(Attachment::from_path)
                .transpose()?,
        })
    }
}

/// Chat command arguments.
#[derive(Debug, Args)]
pub struct ChatCommand {
    /// Message to send (repeat for more); reads stdin lines when omitted
    #[arg(short, long = "message", value_name = "TEXT")]
    pub messages: Vec<String>,

    /// Reply without the simulated delay
    #[arg(long)]
    pub no_delay: bool,
}

/// Quote command arguments.
#[derive(Debug, Args)]
pub struct QuoteCommand {
    /// Daily price (e.g. 45 or 45.50)
    #[arg(long)]
    pub price: String,

    /// First day (YYYY-MM-DD)
    #[arg(long)]
    pub start: NaiveDate,

    /// Return day (YYYY-MM-DD)
    #[arg(long)]
    pub end: NaiveDate,

    /// Security deposit; defaults to the configured one
    #[arg(long)]
    pub deposit: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

/// Identity provider commands.
#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Print an authorization URL with a fresh PKCE challenge
    Url {
        /// Also print the code verifier
        #[arg(long)]
        show_verifier: bool,
    },
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Plain,
    /// JSON output
    Json,
}
