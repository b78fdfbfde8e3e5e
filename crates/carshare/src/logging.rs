//! Logging setup for the carshare binary and tests.
//!
//! Two targets are enabled: `carshare` and `carshare_ledger`. At the default
//! (info) level they report adapter selection, wallet connection, each
//! listing submission with its metadata CID and mint transaction, rental
//! confirmations and every ledger event (`CarListed`, `RentalStarted`,
//! `RentalCompleted`). A failed submission stage is logged as a warning.
//! Debug adds per-upload CIDs, chat rule matches and reply delays.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Verbosity level for logging output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Suppress all output except errors.
    Quiet,
    /// Normal output level (info and above).
    #[default]
    Normal,
    /// Verbose output (debug and above).
    Verbose,
    /// Very verbose output (trace level).
    Trace,
}

impl Verbosity {
    /// Convert verbosity to tracing level filter.
    #[must_use]
    pub fn to_level_filter(&self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }

    /// Map the CLI's `-q` and `-v` counts to a verbosity.
    #[must_use]
    pub fn from_flags(quiet: bool, verbose: u8) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose {
            0 => Self::Normal,
            1 => Self::Verbose,
            _ => Self::Trace,
        }
    }
}

/// Install the stderr subscriber for both crate targets.
///
/// `RUST_LOG` replaces the filter derived from `verbosity`. Command output
/// stays on stdout, so `--format json` can be piped.
///
/// # Examples
///
/// ```no_run
/// use carshare::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::Verbose);
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbosity)));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    );

    // Ignore the error if a subscriber is already set
    let _ = subscriber.try_init();
}

/// Filter directive enabling both crate targets at `verbosity`.
fn default_filter(verbosity: Verbosity) -> String {
    format!(
        "carshare={level},carshare_ledger={level}",
        level = verbosity.to_level_filter()
    )
}

/// Initialize logging for tests.
///
/// Only warnings and errors are logged, through the test writer.
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}
