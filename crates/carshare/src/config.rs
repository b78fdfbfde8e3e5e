//! Configuration management for carshare.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::listing::Price;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default config directory name.
const CONFIG_DIR_NAME: &str = "carshare";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `CARSHARE_`, sections separated
///    by `__`, e.g. `CARSHARE_LISTING__MAX_IMAGES=3`)
/// 2. TOML config file at `~/.config/carshare/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Adapter selection.
    pub adapters: AdapterConfig,
    /// Listing form configuration.
    pub listing: ListingConfig,
    /// Chat auto-responder configuration.
    pub chat: ChatConfig,
    /// Rental wizard configuration.
    pub rental: RentalConfig,
    /// Identity provider configuration.
    pub auth: AuthSettings,
    /// Wallet configuration.
    pub wallet: WalletConfig,
}

/// Which family of capability adapters to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterMode {
    /// Deterministic in-memory fakes.
    #[default]
    Fake,
    /// In-process content addressing and rental ledger.
    Local,
}

/// Adapter-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Adapter family.
    pub mode: AdapterMode,
    /// Seed for identifier and reply randomness.
    /// Unset means seeded from OS entropy.
    pub seed: Option<u64>,
    /// Largest payload the local content store accepts, in bytes.
    /// Unset means unlimited.
    pub max_object_size: Option<usize>,
}

/// Listing-related configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    /// Maximum number of images per listing.
    pub max_images: usize,
}

/// A configured auto-responder rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRuleConfig {
    /// Rule name, used in logs.
    pub name: String,
    /// Regex matched against the incoming message.
    pub pattern: String,
    /// Canned reply.
    pub reply: String,
}

/// Chat-related configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Shortest delay before the owner reply, in milliseconds.
    pub reply_delay_min_ms: u64,
    /// Longest delay before the owner reply, in milliseconds.
    pub reply_delay_max_ms: u64,
    /// Extra rules, checked before the built-in ones.
    pub rules: Vec<ChatRuleConfig>,
    /// Fallback replies. Empty means the built-in list.
    pub fallbacks: Vec<String>,
}

/// Rental-related configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RentalConfig {
    /// Security deposit added to every rental, in cents.
    pub security_deposit_cents: u64,
}

/// Identity provider configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Provider base URL; endpoints are derived from it.
    pub base_url: String,
    /// OAuth client id.
    pub client_id: String,
    /// Redirect URI registered with the provider.
    pub redirect_uri: String,
    /// Requested scopes.
    pub scopes: Vec<String>,
}

/// Wallet-related configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Chain the wallet signs for.
    pub chain_id: u64,
    /// RPC endpoint of the chain.
    pub rpc_url: String,
    /// Account the fake wallet connects to.
    /// Defaults to one drawn from the id generator.
    pub account: Option<String>,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self { max_images: 5 }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            reply_delay_min_ms: 1_000,
            reply_delay_max_ms: 3_000,
            rules: Vec::new(),
            fallbacks: Vec::new(),
        }
    }
}

impl ChatConfig {
    /// Get the shortest reply delay as a Duration.
    #[must_use]
    pub fn reply_delay_min(&self) -> Duration {
        Duration::from_millis(self.reply_delay_min_ms)
    }

    /// Get the longest reply delay as a Duration.
    #[must_use]
    pub fn reply_delay_max(&self) -> Duration {
        Duration::from_millis(self.reply_delay_max_ms)
    }
}

impl Default for RentalConfig {
    fn default() -> Self {
        Self {
            security_deposit_cents: 20_000,
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            client_id: String::new(),
            redirect_uri: "carshare://callback".to_string(),
            scopes: vec![
                "openid".to_string(),
                "profile".to_string(),
                "email".to_string(),
            ],
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            chain_id: 314_159, // Filecoin Calibration testnet
            rpc_url: "https://filecoin-calibration.chainup.net/rpc/v1".to_string(),
            account: None,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("CARSHARE_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.listing.max_images == 0 {
            return Err(Error::ConfigValidation {
                message: "max_images must be greater than 0".to_string(),
            });
        }

        if self.chat.reply_delay_min_ms > self.chat.reply_delay_max_ms {
            return Err(Error::ConfigValidation {
                message: format!(
                    "reply_delay_min_ms ({}) cannot be greater than reply_delay_max_ms ({})",
                    self.chat.reply_delay_min_ms, self.chat.reply_delay_max_ms
                ),
            });
        }

        for rule in &self.chat.rules {
            if regex::Regex::new(&rule.pattern).is_err() {
                return Err(Error::ConfigValidation {
                    message: format!(
                        "invalid regex pattern in rule '{}': {}",
                        rule.name, rule.pattern
                    ),
                });
            }
        }

        if self.chat.fallbacks.iter().any(|f| f.trim().is_empty()) {
            return Err(Error::ConfigValidation {
                message: "fallback replies cannot be blank".to_string(),
            });
        }

        if self.adapters.max_object_size == Some(0) {
            return Err(Error::ConfigValidation {
                message: "max_object_size must be greater than 0".to_string(),
            });
        }

        if self.wallet.chain_id == 0 {
            return Err(Error::ConfigValidation {
                message: "chain_id must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Get the security deposit as a price.
    #[must_use]
    pub fn security_deposit(&self) -> Price {
        Price::from_cents(self.rental.security_deposit_cents)
    }
}
