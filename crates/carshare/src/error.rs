//! Error types for carshare.
//!
//! This module defines all error types used throughout the carshare crate.
//! Errors fall into two coarse groups: validation errors, which block an
//! operation before any external call is made, and operation errors, raised by
//! a capability (storage, mint, wallet, identity provider) while a flow runs.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// The single message shown to a user when a listing flow fails.
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to create listing or mint NFT. Please try again.";

/// The single message shown to a user when sign-in or sign-out fails.
pub const AUTH_FAILURE_MESSAGE: &str = "Sign-in failed. Please try again.";

/// The message shown for failures outside the listing and sign-in flows.
pub const UNEXPECTED_FAILURE_MESSAGE: &str = "Something went wrong. Please try again.";

/// Steps of the listing submission pipeline, recorded on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubmissionStage {
    /// Uploading car images.
    UploadImages,
    /// Uploading insurance or registration documents.
    UploadDocuments,
    /// Serializing the metadata record.
    BuildMetadata,
    /// Uploading the metadata record.
    UploadMetadata,
    /// Minting the listing NFT.
    Mint,
}

impl fmt::Display for SubmissionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UploadImages => write!(f, "upload_images"),
            Self::UploadDocuments => write!(f, "upload_documents"),
            Self::BuildMetadata => write!(f, "build_metadata"),
            Self::UploadMetadata => write!(f, "upload_metadata"),
            Self::Mint => write!(f, "mint"),
        }
    }
}

/// The main error type for carshare operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Validation Errors ===
    /// A required form field is empty.
    #[error("missing required field: {field}")]
    MissingField {
        /// Name of the empty field.
        field: &'static str,
    },

    /// A form field has an unusable value.
    #[error("invalid {field}: {message}")]
    InvalidField {
        /// Name of the field.
        field: &'static str,
        /// Why the value was rejected.
        message: String,
    },

    /// No image was attached to a listing.
    #[error("at least one image of the car is required")]
    NoImages,

    /// Too many images were attached to a listing.
    #[error("too many images: {count} (maximum {max})")]
    TooManyImages {
        /// Number of images attached.
        count: usize,
        /// Configured maximum.
        max: usize,
    },

    /// A wizard step was left incomplete.
    #[error("step '{step}' is incomplete: {message}")]
    IncompleteStep {
        /// Name of the step.
        step: &'static str,
        /// What is missing.
        message: String,
    },

    // === Wallet Errors ===
    /// No wallet provider could be reached or the user declined to connect.
    #[error("wallet unavailable: {0}")]
    WalletUnavailable(String),

    /// An operation needed a connected wallet.
    #[error("wallet not connected")]
    WalletNotConnected,

    /// The user rejected a signature request.
    #[error("signature rejected by user")]
    SignatureRejected,

    /// The wallet failed to produce a signature.
    #[error("signing failed: {0}")]
    Signing(String),

    // === Capability Errors ===
    /// Uploading to the content-addressed store failed.
    #[error("upload of '{name}' failed: {message}")]
    Upload {
        /// Name of the uploaded object.
        name: String,
        /// Description of what went wrong.
        message: String,
    },

    /// The mint call failed or reverted.
    #[error("mint failed: {0}")]
    Mint(String),

    /// The identity provider rejected or failed an exchange.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// A ledger precondition did not hold.
    #[error("ledger error: {0}")]
    Ledger(#[from] carshare_ledger::LedgerError),

    /// A listing submission failed at a given stage.
    #[error("listing submission failed at {stage}: {source}")]
    Submission {
        /// The stage that failed.
        stage: SubmissionStage,
        /// The underlying error.
        #[source]
        source: Box<Error>,
    },

    /// A listing could not be found.
    #[error("listing not found: {0}")]
    ListingNotFound(String),

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to read an attachment from disk.
    #[error("failed to read {path}: {source}")]
    ReadAttachment {
        /// Path of the attachment.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A URL could not be built.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for carshare operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create an invalid field error.
    #[must_use]
    pub fn invalid_field(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            message: message.into(),
        }
    }

    /// Create an upload error.
    #[must_use]
    pub fn upload(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upload {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a mint error.
    #[must_use]
    pub fn mint(message: impl Into<String>) -> Self {
        Self::Mint(message.into())
    }

    /// Create an authentication error.
    #[must_use]
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// Create a wallet unavailable error.
    #[must_use]
    pub fn wallet_unavailable(message: impl Into<String>) -> Self {
        Self::WalletUnavailable(message.into())
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Wrap an error with the submission stage it happened in.
    #[must_use]
    pub fn at_stage(self, stage: SubmissionStage) -> Self {
        Self::Submission {
            stage,
            source: Box::new(self),
        }
    }

    /// Check if this error blocks an operation before any external call.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingField { .. }
                | Self::InvalidField { .. }
                | Self::NoImages
                | Self::TooManyImages { .. }
                | Self::IncompleteStep { .. }
                | Self::WalletNotConnected
        )
    }

    /// Check if this error came from the wallet.
    #[must_use]
    pub fn is_wallet_error(&self) -> bool {
        match self {
            Self::WalletUnavailable(_)
            | Self::WalletNotConnected
            | Self::SignatureRejected
            | Self::Signing(_) => true,
            Self::Submission { source, .. } => source.is_wallet_error(),
            _ => false,
        }
    }

    /// The stage a submission failed at, if any.
    #[must_use]
    pub fn stage(&self) -> Option<SubmissionStage> {
        match self {
            Self::Submission { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The message to show a user.
    ///
    /// Validation, lookup, ledger and configuration errors keep their own
    /// text. Listing flow failures (storage, mint, wallet, submission) are
    /// reduced to [`GENERIC_FAILURE_MESSAGE`] and sign-in failures to
    /// [`AUTH_FAILURE_MESSAGE`].
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingField { .. } => "Please fill in all required fields".to_string(),
            Self::NoImages => "Please upload at least one image of your car".to_string(),
            Self::WalletNotConnected => {
                "Please connect your wallet to create a listing".to_string()
            }
            Self::InvalidField { .. }
            | Self::TooManyImages { .. }
            | Self::IncompleteStep { .. }
            | Self::ReadAttachment { .. }
            | Self::ListingNotFound(_)
            | Self::Ledger(_)
            | Self::ConfigLoad(_)
            | Self::ConfigValidation { .. } => capitalize(&self.to_string()),
            Self::Submission { .. }
            | Self::Upload { .. }
            | Self::Mint(_)
            | Self::WalletUnavailable(_)
            | Self::SignatureRejected
            | Self::Signing(_) => GENERIC_FAILURE_MESSAGE.to_string(),
            Self::Auth(_) => AUTH_FAILURE_MESSAGE.to_string(),
            Self::Io(_) | Self::Json(_) | Self::Url(_) | Self::Internal(_) => {
                UNEXPECTED_FAILURE_MESSAGE.to_string()
            }
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
