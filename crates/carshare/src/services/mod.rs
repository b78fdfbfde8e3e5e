//! Capability interfaces for the external collaborators.
//!
//! Every external boundary of the marketplace is a trait here:
//!
//! - [`ContentStore`]: content-addressed upload returning a CID
//! - [`Minter`]: records a listing's metadata reference on a contract
//! - [`Wallet`]: account connection and message signing
//! - [`IdentityProvider`]: authorization-code exchange and user info
//!
//! Two families of implementations exist. The [`fake`] adapters are
//! deterministic given a seeded [`IdGenerator`] and support failure
//! injection for tests. The [`local`] adapters do the real work in process:
//! BLAKE3 content addressing and the rental ledger. Which one an
//! application uses is decided by configuration (see [`crate::app`]).

pub mod fake;
pub mod ids;
pub mod local;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::auth::{AuthUser, TokenSet};
use crate::error::Result;
use crate::listing::Price;

pub use ids::{IdGenerator, SeededIds};

/// A signature produced by a wallet, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(pub String);

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the minter is asked to record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintRequest {
    /// `ipfs://` URI of the listing metadata.
    pub metadata_uri: String,
    /// Full wallet address of the owner.
    pub owner: String,
    /// Daily price of the listing.
    pub price_per_day: Price,
    /// Owner's signature over the metadata URI.
    pub signature: Signature,
}

/// Outcome of a mint transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintReceipt {
    /// Transaction hash.
    pub transaction_hash: String,
    /// Whether the transaction succeeded.
    pub success: bool,
    /// Block the transaction landed in.
    pub block_number: u64,
    /// Token id assigned to the listing, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_id: Option<u64>,
}

/// Content-addressed storage.
#[async_trait]
pub trait ContentStore: Send + Sync + fmt::Debug {
    /// Name of this store (for logging).
    fn name(&self) -> &'static str;

    /// Upload a payload and return its content identifier.
    ///
    /// # Errors
    ///
    /// Returns an upload error if the store rejects the payload.
    async fn upload(&self, name: &str, bytes: &[u8], content_type: &str) -> Result<String>;
}

/// Contract mint call.
#[async_trait]
pub trait Minter: Send + Sync + fmt::Debug {
    /// Name of this minter (for logging).
    fn name(&self) -> &'static str;

    /// Record a listing's metadata reference and return the receipt.
    ///
    /// # Errors
    ///
    /// Returns a mint error if the call fails or reverts.
    async fn mint(&self, request: &MintRequest) -> Result<MintReceipt>;
}

/// A wallet connector.
///
/// Connection failures surface as [`crate::Error::WalletUnavailable`], while
/// signing failures are either [`crate::Error::SignatureRejected`] (the user
/// declined) or [`crate::Error::Signing`] (the signer broke).
#[async_trait]
pub trait Wallet: Send + Sync + fmt::Debug {
    /// Connect and return the account address.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::WalletUnavailable`] if no wallet can be reached.
    async fn connect(&self) -> Result<String>;

    /// Drop the connection.
    async fn disconnect(&self);

    /// Address of the connected account.
    fn address(&self) -> Option<String>;

    /// Whether an account is connected.
    fn is_connected(&self) -> bool {
        self.address().is_some()
    }

    /// Sign a message with the connected account.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::WalletNotConnected`],
    /// [`crate::Error::SignatureRejected`] or [`crate::Error::Signing`].
    async fn sign(&self, message: &[u8]) -> Result<Signature>;
}

/// An OAuth/OIDC identity provider consumed through the
/// authorization-code-with-PKCE exchange.
#[async_trait]
pub trait IdentityProvider: Send + Sync + fmt::Debug {
    /// Exchange an authorization code for tokens.
    ///
    /// # Errors
    ///
    /// Returns an auth error if the provider rejects the exchange.
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> Result<TokenSet>;

    /// Fetch the profile of the token's subject.
    ///
    /// # Errors
    ///
    /// Returns an auth error if the token is not accepted.
    async fn user_info(&self, access_token: &str) -> Result<AuthUser>;
}
