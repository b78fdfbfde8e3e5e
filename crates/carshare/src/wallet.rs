//! Wallet session used by the listing flow.
//!
//! Wraps a [`Wallet`] connector with the chain it signs for. Listing
//! signatures cover the chain id and the metadata URI, so a signature made
//! for one chain is not valid on another.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::WalletConfig;
use crate::error::{Error, Result};
use crate::listing::short_address;
use crate::services::{Signature, Wallet};

/// A wallet bound to a chain.
#[derive(Debug, Clone)]
pub struct WalletSession {
    wallet: Arc<dyn Wallet>,
    chain_id: u64,
}

impl WalletSession {
    /// Bind `wallet` to `chain_id`.
    #[must_use]
    pub fn new(wallet: Arc<dyn Wallet>, chain_id: u64) -> Self {
        Self { wallet, chain_id }
    }

    /// Bind `wallet` to the configured chain.
    #[must_use]
    pub fn from_config(wallet: Arc<dyn Wallet>, config: &WalletConfig) -> Self {
        Self::new(wallet, config.chain_id)
    }

    /// Chain id signatures are made for.
    #[must_use]
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Connect and return the account address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WalletUnavailable`] if the wallet cannot be reached.
    pub async fn connect(&self) -> Result<String> {
        match self.wallet.connect().await {
            Ok(address) => {
                info!(
                    account = %short_address(&address),
                    chain_id = self.chain_id,
                    "Wallet connected"
                );
                Ok(address)
            }
            Err(e) => {
                warn!(error = %e, "Wallet connection failed");
                Err(e)
            }
        }
    }

    /// Disconnect.
    pub async fn disconnect(&self) {
        self.wallet.disconnect().await;
        info!("Wallet disconnected");
    }

    /// Whether an account is connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.wallet.is_connected()
    }

    /// The connected account.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WalletNotConnected`] if no account is connected.
    pub fn account(&self) -> Result<String> {
        self.wallet.address().ok_or(Error::WalletNotConnected)
    }

    /// The message signed to authorize minting `metadata_uri`.
    #[must_use]
    pub fn listing_message(&self, metadata_uri: &str) -> String {
        format!("carshare:{}:list:{metadata_uri}", self.chain_id)
    }

    /// Sign the authorization to mint `metadata_uri`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WalletNotConnected`], [`Error::SignatureRejected`] or
    /// [`Error::Signing`].
    pub async fn sign_listing(&self, metadata_uri: &str) -> Result<Signature> {
        let message = self.listing_message(metadata_uri);
        self.wallet.sign(message.as_bytes()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fake::{FakeWallet, WalletBehavior};

    const ACCOUNT: &str = "0x742d35Cc6634C0532925a3b8D4C9db96C4b4d8b6";

    #[tokio::test]
    async fn test_connect_and_account() {
        let session = WalletSession::new(Arc::new(FakeWallet::new(ACCOUNT)), 314_159);
        assert!(matches!(session.account(), Err(Error::WalletNotConnected)));

        assert_eq!(session.connect().await.unwrap(), ACCOUNT);
        assert!(session.is_connected());
        assert_eq!(session.account().unwrap(), ACCOUNT);

        session.disconnect().await;
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn test_signature_depends_on_chain() {
        let wallet: Arc<dyn Wallet> = Arc::new(FakeWallet::new(ACCOUNT));
        let a = WalletSession::new(Arc::clone(&wallet), 1);
        let b = WalletSession::new(wallet, 314_159);
        a.connect().await.unwrap();

        let sig_a = a.sign_listing("ipfs://meta").await.unwrap();
        let sig_b = b.sign_listing("ipfs://meta").await.unwrap();
        assert_ne!(sig_a, sig_b);
        assert!(a.listing_message("ipfs://meta").contains(":1:"));
    }

    #[tokio::test]
    async fn test_unavailable_wallet() {
        let session = WalletSession::from_config(
            Arc::new(FakeWallet::with_behavior(
                ACCOUNT,
                WalletBehavior::Unavailable("no provider".into()),
            )),
            &WalletConfig::default(),
        );
        assert!(matches!(
            session.connect().await,
            Err(Error::WalletUnavailable(_))
        ));
        assert_eq!(session.chain_id(), 314_159);
    }

    #[tokio::test]
    async fn test_rejected_signature() {
        let session = WalletSession::new(
            Arc::new(FakeWallet::with_behavior(ACCOUNT, WalletBehavior::RejectSignatures)),
            1,
        );
        session.connect().await.unwrap();
        assert!(matches!(
            session.sign_listing("ipfs://x").await,
            Err(Error::SignatureRejected)
        ));
    }
}
