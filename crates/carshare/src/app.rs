//! Application context.
//!
//! [`AppContext`] holds the shared state and capability adapters every
//! operation needs. It is built once from [`Config`] and passed explicitly;
//! which adapters it holds is decided by `adapters.mode`.

use std::sync::{Arc, Mutex};

use carshare_ledger::Ledger;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use crate::auth::{AuthSession, ClientConfig};
use crate::chat::{AutoResponder, Conversation, ReplyDelay};
use crate::config::{AdapterMode, Config};
use crate::error::{Error, Result};
use crate::rental::RentalWizard;
use crate::services::fake::{FakeContentStore, FakeMinter, FakeWallet};
use crate::services::local::{LedgerMinter, LocalContentStore};
use crate::services::{ContentStore, IdGenerator, IdentityProvider, Minter, SeededIds, Wallet};
use crate::store::ListingStore;
use crate::submit::ListingSubmitter;
use crate::wallet::WalletSession;

/// Shared state and adapters.
#[derive(Debug, Clone)]
pub struct AppContext {
    config: Config,
    ids: Arc<dyn IdGenerator>,
    content: Arc<dyn ContentStore>,
    minter: Arc<dyn Minter>,
    wallet: WalletSession,
    store: Arc<ListingStore>,
    responder: Arc<AutoResponder>,
    ledger: Option<Arc<Mutex<Ledger>>>,
}

impl AppContext {
    /// Build the context selected by `config`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a chat rule does not compile.
    pub fn from_config(config: Config) -> Result<Self> {
        let ids: Arc<dyn IdGenerator> = Arc::new(SeededIds::from_seed_option(config.adapters.seed));
        let responder = Arc::new(AutoResponder::from_config(&config.chat)?);

        let (content, minter, ledger) = match config.adapters.mode {
            AdapterMode::Fake => {
                let content: Arc<dyn ContentStore> =
                    Arc::new(FakeContentStore::new(Arc::clone(&ids)));
                let minter: Arc<dyn Minter> = Arc::new(FakeMinter::new(Arc::clone(&ids)));
                (content, minter, None)
            }
            AdapterMode::Local => {
                let mut store = LocalContentStore::new();
                if let Some(max) = config.adapters.max_object_size {
                    store = store.with_max_object_size(max);
                }
                let ledger_minter = LedgerMinter::new();
                let ledger = ledger_minter.ledger();
                let content: Arc<dyn ContentStore> = Arc::new(store);
                let minter: Arc<dyn Minter> = Arc::new(ledger_minter);
                (content, minter, Some(ledger))
            }
        };

        // Wallet connectors are external; every mode signs with the fake wallet.
        let account = config
            .wallet
            .account
            .clone()
            .unwrap_or_else(|| ids.transaction_hash()[..42].to_string());
        let wallet = WalletSession::from_config(Arc::new(FakeWallet::new(account)), &config.wallet);

        info!(
            mode = ?config.adapters.mode,
            store = content.name(),
            minter = minter.name(),
            seeded = config.adapters.seed.is_some(),
            "Application context ready"
        );

        Ok(Self {
            config,
            ids,
            content,
            minter,
            wallet,
            store: Arc::new(ListingStore::new()),
            responder,
            ledger,
        })
    }

    /// Replace the wallet connector.
    #[must_use]
    pub fn with_wallet(mut self, wallet: Arc<dyn Wallet>) -> Self {
        self.wallet = WalletSession::from_config(wallet, &self.config.wallet);
        self
    }

    /// The configuration the context was built from.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The listing store.
    #[must_use]
    pub fn store(&self) -> &Arc<ListingStore> {
        &self.store
    }

    /// The wallet session.
    #[must_use]
    pub fn wallet(&self) -> &WalletSession {
        &self.wallet
    }

    /// The content store.
    #[must_use]
    pub fn content_store(&self) -> &Arc<dyn ContentStore> {
        &self.content
    }

    /// The rental ledger, in local mode.
    #[must_use]
    pub fn ledger(&self) -> Option<Arc<Mutex<Ledger>>> {
        self.ledger.clone()
    }

    /// A listing submitter over this context's adapters.
    #[must_use]
    pub fn submitter(&self) -> ListingSubmitter {
        ListingSubmitter::new(
            Arc::clone(&self.content),
            Arc::clone(&self.minter),
            self.wallet.clone(),
            Arc::clone(&self.store),
            Arc::clone(&self.ids),
        )
        .with_max_images(self.config.listing.max_images)
    }

    /// Start a chat with a listing's owner.
    #[must_use]
    pub fn conversation(&self) -> Conversation {
        let rng = match self.config.adapters.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Conversation::new(
            Arc::clone(&self.responder),
            ReplyDelay::from_config(&self.config.chat),
            rng,
        )
    }

    /// Start booking a listing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ListingNotFound`] if no listing has the id.
    pub fn rental_wizard(&self, listing_id: &str) -> Result<RentalWizard> {
        let listing = self
            .store
            .get(listing_id)
            .ok_or_else(|| Error::ListingNotFound(listing_id.to_string()))?;
        Ok(RentalWizard::new(&listing, self.config.security_deposit()))
    }

    /// Start a sign-in session against `provider`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the auth settings are incomplete.
    pub fn auth_session(&self, provider: Arc<dyn IdentityProvider>) -> Result<AuthSession> {
        AuthSession::new(ClientConfig::from_settings(&self.config.auth), provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthUser;
    use crate::listing::{Attachment, ListingDraft, Location, Price};
    use crate::services::fake::{FakeIdentityProvider, WalletBehavior};

    fn config(mode: AdapterMode) -> Config {
        let mut config = Config::default();
        config.adapters.mode = mode;
        config.adapters.seed = Some(3);
        config.chat.reply_delay_min_ms = 0;
        config.chat.reply_delay_max_ms = 0;
        config
    }

    fn draft() -> ListingDraft {
        ListingDraft {
            make: "Tesla".to_string(),
            model: "Model 3".to_string(),
            year: "2022".to_string(),
            price_per_day: "89.50".to_string(),
            location: Location::address("Porto"),
            images: vec![Attachment::new("a.jpg", "image/jpeg", vec![1, 2, 3])],
            ..ListingDraft::default()
        }
    }

    #[test]
    fn test_fake_mode() {
        let app = AppContext::from_config(config(AdapterMode::Fake)).unwrap();
        assert_eq!(app.content_store().name(), "fake");
        assert!(app.ledger().is_none());
        assert!(app.store().is_empty());
    }

    #[test]
    fn test_local_mode() {
        let app = AppContext::from_config(config(AdapterMode::Local)).unwrap();
        assert_eq!(app.content_store().name(), "local");
        assert!(app.ledger().is_some());
    }

    #[tokio::test]
    async fn test_seeded_account_is_stable() {
        let a = AppContext::from_config(config(AdapterMode::Fake)).unwrap();
        let b = AppContext::from_config(config(AdapterMode::Fake)).unwrap();
        assert_eq!(a.wallet().chain_id(), 314_159);
        // not connected until asked
        assert!(a.wallet().account().is_err());

        let account = a.wallet().connect().await.unwrap();
        assert_eq!(account, b.wallet().connect().await.unwrap());
        assert_eq!(account.len(), 42);
        assert!(account.starts_with("0x"));
    }

    #[tokio::test]
    async fn test_submit_then_rent() {
        let app = AppContext::from_config(config(AdapterMode::Local)).unwrap();
        app.wallet().connect().await.unwrap();

        let listing = app.submitter().submit(&draft()).await.unwrap().listing;
        assert_eq!(app.store().newest().unwrap().id, listing.id);
        assert_eq!(app.ledger().unwrap().lock().unwrap().len(), 1);

        let mut wizard = app.rental_wizard(&listing.id).unwrap();
        wizard.set_dates(
            "2025-06-01".parse().unwrap(),
            "2025-06-03".parse().unwrap(),
        );
        let quote = wizard.quote().unwrap();
        assert_eq!(quote.cost, Price::from_cents(17_900));
        assert_eq!(quote.total, Price::from_cents(37_900));

        assert!(matches!(
            app.rental_wizard("missing"),
            Err(Error::ListingNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_injected_wallet() {
        let app = AppContext::from_config(config(AdapterMode::Fake))
            .unwrap()
            .with_wallet(Arc::new(FakeWallet::with_behavior(
                "0xabc",
                WalletBehavior::Unavailable("no provider".into()),
            )));
        assert!(matches!(
            app.wallet().connect().await,
            Err(Error::WalletUnavailable(_))
        ));
        assert!(matches!(
            app.submitter().submit(&draft()).await,
            Err(Error::WalletNotConnected)
        ));
    }

    #[tokio::test]
    async fn test_conversation_uses_config() {
        let app = AppContext::from_config(config(AdapterMode::Fake)).unwrap();
        let mut chat = app.conversation();
        let reply = chat.send("is it available?").await.unwrap();
        assert!(reply.text.contains("available"));
    }

    #[test]
    fn test_auth_session_requires_settings() {
        let app = AppContext::from_config(config(AdapterMode::Fake)).unwrap();
        let user = AuthUser {
            sub: "s".to_string(),
            name: "n".to_string(),
            email: None,
            picture: None,
        };
        let provider = Arc::new(FakeIdentityProvider::new("c", user));
        assert!(app.auth_session(provider.clone()).is_err());

        let mut cfg = config(AdapterMode::Fake);
        cfg.auth.base_url = "https://auth.example.com/oauth".to_string();
        cfg.auth.client_id = "client".to_string();
        let app = AppContext::from_config(cfg).unwrap();
        assert!(app.auth_session(provider).is_ok());
    }

    #[test]
    fn test_bad_chat_rule_is_rejected() {
        let mut cfg = config(AdapterMode::Fake);
        cfg.chat.rules.push(crate::config::ChatRuleConfig {
            name: "bad".to_string(),
            pattern: "(".to_string(),
            reply: "x".to_string(),
        });
        assert!(AppContext::from_config(cfg).is_err());
    }
}
