//! Deterministic in-memory adapters.
//!
//! Identifiers come from an injected [`IdGenerator`]; every call is recorded
//! so tests can assert on what was (or was not) invoked, and each adapter can
//! be told to fail.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{
    ContentStore, IdGenerator, IdentityProvider, MintReceipt, MintRequest, Minter, Signature,
    Wallet,
};
use crate::auth::{AuthUser, TokenSet};
use crate::error::{Error, Result};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A recorded upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRecord {
    /// Object name.
    pub name: String,
    /// MIME type.
    pub content_type: String,
    /// Payload size in bytes.
    pub size: usize,
    /// CID handed back.
    pub cid: String,
}

/// Fake content-addressed store.
#[derive(Debug)]
pub struct FakeContentStore {
    ids: Arc<dyn IdGenerator>,
    uploads: Mutex<Vec<UploadRecord>>,
    fail_after: Mutex<Option<usize>>,
}

impl FakeContentStore {
    /// Create a store drawing CIDs from `ids`.
    #[must_use]
    pub fn new(ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            ids,
            uploads: Mutex::new(Vec::new()),
            fail_after: Mutex::new(None),
        }
    }

    /// Make every upload after the first `n` successful ones fail.
    pub fn fail_after(&self, n: usize) {
        *lock(&self.fail_after) = Some(n);
    }

    /// Uploads performed so far.
    #[must_use]
    pub fn uploads(&self) -> Vec<UploadRecord> {
        lock(&self.uploads).clone()
    }

    /// Number of uploads performed so far.
    #[must_use]
    pub fn upload_count(&self) -> usize {
        lock(&self.uploads).len()
    }
}

#[async_trait]
impl ContentStore for FakeContentStore {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn upload(&self, name: &str, bytes: &[u8], content_type: &str) -> Result<String> {
        let mut uploads = lock(&self.uploads);
        if let Some(limit) = *lock(&self.fail_after) {
            if uploads.len() >= limit {
                warn!(name, "Injected upload failure");
                return Err(Error::upload(name, "injected failure"));
            }
        }

        let cid = self.ids.cid();
        debug!(name, content_type, size = bytes.len(), %cid, "Fake upload");
        uploads.push(UploadRecord {
            name: name.to_string(),
            content_type: content_type.to_string(),
            size: bytes.len(),
            cid: cid.clone(),
        });
        Ok(cid)
    }
}

/// Fake mint call.
#[derive(Debug)]
pub struct FakeMinter {
    ids: Arc<dyn IdGenerator>,
    minted: Mutex<Vec<MintRequest>>,
    failure: Mutex<Option<String>>,
}

impl FakeMinter {
    /// Create a minter drawing transaction hashes from `ids`.
    #[must_use]
    pub fn new(ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            ids,
            minted: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
        }
    }

    /// Make every mint fail with `message`.
    pub fn fail_with(&self, message: impl Into<String>) {
        *lock(&self.failure) = Some(message.into());
    }

    /// Requests minted so far.
    #[must_use]
    pub fn minted(&self) -> Vec<MintRequest> {
        lock(&self.minted).clone()
    }
}

#[async_trait]
impl Minter for FakeMinter {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn mint(&self, request: &MintRequest) -> Result<MintReceipt> {
        if let Some(message) = lock(&self.failure).clone() {
            return Err(Error::mint(message));
        }

        let mut minted = lock(&self.minted);
        minted.push(request.clone());
        let token_id = minted.len() as u64;
        let receipt = MintReceipt {
            transaction_hash: self.ids.transaction_hash(),
            success: true,
            block_number: 1_000 + token_id,
            token_id: Some(token_id),
        };
        debug!(uri = %request.metadata_uri, tx = %receipt.transaction_hash, "Fake mint");
        Ok(receipt)
    }
}

/// How a [`FakeWallet`] behaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletBehavior {
    /// Connects and signs.
    Normal,
    /// Cannot connect.
    Unavailable(String),
    /// Connects but the user rejects every signature.
    RejectSignatures,
    /// Connects but the signer fails.
    BrokenSigner(String),
}

/// Fake wallet with a fixed account.
#[derive(Debug)]
pub struct FakeWallet {
    account: String,
    behavior: WalletBehavior,
    connected: Mutex<bool>,
}

impl FakeWallet {
    /// A wallet that connects to `account` and signs.
    #[must_use]
    pub fn new(account: impl Into<String>) -> Self {
        Self::with_behavior(account, WalletBehavior::Normal)
    }

    /// A wallet with a given behavior.
    #[must_use]
    pub fn with_behavior(account: impl Into<String>, behavior: WalletBehavior) -> Self {
        Self {
            account: account.into(),
            behavior,
            connected: Mutex::new(false),
        }
    }
}

#[async_trait]
impl Wallet for FakeWallet {
    async fn connect(&self) -> Result<String> {
        if let WalletBehavior::Unavailable(reason) = &self.behavior {
            return Err(Error::wallet_unavailable(reason.clone()));
        }
        *lock(&self.connected) = true;
        Ok(self.account.clone())
    }

    async fn disconnect(&self) {
        *lock(&self.connected) = false;
    }

    fn address(&self) -> Option<String> {
        (*lock(&self.connected)).then(|| self.account.clone())
    }

    async fn sign(&self, message: &[u8]) -> Result<Signature> {
        if !*lock(&self.connected) {
            return Err(Error::WalletNotConnected);
        }
        match &self.behavior {
            WalletBehavior::RejectSignatures => Err(Error::SignatureRejected),
            WalletBehavior::BrokenSigner(reason) => Err(Error::Signing(reason.clone())),
            WalletBehavior::Normal | WalletBehavior::Unavailable(_) => {
                let mut hasher = blake3::Hasher::new();
                hasher.update(self.account.as_bytes());
                hasher.update(message);
                Ok(Signature(hasher.finalize().to_hex().to_string()))
            }
        }
    }
}

/// Fake identity provider that accepts one authorization code.
#[derive(Debug)]
pub struct FakeIdentityProvider {
    valid_code: String,
    user: AuthUser,
    exchanges: Mutex<Vec<String>>,
}

impl FakeIdentityProvider {
    /// Accept `valid_code` and report `user` as the subject.
    #[must_use]
    pub fn new(valid_code: impl Into<String>, user: AuthUser) -> Self {
        Self {
            valid_code: valid_code.into(),
            user,
            exchanges: Mutex::new(Vec::new()),
        }
    }

    /// Code verifiers received so far.
    #[must_use]
    pub fn verifiers(&self) -> Vec<String> {
        lock(&self.exchanges).clone()
    }

    fn access_token(&self) -> String {
        format!("access-{}", self.user.sub)
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        _redirect_uri: &str,
    ) -> Result<TokenSet> {
        lock(&self.exchanges).push(code_verifier.to_string());
        if code != self.valid_code {
            return Err(Error::auth("invalid authorization code"));
        }
        if code_verifier.is_empty() {
            return Err(Error::auth("missing code verifier"));
        }
        Ok(TokenSet {
            access_token: self.access_token(),
            id_token: Some(format!("id-{}", self.user.sub)),
            refresh_token: None,
            expires_in: Some(3600),
        })
    }

    async fn user_info(&self, access_token: &str) -> Result<AuthUser> {
        if access_token == self.access_token() {
            Ok(self.user.clone())
        } else {
            Err(Error::auth("access token not accepted"))
        }
    }
}
