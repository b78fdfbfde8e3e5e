//! In-process adapters that do the work themselves.
//!
//! [`LocalContentStore`] addresses payloads by their BLAKE3 digest, so equal
//! payloads always get the same CID. [`LedgerMinter`] records listings on a
//! [`carshare_ledger::Ledger`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use carshare_ledger::Ledger;
use tracing::{debug, info};

use super::{ContentStore, MintReceipt, MintRequest, Minter};
use crate::error::{Error, Result};

/// Prefix of CIDs produced by [`LocalContentStore`].
pub const LOCAL_CID_PREFIX: &str = "bafk";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Compute the CID [`LocalContentStore`] assigns to a payload.
#[must_use]
pub fn content_id(bytes: &[u8]) -> String {
    format!("{LOCAL_CID_PREFIX}{}", blake3::hash(bytes).to_hex())
}

/// A stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// MIME type given at upload.
    pub content_type: String,
    /// Payload.
    pub bytes: Vec<u8>,
}

/// Content-addressed store held in memory.
#[derive(Debug, Default)]
pub struct LocalContentStore {
    objects: Mutex<HashMap<String, StoredObject>>,
    max_object_size: Option<usize>,
}

impl LocalContentStore {
    /// Create an empty store with no size limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject payloads larger than `bytes`.
    #[must_use]
    pub fn with_max_object_size(mut self, bytes: usize) -> Self {
        self.max_object_size = Some(bytes);
        self
    }

    /// Fetch an object by CID.
    #[must_use]
    pub fn get(&self, cid: &str) -> Option<StoredObject> {
        lock(&self.objects).get(cid).cloned()
    }

    /// Number of distinct objects held.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.objects).len()
    }

    /// Whether the store holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.objects).is_empty()
    }
}

#[async_trait]
impl ContentStore for LocalContentStore {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn upload(&self, name: &str, bytes: &[u8], content_type: &str) -> Result<String> {
        if bytes.is_empty() {
            return Err(Error::upload(name, "empty payload"));
        }
        if let Some(max) = self.max_object_size {
            if bytes.len() > max {
                return Err(Error::upload(
                    name,
                    format!("{} bytes exceeds the {max} byte limit", bytes.len()),
                ));
            }
        }

        let cid = content_id(bytes);
        let mut objects = lock(&self.objects);
        if objects.contains_key(&cid) {
            debug!(name, %cid, "Payload already stored");
        } else {
            objects.insert(
                cid.clone(),
                StoredObject {
                    content_type: content_type.to_string(),
                    bytes: bytes.to_vec(),
                },
            );
            debug!(name, %cid, size = bytes.len(), "Stored payload");
        }
        Ok(cid)
    }
}

/// Minter that lists cars on an in-process rental ledger.
#[derive(Debug, Clone, Default)]
pub struct LedgerMinter {
    ledger: Arc<Mutex<Ledger>>,
}

impl LedgerMinter {
    /// Create a minter over a fresh ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a minter over a shared ledger.
    #[must_use]
    pub fn with_ledger(ledger: Arc<Mutex<Ledger>>) -> Self {
        Self { ledger }
    }

    /// Shared handle to the ledger.
    #[must_use]
    pub fn ledger(&self) -> Arc<Mutex<Ledger>> {
        Arc::clone(&self.ledger)
    }
}

/// Transaction hash for a ledger listing.
fn transaction_hash(id: u64, metadata_uri: &str, signature: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&id.to_le_bytes());
    hasher.update(metadata_uri.as_bytes());
    hasher.update(signature.as_bytes());
    format!("0x{}", hasher.finalize().to_hex())
}

#[async_trait]
impl Minter for LedgerMinter {
    fn name(&self) -> &'static str {
        "ledger"
    }

    async fn mint(&self, request: &MintRequest) -> Result<MintReceipt> {
        let cid = request
            .metadata_uri
            .strip_prefix("ipfs://")
            .ok_or_else(|| Error::mint(format!("not an ipfs URI: {}", request.metadata_uri)))?;
        if request.signature.0.is_empty() {
            return Err(Error::mint("unsigned mint request"));
        }

        let id = lock(&self.ledger).list_car(
            request.owner.clone(),
            cid,
            u128::from(request.price_per_day.cents()),
        );
        let receipt = MintReceipt {
            transaction_hash: transaction_hash(id, &request.metadata_uri, &request.signature.0),
            success: true,
            block_number: id + 1,
            token_id: Some(id),
        };
        info!(token_id = id, tx = %receipt.transaction_hash, "Listing recorded on ledger");
        Ok(receipt)
    }
}
