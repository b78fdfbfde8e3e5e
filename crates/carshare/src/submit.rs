//! Listing submission pipeline.
//!
//! A submission runs these steps in order, stopping at the first failure:
//!
//! 1. check a wallet is connected and validate the form (no upload happens
//!    if either fails)
//! 2. upload each image, one at a time
//! 3. upload the insurance and registration documents, if attached
//! 4. assemble and upload the metadata record
//! 5. sign and mint
//! 6. add the listing to the store, newest first
//!
//! There are no retries and nothing is rolled back. Failures after step 1
//! are wrapped with the [`SubmissionStage`] they happened in.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::{Error, Result, SubmissionStage};
use crate::listing::{
    ipfs_uri, short_address, CarListing, DocumentKind, ListingDraft, ListingMetadata,
};
use crate::services::{ContentStore, IdGenerator, MintReceipt, MintRequest, Minter};
use crate::store::ListingStore;
use crate::wallet::WalletSession;

/// Content type of the uploaded metadata record.
const METADATA_CONTENT_TYPE: &str = "application/json";

/// Object name of the uploaded metadata record.
const METADATA_NAME: &str = "metadata.json";

/// What a successful submission produced.
#[derive(Debug, Clone)]
pub struct SubmittedListing {
    /// The listing as added to the store.
    pub listing: CarListing,
    /// The uploaded metadata record.
    pub metadata: ListingMetadata,
    /// The mint receipt.
    pub receipt: MintReceipt,
}

/// Runs listing submissions against a set of capabilities.
#[derive(Debug, Clone)]
pub struct ListingSubmitter {
    content: Arc<dyn ContentStore>,
    minter: Arc<dyn Minter>,
    wallet: WalletSession,
    store: Arc<ListingStore>,
    ids: Arc<dyn IdGenerator>,
    max_images: usize,
}

fn failed(stage: SubmissionStage) -> impl FnOnce(Error) -> Error {
    move |e| {
        warn!(%stage, error = %e, "Listing submission failed");
        e.at_stage(stage)
    }
}

/// Upload name for the image at `index`, keeping the original extension.
fn image_object_name(index: usize, original: &str) -> String {
    match Path::new(original).extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("car-image-{index}.{}", ext.to_ascii_lowercase()),
        None => format!("car-image-{index}"),
    }
}

impl ListingSubmitter {
    /// Create a submitter.
    #[must_use]
    pub fn new(
        content: Arc<dyn ContentStore>,
        minter: Arc<dyn Minter>,
        wallet: WalletSession,
        store: Arc<ListingStore>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            content,
            minter,
            wallet,
            store,
            ids,
            max_images: 5,
        }
    }

    /// Set the maximum number of images per listing.
    #[must_use]
    pub fn with_max_images(mut self, max_images: usize) -> Self {
        self.max_images = max_images;
        self
    }

    /// Submit a listing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WalletNotConnected`] or a validation error before any
    /// upload; otherwise an [`Error::Submission`] naming the failed stage.
    pub async fn submit(&self, draft: &ListingDraft) -> Result<SubmittedListing> {
        let owner = self.wallet.account()?;
        let price = draft.validate(self.max_images)?;
        info!(
            name = %draft.display_name(),
            images = draft.images.len(),
            documents = draft.documents().count(),
            store = self.content.name(),
            minter = self.minter.name(),
            "Submitting listing"
        );

        let mut image_cids = Vec::with_capacity(draft.images.len());
        for (index, image) in draft.images.iter().enumerate() {
            let name = image_object_name(index, &image.name);
            let cid = self
                .content
                .upload(&name, &image.bytes, &image.content_type)
                .await
                .map_err(failed(SubmissionStage::UploadImages))?;
            debug!(index, %cid, "Image uploaded");
            image_cids.push(cid);
        }

        let mut document_cids: Vec<(DocumentKind, String)> = Vec::new();
        for (kind, document) in draft.documents() {
            let cid = self
                .content
                .upload(&document.name, &document.bytes, &document.content_type)
                .await
                .map_err(failed(SubmissionStage::UploadDocuments))?;
            debug!(%kind, %cid, "Document uploaded");
            document_cids.push((kind, cid));
        }

        let metadata = ListingMetadata::assemble(draft, price, &image_cids, &document_cids);
        let payload = metadata
            .to_json_bytes()
            .map_err(|e| failed(SubmissionStage::BuildMetadata)(e.into()))?;
        let metadata_cid = self
            .content
            .upload(METADATA_NAME, &payload, METADATA_CONTENT_TYPE)
            .await
            .map_err(failed(SubmissionStage::UploadMetadata))?;
        info!(%metadata_cid, size = payload.len(), "Metadata uploaded");

        let metadata_uri = ipfs_uri(&metadata_cid);
        let signature = self
            .wallet
            .sign_listing(&metadata_uri)
            .await
            .map_err(failed(SubmissionStage::Mint))?;
        let receipt = self
            .minter
            .mint(&MintRequest {
                metadata_uri,
                owner: owner.clone(),
                price_per_day: price,
                signature,
            })
            .await
            .map_err(failed(SubmissionStage::Mint))?;
        if !receipt.success {
            return Err(failed(SubmissionStage::Mint)(Error::mint(format!(
                "transaction {} did not succeed",
                receipt.transaction_hash
            ))));
        }

        let description = draft.description.trim();
        let listing = CarListing {
            id: self.ids.listing_id(),
            name: draft.display_name(),
            make: draft.make.trim().to_string(),
            model: draft.model.trim().to_string(),
            year: draft.year.trim().to_string(),
            price_per_day: price,
            location: draft.location.clone(),
            images: metadata.images.clone(),
            is_available: true,
            owner: short_address(&owner),
            description: (!description.is_empty()).then(|| description.to_string()),
            metadata_cid: Some(metadata_cid),
            transaction_hash: Some(receipt.transaction_hash.clone()),
            token_id: receipt.token_id,
            created_at: Utc::now(),
        };
        self.store.add(listing.clone());
        info!(
            id = %listing.id,
            tx = %receipt.transaction_hash,
            block = receipt.block_number,
            "Listing created"
        );

        Ok(SubmittedListing {
            listing,
            metadata,
            receipt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GENERIC_FAILURE_MESSAGE;
    use crate::listing::{Attachment, Location, Price};
    use crate::logging::init_test_logging;
    use crate::services::fake::{FakeContentStore, FakeMinter, FakeWallet, WalletBehavior};
    use crate::services::local::{LedgerMinter, LocalContentStore};
    use crate::services::{SeededIds, Wallet};

    const ACCOUNT: &str = "0x742d35Cc6634C0532925a3b8D4C9db96C4b4d8b6";

    struct Harness {
        content: Arc<FakeContentStore>,
        minter: Arc<FakeMinter>,
        store: Arc<ListingStore>,
        submitter: ListingSubmitter,
    }

    async fn harness_with_wallet(wallet: FakeWallet, connect: bool) -> Harness {
        init_test_logging();
        let ids: Arc<dyn IdGenerator> = Arc::new(SeededIds::new(7));
        let content = Arc::new(FakeContentStore::new(Arc::clone(&ids)));
        let minter = Arc::new(FakeMinter::new(Arc::clone(&ids)));
        let wallet: Arc<dyn Wallet> = Arc::new(wallet);
        if connect {
            wallet.connect().await.unwrap();
        }
        let store = Arc::new(ListingStore::new());
        let submitter = ListingSubmitter::new(
            content.clone(),
            minter.clone(),
            WalletSession::new(wallet, 314_159),
            Arc::clone(&store),
            ids,
        );
        Harness {
            content,
            minter,
            store,
            submitter,
        }
    }

    async fn harness() -> Harness {
        harness_with_wallet(FakeWallet::new(ACCOUNT), true).await
    }

    fn png(name: &str) -> Attachment {
        Attachment::new(name, "image/png", vec![0x89, b'P', b'N', b'G'])
    }

    fn draft() -> ListingDraft {
        ListingDraft {
            make: "Toyota".to_string(),
            model: "Camry".to_string(),
            year: "2020".to_string(),
            description: "Clean and comfy".to_string(),
            price_per_day: "45".to_string(),
            location: Location::address("Lisbon"),
            images: vec![png("front.PNG"), png("back.png")],
            insurance: Some(Attachment::new("ins.pdf", "application/pdf", b"%PDF".to_vec())),
            registration: None,
        }
    }

    #[tokio::test]
    async fn test_successful_submission() {
        let h = harness().await;
        let before = h.store.len();

        let submitted = h.submitter.submit(&draft()).await.unwrap();

        assert_eq!(h.store.len(), before + 1);
        assert_eq!(h.store.newest().unwrap(), submitted.listing);
        let listing = &submitted.listing;
        assert_eq!(listing.name, "Toyota Camry 2020");
        assert_eq!(listing.price_per_day, Price::from_units(45));
        assert_eq!(listing.owner, "0x742d...d8b6");
        assert!(listing.is_available);
        assert_eq!(listing.images.len(), 2);
        assert!(listing.images[0].starts_with("ipfs://"));
        assert_eq!(listing.token_id, Some(1));

        // two images, one document, metadata
        let uploads = h.content.uploads();
        let names: Vec<_> = uploads.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(
            names,
            ["car-image-0.png", "car-image-1.png", "ins.pdf", "metadata.json"]
        );
        assert_eq!(
            listing.metadata_cid.as_deref(),
            Some(uploads[3].cid.as_str())
        );
        assert_eq!(submitted.metadata.documents.len(), 1);

        let minted = h.minter.minted();
        assert_eq!(minted.len(), 1);
        assert_eq!(minted[0].owner, ACCOUNT);
        assert_eq!(minted[0].metadata_uri, format!("ipfs://{}", uploads[3].cid));
    }

    #[tokio::test]
    async fn test_new_listing_goes_first() {
        let h = harness().await;
        let first = h.submitter.submit(&draft()).await.unwrap().listing;
        let mut other = draft();
        other.make = "Honda".to_string();
        let second = h.submitter.submit(&other).await.unwrap().listing;

        let all = h.store.all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, second.id);
        assert_eq!(all[1].id, first.id);
    }

    #[tokio::test]
    async fn test_missing_fields_block_before_upload() {
        let h = harness().await;
        let blank: [fn(&mut ListingDraft); 4] = [
            |d| d.make = "  ".to_string(),
            |d| d.model.clear(),
            |d| d.year.clear(),
            |d| d.price_per_day.clear(),
        ];
        for clear in blank {
            let mut d = draft();
            clear(&mut d);
            let err = h.submitter.submit(&d).await.unwrap_err();
            assert!(matches!(err, Error::MissingField { .. }), "{err}");
        }
        assert_eq!(h.content.upload_count(), 0);
        assert!(h.minter.minted().is_empty());
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn test_no_images_blocks_submission() {
        let h = harness().await;
        let mut d = draft();
        d.images.clear();
        let err = h.submitter.submit(&d).await.unwrap_err();
        assert!(matches!(err, Error::NoImages));
        assert_eq!(err.user_message(), "Please upload at least one image of your car");
        assert_eq!(h.content.upload_count(), 0);
    }

    #[tokio::test]
    async fn test_too_many_images() {
        let h = harness().await;
        let submitter = h.submitter.clone().with_max_images(1);
        let err = submitter.submit(&draft()).await.unwrap_err();
        assert!(matches!(err, Error::TooManyImages { count: 2, max: 1 }));
        assert_eq!(h.content.upload_count(), 0);
    }

    #[tokio::test]
    async fn test_disconnected_wallet_blocks_submission() {
        let h = harness_with_wallet(FakeWallet::new(ACCOUNT), false).await;
        let err = h.submitter.submit(&draft()).await.unwrap_err();
        assert!(matches!(err, Error::WalletNotConnected));
        assert!(err.is_validation());
        assert_eq!(h.content.upload_count(), 0);
    }

    #[tokio::test]
    async fn test_upload_failure_reports_stage() {
        let h = harness().await;
        h.content.fail_after(1);
        let err = h.submitter.submit(&draft()).await.unwrap_err();

        assert_eq!(err.stage(), Some(SubmissionStage::UploadImages));
        assert_eq!(err.user_message(), GENERIC_FAILURE_MESSAGE);
        assert!(h.minter.minted().is_empty());
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn test_document_and_metadata_failures() {
        let h = harness().await;
        h.content.fail_after(2);
        let err = h.submitter.submit(&draft()).await.unwrap_err();
        assert_eq!(err.stage(), Some(SubmissionStage::UploadDocuments));

        let h = harness().await;
        h.content.fail_after(3);
        let err = h.submitter.submit(&draft()).await.unwrap_err();
        assert_eq!(err.stage(), Some(SubmissionStage::UploadMetadata));
    }

    #[tokio::test]
    async fn test_mint_failure() {
        let h = harness().await;
        h.minter.fail_with("execution reverted");
        let err = h.submitter.submit(&draft()).await.unwrap_err();

        assert_eq!(err.stage(), Some(SubmissionStage::Mint));
        assert!(err.to_string().contains("execution reverted"));
        assert_eq!(err.user_message(), GENERIC_FAILURE_MESSAGE);
        // uploads are not rolled back
        assert_eq!(h.content.upload_count(), 4);
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_signature_fails_mint_stage() {
        let h = harness_with_wallet(
            FakeWallet::with_behavior(ACCOUNT, WalletBehavior::RejectSignatures),
            true,
        )
        .await;
        let err = h.submitter.submit(&draft()).await.unwrap_err();
        assert_eq!(err.stage(), Some(SubmissionStage::Mint));
        assert!(err.is_wallet_error());
        assert!(h.minter.minted().is_empty());
    }

    #[tokio::test]
    async fn test_submission_with_local_adapters() {
        init_test_logging();
        let ids: Arc<dyn IdGenerator> = Arc::new(SeededIds::new(1));
        let content = Arc::new(LocalContentStore::new());
        let minter = Arc::new(LedgerMinter::new());
        let wallet: Arc<dyn Wallet> = Arc::new(FakeWallet::new(ACCOUNT));
        wallet.connect().await.unwrap();
        let store = Arc::new(ListingStore::new());
        let submitter = ListingSubmitter::new(
            content.clone(),
            minter.clone(),
            WalletSession::new(wallet, 1),
            Arc::clone(&store),
            ids,
        );

        let submitted = submitter.submit(&draft()).await.unwrap();
        let metadata_cid = submitted.listing.metadata_cid.clone().unwrap();
        let stored = content.get(&metadata_cid).unwrap();
        let metadata: ListingMetadata = serde_json::from_slice(&stored.bytes).unwrap();
        assert_eq!(metadata, submitted.metadata);

        // both images have identical bytes, so they share one CID
        assert_eq!(submitted.listing.images[0], submitted.listing.images[1]);

        let ledger = minter.ledger();
        let ledger = ledger.lock().unwrap();
        let on_chain = ledger.get_listing(0).unwrap();
        assert_eq!(on_chain.cid, metadata_cid);
        assert_eq!(on_chain.owner, ACCOUNT);
        assert_eq!(submitted.listing.token_id, Some(0));
    }

    #[test]
    fn test_image_object_name() {
        assert_eq!(image_object_name(0, "IMG_1.JPG"), "car-image-0.jpg");
        assert_eq!(image_object_name(3, "photo"), "car-image-3");
    }
}
