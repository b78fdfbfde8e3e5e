//! NFT metadata record uploaded for each listing.

use serde::{Deserialize, Serialize};

use super::{DocumentKind, ListingDraft, Location, Price};

/// Format a CID as an `ipfs://` URI.
#[must_use]
pub fn ipfs_uri(cid: &str) -> String {
    format!("ipfs://{cid}")
}

/// A single NFT trait.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// Trait name.
    pub trait_type: String,
    /// Trait value.
    pub value: String,
}

impl Attribute {
    fn new(trait_type: &str, value: impl Into<String>) -> Self {
        Self {
            trait_type: trait_type.to_string(),
            value: value.into(),
        }
    }
}

/// A reference to an uploaded supporting document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    /// Kind of document.
    #[serde(rename = "type")]
    pub kind: DocumentKind,
    /// `ipfs://` URI of the document.
    pub url: String,
}

/// Metadata describing a listed car, referenced by the minted token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingMetadata {
    /// Display name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Primary image URI.
    pub image: String,
    /// Car traits.
    pub attributes: Vec<Attribute>,
    /// Uploaded documents; only those the owner attached.
    pub documents: Vec<DocumentRef>,
    /// Pickup location.
    pub location: Location,
    /// All image URIs.
    pub images: Vec<String>,
}

impl ListingMetadata {
    /// Assemble metadata from a validated draft and the CIDs of its uploads.
    ///
    /// `image_cids` must not be empty; the first entry becomes the primary
    /// image.
    #[must_use]
    pub fn assemble(
        draft: &ListingDraft,
        price_per_day: Price,
        image_cids: &[String],
        document_cids: &[(DocumentKind, String)],
    ) -> Self {
        let images: Vec<String> = image_cids.iter().map(|cid| ipfs_uri(cid)).collect();
        Self {
            name: draft.display_name(),
            description: draft.description.trim().to_string(),
            image: images.first().cloned().unwrap_or_default(),
            attributes: vec![
                Attribute::new("Make", draft.make.trim()),
                Attribute::new("Model", draft.model.trim()),
                Attribute::new("Year", draft.year.trim()),
                Attribute::new("PricePerDay", price_per_day.to_string()),
            ],
            documents: document_cids
                .iter()
                .map(|(kind, cid)| DocumentRef {
                    kind: *kind,
                    url: ipfs_uri(cid),
                })
                .collect(),
            location: draft.location.clone(),
            images,
        }
    }

    /// Serialize to the JSON payload that gets uploaded.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }
}
