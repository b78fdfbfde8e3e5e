//! Car listing records and listing form validation.
//!
//! A [`ListingDraft`] is what an owner fills in; once the submission pipeline
//! has uploaded its attachments and minted the NFT, the result is stored as a
//! [`CarListing`].

mod metadata;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use metadata::{ipfs_uri, Attribute, DocumentRef, ListingMetadata};

/// Mean Earth radius used for proximity queries.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// A daily price in minor currency units (cents).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Price(u64);

impl Price {
    /// Create a price from whole currency units.
    #[must_use]
    pub const fn from_units(units: u64) -> Self {
        Self(units * 100)
    }

    /// Create a price from minor units.
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// The price in minor units.
    #[must_use]
    pub const fn cents(self) -> u64 {
        self.0
    }

    /// Multiply by a day count, saturating on overflow.
    #[must_use]
    pub fn times(self, days: u64) -> Self {
        Self(self.0.saturating_mul(days))
    }

    /// Add another price, saturating on overflow.
    #[must_use]
    pub fn plus(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (units, cents) = (self.0 / 100, self.0 % 100);
        if cents == 0 {
            write!(f, "{units}")
        } else {
            write!(f, "{units}.{cents:02}")
        }
    }
}

impl FromStr for Price {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().trim_start_matches('$');
        let invalid = || Error::invalid_field("price per day", format!("'{s}' is not an amount"));

        let (units, fraction) = match s.split_once('.') {
            Some((units, fraction)) => (units, fraction),
            None => (s, ""),
        };
        if units.is_empty() || !units.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if fraction.len() > 2 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let units: u64 = units.parse().map_err(|_| invalid())?;
        let cents: u64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<u64>().map_err(|_| invalid())? * 10,
            _ => fraction.parse().map_err(|_| invalid())?,
        };
        let total = units
            .checked_mul(100)
            .and_then(|v| v.checked_add(cents))
            .ok_or_else(invalid)?;
        if total == 0 {
            return Err(Error::invalid_field(
                "price per day",
                "must be greater than zero",
            ));
        }
        Ok(Self(total))
    }
}

/// Geographic coordinates in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
}

impl Coordinates {
    /// Create a new coordinate pair.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle distance to another point in kilometres (haversine).
    #[must_use]
    pub fn distance_km(&self, other: &Self) -> f64 {
        let (lat1, lat2) = (self.latitude.to_radians(), other.latitude.to_radians());
        let d_lat = lat2 - lat1;
        let d_lon = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
    }
}

/// Where a car can be picked up.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    /// Free-text address.
    pub address: String,
    /// Coordinates, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
}

impl Location {
    /// A location with only an address.
    #[must_use]
    pub fn address(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            coordinates: None,
        }
    }

    /// Attach coordinates.
    #[must_use]
    pub fn with_coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        self.coordinates = Some(Coordinates::new(latitude, longitude));
        self
    }
}

/// Supporting documents an owner may attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    /// Proof of insurance.
    Insurance,
    /// Vehicle registration.
    Registration,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insurance => write!(f, "Insurance"),
            Self::Registration => write!(f, "Registration"),
        }
    }
}

/// A file selected in the listing form.
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    /// File name.
    pub name: String,
    /// MIME type.
    pub content_type: String,
    /// File contents.
    pub bytes: Vec<u8>,
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl Attachment {
    /// Create an attachment from memory.
    #[must_use]
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Read an attachment from disk, guessing the content type from the
    /// file extension.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| Error::ReadAttachment {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map_or_else(|| "attachment".to_string(), |n| n.to_string_lossy().into_owned());
        let content_type = content_type_for(path);
        Ok(Self::new(name, content_type, bytes))
    }
}

fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("pdf") => "application/pdf",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

/// The listing form as filled in by an owner.
#[derive(Debug, Clone, Default)]
pub struct ListingDraft {
    /// Manufacturer.
    pub make: String,
    /// Model name.
    pub model: String,
    /// Model year, as typed.
    pub year: String,
    /// Free-text description.
    pub description: String,
    /// Daily price, as typed.
    pub price_per_day: String,
    /// Pickup location.
    pub location: Location,
    /// Selected images, in display order.
    pub images: Vec<Attachment>,
    /// Optional insurance document.
    pub insurance: Option<Attachment>,
    /// Optional registration document.
    pub registration: Option<Attachment>,
}

impl ListingDraft {
    /// Display name used for the listing and its NFT.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} {} {}", self.make.trim(), self.model.trim(), self.year.trim())
    }

    /// Attached documents in upload order.
    pub fn documents(&self) -> impl Iterator<Item = (DocumentKind, &Attachment)> {
        [
            (DocumentKind::Insurance, self.insurance.as_ref()),
            (DocumentKind::Registration, self.registration.as_ref()),
        ]
        .into_iter()
        .filter_map(|(kind, doc)| doc.map(|d| (kind, d)))
    }

    /// Check the form before anything is uploaded and return the parsed price.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a required field is blank, no image (or
    /// more than `max_images`) is attached, the year is not four digits, or
    /// the price is not a positive amount.
    pub fn validate(&self, max_images: usize) -> Result<Price> {
        let required = [
            ("make", &self.make),
            ("model", &self.model),
            ("year", &self.year),
            ("price per day", &self.price_per_day),
        ];
        if let Some(&(field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(Error::MissingField { field });
        }

        if self.images.is_empty() {
            return Err(Error::NoImages);
        }
        if self.images.len() > max_images {
            return Err(Error::TooManyImages {
                count: self.images.len(),
                max: max_images,
            });
        }

        let year = self.year.trim();
        if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::invalid_field("year", format!("'{year}' is not a year")));
        }

        self.price_per_day.parse()
    }
}

/// A listed car.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarListing {
    /// Listing identifier.
    pub id: String,
    /// Display name (`make model year`).
    pub name: String,
    /// Manufacturer.
    pub make: String,
    /// Model name.
    pub model: String,
    /// Model year.
    pub year: String,
    /// Daily price.
    pub price_per_day: Price,
    /// Pickup location.
    pub location: Location,
    /// Image references (`ipfs://` URIs), primary image first.
    pub images: Vec<String>,
    /// Whether the car can currently be rented.
    pub is_available: bool,
    /// Owner identifier (shortened wallet address).
    pub owner: String,
    /// Free-text description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// CID of the uploaded metadata record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_cid: Option<String>,
    /// Hash of the mint transaction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    /// NFT token id, when the minter assigns one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_id: Option<u64>,
    /// When the listing was created.
    pub created_at: DateTime<Utc>,
}

impl CarListing {
    /// The primary image reference.
    #[must_use]
    pub fn image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }

    /// Apply a partial update.
    pub fn apply(&mut self, update: ListingUpdate) {
        if let Some(price) = update.price_per_day {
            self.price_per_day = price;
        }
        if let Some(location) = update.location {
            self.location = location;
        }
        if let Some(available) = update.is_available {
            self.is_available = available;
        }
        if let Some(description) = update.description {
            self.description = Some(description);
        }
    }
}

/// A partial update to a listing. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingUpdate {
    /// New daily price.
    pub price_per_day: Option<Price>,
    /// New location.
    pub location: Option<Location>,
    /// New availability.
    pub is_available: Option<bool>,
    /// New description.
    pub description: Option<String>,
}

/// Shorten a wallet address for display (`0x742d...d8b6`).
#[must_use]
pub fn short_address(address: &str) -> String {
    if address.len() <= 10 || !address.is_ascii() {
        return address.to_string();
    }
    format!("{}...{}", &address[..6], &address[address.len() - 4..])
}
