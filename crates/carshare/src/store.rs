//! In-memory listing collection.
//!
//! Listings are kept newest-first and live only as long as the process. The
//! store is shared through an `Arc` and announces every mutation to its
//! subscribers over a broadcast channel.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::broadcast;
use tracing::debug;

use crate::error::{Error, Result};
use crate::listing::{CarListing, Coordinates, ListingUpdate};

/// Capacity of the change notification channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A change to the listing collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// A listing was added at the front.
    Added(String),
    /// A listing was updated.
    Updated(String),
    /// A listing was removed.
    Removed(String),
}

/// Marketplace filters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ListingFilter {
    /// Every listing.
    #[default]
    All,
    /// Only listings that can be rented now.
    Available,
    /// Listings owned by the given owner identifier.
    OwnedBy(String),
}

impl ListingFilter {
    fn matches(&self, listing: &CarListing) -> bool {
        match self {
            Self::All => true,
            Self::Available => listing.is_available,
            Self::OwnedBy(owner) => &listing.owner == owner,
        }
    }
}

/// Newest-first collection of listings.
#[derive(Debug)]
pub struct ListingStore {
    listings: RwLock<Vec<CarListing>>,
    events: broadcast::Sender<StoreEvent>,
}

impl Default for ListingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ListingStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_listings(Vec::new())
    }

    /// Create a store holding `listings`, which must already be newest-first.
    #[must_use]
    pub fn with_listings(listings: Vec<CarListing>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            listings: RwLock::new(listings),
            events,
        }
    }

    /// Subscribe to change notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Add a listing as the newest entry.
    pub fn add(&self, listing: CarListing) {
        let id = listing.id.clone();
        self.write().insert(0, listing);
        debug!(listing_id = %id, "Listing added");
        self.notify(StoreEvent::Added(id));
    }

    /// Apply a partial update and return the updated listing.
    ///
    /// # Errors
    ///
    /// Returns an error if no listing has the given id.
    pub fn update(&self, id: &str, update: ListingUpdate) -> Result<CarListing> {
        let updated = {
            let mut listings = self.write();
            let listing = listings
                .iter_mut()
                .find(|l| l.id == id)
                .ok_or_else(|| Error::ListingNotFound(id.to_string()))?;
            listing.apply(update);
            listing.clone()
        };
        debug!(listing_id = %id, "Listing updated");
        self.notify(StoreEvent::Updated(id.to_string()));
        Ok(updated)
    }

    /// Remove a listing and return it.
    ///
    /// # Errors
    ///
    /// Returns an error if no listing has the given id.
    pub fn remove(&self, id: &str) -> Result<CarListing> {
        let removed = {
            let mut listings = self.write();
            let index = listings
                .iter()
                .position(|l| l.id == id)
                .ok_or_else(|| Error::ListingNotFound(id.to_string()))?;
            listings.remove(index)
        };
        debug!(listing_id = %id, "Listing removed");
        self.notify(StoreEvent::Removed(id.to_string()));
        Ok(removed)
    }

    /// Look up a listing by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<CarListing> {
        self.read().iter().find(|l| l.id == id).cloned()
    }

    /// The most recently added listing.
    #[must_use]
    pub fn newest(&self) -> Option<CarListing> {
        self.read().first().cloned()
    }

    /// Snapshot of all listings, newest first.
    #[must_use]
    pub fn all(&self) -> Vec<CarListing> {
        self.read().clone()
    }

    /// Listings matching a marketplace filter, newest first.
    #[must_use]
    pub fn filter(&self, filter: &ListingFilter) -> Vec<CarListing> {
        self.read()
            .iter()
            .filter(|l| filter.matches(l))
            .cloned()
            .collect()
    }

    /// Listings with coordinates within `radius_km` of `center`, nearest first.
    /// Listings without coordinates are skipped.
    #[must_use]
    pub fn nearby(&self, center: &Coordinates, radius_km: f64) -> Vec<CarListing> {
        let mut found: Vec<(f64, CarListing)> = self
            .read()
            .iter()
            .filter_map(|l| {
                let distance = l.location.coordinates?.distance_km(center);
                (distance <= radius_km).then(|| (distance, l.clone()))
            })
            .collect();
        found.sort_by(|a, b| a.0.total_cmp(&b.0));
        found.into_iter().map(|(_, l)| l).collect()
    }

    /// Number of listings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn notify(&self, event: StoreEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<CarListing>> {
        self.listings.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<CarListing>> {
        self.listings.write().unwrap_or_else(PoisonError::into_inner)
    }
}
