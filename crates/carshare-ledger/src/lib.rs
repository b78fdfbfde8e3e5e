//! In-memory rental ledger for carshare
//!
//! This crate keeps the on-chain bookkeeping of the car listing contract in
//! process: listing a car against a metadata CID, starting a rental with a
//! deposit, and completing it so the owner is paid out. Every state change is
//! recorded as a [`LedgerEvent`].

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Identifier of a listing on the ledger. Assigned sequentially from 0.
pub type ListingId = u64;

/// Amount in the smallest currency unit.
pub type Amount = u128;

/// Errors raised when a ledger precondition does not hold.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// No listing with the given id.
    #[error("listing not found: {0}")]
    ListingNotFound(ListingId),

    /// The listing is already rented out.
    #[error("listing {0} is already rented")]
    AlreadyRented(ListingId),

    /// The listing is not currently rented.
    #[error("rental not in progress for listing {0}")]
    NotRented(ListingId),

    /// The attached deposit does not cover one day of rent.
    #[error("insufficient deposit: attached {attached}, required {required}")]
    InsufficientDeposit {
        /// Deposit attached by the renter.
        attached: Amount,
        /// Minimum deposit (price per day).
        required: Amount,
    },

    /// Only the owner may complete a rental.
    #[error("only the owner can complete listing {0}")]
    NotOwner(ListingId),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// A car listed on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerListing {
    /// Content identifier of the listing metadata.
    pub cid: String,
    /// Account that listed the car.
    pub owner: String,
    /// Price per day.
    pub price_per_day: Amount,
    /// Whether a rental is in progress.
    pub is_rented: bool,
    /// Current renter, if rented.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renter: Option<String>,
}

/// Events emitted by ledger transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "PascalCase")]
pub enum LedgerEvent {
    /// A car was listed.
    CarListed {
        /// Listing id.
        id: ListingId,
        /// Owner account.
        owner: String,
    },
    /// A rental started.
    RentalStarted {
        /// Listing id.
        id: ListingId,
        /// Renter account.
        renter: String,
    },
    /// A rental completed and the owner was paid.
    RentalCompleted {
        /// Listing id.
        id: ListingId,
    },
}

impl fmt::Display for LedgerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CarListed { id, owner } => {
                write!(f, "event:CarListed {{ id: {id}, owner: {owner} }}")
            }
            Self::RentalStarted { id, renter } => {
                write!(f, "event:RentalStarted {{ id: {id}, renter: {renter} }}")
            }
            Self::RentalCompleted { id } => write!(f, "event:RentalCompleted {{ id: {id} }}"),
        }
    }
}

/// Funds released to an owner when a rental completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payout {
    /// Receiving account.
    pub to: String,
    /// Amount transferred.
    pub amount: Amount,
}

/// The rental ledger.
#[derive(Debug, Default)]
pub struct Ledger {
    listings: BTreeMap<ListingId, LedgerListing>,
    next_id: ListingId,
    events: Vec<LedgerEvent>,
}

impl Ledger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// List a car for rent by metadata CID and price per day.
    pub fn list_car(
        &mut self,
        owner: impl Into<String>,
        cid: impl Into<String>,
        price_per_day: Amount,
    ) -> ListingId {
        let owner = owner.into();
        let id = self.next_id;
        self.listings.insert(
            id,
            LedgerListing {
                cid: cid.into(),
                owner: owner.clone(),
                price_per_day,
                is_rented: false,
                renter: None,
            },
        );
        self.next_id += 1;
        self.emit(LedgerEvent::CarListed { id, owner });
        id
    }

    /// Start a rental on an existing listing.
    ///
    /// # Errors
    ///
    /// Fails if the listing does not exist, is already rented, or the deposit
    /// is below one day's price.
    pub fn start_rental(
        &mut self,
        id: ListingId,
        renter: impl Into<String>,
        deposit: Amount,
    ) -> Result<()> {
        let listing = self
            .listings
            .get_mut(&id)
            .ok_or(LedgerError::ListingNotFound(id))?;
        if listing.is_rented {
            return Err(LedgerError::AlreadyRented(id));
        }
        if deposit < listing.price_per_day {
            return Err(LedgerError::InsufficientDeposit {
                attached: deposit,
                required: listing.price_per_day,
            });
        }

        let renter = renter.into();
        listing.is_rented = true;
        listing.renter = Some(renter.clone());
        self.emit(LedgerEvent::RentalStarted { id, renter });
        Ok(())
    }

    /// Complete a rental. Only the owner may do this.
    ///
    /// # Errors
    ///
    /// Fails if the listing does not exist, is not rented, or `caller` is not
    /// the owner.
    pub fn complete_rental(&mut self, id: ListingId, caller: &str) -> Result<Payout> {
        let listing = self
            .listings
            .get_mut(&id)
            .ok_or(LedgerError::ListingNotFound(id))?;
        if !listing.is_rented {
            return Err(LedgerError::NotRented(id));
        }
        if listing.owner != caller {
            return Err(LedgerError::NotOwner(id));
        }

        listing.is_rented = false;
        listing.renter = None;
        let payout = Payout {
            to: listing.owner.clone(),
            amount: listing.price_per_day,
        };
        self.emit(LedgerEvent::RentalCompleted { id });
        Ok(payout)
    }

    /// View a listing.
    #[must_use]
    pub fn get_listing(&self, id: ListingId) -> Option<&LedgerListing> {
        self.listings.get(&id)
    }

    /// Number of listings ever created.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listings.len()
    }

    /// Whether the ledger has no listings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }

    /// All events in emission order.
    #[must_use]
    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    fn emit(&mut self, event: LedgerEvent) {
        info!("{event}");
        debug!(total_events = self.events.len() + 1, "Ledger event recorded");
        self.events.push(event);
    }
}
