//! `carshare` - core of a peer-to-peer car rental marketplace
//!
//! Listings are backed by NFTs that reference metadata held in a
//! content-addressed store. This library provides the listing records and
//! their in-memory store, the listing submission pipeline, the owner chat
//! auto-responder, the rental booking wizard, and the capability interfaces
//! (storage, mint, wallet, identity provider) with fake and local adapters.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod app;
pub mod auth;
pub mod chat;
pub mod cli;
pub mod config;
pub mod error;
pub mod listing;
pub mod logging;
pub mod rental;
pub mod services;
pub mod store;
pub mod submit;
pub mod wallet;

pub use app::AppContext;
pub use config::Config;
pub use error::{Error, Result};
pub use listing::{CarListing, ListingDraft, Price};
pub use logging::init_logging;
pub use store::ListingStore;
pub use submit::{ListingSubmitter, SubmittedListing};
