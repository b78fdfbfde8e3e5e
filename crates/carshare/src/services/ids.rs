//! Identifier generation for fake adapters and new records.
//!
//! Everything that needs a fresh identifier draws it from an [`IdGenerator`]
//! so tests can inject a seeded one and get the same ids on every run.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Source of fresh identifiers.
pub trait IdGenerator: Send + Sync + fmt::Debug {
    /// A content identifier in the shape a content-addressed store returns.
    fn cid(&self) -> String;

    /// A transaction hash (`0x` followed by 64 hex digits).
    fn transaction_hash(&self) -> String;

    /// A listing identifier.
    fn listing_id(&self) -> String;
}

/// Random identifiers from a seedable RNG.
pub struct SeededIds {
    rng: Mutex<StdRng>,
}

impl fmt::Debug for SeededIds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeededIds").finish_non_exhaustive()
    }
}

impl SeededIds {
    /// Deterministic identifiers from a fixed seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Identifiers seeded from OS entropy.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Build from an optional seed, falling back to entropy.
    #[must_use]
    pub fn from_seed_option(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::from_entropy, Self::new)
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut rng)
    }
}

impl IdGenerator for SeededIds {
    fn cid(&self) -> String {
        self.with_rng(|rng| {
            let suffix: String = (0..26)
                .map(|_| char::from(BASE36[rng.gen_range(0..BASE36.len())]))
                .collect();
            format!("bafybeih{suffix}")
        })
    }

    fn transaction_hash(&self) -> String {
        self.with_rng(|rng| {
            let bytes: [u8; 32] = rng.gen();
            let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
            format!("0x{hex}")
        })
    }

    fn listing_id(&self) -> String {
        self.with_rng(|rng| format!("car-{:016x}", rng.gen::<u64>()))
    }
}
