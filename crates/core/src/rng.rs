//! Deterministic RNG construction.
//!
//! Every search instance owns a `ChaCha8Rng`.  With `RANDOM_SEED` set, the
//! full sequence of emitted points is reproducible; otherwise the seed is
//! taken from the wall clock once at init.

use crate::config::{keys, KeyMap};
use crate::error::Result;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn seeded(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// RNG from the `RANDOM_SEED` key, falling back to the wall clock.
pub fn from_config(cfg: &KeyMap) -> Result<ChaCha8Rng> {
    let seed = match cfg.int(keys::RANDOM_SEED)? {
        Some(seed) => seed as u64,
        None => SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0),
    };
    Ok(seeded(seed))
}
