//! Seeded random sources.
//!
//! Every run owns exactly one [`ChainRng`], created from the configured seed and
//! passed by `&mut` to each random operation. Derived streams (resumed chains,
//! independent ensembles sharing a master seed) hash `(master, stream)` with SHA-256.

use rand::SeedableRng;
use rand::rngs::StdRng;
use sha2::{Digest, Sha256};

/// Random source owned by a single chain run.
pub type ChainRng = StdRng;

/// Create the run's random source from a seed.
pub fn seeded(seed: u64) -> ChainRng { StdRng::seed_from_u64(seed) }

/// Derive a reproducible seed for a sub-stream of a master seed.
pub fn derive_seed(master: u64, stream: u64) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(master.to_le_bytes());
    hasher.update(stream.to_le_bytes());
    let digest = hasher.finalize();

    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(head)
}
