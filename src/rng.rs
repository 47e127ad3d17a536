//! Deterministic, externally-seeded randomness (spec.md §5 Randomness).
//!
//! Every stage that samples (the C2 tuple filter, solver subsampling of
//! TIMS pairs) takes its randomness from a [`rand_chacha::ChaCha8Rng`]
//! seeded by the caller, so that the same seed and inputs reproduce
//! bit-identical output regardless of thread count.

pub use rand_chacha::ChaCha8Rng;

/// Builds a deterministic RNG from a `u64` seed.
#[must_use]
pub fn from_seed(seed: u64) -> ChaCha8Rng {
    use rand::SeedableRng;
    ChaCha8Rng::seed_from_u64(seed)
}
