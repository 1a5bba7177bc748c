//! Seedable random number generation.
//!
//! [`DiceRng`] wraps a `ChaCha8Rng` so that every consumer of randomness in
//! the simulator threads an explicit generator instead of touching a global.
//! Streams derived from a master seed are independent, which is what lets
//! Monte-Carlo runs execute in parallel while staying reproducible.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Draws a fresh master seed from the operating system, for callers that did
/// not fix one.
#[must_use]
pub fn seed_from_entropy() -> u64 {
    ChaCha8Rng::from_entropy().gen()
}

/// Explicitly threaded random number generator.
///
/// All dice in this crate borrow a `DiceRng` mutably per roll; the generator
/// itself is cheap to construct and carries no dice state.
#[derive(Debug, Clone)]
pub struct DiceRng {
    inner: ChaCha8Rng,
}

impl DiceRng {
    /// Creates a generator from a 64-bit seed.
    #[must_use]
    pub fn from_seed(seed: u64) -> Self {
        Self {
            inner: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Creates the `index`-th independent stream of a master seed.
    ///
    /// Streams with the same seed but different indices never overlap, so
    /// each simulated adventuring day can own one without coordinating with
    /// the others.
    #[must_use]
    pub fn stream(seed: u64, index: u64) -> Self {
        let mut inner = ChaCha8Rng::seed_from_u64(seed);
        inner.set_stream(index);
        Self { inner }
    }

    /// Creates a generator seeded from the operating system.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self {
            inner: ChaCha8Rng::from_entropy(),
        }
    }

    /// Uniform integer in `[lo, hi]`, both ends inclusive.
    pub fn range(&mut self, lo: i32, hi: i32) -> i32 {
        self.inner.gen_range(lo..=hi)
    }

    /// Uniform float in `[0, 1)`.
    pub fn random(&mut self) -> f64 {
        self.inner.gen::<f64>()
    }

    /// Uniform index into a collection of `len` elements.
    ///
    /// # Panics
    ///
    /// Panics if `len` is zero; callers guard against empty collections.
    pub fn choose_index(&mut self, len: usize) -> usize {
        assert!(len > 0, "cannot choose from an empty collection");
        self.inner.gen_range(0..len)
    }

    /// Samples `n` indices from `0..len`, with or without replacement.
    ///
    /// Without replacement this is a partial Fisher-Yates shuffle, so at most
    /// `len` distinct indices come back. Order is unspecified.
    pub fn sample_indices(&mut self, len: usize, n: usize, replacement: bool) -> Vec<usize> {
        if replacement {
            (0..n).map(|_| self.choose_index(len)).collect()
        } else {
            let mut indices: Vec<usize> = (0..len).collect();
            let take = n.min(len);
            for i in 0..take {
                let j = self.inner.gen_range(i..len);
                indices.swap(i, j);
            }
            indices.truncate(take);
            indices
        }
    }
}
