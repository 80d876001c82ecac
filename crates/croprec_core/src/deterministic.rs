//! Deterministic randomness for reproducible forest training
//!
//! Bootstrapping, feature subsampling and dataset shuffling all draw from
//! [`LcgRng`], so a fixed seed yields the same forest on every platform.

use std::num::Wrapping;

/// 64-bit Linear Congruential Generator (Knuth MMIX constants)
///
/// Only the high bits of the state are handed out; the low bits of an LCG
/// have short periods.
#[derive(Clone, Debug)]
pub struct LcgRng {
    state: Wrapping<u64>,
}

impl LcgRng {
    const MULTIPLIER: u64 = 6_364_136_223_846_793_005;
    const INCREMENT: u64 = 1_442_695_040_888_963_407;

    pub fn new(seed: u64) -> Self {
        let mut rng = Self {
            state: Wrapping(seed),
        };
        // Warm up so that small neighbouring seeds diverge immediately
        rng.next_u32();
        rng
    }

    /// Generator for the `stream`-th independent consumer of `seed`
    /// (one stream per tree, per fold, ...)
    pub fn for_stream(seed: u64, stream: u64) -> Self {
        Self::new(mix_seed(seed, stream))
    }

    /// Next 32 random bits
    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state * Wrapping(Self::MULTIPLIER) + Wrapping(Self::INCREMENT);
        (self.state.0 >> 32) as u32
    }

    /// Uniform value in `[0, bound)`; returns 0 when `bound` is 0
    pub fn next_below(&mut self, bound: usize) -> usize {
        if bound == 0 {
            return 0;
        }
        let wide = (u64::from(self.next_u32()) << 32) | u64::from(self.next_u32());
        (wide % bound as u64) as usize
    }

    /// Fisher-Yates shuffle
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.next_below(i + 1);
            items.swap(i, j);
        }
    }

    /// `n` draws with replacement from `0..n`
    pub fn bootstrap_indices(&mut self, n: usize) -> Vec<usize> {
        (0..n).map(|_| self.next_below(n)).collect()
    }
}

/// Deterministic seed mixing (splitmix64 finalizer)
pub fn mix_seed(seed: u64, stream: u64) -> u64 {
    let mut h = seed ^ stream.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    h ^= h >> 30;
    h = h.wrapping_mul(0xBF58_476D_1CE4_E5B9);
    h ^= h >> 27;
    h = h.wrapping_mul(0x94D0_49BB_1331_11EB);
    h ^= h >> 31;
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lcg_determinism() {
        let mut rng1 = LcgRng::new(42);
        let mut rng2 = LcgRng::new(42);

        for _ in 0..100 {
            assert_eq!(rng1.next_u32(), rng2.next_u32());
        }
    }

    #[test]
    fn test_next_below_range() {
        let mut rng = LcgRng::new(42);
        for _ in 0..1000 {
            assert!(rng.next_below(7) < 7);
        }
        assert_eq!(rng.next_below(0), 0);
    }

    #[test]
    fn test_low_bound_is_not_periodic() {
        let mut rng = LcgRng::new(7);
        let draws: Vec<usize> = (0..64).map(|_| rng.next_below(2)).collect();
        let alternating = draws.windows(2).all(|w| w[0] != w[1]);
        assert!(!alternating);
        assert!(draws.contains(&0) && draws.contains(&1));
    }

    #[test]
    fn test_shuffle_is_permutation() {
        let mut rng = LcgRng::new(3);
        let mut items: Vec<usize> = (0..20).collect();
        rng.shuffle(&mut items);

        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_streams_differ() {
        let a = LcgRng::for_stream(42, 0).next_u32();
        let b = LcgRng::for_stream(42, 1).next_u32();
        assert_ne!(a, b);
        assert_ne!(mix_seed(42, 0), mix_seed(43, 0));
    }

    #[test]
    fn test_bootstrap_indices_in_range() {
        let mut rng = LcgRng::new(11);
        let idx = rng.bootstrap_indices(6);
        assert_eq!(idx.len(), 6);
        assert!(idx.iter().all(|&i| i < 6));
    }
}
