//! Sampling primitives for the simulation loops.
//!
//! The monte carlo kernels draw tens of millions of small uniform integers
//! per second; `FastUniformInt` slices one 64-bit PRNG output into several
//! fixed-width windows instead of paying one full draw (and one modulo) per
//! sample. `UniqueRng64` shuffles enumeration order without ever repeating
//! an index.

use rand::RngCore;

/// Cheap uniform integer distribution over `[0, range)`.
///
/// Draws `BITS`-wide windows from a buffered 64-bit word and maps them with
/// `(window * range) >> BITS`. This carries a modulo-like bias of at most
/// `range / 2^BITS` per sample, which is acceptable for combo and board
/// sampling; use [`sample_unbiased`](Self::sample_unbiased) where exact
/// uniformity matters.
#[derive(Debug, Clone)]
pub struct FastUniformInt<const BITS: u32 = 21> {
    range: u64,
    buffer: u64,
    uses_left: u32,
}

impl<const BITS: u32> FastUniformInt<BITS> {
    pub const MASK: u64 = (1u64 << BITS) - 1;
    const USES: u32 = 64 / BITS;

    pub fn new(range: u64) -> FastUniformInt<BITS> {
        assert!(range > 0 && range <= Self::MASK + 1);
        FastUniformInt {
            range,
            buffer: 0,
            uses_left: 0,
        }
    }

    #[inline(always)]
    pub fn sample<R: RngCore>(&mut self, rng: &mut R) -> usize {
        if self.uses_left == 0 {
            self.buffer = rng.next_u64();
            self.uses_left = Self::USES;
        }
        let res = ((self.buffer & Self::MASK) * self.range) >> BITS;
        self.buffer >>= BITS;
        self.uses_left -= 1;
        res as usize
    }

    /// Rejection sampled variant without the mapping bias. Slower.
    pub fn sample_unbiased<R: RngCore>(&mut self, rng: &mut R) -> usize {
        // largest multiple of range that fits in a window
        let zone = (Self::MASK + 1) - (Self::MASK + 1) % self.range;
        loop {
            if self.uses_left == 0 {
                self.buffer = rng.next_u64();
                self.uses_left = Self::USES;
            }
            let bits = self.buffer & Self::MASK;
            self.buffer >>= BITS;
            self.uses_left -= 1;
            if bits < zone {
                return (bits % self.range) as usize;
            }
        }
    }
}

/// Visits every index in `[0, range)` exactly once, in pseudo random order.
///
/// A linear congruential generator over the next power of two, with rejection
/// of out-of-range values. The multiplier/increment pair gives a full period
/// for any power-of-two modulus, so `shuffle` restricted to `[0, range)` is a
/// permutation of it.
#[derive(Debug, Clone, Copy)]
pub struct UniqueRng64 {
    range: u64,
    mask: u64,
}

impl UniqueRng64 {
    const A: u64 = 4 * 0xbce1fb1361e7685 + 1;
    const C: u64 = 0x170a96c613336ed9;

    pub fn new(range: u64) -> UniqueRng64 {
        UniqueRng64 {
            range,
            mask: range.next_power_of_two() - 1,
        }
    }

    #[inline(always)]
    pub fn shuffle(&self, mut idx: u64) -> u64 {
        loop {
            idx = Self::A.wrapping_mul(idx).wrapping_add(Self::C) & self.mask;
            if idx < self.range {
                return idx;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoroshiro128Plus;

    #[test]
    fn test_fast_uniform_int_range() {
        let mut rng = Xoroshiro128Plus::seed_from_u64(123);
        let mut dist = FastUniformInt::<16>::new(52);
        for _ in 0..100_000 {
            assert!(dist.sample(&mut rng) < 52);
        }
        let mut dist = FastUniformInt::<21>::new(1326);
        for _ in 0..100_000 {
            assert!(dist.sample(&mut rng) < 1326);
        }
    }

    #[test]
    fn test_fast_uniform_int_bias_bound() {
        // For a range dividing 2^BITS the mapping is exact; check the counts
        // are close to uniform for a range that does not divide it.
        let mut rng = Xoroshiro128Plus::seed_from_u64(7);
        let mut dist = FastUniformInt::<16>::new(52);
        let mut counts = [0u32; 52];
        let n = 2_600_000;
        for _ in 0..n {
            counts[dist.sample(&mut rng)] += 1;
        }
        let expected = n as f64 / 52.0;
        for &c in &counts {
            // bias bound 52/2^16 plus sampling noise
            assert!((c as f64 - expected).abs() / expected < 0.02);
        }
    }

    #[test]
    fn test_fast_uniform_int_unbiased() {
        let mut rng = Xoroshiro128Plus::seed_from_u64(99);
        let mut dist = FastUniformInt::<16>::new(52);
        let mut counts = [0u32; 52];
        let n = 2_600_000;
        for _ in 0..n {
            counts[dist.sample_unbiased(&mut rng)] += 1;
        }
        let expected = n as f64 / 52.0;
        for &c in &counts {
            assert!((c as f64 - expected).abs() / expected < 0.02);
        }
    }

    #[test]
    fn test_unique_rng_is_permutation() {
        for range in [1u64, 2, 36, 1000, 1327] {
            let urng = UniqueRng64::new(range);
            let mut seen = vec![false; range as usize];
            for i in 0..range {
                let v = urng.shuffle(i);
                assert!(v < range);
                assert!(!seen[v as usize], "duplicate output for range {}", range);
                seen[v as usize] = true;
            }
        }
    }
}
