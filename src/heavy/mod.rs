//! Count-min sketch and hierarchical heavy-hitters recovery (`spec.md`
//! §4.5), built on a deterministic universal hash family seeded the same
//! way on the client and both servers so no extra round trip is needed to
//! agree on hash parameters.
//!
//! Grounded on `original_source/client.cpp`'s `HashStore`/`countmin_helper`/
//! `heavy_helper`: a degree-1 polynomial hash family over `Fp`, reduced mod
//! the sketch width `w`, and a `d`-row count-min table per stratification
//! level.

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use crate::ff::{Bit, Fp};

/// A deterministically-seeded family of `d` degree-1 polynomial hashes
/// `h_j(x) = (a_j*x + b_j) mod p mod w`, one pair `(a_j, b_j)` per row,
/// derived from a 32-byte PRG seed shared out-of-band by the client
/// (`spec.md` §6's `InitMessage`/seed field).
pub struct HashFamily {
    a: Vec<Fp>,
    b: Vec<Fp>,
    w: usize,
}

impl HashFamily {
    pub fn new(seed: [u8; 32], d: usize, w: usize) -> Self {
        let mut rng = ChaCha20Rng::from_seed(seed);
        let mut a = Vec::with_capacity(d);
        let mut b = Vec::with_capacity(d);
        for _ in 0..d {
            a.push(Fp::random(&mut rng));
            b.push(Fp::random(&mut rng));
        }
        HashFamily { a, b, w }
    }

    pub fn num_rows(&self) -> usize {
        self.a.len()
    }

    pub fn width(&self) -> usize {
        self.w
    }

    pub fn hash(&self, row: usize, x: u64) -> usize {
        let v = (self.a[row] * Fp::new(x) + self.b[row]).as_u64();
        (v as usize) % self.w
    }

    fn bucket(&self, row: usize, x: u64) -> usize {
        row * self.w + self.hash(row, x)
    }
}

/// The client-side one-hot bit vector for a single value: one set bit per
/// hash row, `d*w` long, flattened row-major (`FreqShare`'s payload for
/// `COUNTMIN_OP`/`HEAVY_OP`, `spec.md` §3).
pub fn one_hot_indicator(family: &HashFamily, value: u64) -> Vec<Bit> {
    let mut indicator = vec![Bit::ZERO; family.num_rows() * family.width()];
    for row in 0..family.num_rows() {
        indicator[family.bucket(row, value)] = Bit::ONE;
    }
    indicator
}

/// A count-min sketch reconstructed from the servers' revealed per-bucket
/// sums (`spec.md` §4.3: "each server XORs the Bit arrays of valid
/// submissions position-wise and reveals each bucket count via OT-assisted
/// bit sum").
pub struct CountMin {
    family: HashFamily,
    counts: Vec<u64>,
}

impl CountMin {
    pub fn from_counts(family: HashFamily, counts: Vec<u64>) -> Self {
        assert_eq!(
            counts.len(),
            family.num_rows() * family.width(),
            "counts length must be d*w"
        );
        CountMin { family, counts }
    }

    pub fn estimate(&self, x: u64) -> u64 {
        (0..self.family.num_rows())
            .map(|row| self.counts[self.family.bucket(row, x)])
            .min()
            .unwrap_or(0)
    }
}

/// Parameters for `COUNTMIN_OP`/`HEAVY_OP`: `t` is the heavy-hitter
/// frequency threshold fraction, `w`/`d` size the count-min sketch.
#[derive(Debug, Clone, Copy)]
pub struct HeavyConfig {
    pub t: f64,
    pub w: usize,
    pub d: usize,
}

/// `L = num_bits - ceil(log2(w*d))`, the number of stratified count-min
/// levels `HEAVY_OP` maintains before falling back to an exact histogram
/// over the remaining bits.
pub fn prefix_levels(num_bits: u32, cfg: &HeavyConfig) -> u32 {
    let domain_bits = ((cfg.w * cfg.d) as f64).log2().ceil() as u32;
    num_bits.saturating_sub(domain_bits)
}

/// Recovers every value whose estimated frequency exceeds `t*N/2`, walking
/// the `L` stratified count-min levels bit-by-bit from the most significant
/// prefix bit down, then disambiguating survivors against the exact tail
/// histogram over the final `num_bits - L` bits (`spec.md` §4.5).
///
/// `level_counts[k]` is the revealed `d*w` bucket-count vector for the
/// `(k+1)`-bit-prefix count-min sketch at level `k`; `tail_counts` is the
/// revealed exact histogram over `[0, 2^(num_bits-L))`.
pub fn recover_heavy_hitters(
    seed: [u8; 32],
    cfg: &HeavyConfig,
    num_bits: u32,
    level_counts: &[Vec<u64>],
    tail_counts: &[u64],
    num_submissions: u64,
) -> Vec<u64> {
    let levels = level_counts.len() as u32;
    let threshold = cfg.t * (num_submissions as f64) / 2.0;

    let mut candidates: Vec<u64> = vec![0, 1];
    for (level, counts) in level_counts.iter().enumerate() {
        let family = HashFamily::new(seed, cfg.d, cfg.w);
        let sketch = CountMin::from_counts(family, counts.clone());
        candidates.retain(|&prefix| sketch.estimate(prefix) as f64 > threshold);
        if (level as u32) + 1 < levels {
            candidates = candidates
                .into_iter()
                .flat_map(|p| [p << 1, (p << 1) | 1])
                .collect();
        }
    }

    let tail_bits = num_bits.saturating_sub(levels);
    candidates
        .into_iter()
        .flat_map(|prefix| {
            let base = prefix << tail_bits;
            tail_counts
                .iter()
                .enumerate()
                .filter(move |&(_, &count)| count as f64 > threshold)
                .map(move |(i, _)| base + i as u64)
        })
        .collect()
}
