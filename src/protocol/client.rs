//! Client-side per-statistic encoders (`spec.md` §3/§4.3), producing the two
//! servers' share records from a plaintext value. Grounded on
//! `original_source/client.cpp`'s `*_helper` functions, translated from
//! random-buffer-then-XOR-patch C to direct additive/XOR splits.
//!
//! Every encoder returns `(server0_share, server1_share)`; the SNIP
//! `ClientPacket` pair for SNIP-bearing statistics is produced separately by
//! `snip::share_polynomials` over the statistic's `Circuit`.

use rand::Rng;

use crate::{
    circuit::{check_lin_reg, check_var},
    ff::{Bit, Fp},
    pk::Pk,
    shares::{BitShare, FreqShare, IntShare, LinRegShare, MaxShare, VarShare},
    snip::{self, ClientPacket},
};

fn split_fp(v: Fp, rng: &mut impl Rng) -> (Fp, Fp) {
    let s0 = Fp::random(rng);
    (s0, v - s0)
}

fn split_bit(v: Bit, rng: &mut impl Rng) -> (Bit, Bit) {
    let s0 = Bit::random(rng);
    (s0, v + s0)
}

/// `BIT_SUM`/`AND_OP`/`OR_OP`: a single XOR-split bit.
pub fn encode_bit(pk: Pk, value: bool, rng: &mut impl Rng) -> (BitShare, BitShare) {
    let (b0, b1) = split_bit(Bit::new(value), rng);
    (BitShare { pk, bit: b0 }, BitShare { pk, bit: b1 })
}

/// `INT_SUM`: a single XOR-split value bounded by `2^num_bits`
/// (`original_source/client.cpp`'s `int_sum_helper`: `share0` random,
/// `share1 = share0 ^ real_val`).
pub fn encode_int(pk: Pk, value: u64, num_bits: u32, rng: &mut impl Rng) -> (IntShare, IntShare) {
    let bound = 1u64 << num_bits;
    let real_val = value % bound;
    let share0 = rng.gen::<u64>() % bound;
    let share1 = share0 ^ real_val;
    (
        IntShare { pk, value: Fp::new(share0) },
        IntShare { pk, value: Fp::new(share1) },
    )
}

/// `VAR_OP`/`STDDEV_OP`: additively splits `v` and `v^2`, plus the SNIP
/// proof that the claimed square is correct (`circuit::check_var`).
pub fn encode_var(
    pk: Pk,
    value: u64,
    rng: &mut impl Rng,
) -> (VarShare, VarShare, ClientPacket, ClientPacket) {
    let v = Fp::new(value);
    let v_squared = v * v;
    let (v0, v1) = split_fp(v, rng);
    let (vs0, vs1) = split_fp(v_squared, rng);

    let circuit = check_var();
    let (packet0, packet1) = snip::share_polynomials(&circuit, &[v, v_squared], rng);

    (
        VarShare { pk, v: v0, v_squared: vs0 },
        VarShare { pk, v: v1, v_squared: vs1 },
        packet0,
        packet1,
    )
}

/// `LINREG_OP(d)`: additively splits every slot `CheckLinReg(d)` checks
/// (`original_source/client.cpp`'s call sites pin the arity: `d-1`
/// independent variables, one dependent variable, every pairwise
/// cross-product, every independent-times-dependent product).
pub fn encode_linreg(
    pk: Pk,
    xs: &[u64],
    y: u64,
    rng: &mut impl Rng,
) -> (LinRegShare, LinRegShare, ClientPacket, ClientPacket) {
    let d = xs.len() + 1;
    let xs_fp: Vec<Fp> = xs.iter().map(|&x| Fp::new(x)).collect();
    let y_fp = Fp::new(y);

    let num_x = xs_fp.len();
    let mut cross = Vec::with_capacity(num_x * (num_x + 1) / 2);
    for j in 0..num_x {
        for k in j..num_x {
            cross.push(xs_fp[j] * xs_fp[k]);
        }
    }
    let xy: Vec<Fp> = xs_fp.iter().map(|&x| x * y_fp).collect();

    let (xs0, xs1): (Vec<Fp>, Vec<Fp>) = xs_fp.iter().map(|&x| split_fp(x, rng)).unzip();
    let (y0, y1) = split_fp(y_fp, rng);
    let (cross0, cross1): (Vec<Fp>, Vec<Fp>) = cross.iter().map(|&c| split_fp(c, rng)).unzip();
    let (xy0, xy1): (Vec<Fp>, Vec<Fp>) = xy.iter().map(|&c| split_fp(c, rng)).unzip();

    let mut plain_inputs = xs_fp.clone();
    plain_inputs.push(y_fp);
    plain_inputs.extend(cross.iter().copied());
    plain_inputs.extend(xy.iter().copied());

    let circuit = check_lin_reg(d);
    let (packet0, packet1) = snip::share_polynomials(&circuit, &plain_inputs, rng);

    (
        LinRegShare { pk, xs: xs0, y: y0, cross_products: cross0, xy_products: xy0 },
        LinRegShare { pk, xs: xs1, y: y1, cross_products: cross1, xy_products: xy1 },
        packet0,
        packet1,
    )
}

/// `MAX_OP`/`MIN_OP`: a `(B+1)`-long XOR-split unary threshold indicator.
/// For `MAX_OP`, index `j` is set iff `j <= value`, so the combined array's
/// highest set index across every client is the maximum. For `MIN_OP`,
/// index `j` is set iff `j >= value`, so the combined array's lowest set
/// index is the minimum (`original_source/client.cpp`'s `max_op_helper`,
/// simplified here to a plain boolean indicator rather than the original's
/// arbitrary-nonzero-field-element OR encoding — see DESIGN.md).
pub fn encode_max(pk: Pk, value: u64, bound: u64, is_max: bool, rng: &mut impl Rng) -> (MaxShare, MaxShare) {
    let indicator: Vec<Fp> = (0..=bound)
        .map(|j| {
            let set = if is_max { j <= value } else { j >= value };
            if set { Fp::ONE } else { Fp::ZERO }
        })
        .collect();
    let (s0, s1): (Vec<Fp>, Vec<Fp>) = indicator.iter().map(|&b| split_fp(b, rng)).unzip();
    (MaxShare { pk, indicator: s0 }, MaxShare { pk, indicator: s1 })
}

/// `FREQ_OP`: an `m`-long XOR-split one-hot bit vector, `m = 2^num_bits`.
pub fn encode_freq(pk: Pk, value: u64, num_bits: u32, rng: &mut impl Rng) -> (FreqShare, FreqShare) {
    let m = 1usize << num_bits;
    let mut indicator = vec![Bit::ZERO; m];
    indicator[value as usize % m] = Bit::ONE;
    let (s0, s1): (Vec<Bit>, Vec<Bit>) = indicator.iter().map(|&b| split_bit(b, rng)).unzip();
    (FreqShare { pk, indicator: s0 }, FreqShare { pk, indicator: s1 })
}

/// `COUNTMIN_OP`/`HEAVY_OP`: an XOR-split one-hot vector over the hash
/// family's buckets (`heavy::one_hot_indicator`), `d*w` long for
/// `COUNTMIN_OP` or `L*d*w + 2^(num_bits-L)` long for `HEAVY_OP` (the
/// caller builds the combined indicator across every stratification level
/// plus the tail histogram and passes it here as one flat vector).
pub fn encode_freq_like(pk: Pk, indicator: Vec<Bit>, rng: &mut impl Rng) -> (FreqShare, FreqShare) {
    let (s0, s1): (Vec<Bit>, Vec<Bit>) = indicator.iter().map(|&b| split_bit(b, rng)).unzip();
    (FreqShare { pk, indicator: s0 }, FreqShare { pk, indicator: s1 })
}

/// `COUNTMIN_OP`: encodes `value` against a single count-min sketch level
/// (`heavy::HashFamily`/`heavy::one_hot_indicator`), reusing the `FREQ_OP`
/// one-hot XOR-split wire format since a sketch row is just a wider
/// histogram bucket.
pub fn encode_countmin(
    pk: Pk,
    value: u64,
    seed: [u8; 32],
    d: usize,
    w: usize,
    rng: &mut impl Rng,
) -> (FreqShare, FreqShare) {
    let family = crate::heavy::HashFamily::new(seed, d, w);
    let indicator = crate::heavy::one_hot_indicator(&family, value);
    encode_freq_like(pk, indicator, rng)
}

/// `HEAVY_OP`: concatenates one count-min one-hot vector per stratification
/// level (the value's `(level+1)`-bit prefix hashed into that level's
/// sketch) with an exact one-hot histogram over the final
/// `num_bits - L` tail bits (`heavy::prefix_levels`, `spec.md` §4.5).
pub fn encode_heavy(
    pk: Pk,
    value: u64,
    seed: [u8; 32],
    cfg: &crate::heavy::HeavyConfig,
    num_bits: u32,
    rng: &mut impl Rng,
) -> (FreqShare, FreqShare) {
    let levels = crate::heavy::prefix_levels(num_bits, cfg);
    let tail_bits = num_bits.saturating_sub(levels);

    let mut indicator = Vec::with_capacity(levels as usize * cfg.d * cfg.w + (1usize << tail_bits));
    for level in 0..levels {
        let shift = num_bits - level - 1;
        let prefix = value >> shift;
        let family = crate::heavy::HashFamily::new(seed, cfg.d, cfg.w);
        indicator.extend(crate::heavy::one_hot_indicator(&family, prefix));
    }
    let tail_len = 1usize << tail_bits;
    let mut tail = vec![Bit::ZERO; tail_len];
    tail[(value & (tail_len as u64 - 1)) as usize] = Bit::ONE;
    indicator.extend(tail);

    encode_freq_like(pk, indicator, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::thread_rng;

    fn init_field() {
        crate::ff::set_modulus(0xFFFF_FFFF_0000_0001);
    }

    #[test]
    fn int_share_xor_reconstructs() {
        init_field();
        let mut rng = thread_rng();
        let pk = Pk::generate(&mut rng);
        let (s0, s1) = encode_int(pk, 42, 8, &mut rng);
        assert_eq!(s0.value.as_u64() ^ s1.value.as_u64(), 42);
    }

    #[test]
    fn var_share_reconstructs_value_and_square() {
        init_field();
        let mut rng = thread_rng();
        let pk = Pk::generate(&mut rng);
        let (s0, s1, p0, p1) = encode_var(pk, 11, &mut rng);
        assert_eq!(s0.v + s1.v, Fp::new(11));
        assert_eq!(s0.v_squared + s1.v_squared, Fp::new(121));
        assert_eq!(p0.f0_share + p1.f0_share, Fp::new(11));
    }

    #[test]
    fn max_indicator_reconstructs_threshold() {
        init_field();
        let mut rng = thread_rng();
        let pk = Pk::generate(&mut rng);
        let (s0, s1) = encode_max(pk, 3, 7, true, &mut rng);
        let combined: Vec<Fp> = s0.indicator.iter().zip(s1.indicator.iter()).map(|(&a, &b)| a + b).collect();
        for (j, &v) in combined.iter().enumerate() {
            assert_eq!(v == Fp::ONE, j <= 3);
        }
    }

    #[test]
    fn countmin_indicator_has_one_set_bit_per_row() {
        init_field();
        let mut rng = thread_rng();
        let pk = Pk::generate(&mut rng);
        let seed = [5u8; 32];
        let (s0, s1) = encode_countmin(pk, 42, seed, 3, 16, &mut rng);
        let combined: Vec<bool> = s0.indicator.iter().zip(s1.indicator.iter()).map(|(&a, &b)| (a + b).as_bool()).collect();
        assert_eq!(combined.iter().filter(|&&b| b).count(), 3);
    }

    #[test]
    fn heavy_indicator_covers_every_level_plus_tail() {
        init_field();
        let mut rng = thread_rng();
        let pk = Pk::generate(&mut rng);
        let seed = [6u8; 32];
        let cfg = crate::heavy::HeavyConfig { t: 0.3, w: 8, d: 2 };
        let num_bits = 6;
        let levels = crate::heavy::prefix_levels(num_bits, &cfg);
        let (s0, s1) = encode_heavy(pk, 19, seed, &cfg, num_bits, &mut rng);
        let combined: Vec<bool> = s0.indicator.iter().zip(s1.indicator.iter()).map(|(&a, &b)| (a + b).as_bool()).collect();
        // one set bit per level plus exactly one in the tail histogram
        assert_eq!(combined.iter().filter(|&&b| b).count(), levels as usize + 1);
    }

    #[test]
    fn freq_indicator_is_one_hot() {
        init_field();
        let mut rng = thread_rng();
        let pk = Pk::generate(&mut rng);
        let (s0, s1) = encode_freq(pk, 5, 4, &mut rng);
        let combined: Vec<bool> = s0.indicator.iter().zip(s1.indicator.iter()).map(|(&a, &b)| (a + b).as_bool()).collect();
        assert_eq!(combined.iter().filter(|&&b| b).count(), 1);
        assert!(combined[5]);
    }
}
