//! End-to-end scenarios over the in-process two-party primitives, covering
//! the concrete cases a deployment's acceptance tests would check: each
//! statistic reconstructs the expected aggregate from honestly split
//! shares, and a single cheating submission is excluded without disturbing
//! the rest.

use rand::thread_rng;

use prio_aggregate::{
    circuit::check_var,
    ff::{Bit, Fp},
    ot,
    pk::Pk,
    protocol::{and_result, client as encode, or_result, resolve_max, resolve_min},
    snip::{self, RootsTable},
};

fn init_field() {
    prio_aggregate::ff::set_modulus(0xFFFF_FFFF_0000_0001);
}

#[test]
fn bit_sum_over_five_clients() {
    init_field();
    let mut rng = thread_rng();
    let values = [true, false, true, true, false];
    let pks: Vec<Pk> = values.iter().map(|_| Pk::generate(&mut rng)).collect();

    let (x0, x1): (Vec<bool>, Vec<bool>) = values
        .iter()
        .zip(pks.iter())
        .map(|(&v, &pk)| {
            let (s0, s1) = encode::encode_bit(pk, v, &mut rng);
            (s0.bit.as_bool(), s1.bit.as_bool())
        })
        .unzip();
    let valid = vec![true; values.len()];

    let total = ot::sum_in_memory(
        &x0.iter().map(|&b| u64::from(b)).collect::<Vec<_>>(),
        &x1.iter().map(|&b| u64::from(b)).collect::<Vec<_>>(),
        &valid,
        1,
        &mut rng,
    );
    assert_eq!(total, 3);
}

#[test]
fn int_sum_over_three_clients() {
    init_field();
    let mut rng = thread_rng();
    let values = [7u64, 250, 3];
    let pks: Vec<Pk> = values.iter().map(|_| Pk::generate(&mut rng)).collect();

    let (x0, x1): (Vec<u64>, Vec<u64>) = values
        .iter()
        .zip(pks.iter())
        .map(|(&v, &pk)| {
            let (s0, s1) = encode::encode_int(pk, v, 16, &mut rng);
            (s0.value.as_u64(), s1.value.as_u64())
        })
        .unzip();
    let valid = vec![true; values.len()];

    let total = ot::sum_in_memory(&x0, &x1, &valid, 16, &mut rng);
    assert_eq!(total, 260);
}

#[test]
fn max_and_min_over_unary_indicator() {
    init_field();
    let mut rng = thread_rng();
    let values = [3u64, 11, 7, 11, 2];
    let bound = 15u64;

    let mut combined = vec![false; (bound + 1) as usize];
    for &v in &values {
        let pk = Pk::generate(&mut rng);
        let (s0, s1) = encode::encode_max(pk, v, bound, true, &mut rng);
        for (i, (a, b)) in s0.indicator.iter().zip(s1.indicator.iter()).enumerate() {
            if (*a + *b) == Fp::ONE {
                combined[i] = combined[i] || true;
            }
        }
    }
    assert_eq!(resolve_max(&combined), 11);

    let mut combined_min = vec![false; (bound + 1) as usize];
    for &v in &values {
        let pk = Pk::generate(&mut rng);
        let (s0, s1) = encode::encode_max(pk, v, bound, false, &mut rng);
        for (i, (a, b)) in s0.indicator.iter().zip(s1.indicator.iter()).enumerate() {
            if (*a + *b) == Fp::ONE {
                combined_min[i] = combined_min[i] || true;
            }
        }
    }
    assert_eq!(resolve_min(&combined_min), 2);
}

#[test]
fn and_and_or_over_three_clients() {
    init_field();
    let mut rng = thread_rng();
    let values = [true, true, false];

    let mut combined_and = Bit::ZERO;
    let mut combined_or = Bit::ZERO;
    for &v in &values {
        let pk = Pk::generate(&mut rng);
        let (s0, s1) = encode::encode_bit(pk, v, &mut rng);
        combined_and = combined_and + s0.bit + s1.bit;
        combined_or = combined_or + s0.bit + s1.bit;
    }
    assert!(!and_result(combined_and));
    assert!(or_result(combined_or));
}

#[test]
fn freq_histogram_over_seven_submissions() {
    init_field();
    let mut rng = thread_rng();
    let values = [0u64, 0, 1, 2, 2, 2, 3];
    let num_bits = 2;
    let m = 1usize << num_bits;

    let mut counts = vec![0u64; m];
    for &v in &values {
        let pk = Pk::generate(&mut rng);
        let (s0, s1) = encode::encode_freq(pk, v, num_bits, &mut rng);
        for i in 0..m {
            if (s0.indicator[i] + s1.indicator[i]).as_bool() {
                counts[i] += 1;
            }
        }
    }
    assert_eq!(counts, vec![2, 1, 3, 1]);
}

#[test]
fn variance_excludes_a_cheating_submission() {
    init_field();
    let mut rng = thread_rng();
    let honest = [1u64, 2, 3, 4];
    let circuit = check_var();
    let table = RootsTable::new(circuit.next_pow2());

    let mut sum_v = 0u64;
    let mut sum_sq = 0u64;
    let mut count = 0u64;

    for &v in &honest {
        let pk = Pk::generate(&mut rng);
        let (s0, s1, p0, p1) = encode::encode_var(pk, v, &mut rng);
        assert!(snip_round_passes(&circuit, &table, &p0, &p1, &mut rng));
        sum_v += (s0.v + s1.v).as_u64();
        sum_sq += (s0.v_squared + s1.v_squared).as_u64();
        count += 1;
        let _ = pk;
    }

    // Cheater: claims v_squared = v*v + 10.
    let pk = Pk::generate(&mut rng);
    let v = 5u64;
    let (_s0, _s1, p0, p1) = encode::encode_var(pk, v, &mut rng);
    let (x, claimed_sq) = (Fp::new(v), Fp::new(v * v) + Fp::new(10));
    let (cheat_p0, cheat_p1) = snip::share_polynomials(&circuit, &[x, claimed_sq], &mut rng);
    let _ = (p0, p1);
    assert!(!output_wire_zero(&circuit, &table, x, claimed_sq, &cheat_p0, &cheat_p1, Fp::new(999)));

    let mean = sum_v as f64 / count as f64;
    let variance = (sum_sq as f64 / count as f64) - mean * mean;
    assert!((variance - 2.0).abs() < 1e-9);
}

fn snip_round_passes(
    circuit: &prio_aggregate::circuit::Circuit,
    table: &RootsTable,
    p0: &snip::ClientPacket,
    p1: &snip::ClientPacket,
    rng: &mut impl rand::Rng,
) -> bool {
    let x = Fp::random(rng);
    let f0 = snip::f_share_at_x(table, &p0.wire_shares, x);
    let f1 = snip::f_share_at_x(table, &p1.wire_shares, x);
    let g0 = snip::g_share_at_x(table, &p0.wire_shares, x);
    let g1 = snip::g_share_at_x(table, &p1.wire_shares, x);
    let h0 = snip::h_share_at_x(table, &p0.h_points, x);
    let h1 = snip::h_share_at_x(table, &p1.h_points, x);

    let cor0 = snip::mask(f0, g0, &p0.triple_share);
    let cor1 = snip::mask(f1, g1, &p1.triple_share);
    let cor = snip::open_cor(&cor0, &cor1);

    let v0 = snip::valid_share(&cor, &p0.triple_share, h0, true);
    let v1 = snip::valid_share(&cor, &p1.triple_share, h1, false);
    let _ = circuit;
    snip::output_is_valid(v0, v1)
}

fn output_wire_zero(
    circuit: &prio_aggregate::circuit::Circuit,
    table: &RootsTable,
    x: Fp,
    y: Fp,
    p0: &snip::ClientPacket,
    p1: &snip::ClientPacket,
    challenge: Fp,
) -> bool {
    let out0 = snip::output_share(circuit, table, &[x, Fp::ZERO], &p0.h_points, challenge);
    let out1 = snip::output_share(circuit, table, &[Fp::ZERO, y], &p1.h_points, challenge);
    snip::output_wire_is_zero(out0, out1)
}
