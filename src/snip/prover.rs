use rand::Rng;

use crate::{circuit::Circuit, ff::Fp, triples::FieldTripleShare};

use super::ClientPacket;

fn lagrange_eval(points: &[Fp], values: &[Fp], x: Fp) -> Fp {
    if let Some(i) = points.iter().position(|&p| p == x) {
        return values[i];
    }
    let mut sum = Fp::ZERO;
    for i in 0..points.len() {
        let mut num = Fp::ONE;
        let mut den = Fp::ONE;
        for (j, &pj) in points.iter().enumerate() {
            if j == i {
                continue;
            }
            num *= x - pj;
            den *= points[i] - pj;
        }
        sum += values[i] * num * den.inv();
    }
    sum
}

fn roots_of_unity(n: usize) -> Vec<Fp> {
    let log_n = n.trailing_zeros();
    let root = Fp::root_of_unity(log_n);
    (0..n).map(|i| root.pow(i as u64)).collect()
}

fn h_eval_points(n: usize) -> Vec<Fp> {
    (1..=(2 * n - 1)).map(|i| Fp::new(i as u64)).collect()
}

fn split2(v: Fp, rng: &mut impl Rng) -> (Fp, Fp) {
    let s0 = Fp::random(rng);
    (s0, v - s0)
}

fn split_vec(v: &[Fp], rng: &mut impl Rng) -> (Vec<Fp>, Vec<Fp>) {
    v.iter().map(|&x| split2(x, rng)).unzip()
}

/// Runs the client-side SNIP prover: evaluates `circuit` on `inputs`,
/// interpolates `f`, `g`, `h` over the roots-of-unity domain, and splits
/// every quantity the verifier needs into two additive-share `ClientPacket`s
/// — one per server (`spec.md` §4.2).
///
/// If `circuit.num_mul_gates() == 0` this still produces well-formed empty
/// packets; the caller is expected to skip SNIP verification entirely per
/// the tie-break in `spec.md` §4.2.
pub fn share_polynomials(
    circuit: &Circuit,
    inputs: &[Fp],
    rng: &mut impl Rng,
) -> (ClientPacket, ClientPacket) {
    let wires = circuit.eval(inputs);
    let mul_ops = circuit.mul_operands();
    let n_mul = mul_ops.len();
    let n = circuit.next_pow2();

    let roots = roots_of_unity(n);
    let mut f_vals = vec![Fp::ZERO; n];
    let mut g_vals = vec![Fp::ZERO; n];
    for (i, &(l, r)) in mul_ops.iter().enumerate() {
        f_vals[i] = wires[l];
        g_vals[i] = wires[r];
    }

    let f0 = lagrange_eval(&roots, &f_vals, Fp::ZERO);
    let g0 = lagrange_eval(&roots, &g_vals, Fp::ZERO);
    let h0 = f0 * g0;

    let eval_points = h_eval_points(n);
    let h_points: Vec<Fp> = eval_points
        .iter()
        .map(|&x| lagrange_eval(&roots, &f_vals, x) * lagrange_eval(&roots, &g_vals, x))
        .collect();

    let mut wire_flat = Vec::with_capacity(2 * n_mul);
    for &(l, r) in &mul_ops {
        wire_flat.push(wires[l]);
        wire_flat.push(wires[r]);
    }

    let (wire0, wire1) = split_vec(&wire_flat, rng);
    let (f0_0, f0_1) = split2(f0, rng);
    let (g0_0, g0_1) = split2(g0, rng);
    let (h0_0, h0_1) = split2(h0, rng);
    let (hpoints0, hpoints1) = split_vec(&h_points, rng);

    let a = Fp::random(rng);
    let b = Fp::random(rng);
    let c = a * b;
    let (a0, a1) = split2(a, rng);
    let (b0, b1) = split2(b, rng);
    let (c0, c1) = split2(c, rng);

    let packet0 = ClientPacket {
        wire_shares: wire0,
        f0_share: f0_0,
        g0_share: g0_0,
        h0_share: h0_0,
        h_points: hpoints0,
        triple_share: FieldTripleShare { a: a0, b: b0, c: c0 },
    };
    let packet1 = ClientPacket {
        wire_shares: wire1,
        f0_share: f0_1,
        g0_share: g0_1,
        h0_share: h0_1,
        h_points: hpoints1,
        triple_share: FieldTripleShare { a: a1, b: b1, c: c1 },
    };
    (packet0, packet1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::check_var;
    use rand::thread_rng;

    fn init_field() {
        crate::ff::set_modulus(0xFFFF_FFFF_0000_0001);
    }

    #[test]
    fn honest_proof_splits_reconstruct() {
        init_field();
        let mut rng = thread_rng();
        let circuit = check_var();
        let (p0, p1) = share_polynomials(&circuit, &[Fp::new(5), Fp::new(25)], &mut rng);
        assert_eq!(p0.f0_share + p1.f0_share, Fp::new(5));
        assert_eq!(p0.g0_share + p1.g0_share, Fp::new(25));
        assert_eq!(p0.h0_share + p1.h0_share, Fp::new(5) * Fp::new(25));
        assert_eq!(p0.h_points.len(), p1.h_points.len());
    }
}
