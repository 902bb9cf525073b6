//! Arithmetic-circuit layer used to express each statistic's validity
//! predicate (`spec.md` §4.1). A circuit is a flat, index-addressed DAG of
//! gates over `Fp`; wire `i` is the output of gate `i`.

mod checks;

pub use checks::{check_lin_reg, check_var};

use crate::ff::Fp;

/// One gate in the circuit. Operands are wire indices into the vector
/// `Circuit::eval` produces, always referring to an earlier wire.
#[derive(Debug, Clone, Copy)]
pub enum Gate {
    /// An input wire, filled directly from the caller's input vector in
    /// declaration order.
    Input,
    Add(usize, usize),
    Sub(usize, usize),
    /// A multiplication gate. These are the only gates whose correctness
    /// the SNIP protocol checks; every other gate is a free linear
    /// operation on secret shares.
    Mul(usize, usize),
    ScalarMul(usize, Fp),
    Negate(usize),
}

/// A fixed sequence of gates plus the designated output wires that must all
/// equal zero iff the submission is well-formed. Circuits that check more
/// than one independent assertion (e.g. `CheckLinReg`) keep each assertion
/// on its own output wire rather than pre-combining them: combining several
/// assertions into one field element is only sound when the combining
/// weights are chosen *after* the client's shares are fixed (see
/// `combine_outputs`), so a `Circuit` itself never bakes in fixed weights.
#[derive(Debug, Clone)]
pub struct Circuit {
    gates: Vec<Gate>,
    num_inputs: usize,
    outputs: Vec<usize>,
}

impl Circuit {
    pub fn new(gates: Vec<Gate>, num_inputs: usize, outputs: Vec<usize>) -> Self {
        assert!(!outputs.is_empty(), "circuit needs at least one output wire");
        for &o in &outputs {
            assert!(o < gates.len(), "output wire out of range");
        }
        Circuit {
            gates,
            num_inputs,
            outputs,
        }
    }

    pub fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    pub fn num_wires(&self) -> usize {
        self.gates.len()
    }

    pub fn output_wires(&self) -> &[usize] {
        &self.outputs
    }

    /// Indices of wires that are multiplication gates, in declaration order.
    /// This is the order in which `f`/`g` carry left/right operands in the
    /// SNIP prover (`spec.md` §4.2).
    pub fn mul_gates(&self) -> Vec<usize> {
        self.gates
            .iter()
            .enumerate()
            .filter_map(|(i, g)| matches!(g, Gate::Mul(_, _)).then_some(i))
            .collect()
    }

    pub fn num_mul_gates(&self) -> usize {
        self.gates
            .iter()
            .filter(|g| matches!(g, Gate::Mul(_, _)))
            .count()
    }

    /// The smallest power of two `>= num_mul_gates + 1`, the root-of-unity
    /// table size the SNIP prover/verifier need (`spec.md` §4.2).
    pub fn next_pow2(&self) -> usize {
        (self.num_mul_gates() + 1).next_power_of_two()
    }

    /// For each multiplication gate, returns its (left, right) operand wire
    /// indices, in declaration order.
    pub fn mul_operands(&self) -> Vec<(usize, usize)> {
        self.gates
            .iter()
            .filter_map(|g| match g {
                Gate::Mul(l, r) => Some((*l, *r)),
                _ => None,
            })
            .collect()
    }

    /// Fills in every gate's wire value from a plaintext input vector.
    /// `inputs.len()` must equal `num_inputs`.
    pub fn eval(&self, inputs: &[Fp]) -> Vec<Fp> {
        assert_eq!(inputs.len(), self.num_inputs, "wrong input arity");
        let mut wires = vec![Fp::ZERO; self.gates.len()];
        let mut next_input = 0;
        for (i, gate) in self.gates.iter().enumerate() {
            wires[i] = match gate {
                Gate::Input => {
                    let v = inputs[next_input];
                    next_input += 1;
                    v
                }
                Gate::Add(a, b) => wires[*a] + wires[*b],
                Gate::Sub(a, b) => wires[*a] - wires[*b],
                Gate::Mul(a, b) => wires[*a] * wires[*b],
                Gate::ScalarMul(a, c) => wires[*a] * *c,
                Gate::Negate(a) => -wires[*a],
            };
        }
        wires
    }

    /// Evaluates the circuit and returns whether every output wire is zero,
    /// i.e. whether plaintext `inputs` satisfy all of the predicate's
    /// assertions.
    pub fn is_satisfied(&self, inputs: &[Fp]) -> bool {
        let wires = self.eval(inputs);
        self.outputs.iter().all(|&o| wires[o] == Fp::ZERO)
    }

    /// Evaluates the circuit on secret shares rather than plaintext: `Add`,
    /// `Sub`, `Negate` and `ScalarMul` are linear and so apply directly to
    /// shares; each `Mul` gate's output share must instead be supplied
    /// (it cannot be derived locally from the two input shares without a
    /// multiplication protocol — in the SNIP verifier this comes from
    /// interpolating the proof's `h` polynomial at that gate's root, see
    /// `snip::verifier`). `mul_output_shares` must be given in the same
    /// declaration order as `mul_gates`/`mul_operands`.
    pub fn eval_shares(&self, input_shares: &[Fp], mul_output_shares: &[Fp]) -> Vec<Fp> {
        assert_eq!(input_shares.len(), self.num_inputs, "wrong input arity");
        assert_eq!(
            mul_output_shares.len(),
            self.num_mul_gates(),
            "wrong mul-gate output arity"
        );
        let mut wires = vec![Fp::ZERO; self.gates.len()];
        let mut next_input = 0;
        let mut next_mul = 0;
        for (i, gate) in self.gates.iter().enumerate() {
            wires[i] = match gate {
                Gate::Input => {
                    let v = input_shares[next_input];
                    next_input += 1;
                    v
                }
                Gate::Add(a, b) => wires[*a] + wires[*b],
                Gate::Sub(a, b) => wires[*a] - wires[*b],
                Gate::Mul(_, _) => {
                    let v = mul_output_shares[next_mul];
                    next_mul += 1;
                    v
                }
                Gate::ScalarMul(a, c) => wires[*a] * *c,
                Gate::Negate(a) => -wires[*a],
            };
        }
        wires
    }

    /// This party's shares of every output wire, given its shares of the
    /// circuit's inputs and of every multiplication gate's output.
    pub fn output_shares(&self, input_shares: &[Fp], mul_output_shares: &[Fp]) -> Vec<Fp> {
        let wires = self.eval_shares(input_shares, mul_output_shares);
        self.outputs.iter().map(|&o| wires[o]).collect()
    }
}

/// Combines several output-wire shares into one field element via a Horner
/// evaluation at `challenge`: `shares[0] + challenge*shares[1] + ... +
/// challenge^(n-1)*shares[n-1]`. Summing each party's combined share and
/// checking the total is zero is sound only when `challenge` is chosen
/// *after* the client's packet (and so every output-wire share) is already
/// fixed — a fixed, client-known challenge lets a malicious client trade an
/// error in one assertion against another (`protocol::server::output_wire_round`
/// derives `challenge` from a post-commitment coin flip for this reason).
pub fn combine_outputs(output_shares: &[Fp], challenge: Fp) -> Fp {
    let mut acc = Fp::ZERO;
    for &share in output_shares.iter().rev() {
        acc = acc * challenge + share;
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_field() {
        crate::ff::set_modulus(0xFFFF_FFFF_0000_0001);
    }

    #[test]
    fn basic_add_mul_circuit() {
        init_field();
        // (x + y) * z
        let gates = vec![
            Gate::Input,          // 0: x
            Gate::Input,          // 1: y
            Gate::Input,          // 2: z
            Gate::Add(0, 1),      // 3: x+y
            Gate::Mul(3, 2),      // 4: (x+y)*z
        ];
        let c = Circuit::new(gates, 3, vec![4]);
        let wires = c.eval(&[Fp::new(2), Fp::new(3), Fp::new(4)]);
        assert_eq!(wires[4], Fp::new(20));
        assert_eq!(c.num_mul_gates(), 1);
        assert_eq!(c.next_pow2(), 2);
    }

    #[test]
    fn eval_shares_matches_plaintext_split() {
        init_field();
        let gates = vec![
            Gate::Input,
            Gate::Input,
            Gate::Input,
            Gate::Add(0, 1),
            Gate::Mul(3, 2),
        ];
        let c = Circuit::new(gates, 3, vec![4]);
        let inputs = [Fp::new(2), Fp::new(3), Fp::new(4)];
        let plain = c.eval(&inputs);

        // Split every input additively across two "servers" and check their
        // output shares sum to the plaintext output.
        let (x0, x1) = (Fp::new(9), inputs[0] - Fp::new(9));
        let (y0, y1) = (Fp::new(1), inputs[1] - Fp::new(1));
        let (z0, z1) = (Fp::new(7), inputs[2] - Fp::new(7));
        let mul_output = plain[4]; // the single Mul gate's output, known in the clear here
        let (m0, m1) = (Fp::new(3), mul_output - Fp::new(3));

        let share0 = c.output_shares(&[x0, y0, z0], &[m0])[0];
        let share1 = c.output_shares(&[x1, y1, z1], &[m1])[0];
        assert_eq!(share0 + share1, plain[4]);
    }

    #[test]
    fn combine_outputs_is_horner_evaluation() {
        init_field();
        let shares = vec![Fp::new(5), Fp::new(7), Fp::new(2)];
        let challenge = Fp::new(3);
        // 5 + 3*7 + 9*2 = 5 + 21 + 18 = 44
        assert_eq!(combine_outputs(&shares, challenge), Fp::new(44));
    }
}
