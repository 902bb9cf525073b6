use crate::ff::Fp;

use super::{Circuit, Gate};

/// `CheckVar`: inputs `(x, y)`; asserts `x*x - y = 0` (`spec.md` §4.1).
/// Used to validate a `VarShare`'s claimed square against its value.
pub fn check_var() -> Circuit {
    let gates = vec![
        Gate::Input,     // 0: x
        Gate::Input,     // 1: y  (claimed x^2)
        Gate::Mul(0, 0), // 2: x*x
        Gate::Sub(2, 1), // 3: x*x - y
    ];
    Circuit::new(gates, 2, vec![3])
}

/// `CheckLinReg(d)`: inputs `x_1..x_{d-1}, y`, then the claimed pairwise
/// products `x_j*x_k` (`j <= k`, row-major) and the claimed products
/// `x_j*y`; asserts every claimed product equals the product of its
/// claimed factors (`spec.md` §4.1), matching the input layout
/// `original_source/client.cpp`'s `lin_reg_helper` builds.
///
/// Each product's residual gets its own output wire rather than being
/// folded into a single wire here: the "claimed" product inputs are free
/// input wires the SNIP multiplication check never constrains on their own,
/// so combining several residuals with fixed public weights known to the
/// client ahead of time lets it zero out one residual's error against
/// another's. The caller (`protocol::server::output_wire_round`) combines
/// these wires with `circuit::combine_outputs` under a challenge chosen only
/// after the client's packet is fixed.
pub fn check_lin_reg(d: usize) -> Circuit {
    assert!(d >= 2, "linear regression needs at least one predictor");
    let num_x = d - 1;
    let num_quad = num_x * (num_x + 1) / 2;

    let mut gates = Vec::new();
    // Inputs: x_1..x_{num_x-1}, y
    for _ in 0..num_x {
        gates.push(Gate::Input);
    }
    let y_wire = gates.len();
    gates.push(Gate::Input);

    // Claimed quadratic products x_j*x_k, j <= k.
    let mut claimed_quad = Vec::with_capacity(num_quad);
    for _ in 0..num_quad {
        claimed_quad.push(gates.len());
        gates.push(Gate::Input);
    }
    // Claimed cross products x_j*y.
    let mut claimed_xy = Vec::with_capacity(num_x);
    for _ in 0..num_x {
        claimed_xy.push(gates.len());
        gates.push(Gate::Input);
    }
    let num_inputs = gates.len();

    let mut diffs = Vec::with_capacity(num_quad + num_x);
    let mut idx = 0;
    for j in 0..num_x {
        for k in j..num_x {
            let actual = gates.len();
            gates.push(Gate::Mul(j, k));
            let diff = gates.len();
            gates.push(Gate::Sub(actual, claimed_quad[idx]));
            diffs.push(diff);
            idx += 1;
        }
    }
    for (j, &claimed) in claimed_xy.iter().enumerate() {
        let actual = gates.len();
        gates.push(Gate::Mul(j, y_wire));
        let diff = gates.len();
        gates.push(Gate::Sub(actual, claimed));
        diffs.push(diff);
    }

    Circuit::new(gates, num_inputs, diffs)
}
