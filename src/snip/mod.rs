//! Secret-shared Non-Interactive Proof (SNIP): the polynomial-IOP that lets
//! a client prove its plaintext satisfies an arithmetic circuit without
//! revealing it (`spec.md` §4.2).

mod prover;
mod verifier;

pub use prover::share_polynomials;
pub use verifier::{
    check_constant_terms, f_share_at_x, g_share_at_x, h_share_at_x, mask, mul_output_shares,
    open_cor, output_is_valid, output_share, output_wire_is_zero, valid_share, Cor, CorShare,
    RootsTable,
};

use thiserror::Error;

use crate::{ff::Fp, triples::FieldTripleShare};

#[derive(Error, Debug)]
pub enum Error {
    #[error("servers disagree on the round challenge X")]
    ChallengeMismatch,
}

/// The SNIP payload attached to a per-client submission, one per server.
/// Field order and names follow `original_source/net_share.h`'s
/// `client_packet` / `send_ClientPacket`.
#[derive(Debug, Clone)]
pub struct ClientPacket {
    /// This server's share of every multiplication gate's (left, right)
    /// input, flattened as `[left_0, right_0, left_1, right_1, ...]`.
    pub wire_shares: Vec<Fp>,
    pub f0_share: Fp,
    pub g0_share: Fp,
    pub h0_share: Fp,
    /// This server's share of `h` evaluated at `2N-1` fixed public points.
    pub h_points: Vec<Fp>,
    pub triple_share: FieldTripleShare,
}

impl ClientPacket {
    /// Number of multiplication gates this packet's wire shares cover.
    pub fn num_mul_gates(&self) -> usize {
        self.wire_shares.len() / 2
    }
}
