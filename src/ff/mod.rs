//! Finite-field primitives: `Fp` (a prime field element) and `Bit` (GF(2)).
//!
//! Mirrors the teacher's `ff` module shape: a handful of small numeric types
//! plus a `Serializable` trait used everywhere a type needs a fixed-size
//! wire representation.

mod bit;
mod fp;

pub use bit::Bit;
pub use fp::{set_modulus, Fp};

use generic_array::{ArrayLength, GenericArray};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("field element {0} is out of range for modulus {1}")]
    OutOfRange(u64, u64),
    #[error("modulus not initialised")]
    ModulusUninit,
    #[error("modulus {0} is too small for num_bits={1}, num_of_inputs={2}")]
    ModulusTooSmall(u64, u32, u64),
}

/// A type with a fixed-size wire representation, the way the teacher's
/// `ff::Serializable` trait works: serialize into a caller-provided buffer
/// sized by the associated type-level constant.
pub trait Serializable {
    type Size: ArrayLength;

    fn serialize(&self, buf: &mut GenericArray<u8, Self::Size>);
    fn deserialize(buf: &GenericArray<u8, Self::Size>) -> Self;
}

/// Picks a prime modulus this crate ships with that satisfies
/// `p > 2^(2*num_bits) * num_of_inputs`, per the invariant in `spec.md` §3.
///
/// `Fp` is a 64-bit field (in the shape of libprio-rs's `Field64`): the
/// modulus is the Goldilocks prime `2^64 - 2^32 + 1`, chosen for its large
/// 2-adicity (roots of unity up to order 2^32), which keeps the SNIP
/// roots-of-unity table construction in §4.2 simple. This bounds
/// `2*num_bits + log2(num_of_inputs) < 64`; deployments needing more headroom
/// need a wider field, out of scope here (see DESIGN.md).
///
/// Process-wide state: called once at program start (see `spec.md` §9,
/// design note on global process state). Only `p` and the roots-of-unity
/// table derived from it persist across rounds; everything else is
/// per-round context.
pub fn pick_modulus(num_bits: u32, num_of_inputs: u64) -> Result<u64, Error> {
    const GOLDILOCKS: u64 = 0xFFFF_FFFF_0000_0001; // 2^64 - 2^32 + 1
    let required = 2u128
        .checked_pow(2 * num_bits)
        .and_then(|bound| bound.checked_mul(u128::from(num_of_inputs)))
        .ok_or(Error::ModulusTooSmall(GOLDILOCKS, num_bits, num_of_inputs))?;
    if u128::from(GOLDILOCKS) > required {
        Ok(GOLDILOCKS)
    } else {
        Err(Error::ModulusTooSmall(GOLDILOCKS, num_bits, num_of_inputs))
    }
}
