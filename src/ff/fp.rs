use std::{
    fmt,
    ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign},
    sync::atomic::{AtomicU64, Ordering},
};

use generic_array::{typenum::U8, GenericArray};
use rand_core::RngCore;

use super::{Error, Serializable};

/// Process-wide modulus, set once at program start per `spec.md` §9's
/// design note on global state. `0` means uninitialised.
static MODULUS: AtomicU64 = AtomicU64::new(0);

/// Installs the process-wide modulus. Idempotent if called again with the
/// same value; panics if called twice with different values, since that
/// would silently corrupt every round's arithmetic.
pub fn set_modulus(p: u64) {
    let prev = MODULUS.swap(p, Ordering::SeqCst);
    assert!(
        prev == 0 || prev == p,
        "modulus already initialised to {prev}, cannot change to {p}"
    );
}

fn modulus() -> u64 {
    let p = MODULUS.load(Ordering::SeqCst);
    assert_ne!(p, 0, "Fp modulus used before ff::set_modulus was called");
    p
}

/// An element of the prime field used for Beaver triples, SNIP polynomial
/// arithmetic, and OT-assisted sums.
///
/// Backed by a single `u64` limb reduced modulo the process-wide prime
/// (the Goldilocks prime `2^64 - 2^32 + 1` by default, see `ff::pick_modulus`).
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Fp(u64);

impl Fp {
    pub const ZERO: Fp = Fp(0);
    pub const ONE: Fp = Fp(1);

    /// Builds an `Fp`, reducing `v` mod the process-wide modulus.
    pub fn new(v: u64) -> Self {
        Fp(v % modulus())
    }

    /// Builds an `Fp` from a value already known to be in `[0, p)`,
    /// rejecting it otherwise. Used at every wire boundary, per the
    /// invariant that any `Fp` received from the network is checked to be
    /// in range (`spec.md` §3).
    pub fn from_wire(v: u64) -> Result<Self, Error> {
        let p = modulus();
        if v < p {
            Ok(Fp(v))
        } else {
            Err(Error::OutOfRange(v, p))
        }
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub fn random(rng: &mut impl RngCore) -> Self {
        Fp(rng.next_u64() % modulus())
    }

    /// Modular inverse via Fermat's little theorem (`p` is prime):
    /// `a^(p-2) mod p`.
    pub fn inv(self) -> Self {
        assert_ne!(self.0, 0, "cannot invert zero in Fp");
        self.pow(modulus() - 2)
    }

    pub fn pow(self, mut exp: u64) -> Self {
        let mut base = self;
        let mut acc = Fp::ONE;
        while exp > 0 {
            if exp & 1 == 1 {
                acc *= base;
            }
            base *= base;
            exp >>= 1;
        }
        acc
    }

    /// A primitive `2^log_order`-th root of unity, derived from a fixed
    /// generator of the multiplicative group. Used to build the SNIP
    /// roots-of-unity table (`spec.md` §4.2).
    pub fn root_of_unity(log_order: u32) -> Self {
        const GENERATOR: u64 = 7; // a generator of F*_p for the Goldilocks prime
        const TWO_ADICITY: u32 = 32;
        assert!(
            log_order <= TWO_ADICITY,
            "requested root of unity order 2^{log_order} exceeds the field's 2-adicity"
        );
        let root_of_max_order = Fp::new(GENERATOR).pow((modulus() - 1) >> TWO_ADICITY);
        root_of_max_order.pow(1u64 << (TWO_ADICITY - log_order))
    }
}

fn add_mod(a: u64, b: u64, p: u64) -> u64 {
    let (sum, overflow) = a.overflowing_add(b);
    if overflow || sum >= p {
        sum.wrapping_sub(p)
    } else {
        sum
    }
}

fn mul_mod(a: u64, b: u64, p: u64) -> u64 {
    ((u128::from(a) * u128::from(b)) % u128::from(p)) as u64
}

impl Add for Fp {
    type Output = Fp;
    fn add(self, rhs: Self) -> Fp {
        Fp(add_mod(self.0, rhs.0, modulus()))
    }
}

impl AddAssign for Fp {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Neg for Fp {
    type Output = Fp;
    fn neg(self) -> Fp {
        if self.0 == 0 {
            self
        } else {
            Fp(modulus() - self.0)
        }
    }
}

impl Sub for Fp {
    type Output = Fp;
    fn sub(self, rhs: Self) -> Fp {
        self + (-rhs)
    }
}

impl SubAssign for Fp {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl Mul for Fp {
    type Output = Fp;
    fn mul(self, rhs: Self) -> Fp {
        Fp(mul_mod(self.0, rhs.0, modulus()))
    }
}

impl MulAssign for Fp {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl fmt::Debug for Fp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fp({})", self.0)
    }
}

impl Serializable for Fp {
    type Size = U8;

    fn serialize(&self, buf: &mut GenericArray<u8, Self::Size>) {
        buf.copy_from_slice(&self.0.to_be_bytes());
    }

    fn deserialize(buf: &GenericArray<u8, Self::Size>) -> Self {
        Fp(u64::from_be_bytes(buf.as_slice().try_into().unwrap()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        set_modulus(0xFFFF_FFFF_0000_0001);
    }

    #[test]
    fn add_sub_roundtrip() {
        init();
        let a = Fp::new(123_456_789);
        let b = Fp::new(987_654_321);
        assert_eq!((a + b) - b, a);
    }

    #[test]
    fn mul_inverse() {
        init();
        let a = Fp::new(42);
        assert_eq!(a * a.inv(), Fp::ONE);
    }

    #[test]
    fn neg_zero_is_zero() {
        init();
        assert_eq!(-Fp::ZERO, Fp::ZERO);
    }

    #[test]
    fn root_of_unity_has_correct_order() {
        init();
        let root = Fp::root_of_unity(4);
        assert_eq!(root.pow(16), Fp::ONE);
        assert_ne!(root.pow(8), Fp::ONE);
    }

    #[test]
    fn from_wire_rejects_out_of_range() {
        init();
        assert!(Fp::from_wire(0xFFFF_FFFF_0000_0001).is_err());
        assert!(Fp::from_wire(0xFFFF_FFFF_0000_0000).is_ok());
    }
}
