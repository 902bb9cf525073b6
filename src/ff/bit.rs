use std::ops::{Add, AddAssign, Mul, MulAssign, Sub, SubAssign};

use generic_array::{typenum::U1, GenericArray};
use rand_core::RngCore;

use super::Serializable;

/// An element of GF(2). Addition is XOR, multiplication is AND.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Bit(bool);

impl Bit {
    pub const ZERO: Bit = Bit(false);
    pub const ONE: Bit = Bit(true);

    pub fn new(v: bool) -> Self {
        Bit(v)
    }

    pub fn as_bool(self) -> bool {
        self.0
    }

    pub fn random(rng: &mut impl RngCore) -> Self {
        Bit(rng.next_u32() & 1 == 1)
    }
}

impl From<bool> for Bit {
    fn from(v: bool) -> Self {
        Bit(v)
    }
}

impl Add for Bit {
    type Output = Bit;
    fn add(self, rhs: Self) -> Bit {
        Bit(self.0 ^ rhs.0)
    }
}

impl AddAssign for Bit {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// XOR is its own inverse, so subtraction coincides with addition.
impl Sub for Bit {
    type Output = Bit;
    fn sub(self, rhs: Self) -> Bit {
        self + rhs
    }
}

impl SubAssign for Bit {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl Mul for Bit {
    type Output = Bit;
    fn mul(self, rhs: Self) -> Bit {
        Bit(self.0 && rhs.0)
    }
}

impl MulAssign for Bit {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl Serializable for Bit {
    type Size = U1;

    fn serialize(&self, buf: &mut GenericArray<u8, Self::Size>) {
        buf[0] = u8::from(self.0);
    }

    fn deserialize(buf: &GenericArray<u8, Self::Size>) -> Self {
        Bit(buf[0] != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xor_and_semantics() {
        let (t, f) = (Bit::ONE, Bit::ZERO);
        assert_eq!(t + t, f);
        assert_eq!(t + f, t);
        assert_eq!(t * f, f);
        assert_eq!(t * t, t);
    }
}
