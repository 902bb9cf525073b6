use std::fmt;

use generic_array::{typenum::U32, GenericArray};
use rand_core::RngCore;

use crate::ff::Serializable;

/// Opaque 32-byte submission identifier. Used only for deduplication and
/// cross-server matching, never verified as a credential (`spec.md` §1 Non-goals).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pk([u8; 32]);

impl Pk {
    pub fn new(bytes: [u8; 32]) -> Self {
        Pk(bytes)
    }

    /// Generates a fresh, effectively-unique `pk`, the way a client mints
    /// one per submission (`original_source/client.cpp`'s `make_pk`).
    pub fn generate(rng: &mut impl RngCore) -> Self {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        Pk(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Pk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pk({})", hex::encode(self.0))
    }
}

impl fmt::Display for Pk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl Serializable for Pk {
    type Size = U32;

    fn serialize(&self, buf: &mut GenericArray<u8, Self::Size>) {
        buf.copy_from_slice(&self.0);
    }

    fn deserialize(buf: &GenericArray<u8, Self::Size>) -> Self {
        Pk(buf.as_slice().try_into().unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::thread_rng;

    #[test]
    fn distinct_pks_are_not_equal() {
        let mut rng = thread_rng();
        let a = Pk::generate(&mut rng);
        let b = Pk::generate(&mut rng);
        assert_ne!(a, b);
    }

    #[test]
    fn display_is_lowercase_hex() {
        let pk = Pk::new([0xab; 32]);
        assert_eq!(pk.to_string(), "ab".repeat(32));
    }
}
