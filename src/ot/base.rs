use rand::Rng;
use sha2::{Digest, Sha256};

use crate::ff::Fp;

const GENERATOR: u64 = 7;

fn hash_to_key(point: Fp) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(point.as_u64().to_be_bytes());
    let digest = hasher.finalize();
    u64::from_be_bytes(digest[..8].try_into().expect("sha256 digest is at least 8 bytes"))
}

/// The sender's secret exponent `a`, kept between round 1 and round 2.
pub struct OtSenderState {
    a: Fp,
}

/// The receiver's secret exponent `b` plus its choice bit, kept between
/// round 1 and round 2.
pub struct OtReceiverState {
    b: Fp,
    choice: bool,
}

/// Round 1, sender side: picks `a` at random and publishes `A = g^a`.
pub fn sender_round1(rng: &mut impl Rng) -> (OtSenderState, Fp) {
    let a = Fp::random(rng);
    let a_pub = Fp::new(GENERATOR).pow(a.as_u64());
    (OtSenderState { a }, a_pub)
}

/// Round 1, receiver side: given the sender's `A` and its own choice bit,
/// picks `b` and publishes `B = g^b` (choice 0) or `B = A*g^b` (choice 1).
pub fn receiver_round1(choice: bool, a_pub: Fp, rng: &mut impl Rng) -> (OtReceiverState, Fp) {
    let b = Fp::random(rng);
    let g_b = Fp::new(GENERATOR).pow(b.as_u64());
    let b_pub = if choice { a_pub * g_b } else { g_b };
    (OtReceiverState { b, choice }, b_pub)
}

/// Round 2, sender side: derives both branch keys from `B` and one-time-pads
/// `m0`/`m1` under them.
pub fn sender_round2(state: &OtSenderState, b_pub: Fp, m0: u64, m1: u64) -> (u64, u64) {
    let k0 = hash_to_key(b_pub.pow(state.a.as_u64()));
    let b_over_a = b_pub * Fp::new(GENERATOR).pow(state.a.as_u64()).inv();
    let k1 = hash_to_key(b_over_a.pow(state.a.as_u64()));
    (m0 ^ k0, m1 ^ k1)
}

/// Round 2, receiver side: recovers exactly the message corresponding to
/// its own choice bit by deriving `g^{ab}` via `A^b`, which equals both
/// branches' key base regardless of which branch it actually chose.
pub fn receiver_round2(state: &OtReceiverState, a_pub: Fp, choice: bool, c0: u64, c1: u64) -> u64 {
    debug_assert_eq!(choice, state.choice);
    let key = hash_to_key(a_pub.pow(state.b.as_u64()));
    if choice {
        c1 ^ key
    } else {
        c0 ^ key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::thread_rng;

    fn init_field() {
        crate::ff::set_modulus(0xFFFF_FFFF_0000_0001);
    }

    #[test]
    fn recovers_message_zero() {
        init_field();
        let mut rng = thread_rng();
        let (sender, a_pub) = sender_round1(&mut rng);
        let (receiver, b_pub) = receiver_round1(false, a_pub, &mut rng);
        let (c0, c1) = sender_round2(&sender, b_pub, 42, 99);
        assert_eq!(receiver_round2(&receiver, a_pub, false, c0, c1), 42);
    }

    #[test]
    fn recovers_message_one() {
        init_field();
        let mut rng = thread_rng();
        let (sender, a_pub) = sender_round1(&mut rng);
        let (receiver, b_pub) = receiver_round1(true, a_pub, &mut rng);
        let (c0, c1) = sender_round2(&sender, b_pub, 42, 99);
        assert_eq!(receiver_round2(&receiver, a_pub, true, c0, c1), 99);
    }
}
