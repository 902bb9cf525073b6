//! Cross-server orchestration: presence exchange, SNIP rounds, and
//! OT-assisted sums, each a suspension point per `spec.md` §5. Server 1
//! drives every peer exchange (`original_source/server.cpp`'s `var_op`
//! `server_num == 1` branch sends first); Server 0 responds.
//!
//! These are thin `async` wrappers around the pure combinators in
//! `circuit`, `snip`, `ot`, and `triples` — the actual cryptographic work
//! stays testable without a socket, matching the teacher's pattern of
//! keeping protocol logic separate from transport (`helpers::Transport`).

use rand::Rng;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{
    circuit::Circuit,
    ff::Fp,
    net,
    ot,
    pk::Pk,
    snip::{self, ClientPacket, RootsTable},
};

/// Server 1's half of the presence exchange (`spec.md` §4.3 step 4): sends
/// the map size, then each `pk` in insertion order, collecting Server 0's
/// present/absent reply for each.
pub async fn drive_presence<S: AsyncRead + AsyncWrite + Unpin>(
    peer: &mut S,
    local_pks: &[Pk],
) -> Result<Vec<bool>, net::Error> {
    net::write_u64(peer, local_pks.len() as u64).await?;
    let mut present = Vec::with_capacity(local_pks.len());
    for pk in local_pks {
        net::write_pk(peer, pk).await?;
        present.push(net::read_bool(peer).await?);
    }
    Ok(present)
}

/// Server 0's half of the presence exchange: reads the claimed submission
/// count, then answers present/absent for each `pk` Server 1 sends, in the
/// order Server 1 sent them.
pub async fn respond_presence<S: AsyncRead + AsyncWrite + Unpin>(
    peer: &mut S,
    contains: impl Fn(&Pk) -> bool,
) -> Result<(Vec<Pk>, Vec<bool>), net::Error> {
    let count = net::read_u64(peer).await? as usize;
    let mut order = Vec::with_capacity(count);
    let mut present = Vec::with_capacity(count);
    for _ in 0..count {
        let pk = net::read_pk(peer).await?;
        let is_present = contains(&pk);
        net::write_bool(peer, is_present).await?;
        order.push(pk);
        present.push(is_present);
    }
    Ok((order, present))
}

/// One full SNIP verification round for a single submission
/// (`spec.md` §4.2 steps 3-5): masked `(f, g)` opening, then the Beaver
/// validity-share exchange. Returns whether the multiplication gates'
/// claimed products check out; does not by itself prove the circuit's
/// output wire is zero (see `output_wire_round`).
pub async fn mul_gate_round<S: AsyncRead + AsyncWrite + Unpin>(
    peer: &mut S,
    is_first: bool,
    table: &RootsTable,
    packet: &ClientPacket,
    x: Fp,
) -> Result<bool, net::Error> {
    let f_share = snip::f_share_at_x(table, &packet.wire_shares, x);
    let g_share = snip::g_share_at_x(table, &packet.wire_shares, x);
    let h_share = snip::h_share_at_x(table, &packet.h_points, x);
    let cor_share = snip::mask(f_share, g_share, &packet.triple_share);

    net::write_fp(peer, cor_share.d_share).await?;
    net::write_fp(peer, cor_share.e_share).await?;
    let peer_d = net::read_fp(peer).await?;
    let peer_e = net::read_fp(peer).await?;
    let peer_cor_share = snip::CorShare { d_share: peer_d, e_share: peer_e };
    let cor = snip::open_cor(&cor_share, &peer_cor_share);
    let my_valid = snip::valid_share(&cor, &packet.triple_share, h_share, is_first);

    net::write_fp(peer, my_valid).await?;
    let peer_valid = net::read_fp(peer).await?;
    Ok(snip::output_is_valid(my_valid, peer_valid))
}

/// The output-wire check (`snip::output_wire_is_zero`): exchanges both
/// servers' shares of the circuit's (possibly several) designated output
/// wires, combined under `challenge`, once every multiplication gate's
/// output share has been recovered from the proof's `h_points`. `challenge`
/// must come from `sync_random_challenge`, derived *after* the client's
/// packet is already fixed — reusing a client-predictable value here is the
/// soundness bug `circuit::combine_outputs` documents.
pub async fn output_wire_round<S: AsyncRead + AsyncWrite + Unpin>(
    peer: &mut S,
    circuit: &Circuit,
    table: &RootsTable,
    input_shares: &[Fp],
    packet: &ClientPacket,
    challenge: Fp,
) -> Result<bool, net::Error> {
    let my_share = snip::output_share(circuit, table, input_shares, &packet.h_points, challenge);
    net::write_fp(peer, my_share).await?;
    let peer_share = net::read_fp(peer).await?;
    Ok(snip::output_wire_is_zero(my_share, peer_share))
}

/// Jointly derives a random challenge neither side could have biased,
/// via a commit-reveal coin flip over `sha2::Sha256`: each side commits to
/// a random `Fp` and nonce, both commitments are exchanged, then both
/// reveal, and each side checks the other's reveal matches its earlier
/// commitment before accepting it. The result (`my_value + peer_value`) is
/// unpredictable to either side alone, which is what makes it safe to use
/// as the Beaver-check and output-wire-combination challenge for a circuit
/// the client already committed to in its `ClientPacket`.
pub async fn sync_random_challenge<S: AsyncRead + AsyncWrite + Unpin>(
    peer: &mut S,
    rng: &mut impl Rng,
) -> Result<Fp, net::Error> {
    use sha2::{Digest, Sha256};

    let my_value = Fp::random(rng);
    let mut my_nonce = [0u8; 32];
    rng.fill_bytes(&mut my_nonce);

    let mut hasher = Sha256::new();
    hasher.update(my_value.as_u64().to_be_bytes());
    hasher.update(my_nonce);
    let my_commitment: [u8; 32] = hasher.finalize().into();

    net::write_bytes32(peer, &my_commitment).await?;
    let peer_commitment = net::read_bytes32(peer).await?;

    net::write_fp(peer, my_value).await?;
    net::write_bytes32(peer, &my_nonce).await?;
    let peer_value = net::read_fp(peer).await?;
    let peer_nonce = net::read_bytes32(peer).await?;

    let mut verify = Sha256::new();
    verify.update(peer_value.as_u64().to_be_bytes());
    verify.update(peer_nonce);
    let expected: [u8; 32] = verify.finalize().into();
    if expected != peer_commitment {
        return Err(net::Error::CommitmentMismatch);
    }

    Ok(my_value + peer_value)
}

/// Drives one bit position of a correlated bitsum/intsum OT as the sender
/// (Server 0), over the dedicated OT connection (`spec.md` §4.4,
/// §5 "OT session is a dedicated side connection").
pub async fn ot_sender_round<S: AsyncRead + AsyncWrite + Unpin>(
    peer: &mut S,
    m0: u64,
    m1: u64,
    rng: &mut impl Rng,
) -> Result<(), net::Error> {
    let (state, a_pub) = ot::sender_round1(rng);
    net::write_fp(peer, a_pub).await?;
    let b_pub = net::read_fp(peer).await?;
    let (c0, c1) = ot::sender_round2(&state, b_pub, m0, m1);
    net::write_u64(peer, c0).await?;
    net::write_u64(peer, c1).await?;
    Ok(())
}

/// The receiver (Server 1) side of `ot_sender_round`.
pub async fn ot_receiver_round<S: AsyncRead + AsyncWrite + Unpin>(
    peer: &mut S,
    choice: bool,
    rng: &mut impl Rng,
) -> Result<u64, net::Error> {
    let a_pub = net::read_fp(peer).await?;
    let (state, b_pub) = ot::receiver_round1(choice, a_pub, rng);
    net::write_fp(peer, b_pub).await?;
    let c0 = net::read_u64(peer).await?;
    let c1 = net::read_u64(peer).await?;
    Ok(ot::receiver_round2(&state, a_pub, choice, c0, c1))
}

/// Sums one bit position across every valid submission as the OT sender,
/// returning the sender's running-sum contribution.
pub async fn drive_bit_as_sender<S: AsyncRead + AsyncWrite + Unpin>(
    ot_peer: &mut S,
    x0_bits: &[bool],
    valid: &[bool],
    bit_index: u32,
    rng: &mut impl Rng,
) -> Result<u64, net::Error> {
    let (running, pairs) = ot::bitsum_ot_sender(x0_bits, valid, bit_index, rng);
    for &(m0, m1) in &pairs {
        ot_sender_round(ot_peer, m0, m1, rng).await?;
    }
    Ok(running)
}

/// Sums one bit position across every submission as the OT receiver.
pub async fn drive_bit_as_receiver<S: AsyncRead + AsyncWrite + Unpin>(
    ot_peer: &mut S,
    x1_bits: &[bool],
    rng: &mut impl Rng,
) -> Result<u64, net::Error> {
    let mut received = Vec::with_capacity(x1_bits.len());
    for &choice in x1_bits {
        received.push(ot_receiver_round(ot_peer, choice, rng).await?);
    }
    Ok(ot::bitsum_ot_receiver(&received))
}

/// Full `num_bits`-wide intsum/bitsum over a dedicated OT connection, one
/// bit position at a time (`spec.md` §4.4). The sender's final output is
/// its share of the sum; the caller combines both sides' shares once
/// Server 1 has forwarded its contribution over the main peer socket
/// (`spec.md` §4.3 step 6: "Server 1 sends its OT-receiver output b to
/// Server 0").
pub async fn intsum_as_sender<S: AsyncRead + AsyncWrite + Unpin>(
    ot_peer: &mut S,
    x0: &[u64],
    valid: &[bool],
    num_bits: u32,
    rng: &mut impl Rng,
) -> Result<u64, net::Error> {
    let mut total = 0u64;
    for bit in 0..num_bits {
        let bits: Vec<bool> = x0.iter().map(|v| (v >> bit) & 1 == 1).collect();
        total = total.wrapping_add(drive_bit_as_sender(ot_peer, &bits, valid, bit, rng).await?);
    }
    Ok(total)
}

pub async fn intsum_as_receiver<S: AsyncRead + AsyncWrite + Unpin>(
    ot_peer: &mut S,
    x1: &[u64],
    num_bits: u32,
    rng: &mut impl Rng,
) -> Result<u64, net::Error> {
    let mut total = 0u64;
    for bit in 0..num_bits {
        let bits: Vec<bool> = x1.iter().map(|v| (v >> bit) & 1 == 1).collect();
        total = total.wrapping_add(drive_bit_as_receiver(ot_peer, &bits, rng).await?);
    }
    Ok(total)
}

/// `MAX_OP`/`MIN_OP`: Server 1 sends its combined (summed) threshold array
/// so Server 0 can add its own and scan (`spec.md` §4.3 step 6).
pub async fn send_combined_array<S: AsyncRead + AsyncWrite + Unpin>(
    peer: &mut S,
    array: &[Fp],
) -> Result<(), net::Error> {
    net::write_fp_vec(peer, array).await
}

pub async fn recv_combined_array<S: AsyncRead + AsyncWrite + Unpin>(
    peer: &mut S,
) -> Result<Vec<Fp>, net::Error> {
    net::read_fp_vec(peer).await
}

/// `FREQ_OP`/`COUNTMIN_OP`/`HEAVY_OP`'s combine step: each bucket of the
/// one-hot indicator is algebraically an independent `num_bits=1` bitsum
/// (`heavy` module doc), so this drives `drive_bit_as_sender` once per
/// bucket column with `bit_index` pinned at `0` — every bucket contributes
/// weight `1` to its own count, not a power-of-two weight within one
/// integer, since each bucket is counted separately.
pub async fn drive_bucket_counts_as_sender<S: AsyncRead + AsyncWrite + Unpin>(
    ot_peer: &mut S,
    indicators0: &[Vec<bool>],
    valid: &[bool],
    rng: &mut impl Rng,
) -> Result<Vec<u64>, net::Error> {
    let width = indicators0.first().map_or(0, |v| v.len());
    let mut counts = Vec::with_capacity(width);
    for bucket in 0..width {
        let bits: Vec<bool> = indicators0.iter().map(|v| v[bucket]).collect();
        counts.push(drive_bit_as_sender(ot_peer, &bits, valid, 0, rng).await?);
    }
    Ok(counts)
}

pub async fn drive_bucket_counts_as_receiver<S: AsyncRead + AsyncWrite + Unpin>(
    ot_peer: &mut S,
    indicators1: &[Vec<bool>],
    rng: &mut impl Rng,
) -> Result<Vec<u64>, net::Error> {
    let width = indicators1.first().map_or(0, |v| v.len());
    let mut counts = Vec::with_capacity(width);
    for bucket in 0..width {
        let bits: Vec<bool> = indicators1.iter().map(|v| v[bucket]).collect();
        counts.push(drive_bit_as_receiver(ot_peer, &bits, rng).await?);
    }
    Ok(counts)
}
