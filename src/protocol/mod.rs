//! Statistic tags, round configuration, and the per-statistic aggregation
//! logic that threads the circuit/SNIP/triples/OT/heavy primitives together
//! (`spec.md` §4.3). `aggregate` holds the pure combine step each state
//! machine performs once both servers' contributions are in hand; `server`
//! and `client` drive the actual two-party exchange over `net`.

mod aggregate;
pub mod client;
pub mod server;

pub use aggregate::{
    and_result, build_normal_equations, linreg_solve, or_result, resolve_max, resolve_min,
    stddev_result, variance_result, NormalEquations,
};

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::heavy::HeavyConfig;
use crate::net;

#[derive(Error, Debug)]
pub enum Error {
    #[error("round aborted: only {valid}/{total} submissions were valid (threshold {threshold})")]
    TooManyInvalid {
        valid: usize,
        total: usize,
        threshold: f64,
    },
    #[error("servers disagree on submission count for this round")]
    MapSizeMismatch,
    #[error("peer sent a statistic tag mismatched with this round's init message")]
    TagMismatch,
}

/// The thirteen statistic tags a round's `InitMessage` can request
/// (`spec.md` §6), including the no-op placeholder `NONE_OP` the original
/// protocol also carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatTag {
    NoneOp,
    BitSum,
    IntSum,
    And,
    Or,
    Max,
    Min,
    Var,
    StdDev,
    LinReg,
    Freq,
    CountMin,
    Heavy,
}

impl StatTag {
    /// Whether this statistic's submissions carry a SNIP `ClientPacket`
    /// (`spec.md` §4.2's `N_mul = 0` tie-break applies to `AND`/`OR`/`MAX`/
    /// `MIN`/`FREQ`/`COUNTMIN`/`HEAVY`, which have no multiplication-gate
    /// validity predicate).
    pub fn uses_snip(self) -> bool {
        matches!(self, StatTag::Var | StatTag::StdDev | StatTag::LinReg)
    }

    fn wire_code(self) -> u8 {
        match self {
            StatTag::NoneOp => 0,
            StatTag::BitSum => 1,
            StatTag::IntSum => 2,
            StatTag::And => 3,
            StatTag::Or => 4,
            StatTag::Max => 5,
            StatTag::Min => 6,
            StatTag::Var => 7,
            StatTag::StdDev => 8,
            StatTag::LinReg => 9,
            StatTag::Freq => 10,
            StatTag::CountMin => 11,
            StatTag::Heavy => 12,
        }
    }

    fn from_wire_code(code: u8) -> Self {
        match code {
            0 => StatTag::NoneOp,
            1 => StatTag::BitSum,
            2 => StatTag::IntSum,
            3 => StatTag::And,
            4 => StatTag::Or,
            5 => StatTag::Max,
            6 => StatTag::Min,
            7 => StatTag::Var,
            8 => StatTag::StdDev,
            9 => StatTag::LinReg,
            10 => StatTag::Freq,
            11 => StatTag::CountMin,
            _ => StatTag::Heavy,
        }
    }
}

/// The round-parameters message every client sends before its submissions
/// (`spec.md` §6's `InitMessage`).
#[derive(Debug, Clone)]
pub struct InitMessage {
    pub tag: StatTag,
    pub num_bits: u32,
    pub num_of_inputs: usize,
    /// `MAX_OP`/`MIN_OP`'s upper bound `B`.
    pub max_inp: Option<u64>,
    /// `LINREG_OP`'s degree `d`.
    pub degree: Option<usize>,
    /// `COUNTMIN_OP`/`HEAVY_OP`'s sketch parameters.
    pub heavy: Option<HeavyConfig>,
    /// 32-byte PRG seed for the hash family, present whenever `heavy` is.
    pub hash_seed: Option<[u8; 32]>,
}

impl InitMessage {
    /// Writes the round header both servers read before a submission round
    /// starts (`spec.md` §6): the common `tag`/`num_bits`/`num_of_inputs`
    /// fields, then whatever extra parameters the tag requires.
    pub async fn write<W: AsyncWrite + Unpin>(&self, w: &mut W) -> Result<(), net::Error> {
        w.write_u8(self.tag.wire_code()).await.map_err(net::Error::Io)?;
        w.write_u32(self.num_bits).await.map_err(net::Error::Io)?;
        w.write_u64(self.num_of_inputs as u64).await.map_err(net::Error::Io)?;
        match self.tag {
            StatTag::Max | StatTag::Min => {
                let bound = self.max_inp.expect("MAX_OP/MIN_OP init message needs a bound");
                w.write_u64(bound).await.map_err(net::Error::Io)?;
            }
            StatTag::LinReg => {
                let degree = self.degree.expect("LINREG_OP init message needs a degree");
                w.write_u64(degree as u64).await.map_err(net::Error::Io)?;
            }
            StatTag::CountMin | StatTag::Heavy => {
                let seed = self.hash_seed.expect("COUNTMIN_OP/HEAVY_OP init message needs a hash seed");
                net::write_bytes32(w, &seed).await?;
                let cfg = self.heavy.expect("COUNTMIN_OP/HEAVY_OP init message needs sketch parameters");
                w.write_u64(cfg.d as u64).await.map_err(net::Error::Io)?;
                w.write_u64(cfg.w as u64).await.map_err(net::Error::Io)?;
                if self.tag == StatTag::Heavy {
                    net::write_f64(w, cfg.t).await?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    pub async fn read<R: AsyncRead + Unpin>(r: &mut R) -> Result<Self, net::Error> {
        let tag = StatTag::from_wire_code(r.read_u8().await.map_err(net::Error::Io)?);
        let num_bits = r.read_u32().await.map_err(net::Error::Io)?;
        let num_of_inputs = r.read_u64().await.map_err(net::Error::Io)? as usize;

        let mut max_inp = None;
        let mut degree = None;
        let mut heavy = None;
        let mut hash_seed = None;
        match tag {
            StatTag::Max | StatTag::Min => {
                max_inp = Some(r.read_u64().await.map_err(net::Error::Io)?);
            }
            StatTag::LinReg => {
                degree = Some(r.read_u64().await.map_err(net::Error::Io)? as usize);
            }
            StatTag::CountMin | StatTag::Heavy => {
                hash_seed = Some(net::read_bytes32(r).await?);
                let d = r.read_u64().await.map_err(net::Error::Io)? as usize;
                let w = r.read_u64().await.map_err(net::Error::Io)? as usize;
                let t = if tag == StatTag::Heavy {
                    net::read_f64(r).await?
                } else {
                    0.0
                };
                heavy = Some(HeavyConfig { t, w, d });
            }
            _ => {}
        }

        Ok(InitMessage { tag, num_bits, num_of_inputs, max_inp, degree, heavy, hash_seed })
    }
}

/// Server-local configuration for a round, combining the wire `InitMessage`
/// with operator-configured policy (`spec.md` §9's open questions, resolved
/// as configuration rather than compile-time constants).
#[derive(Debug, Clone)]
pub struct RoundConfig {
    pub init: InitMessage,
    pub invalid_threshold: f64,
    pub ot_port: u16,
}

impl RoundConfig {
    pub fn is_round_valid(&self, valid_count: usize, total: usize) -> bool {
        if total == 0 {
            return true;
        }
        (valid_count as f64) / (total as f64) >= self.invalid_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn init_message_roundtrips_for_every_tag_shape() {
        let plain = InitMessage {
            tag: StatTag::BitSum,
            num_bits: 1,
            num_of_inputs: 5,
            max_inp: None,
            degree: None,
            heavy: None,
            hash_seed: None,
        };
        let max_min = InitMessage {
            tag: StatTag::Max,
            num_bits: 8,
            num_of_inputs: 5,
            max_inp: Some(100),
            degree: None,
            heavy: None,
            hash_seed: None,
        };
        let linreg = InitMessage {
            tag: StatTag::LinReg,
            num_bits: 16,
            num_of_inputs: 5,
            max_inp: None,
            degree: Some(3),
            heavy: None,
            hash_seed: None,
        };
        let heavy = InitMessage {
            tag: StatTag::Heavy,
            num_bits: 20,
            num_of_inputs: 5,
            max_inp: None,
            degree: None,
            heavy: Some(HeavyConfig { t: 0.2, w: 64, d: 3 }),
            hash_seed: Some([9u8; 32]),
        };

        for init in [plain, max_min, linreg, heavy] {
            let (mut a, mut b) = tokio::io::duplex(4096);
            init.write(&mut a).await.unwrap();
            let got = InitMessage::read(&mut b).await.unwrap();
            assert_eq!(got.tag, init.tag);
            assert_eq!(got.num_bits, init.num_bits);
            assert_eq!(got.num_of_inputs, init.num_of_inputs);
            assert_eq!(got.max_inp, init.max_inp);
            assert_eq!(got.degree, init.degree);
            assert_eq!(got.hash_seed, init.hash_seed);
            match (got.heavy, init.heavy) {
                (Some(a), Some(b)) => {
                    assert_eq!(a.w, b.w);
                    assert_eq!(a.d, b.d);
                    assert!((a.t - b.t).abs() < 1e-12);
                }
                (None, None) => {}
                _ => panic!("heavy config presence mismatch"),
            }
        }
    }

    #[test]
    fn is_round_valid_rejects_below_threshold() {
        let round = RoundConfig {
            init: InitMessage {
                tag: StatTag::BitSum,
                num_bits: 1,
                num_of_inputs: 10,
                max_inp: None,
                degree: None,
                heavy: None,
                hash_seed: None,
            },
            invalid_threshold: 0.8,
            ot_port: 0,
        };
        assert!(round.is_round_valid(8, 10));
        assert!(!round.is_round_valid(7, 10));
        assert!(round.is_round_valid(0, 0));
    }
}
