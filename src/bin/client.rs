//! Submission client. Splits one plaintext value into the two servers'
//! shares (`protocol::client`) and sends each server its half over a plain
//! TCP connection, after the per-round `InitMessage` header both servers
//! expect (`spec.md` §6).

use std::{net::SocketAddr, process};

use clap::{Parser, ValueEnum};
use rand::RngCore;
use tracing::error;

use prio_aggregate::{
    ff,
    heavy::HeavyConfig,
    net,
    pk::Pk,
    protocol::{self, client as encode, StatTag},
};

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
enum Stat {
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

impl Stat {
    fn to_tag(self) -> StatTag {
        match self {
            Stat::BitSum => StatTag::BitSum,
            Stat::IntSum => StatTag::IntSum,
            Stat::And => StatTag::And,
            Stat::Or => StatTag::Or,
            Stat::Max => StatTag::Max,
            Stat::Min => StatTag::Min,
            Stat::Var => StatTag::Var,
            Stat::StdDev => StatTag::StdDev,
            Stat::LinReg => StatTag::LinReg,
            Stat::Freq => StatTag::Freq,
            Stat::CountMin => StatTag::CountMin,
            Stat::Heavy => StatTag::Heavy,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "client", about = "Secure-aggregation submission client")]
struct Args {
    /// Which statistic this submission contributes to.
    #[arg(long, value_enum)]
    stat: Stat,

    /// The plaintext value to submit (unused by `LinReg`, which takes
    /// `--xs`/`--y` instead).
    #[arg(long, default_value_t = 0)]
    value: u64,

    /// Number of bits the value is bounded by (`IntSum`/`Freq`/`Heavy`).
    #[arg(long, default_value_t = 32)]
    num_bits: u32,

    /// Upper bound `B` of the unary threshold indicator (`Max`/`Min`).
    #[arg(long)]
    bound: Option<u64>,

    /// Independent variables (`LinReg`), comma-separated.
    #[arg(long, value_delimiter = ',')]
    xs: Vec<u64>,

    /// Dependent variable (`LinReg`).
    #[arg(long)]
    y: Option<u64>,

    /// Hex-encoded 32-byte hash-family seed (`CountMin`/`Heavy`). A fresh
    /// random seed is minted and printed if omitted; every client and both
    /// servers must agree on the same seed for a round.
    #[arg(long)]
    seed: Option<String>,

    /// Count-min sketch row count `d` (`CountMin`/`Heavy`).
    #[arg(long, default_value_t = 4)]
    hash_rows: usize,

    /// Count-min sketch width `w` (`CountMin`/`Heavy`).
    #[arg(long, default_value_t = 256)]
    hash_width: usize,

    /// Heavy-hitter frequency threshold fraction `t` (`Heavy`).
    #[arg(long, default_value_t = 0.1)]
    heavy_threshold: f64,

    /// Server 0's client-submission address.
    #[arg(long)]
    server0: SocketAddr,

    /// Server 1's client-submission address.
    #[arg(long)]
    server1: SocketAddr,

    /// Total submissions this round expects, forwarded in the init header
    /// so the server knows how many records to read.
    #[arg(long)]
    num_of_inputs: u64,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    tracing_subscriber::fmt().init();

    if let Err(e) = run(args).await {
        error!(error = %e, "client submission failed");
        process::exit(1);
    }
}

fn resolve_seed(raw: Option<&str>, rng: &mut impl RngCore) -> [u8; 32] {
    match raw {
        Some(hex_str) => {
            let bytes = hex::decode(hex_str).expect("--seed must be 64 hex characters");
            bytes.try_into().expect("--seed must decode to exactly 32 bytes")
        }
        None => {
            let mut seed = [0u8; 32];
            rng.fill_bytes(&mut seed);
            tracing::info!(seed = %hex::encode(seed), "minted a fresh hash-family seed for this round");
            seed
        }
    }
}

async fn run(args: Args) -> prio_aggregate::Result<()> {
    ff::set_modulus(0xFFFF_FFFF_0000_0001);
    let mut rng = rand::thread_rng();
    let pk = Pk::generate(&mut rng);
    let tag = args.stat.to_tag();

    let mut sock0 = tokio::net::TcpStream::connect(args.server0).await?;
    let mut sock1 = tokio::net::TcpStream::connect(args.server1).await?;

    let uses_heavy = matches!(tag, StatTag::CountMin | StatTag::Heavy);
    let seed = if uses_heavy { Some(resolve_seed(args.seed.as_deref(), &mut rng)) } else { None };
    let heavy_cfg = uses_heavy.then(|| HeavyConfig { t: args.heavy_threshold, w: args.hash_width, d: args.hash_rows });

    let init = protocol::InitMessage {
        tag,
        num_bits: args.num_bits,
        num_of_inputs: args.num_of_inputs as usize,
        max_inp: matches!(tag, StatTag::Max | StatTag::Min).then(|| {
            args.bound.expect("--bound is required for Max/Min")
        }),
        degree: matches!(tag, StatTag::LinReg).then_some(args.xs.len() + 1),
        heavy: heavy_cfg,
        hash_seed: seed,
    };
    init.write(&mut sock0).await?;
    init.write(&mut sock1).await?;

    match tag {
        StatTag::BitSum | StatTag::And | StatTag::Or => {
            let value = args.value != 0;
            let (s0, s1) = encode::encode_bit(pk, value, &mut rng);
            net::write_pk(&mut sock0, &pk).await?;
            net::write_bool(&mut sock0, s0.bit.as_bool()).await?;
            net::write_pk(&mut sock1, &pk).await?;
            net::write_bool(&mut sock1, s1.bit.as_bool()).await?;
        }
        StatTag::IntSum => {
            let (s0, s1) = encode::encode_int(pk, args.value, args.num_bits, &mut rng);
            net::write_pk(&mut sock0, &pk).await?;
            net::write_fp(&mut sock0, s0.value).await?;
            net::write_pk(&mut sock1, &pk).await?;
            net::write_fp(&mut sock1, s1.value).await?;
        }
        StatTag::Max | StatTag::Min => {
            let bound = args.bound.expect("--bound is required for Max/Min");
            let is_max = tag == StatTag::Max;
            let (s0, s1) = encode::encode_max(pk, args.value, bound, is_max, &mut rng);
            net::write_pk(&mut sock0, &pk).await?;
            net::write_fp_vec(&mut sock0, &s0.indicator).await?;
            net::write_pk(&mut sock1, &pk).await?;
            net::write_fp_vec(&mut sock1, &s1.indicator).await?;
        }
        StatTag::Var | StatTag::StdDev => {
            let (s0, s1, p0, p1) = encode::encode_var(pk, args.value, &mut rng);
            net::write_pk(&mut sock0, &pk).await?;
            net::write_fp(&mut sock0, s0.v).await?;
            net::write_fp(&mut sock0, s0.v_squared).await?;
            net::write_client_packet(&mut sock0, &p0).await?;
            net::write_pk(&mut sock1, &pk).await?;
            net::write_fp(&mut sock1, s1.v).await?;
            net::write_fp(&mut sock1, s1.v_squared).await?;
            net::write_client_packet(&mut sock1, &p1).await?;
        }
        StatTag::LinReg => {
            let y = args.y.expect("--y is required for LinReg");
            let (s0, s1, p0, p1) = encode::encode_linreg(pk, &args.xs, y, &mut rng);
            net::write_pk(&mut sock0, &pk).await?;
            net::write_fp_vec(&mut sock0, &s0.xs).await?;
            net::write_fp(&mut sock0, s0.y).await?;
            net::write_fp_vec(&mut sock0, &s0.cross_products).await?;
            net::write_fp_vec(&mut sock0, &s0.xy_products).await?;
            net::write_client_packet(&mut sock0, &p0).await?;
            net::write_pk(&mut sock1, &pk).await?;
            net::write_fp_vec(&mut sock1, &s1.xs).await?;
            net::write_fp(&mut sock1, s1.y).await?;
            net::write_fp_vec(&mut sock1, &s1.cross_products).await?;
            net::write_fp_vec(&mut sock1, &s1.xy_products).await?;
            net::write_client_packet(&mut sock1, &p1).await?;
        }
        StatTag::Freq => {
            let (s0, s1) = encode::encode_freq(pk, args.value, args.num_bits, &mut rng);
            net::write_pk(&mut sock0, &pk).await?;
            net::write_bit_vec(&mut sock0, &s0.indicator).await?;
            net::write_pk(&mut sock1, &pk).await?;
            net::write_bit_vec(&mut sock1, &s1.indicator).await?;
        }
        StatTag::CountMin => {
            let seed = seed.expect("CountMin always derives a hash seed above");
            let (s0, s1) = encode::encode_countmin(pk, args.value, seed, args.hash_rows, args.hash_width, &mut rng);
            net::write_pk(&mut sock0, &pk).await?;
            net::write_bit_vec(&mut sock0, &s0.indicator).await?;
            net::write_pk(&mut sock1, &pk).await?;
            net::write_bit_vec(&mut sock1, &s1.indicator).await?;
        }
        StatTag::Heavy => {
            let seed = seed.expect("Heavy always derives a hash seed above");
            let cfg = heavy_cfg.expect("Heavy always derives sketch parameters above");
            let (s0, s1) = encode::encode_heavy(pk, args.value, seed, &cfg, args.num_bits, &mut rng);
            net::write_pk(&mut sock0, &pk).await?;
            net::write_bit_vec(&mut sock0, &s0.indicator).await?;
            net::write_pk(&mut sock1, &pk).await?;
            net::write_bit_vec(&mut sock1, &s1.indicator).await?;
        }
        StatTag::NoneOp => {}
    }

    Ok(())
}
