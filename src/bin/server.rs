//! Aggregation server entry point. Each process plays one of the two
//! non-colluding roles (`--server-index 0` or `1`); which role determines
//! who drives each peer exchange (`protocol::server`'s `drive_*`/`respond_*`
//! split).

use std::{collections::HashSet, path::PathBuf, process};

use clap::Parser;
use tracing::{error, info};

use prio_aggregate::{
    circuit,
    config::ServerConfig,
    ff::{self, Fp},
    net,
    pk::Pk,
    protocol::{
        self, and_result, build_normal_equations, linreg_solve, or_result, resolve_max,
        resolve_min, server as protocol_server, stddev_result, variance_result, StatTag,
    },
    snip,
};

#[derive(Debug, Parser)]
#[command(name = "server", about = "Two-server secure aggregation helper")]
struct Args {
    /// Path to this server's TOML configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Increase logging verbosity; repeat for more detail.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).init();
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    if let Err(e) = run(args).await {
        error!(error = %e, "server exiting on error");
        process::exit(1);
    }
}

async fn run(args: Args) -> prio_aggregate::Result<()> {
    let config = ServerConfig::from_file(&args.config)?;
    info!(server_index = config.server_index, "loaded configuration");

    let client_listener = tokio::net::TcpListener::bind(("0.0.0.0", config.client_port)).await?;
    info!(port = config.client_port, "listening for client submissions");
    let (mut client_sock, _) = client_listener.accept().await?;

    let init = protocol::InitMessage::read(&mut client_sock).await?;
    info!(tag = ?init.tag, num_of_inputs = init.num_of_inputs, "starting round");

    // The field modulus is picked per round from the client's claimed
    // num_bits/num_of_inputs (spec.md §9's global-state note) rather than
    // pinned once at process start: a round with larger inputs needs more
    // headroom than the last one.
    let modulus = ff::pick_modulus(init.num_bits, init.num_of_inputs as u64)?;
    ff::set_modulus(modulus);

    let peer = connect_peer(&config).await?;

    let round = protocol::RoundConfig {
        init,
        invalid_threshold: config.invalid_threshold,
        ot_port: config.ot_port,
    };

    run_round(&round, config.is_first(), &mut client_sock, peer).await
}

async fn connect_peer(config: &ServerConfig) -> std::io::Result<tokio::net::TcpStream> {
    if config.is_first() {
        let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.client_port + 1)).await?;
        let (sock, _) = listener.accept().await?;
        Ok(sock)
    } else {
        tokio::net::TcpStream::connect(config.peer_socket_addr().map_err(std::io::Error::other)?).await
    }
}

/// Marks each `pk`'s first occurrence valid and every later repeat invalid,
/// dropping duplicate submissions from a round's valid set the same way a
/// malformed submission is dropped (`error.rs`'s design note).
fn dedupe(pks: &[Pk]) -> Vec<bool> {
    let mut seen = HashSet::with_capacity(pks.len());
    pks.iter().map(|pk| seen.insert(*pk)).collect()
}

fn check_round_valid(round: &protocol::RoundConfig, valid: &[bool]) -> prio_aggregate::Result<()> {
    let valid_count = valid.iter().filter(|&&v| v).count();
    let total = valid.len();
    if !round.is_round_valid(valid_count, total) {
        return Err(protocol::Error::TooManyInvalid {
            valid: valid_count,
            total,
            threshold: round.invalid_threshold,
        }
        .into());
    }
    Ok(())
}

async fn exchange_presence(
    is_first: bool,
    peer: &mut tokio::net::TcpStream,
    pks: &[Pk],
) -> prio_aggregate::Result<Vec<bool>> {
    if is_first {
        Ok(protocol_server::drive_presence(peer, pks).await?)
    } else {
        let set: HashSet<Pk> = pks.iter().copied().collect();
        let (_order, present) = protocol_server::respond_presence(peer, |pk| set.contains(pk)).await?;
        Ok(present)
    }
}

async fn combine_u64(peer: &mut tokio::net::TcpStream, mine: u64, is_first: bool) -> prio_aggregate::Result<u64> {
    if is_first {
        net::write_u64(peer, mine).await?;
        let theirs = net::read_u64(peer).await?;
        Ok(mine.wrapping_add(theirs))
    } else {
        let theirs = net::read_u64(peer).await?;
        net::write_u64(peer, mine).await?;
        Ok(mine.wrapping_add(theirs))
    }
}

async fn combine_fp(peer: &mut tokio::net::TcpStream, mine: Fp, is_first: bool) -> prio_aggregate::Result<Fp> {
    if is_first {
        net::write_fp(peer, mine).await?;
        let theirs = net::read_fp(peer).await?;
        Ok(mine + theirs)
    } else {
        let theirs = net::read_fp(peer).await?;
        net::write_fp(peer, mine).await?;
        Ok(mine + theirs)
    }
}

async fn combine_fp_vec(
    peer: &mut tokio::net::TcpStream,
    mine: &[Fp],
    is_first: bool,
) -> prio_aggregate::Result<Vec<Fp>> {
    if is_first {
        protocol_server::send_combined_array(peer, mine).await?;
        let theirs = protocol_server::recv_combined_array(peer).await?;
        Ok(mine.iter().zip(theirs.iter()).map(|(&a, &b)| a + b).collect())
    } else {
        let theirs = protocol_server::recv_combined_array(peer).await?;
        protocol_server::send_combined_array(peer, mine).await?;
        Ok(mine.iter().zip(theirs.iter()).map(|(&a, &b)| a + b).collect())
    }
}

async fn combine_u64_vec(
    peer: &mut tokio::net::TcpStream,
    mine: &[u64],
    is_first: bool,
) -> prio_aggregate::Result<Vec<u64>> {
    async fn send(peer: &mut tokio::net::TcpStream, values: &[u64]) -> prio_aggregate::Result<()> {
        net::write_u64(peer, values.len() as u64).await?;
        for &v in values {
            net::write_u64(peer, v).await?;
        }
        Ok(())
    }
    async fn recv(peer: &mut tokio::net::TcpStream) -> prio_aggregate::Result<Vec<u64>> {
        let len = net::read_u64(peer).await? as usize;
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            out.push(net::read_u64(peer).await?);
        }
        Ok(out)
    }

    let theirs = if is_first {
        send(peer, mine).await?;
        recv(peer).await?
    } else {
        let theirs = recv(peer).await?;
        send(peer, mine).await?;
        theirs
    };
    Ok(mine.iter().zip(theirs.iter()).map(|(&a, &b)| a.wrapping_add(b)).collect())
}

/// Dispatches one round to its statistic-specific exchange: presence
/// exchange, then each tag's combine step (OT-assisted sums for the
/// bit/integer/histogram statistics, SNIP verification plus a field-sum
/// combine for `Var`/`StdDev`/`LinReg`).
async fn run_round(
    round: &protocol::RoundConfig,
    is_first: bool,
    client_sock: &mut tokio::net::TcpStream,
    mut peer: tokio::net::TcpStream,
) -> prio_aggregate::Result<()> {
    let mut rng = rand::thread_rng();
    let n = round.init.num_of_inputs;

    match round.init.tag {
        StatTag::BitSum | StatTag::And | StatTag::Or => {
            let mut pks = Vec::with_capacity(n);
            let mut bits = Vec::with_capacity(n);
            for _ in 0..n {
                pks.push(net::read_pk(client_sock).await?);
                bits.push(net::read_bool(client_sock).await?);
            }
            let valid = dedupe(&pks);
            check_round_valid(round, &valid)?;
            exchange_presence(is_first, &mut peer, &pks).await?;

            if round.init.tag == StatTag::BitSum {
                let my_share = if is_first {
                    protocol_server::drive_bit_as_sender(&mut peer, &bits, &valid, 0, &mut rng).await?
                } else {
                    protocol_server::drive_bit_as_receiver(&mut peer, &bits, &mut rng).await?
                };
                let result = combine_u64(&mut peer, my_share, is_first).await?;
                info!(result, "BIT_SUM complete");
            } else {
                use prio_aggregate::ff::Bit;
                let local = bits
                    .iter()
                    .zip(valid.iter())
                    .filter(|(_, &ok)| ok)
                    .fold(Bit::ZERO, |acc, (&b, _)| acc + Bit::new(b));
                net::write_bool(&mut peer, local.as_bool()).await?;
                let peer_bit = net::read_bool(&mut peer).await?;
                let combined = local + Bit::new(peer_bit);
                let result = if round.init.tag == StatTag::And {
                    and_result(combined)
                } else {
                    or_result(combined)
                };
                info!(result, "boolean aggregate complete");
            }
        }
        StatTag::IntSum => {
            let mut pks = Vec::with_capacity(n);
            let mut ints = Vec::with_capacity(n);
            for _ in 0..n {
                pks.push(net::read_pk(client_sock).await?);
                ints.push(net::read_fp(client_sock).await?.as_u64());
            }
            let valid = dedupe(&pks);
            check_round_valid(round, &valid)?;
            exchange_presence(is_first, &mut peer, &pks).await?;

            let my_share = if is_first {
                protocol_server::intsum_as_sender(&mut peer, &ints, &valid, round.init.num_bits, &mut rng).await?
            } else {
                protocol_server::intsum_as_receiver(&mut peer, &ints, round.init.num_bits, &mut rng).await?
            };
            let result = combine_u64(&mut peer, my_share, is_first).await?;
            info!(result, "INT_SUM complete");
        }
        StatTag::Max | StatTag::Min => {
            let mut pks = Vec::with_capacity(n);
            let mut shares = Vec::with_capacity(n);
            for _ in 0..n {
                pks.push(net::read_pk(client_sock).await?);
                shares.push(net::read_fp_vec(client_sock).await?);
            }
            let valid = dedupe(&pks);
            check_round_valid(round, &valid)?;
            exchange_presence(is_first, &mut peer, &pks).await?;

            let width = shares.first().map_or(0, |v| v.len());
            let mut local_sum = vec![Fp::ZERO; width];
            for (share, &ok) in shares.iter().zip(valid.iter()) {
                if !ok {
                    continue;
                }
                for (slot, &v) in local_sum.iter_mut().zip(share.iter()) {
                    *slot = *slot + v;
                }
            }
            let combined = combine_fp_vec(&mut peer, &local_sum, is_first).await?;
            let bools: Vec<bool> = combined.iter().map(|v| v.as_u64() != 0).collect();
            let result = if round.init.tag == StatTag::Max {
                resolve_max(&bools)
            } else {
                resolve_min(&bools)
            };
            info!(result, "max/min complete");
        }
        StatTag::Var | StatTag::StdDev => {
            let mut pks = Vec::with_capacity(n);
            let mut shares = Vec::with_capacity(n);
            let mut packets = Vec::with_capacity(n);
            for _ in 0..n {
                pks.push(net::read_pk(client_sock).await?);
                let v = net::read_fp(client_sock).await?;
                let v_squared = net::read_fp(client_sock).await?;
                shares.push((v, v_squared));
                packets.push(net::read_client_packet(client_sock).await?);
            }
            let dedup_valid = dedupe(&pks);
            exchange_presence(is_first, &mut peer, &pks).await?;

            let circuit = circuit::check_var();
            let table = snip::RootsTable::new(circuit.next_pow2());
            let challenge = protocol_server::sync_random_challenge(&mut peer, &mut rng).await?;

            let mut valid = Vec::with_capacity(n);
            for (i, packet) in packets.iter().enumerate() {
                if !dedup_valid[i] {
                    valid.push(false);
                    continue;
                }
                let (v, v_squared) = shares[i];
                let mul_ok = protocol_server::mul_gate_round(&mut peer, is_first, &table, packet, challenge).await?;
                let output_ok =
                    protocol_server::output_wire_round(&mut peer, &circuit, &table, &[v, v_squared], packet, challenge)
                        .await?;
                valid.push(mul_ok && output_ok);
            }
            check_round_valid(round, &valid)?;

            let mut sum_v = Fp::ZERO;
            let mut sum_v_squared = Fp::ZERO;
            for ((v, v_squared), &ok) in shares.iter().zip(valid.iter()) {
                if ok {
                    sum_v = sum_v + *v;
                    sum_v_squared = sum_v_squared + *v_squared;
                }
            }
            let sum_v = combine_fp(&mut peer, sum_v, is_first).await?;
            let sum_v_squared = combine_fp(&mut peer, sum_v_squared, is_first).await?;
            let n_valid = valid.iter().filter(|&&ok| ok).count();

            let result = if round.init.tag == StatTag::Var {
                variance_result(n_valid, sum_v.as_u64(), sum_v_squared.as_u64())
            } else {
                stddev_result(n_valid, sum_v.as_u64(), sum_v_squared.as_u64())
            };
            info!(result, "variance/stddev complete");
        }
        StatTag::LinReg => {
            let degree = round.init.degree.expect("LINREG_OP round needs a degree");
            let mut pks = Vec::with_capacity(n);
            let mut shares = Vec::with_capacity(n);
            let mut packets = Vec::with_capacity(n);
            for _ in 0..n {
                pks.push(net::read_pk(client_sock).await?);
                let xs = net::read_fp_vec(client_sock).await?;
                let y = net::read_fp(client_sock).await?;
                let cross_products = net::read_fp_vec(client_sock).await?;
                let xy_products = net::read_fp_vec(client_sock).await?;
                shares.push((xs, y, cross_products, xy_products));
                packets.push(net::read_client_packet(client_sock).await?);
            }
            let dedup_valid = dedupe(&pks);
            exchange_presence(is_first, &mut peer, &pks).await?;

            let circuit = circuit::check_lin_reg(degree);
            let table = snip::RootsTable::new(circuit.next_pow2());
            let challenge = protocol_server::sync_random_challenge(&mut peer, &mut rng).await?;

            let mut valid = Vec::with_capacity(n);
            for (i, packet) in packets.iter().enumerate() {
                if !dedup_valid[i] {
                    valid.push(false);
                    continue;
                }
                let (xs, y, cross_products, xy_products) = &shares[i];
                let mut inputs = xs.clone();
                inputs.push(*y);
                inputs.extend(cross_products.iter().copied());
                inputs.extend(xy_products.iter().copied());

                let mul_ok = protocol_server::mul_gate_round(&mut peer, is_first, &table, packet, challenge).await?;
                let output_ok =
                    protocol_server::output_wire_round(&mut peer, &circuit, &table, &inputs, packet, challenge).await?;
                valid.push(mul_ok && output_ok);
            }
            check_round_valid(round, &valid)?;

            let num_x = degree - 1;
            let mut sum_x = vec![Fp::ZERO; num_x];
            let mut sum_y = Fp::ZERO;
            let mut sum_cross = vec![Fp::ZERO; num_x * (num_x + 1) / 2];
            let mut sum_xy = vec![Fp::ZERO; num_x];
            for ((xs, y, cross_products, xy_products), &ok) in shares.iter().zip(valid.iter()) {
                if !ok {
                    continue;
                }
                for (slot, &v) in sum_x.iter_mut().zip(xs.iter()) {
                    *slot = *slot + v;
                }
                sum_y = sum_y + *y;
                for (slot, &v) in sum_cross.iter_mut().zip(cross_products.iter()) {
                    *slot = *slot + v;
                }
                for (slot, &v) in sum_xy.iter_mut().zip(xy_products.iter()) {
                    *slot = *slot + v;
                }
            }
            let sum_x = combine_fp_vec(&mut peer, &sum_x, is_first).await?;
            let sum_y = combine_fp(&mut peer, sum_y, is_first).await?;
            let sum_cross = combine_fp_vec(&mut peer, &sum_cross, is_first).await?;
            let sum_xy = combine_fp_vec(&mut peer, &sum_xy, is_first).await?;
            let n_valid = valid.iter().filter(|&&ok| ok).count();

            let eqs = build_normal_equations(
                n_valid,
                &sum_x.iter().map(|v| v.as_u64()).collect::<Vec<_>>(),
                sum_y.as_u64(),
                &sum_cross.iter().map(|v| v.as_u64()).collect::<Vec<_>>(),
                &sum_xy.iter().map(|v| v.as_u64()).collect::<Vec<_>>(),
            );
            let coefficients = linreg_solve(&eqs);
            info!(?coefficients, "linear regression complete");
        }
        StatTag::Freq => {
            let mut pks = Vec::with_capacity(n);
            let mut indicators = Vec::with_capacity(n);
            for _ in 0..n {
                pks.push(net::read_pk(client_sock).await?);
                let bits = net::read_bit_vec(client_sock).await?;
                indicators.push(bits.iter().map(|b| b.as_bool()).collect::<Vec<_>>());
            }
            let valid = dedupe(&pks);
            check_round_valid(round, &valid)?;
            exchange_presence(is_first, &mut peer, &pks).await?;

            let my_counts = if is_first {
                protocol_server::drive_bucket_counts_as_sender(&mut peer, &indicators, &valid, &mut rng).await?
            } else {
                protocol_server::drive_bucket_counts_as_receiver(&mut peer, &indicators, &mut rng).await?
            };
            let counts = combine_u64_vec(&mut peer, &my_counts, is_first).await?;
            let total: u64 = counts.iter().sum();
            info!(buckets = counts.len(), total, "FREQ_OP complete");
        }
        StatTag::CountMin => {
            let cfg = round.init.heavy.expect("COUNTMIN_OP round needs sketch parameters");
            let seed = round.init.hash_seed.expect("COUNTMIN_OP round needs a hash seed");
            let mut pks = Vec::with_capacity(n);
            let mut indicators = Vec::with_capacity(n);
            for _ in 0..n {
                pks.push(net::read_pk(client_sock).await?);
                let bits = net::read_bit_vec(client_sock).await?;
                indicators.push(bits.iter().map(|b| b.as_bool()).collect::<Vec<_>>());
            }
            let valid = dedupe(&pks);
            check_round_valid(round, &valid)?;
            exchange_presence(is_first, &mut peer, &pks).await?;

            let my_counts = if is_first {
                protocol_server::drive_bucket_counts_as_sender(&mut peer, &indicators, &valid, &mut rng).await?
            } else {
                protocol_server::drive_bucket_counts_as_receiver(&mut peer, &indicators, &mut rng).await?
            };
            let counts = combine_u64_vec(&mut peer, &my_counts, is_first).await?;
            let family = prio_aggregate::heavy::HashFamily::new(seed, cfg.d, cfg.w);
            let sketch = prio_aggregate::heavy::CountMin::from_counts(family, counts);
            info!(d = cfg.d, w = cfg.w, estimate_of_0 = sketch.estimate(0), "COUNTMIN_OP sketch ready");
        }
        StatTag::Heavy => {
            let cfg = round.init.heavy.expect("HEAVY_OP round needs sketch parameters");
            let seed = round.init.hash_seed.expect("HEAVY_OP round needs a hash seed");
            let num_bits = round.init.num_bits;
            let mut pks = Vec::with_capacity(n);
            let mut indicators = Vec::with_capacity(n);
            for _ in 0..n {
                pks.push(net::read_pk(client_sock).await?);
                let bits = net::read_bit_vec(client_sock).await?;
                indicators.push(bits.iter().map(|b| b.as_bool()).collect::<Vec<_>>());
            }
            let valid = dedupe(&pks);
            check_round_valid(round, &valid)?;
            exchange_presence(is_first, &mut peer, &pks).await?;

            let my_counts = if is_first {
                protocol_server::drive_bucket_counts_as_sender(&mut peer, &indicators, &valid, &mut rng).await?
            } else {
                protocol_server::drive_bucket_counts_as_receiver(&mut peer, &indicators, &mut rng).await?
            };
            let counts = combine_u64_vec(&mut peer, &my_counts, is_first).await?;

            let levels = prio_aggregate::heavy::prefix_levels(num_bits, &cfg);
            let level_width = cfg.d * cfg.w;
            let mut level_counts = Vec::with_capacity(levels as usize);
            for level in 0..levels as usize {
                level_counts.push(counts[level * level_width..(level + 1) * level_width].to_vec());
            }
            let tail_counts = counts[levels as usize * level_width..].to_vec();
            let n_valid = valid.iter().filter(|&&ok| ok).count() as u64;

            let hitters = prio_aggregate::heavy::recover_heavy_hitters(
                seed,
                &cfg,
                num_bits,
                &level_counts,
                &tail_counts,
                n_valid,
            );
            info!(?hitters, "HEAVY_OP complete");
        }
        StatTag::NoneOp => {
            info!("round carried no statistic tag; nothing to do");
        }
    }

    Ok(())
}
