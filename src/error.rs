use thiserror::Error;

use crate::{config, ff, net, protocol, snip};

/// Top-level error surface returned by the `server`/`client` binaries.
///
/// A malformed *individual* submission never reaches this type: the
/// per-`pk` ingest map in `bin/server.rs` just drops it from the round's
/// valid set. This type is for round- and process-level failures: bad
/// configuration, a peer disconnecting, a field modulus too small for the
/// round's parameters, or too many invalid submissions to proceed.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] config::Error),

    #[error(transparent)]
    Net(#[from] net::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Protocol(#[from] protocol::Error),

    #[error(transparent)]
    Snip(#[from] snip::Error),

    #[error(transparent)]
    Field(#[from] ff::Error),

    #[error("round aborted: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, Error>;
