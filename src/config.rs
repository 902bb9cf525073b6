//! Operator-facing configuration (`spec.md` §9's "resolved as configuration
//! rather than compile-time constants" note): peer address, listening
//! ports, and round policy, loaded the way the teacher loads its network
//! config — a TOML file via the `config` crate, layered with environment
//! overrides and CLI flags from `clap`.

use std::{net::SocketAddr, path::Path};

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("invalid socket address {0:?}: {1}")]
    BadAddr(String, std::net::AddrParseError),
}

/// This server's full configuration: which peer to talk to, which ports to
/// listen on, and the default round policy applied when a client's
/// `InitMessage` doesn't override it.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Which of the two servers this process is (0 or 1), matching
    /// `spec.md` §4.3's `is_first` role split.
    pub server_index: u8,

    /// Address of the other server, used for the SNIP/aggregation peer
    /// connection.
    pub peer_addr: String,

    /// Port this server listens on for client submissions.
    #[serde(default = "default_client_port")]
    pub client_port: u16,

    /// Port used for the dedicated OT side-connection (`spec.md` §4.4/§5).
    #[serde(default = "default_ot_port")]
    pub ot_port: u16,

    /// Fraction of submissions that must validate for a round to publish a
    /// result (`spec.md` §9 Open Question, resolved here as policy).
    #[serde(default = "default_invalid_threshold")]
    pub invalid_threshold: f64,
}

fn default_client_port() -> u16 {
    7000
}

fn default_ot_port() -> u16 {
    60051
}

fn default_invalid_threshold() -> f64 {
    0.5
}

impl ServerConfig {
    /// Loads configuration from a TOML file, allowing `PRIO_` prefixed
    /// environment variables to override individual fields, the same
    /// layering the teacher's `config` crate usage follows.
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let raw = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .add_source(::config::Environment::with_prefix("PRIO"))
            .build()?;
        Ok(raw.try_deserialize()?)
    }

    pub fn peer_socket_addr(&self) -> Result<SocketAddr, Error> {
        self.peer_addr
            .parse()
            .map_err(|e| Error::BadAddr(self.peer_addr.clone(), e))
    }

    pub fn is_first(&self) -> bool {
        self.server_index == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_minimal_config_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "server_index = 0\npeer_addr = \"127.0.0.1:7001\"").unwrap();
        let cfg = ServerConfig::from_file(file.path()).unwrap();
        assert_eq!(cfg.client_port, 7000);
        assert_eq!(cfg.ot_port, 60051);
        assert!((cfg.invalid_threshold - 0.5).abs() < 1e-9);
        assert!(cfg.is_first());
    }

    #[test]
    fn overrides_defaults_when_present() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "server_index = 1\npeer_addr = \"127.0.0.1:7001\"\nclient_port = 8000\ninvalid_threshold = 0.8"
        )
        .unwrap();
        let cfg = ServerConfig::from_file(file.path()).unwrap();
        assert_eq!(cfg.client_port, 8000);
        assert!((cfg.invalid_threshold - 0.8).abs() < 1e-9);
        assert!(!cfg.is_first());
    }
}
