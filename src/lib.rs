//! Two-server secure aggregation (`spec.md` §1): clients secret-share a
//! submission across two non-colluding servers, which jointly verify each
//! submission's SNIP proof (where applicable) and combine the valid shares
//! into a single aggregate statistic, without either server ever seeing a
//! plaintext submission.

pub mod circuit;
pub mod config;
pub mod error;
pub mod ff;
pub mod heavy;
pub mod net;
pub mod ot;
pub mod pk;
pub mod protocol;
pub mod shares;
pub mod snip;
pub mod triples;

pub use error::{Error, Result};
