//! Chain configuration and the genesis header derived from it.
//!
//! The chain configuration names the network (which selects the storage partition) and lists the
//! authorized bookkeepers. The genesis header commits to that list through `next_bookkeeper`, so
//! opening a [crate::Ledger] with a configuration that disagrees with the stored chain fails.
//!
//! # Format
//!
//! ```json
//! {
//!     "network": "testnet",
//!     "timestamp": 1530316800,
//!     "bookkeepers": ["1f3c...", "0x8a91..."]
//! }
//! ```

use crate::{AuthorizedSigners, Digest, Error, Header};
use bytes::Bytes;
use serde::Deserialize;
use std::path::Path;

/// Chain configuration loaded from disk.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// Name of the network. Must only contain ASCII alphanumerics, `-`, or `_`.
    pub network: String,

    /// Timestamp recorded in the genesis header.
    #[serde(default)]
    pub timestamp: u32,

    /// Hex-encoded public keys of the authorized bookkeepers, in order.
    pub bookkeepers: Vec<String>,
}

impl Config {
    /// Read and parse the configuration at `path`.
    pub fn read(path: &Path) -> Result<Self, Error> {
        let data = std::fs::read(path)
            .map_err(|err| Error::Config(format!("cannot read {}: {err}", path.display())))?;
        Self::parse(&data)
    }

    /// Parse a configuration from JSON.
    pub fn parse(data: &[u8]) -> Result<Self, Error> {
        let cfg: Self = serde_json::from_slice(data)
            .map_err(|err| Error::Config(format!("malformed chain config: {err}")))?;
        let valid = !cfg.network.is_empty()
            && cfg
                .network
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(Error::Config(format!(
                "invalid network name: {:?}",
                cfg.network
            )));
        }
        Ok(cfg)
    }

    /// Returns the authorized bookkeepers listed in the configuration.
    pub fn authorized(&self) -> Result<AuthorizedSigners, Error> {
        AuthorizedSigners::from_hex(&self.bookkeepers)
    }

    /// Returns the storage partition holding this network's headers.
    pub fn partition(&self) -> String {
        format!("headers_{}", self.network)
    }
}

/// Build the genesis header for `authorized`.
///
/// The header is unsigned: genesis endorsements are added the same way as any other height.
pub fn header(authorized: &AuthorizedSigners, timestamp: u32) -> Header {
    let empty = Digest::from([0u8; 32]);
    Header {
        version: 0,
        parent: empty,
        transactions_root: empty,
        block_root: empty,
        timestamp,
        height: 0,
        consensus_data: 0,
        consensus_payload: Bytes::new(),
        next_bookkeeper: authorized.digest(),
        bookkeepers: Vec::new(),
        signatures: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commonware_codec::Encode;
    use commonware_cryptography::{ed25519::PrivateKey, PrivateKeyExt as _, Signer as _};
    use commonware_utils::hex;

    fn config(network: &str, seeds: &[u64]) -> String {
        let keys = seeds
            .iter()
            .map(|seed| format!("\"{}\"", hex(&PrivateKey::from_seed(*seed).public_key().encode())))
            .collect::<Vec<_>>()
            .join(",");
        format!("{{\"network\":\"{network}\",\"timestamp\":42,\"bookkeepers\":[{keys}]}}")
    }

    #[test]
    fn test_parse() {
        let cfg = Config::parse(config("testnet", &[1, 2]).as_bytes()).unwrap();
        assert_eq!(cfg.partition(), "headers_testnet");
        assert_eq!(cfg.timestamp, 42);
        let authorized = cfg.authorized().unwrap();
        assert_eq!(authorized.len(), 2);
        assert!(authorized.contains(&PrivateKey::from_seed(2).public_key()));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(Config::parse(b"{"), Err(Error::Config(_))));
        assert!(matches!(
            Config::parse(config("main/net", &[1]).as_bytes()),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::parse(config("", &[1]).as_bytes()),
            Err(Error::Config(_))
        ));

        // Parsing succeeds but the bookkeeper list is unusable
        let cfg = Config::parse(config("testnet", &[]).as_bytes()).unwrap();
        assert!(matches!(cfg.authorized(), Err(Error::Config(_))));
    }

    #[test]
    fn test_genesis_commits_to_bookkeepers() {
        let a = AuthorizedSigners::new(vec![PrivateKey::from_seed(1).public_key()]).unwrap();
        let b = AuthorizedSigners::new(vec![PrivateKey::from_seed(2).public_key()]).unwrap();
        let genesis = header(&a, 7);
        assert_eq!(genesis.height, 0);
        assert_eq!(genesis.next_bookkeeper, a.digest());
        assert_ne!(genesis.digest(), header(&b, 7).digest());
        assert!(genesis.check().is_ok());
    }
}
