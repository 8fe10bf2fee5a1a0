//! Block headers, bookkeeper sets, and the store that persists them.
//!
//! Every committed [Header] carries a list of bookkeeper public keys and an index-aligned list of
//! signatures over the header's signable hash ([Header::digest]). This crate defines that data
//! model, the [Bookkeeper] interface used to produce new signatures, and the [HeaderStore]
//! interface through which re-signed headers are written back.
//!
//! # Canonical Keys
//!
//! Set membership is always decided on [KeyId], the canonical identifier of a public key. The
//! same function is used for the authorized bookkeeper set and for the signers already present in
//! a header, so both sides can never disagree about key encodings.
//!
//! # Persistence
//!
//! [Ledger] persists headers on any [commonware_runtime::Storage]. Each height is stored in two
//! slots so that replacing a header never leaves the height unreadable (see [disk] for the
//! format). [mocks::Store] provides the same append semantics in memory, with injectable
//! failures.

use commonware_codec::Encode;
use commonware_cryptography::ed25519;
use commonware_utils::hex;
use std::fmt;
use thiserror::Error;

mod authorized;
pub use authorized::AuthorizedSigners;
pub mod genesis;
mod header;
pub use header::{Header, MAX_BOOKKEEPERS, MAX_PAYLOAD};
pub mod disk;
pub use disk::{Config, Ledger};
pub mod mocks;
mod store;
pub use store::{validate, HeaderStore};

/// Namespace under which every header signature is produced and verified.
pub const NAMESPACE: &[u8] = b"_SUPPLYSIGN_HEADER";

/// Public key of a bookkeeper.
pub type PublicKey = ed25519::PublicKey;

/// Signature of a bookkeeper over a header's signable hash.
pub type Signature = ed25519::Signature;

/// Signable hash of a header.
pub type Digest = commonware_cryptography::sha256::Digest;

/// Canonical identifier of a [PublicKey].
///
/// Derived from the key's canonical encoding (hex), never from whatever bytes the key
/// happened to be supplied as.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyId(String);

impl From<&PublicKey> for KeyId {
    fn from(key: &PublicKey) -> Self {
        Self(hex(&key.encode()))
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An identity able to co-sign headers.
pub trait Bookkeeper {
    /// Error returned when a signature cannot be produced.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the [PublicKey] appended next to any signature this identity produces.
    fn public_key(&self) -> PublicKey;

    /// Sign `message` under `namespace`.
    fn sign(&self, namespace: &[u8], message: &[u8]) -> Result<Signature, Self::Error>;
}

/// Errors that can occur when interacting with headers and the [HeaderStore].
#[derive(Debug, Error)]
pub enum Error {
    #[error("runtime error: {0}")]
    Runtime(#[from] commonware_runtime::Error),
    #[error("codec error: {0}")]
    Codec(#[from] commonware_codec::Error),
    #[error("invalid blob name: {0}")]
    InvalidBlobName(String),
    #[error("header {0} is corrupt")]
    Corrupt(u32),
    #[error("missing header at height {0}")]
    MissingHeight(u32),
    #[error("header {height} does not extend tip {tip:?}")]
    Gap { height: u32, tip: Option<u32> },
    #[error("header {0} does not reference its parent")]
    ParentMismatch(u32),
    #[error("header {0} changes block content")]
    ContentMismatch(u32),
    #[error("header {0} drops existing signatures")]
    SignaturesRemoved(u32),
    #[error("header {height} has {bookkeepers} bookkeepers but {signatures} signatures")]
    LengthMismatch {
        height: u32,
        bookkeepers: usize,
        signatures: usize,
    },
    #[error("header {height} has {count} bookkeepers (at most {max} allowed)")]
    TooManyBookkeepers { height: u32, count: usize, max: usize },
    #[error("header {height} repeats bookkeeper {key}")]
    DuplicateBookkeeper { height: u32, key: KeyId },
    #[error("header {height} has an invalid signature at index {index}")]
    InvalidSignature { height: u32, index: usize },
    #[error("stored genesis does not match configured genesis")]
    GenesisMismatch,
    #[error("invalid config: {0}")]
    Config(String),
    #[error("store unavailable at height {0}")]
    Unavailable(u32),
}
