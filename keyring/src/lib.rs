//! Load the local bookkeeper identities used to co-sign headers.
//!
//! A signer configuration ([Locations]) lists wallet files. Each wallet holds encrypted accounts,
//! one of which is marked as default. [load] opens every configured wallet in order, unlocks its
//! default account with a secret from a [SecretSource], and returns the resulting
//! [SignerIdentity]s.
//!
//! Loading is all-or-nothing: if any wallet cannot be opened or unlocked, no identity is returned
//! (and every key decrypted so far is dropped).

use std::{collections::HashSet, path::PathBuf};
use thiserror::Error;
use tracing::{info, warn};

mod config;
pub use config::Locations;
mod identity;
pub use identity::{InvalidSignature, SignerIdentity};
pub mod secret;
pub use secret::SecretSource;
pub mod wallet;
pub use wallet::{Account, Kdf, Wallet};

/// Errors that can occur when loading identities.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid signer config: {0}")]
    Config(String),
    #[error("cannot open wallet {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        source: wallet::Error,
    },
    #[error("no secret for wallet {}: {source}", .path.display())]
    Secret {
        path: PathBuf,
        source: secret::Error,
    },
    #[error("wallet {} has no default account", .path.display())]
    MissingDefault { path: PathBuf },
    #[error("cannot decrypt wallet {}: {source}", .path.display())]
    Decrypt {
        path: PathBuf,
        source: wallet::Error,
    },
    #[error("wallet {} holds a key that does not match its public key", .path.display())]
    KeyMismatch { path: PathBuf },
}

/// Load the default identity of every wallet in `locations`, in configured order.
///
/// Identities repeated across wallets are kept (and logged).
pub fn load<S: SecretSource>(
    locations: &Locations,
    secrets: &mut S,
) -> Result<Vec<SignerIdentity>, Error> {
    let mut identities = Vec::with_capacity(locations.len());
    let mut seen = HashSet::with_capacity(locations.len());
    for path in locations.iter() {
        let wallet = Wallet::open(path).map_err(|source| Error::Open {
            path: path.clone(),
            source,
        })?;
        let account = wallet
            .default_account()
            .ok_or_else(|| Error::MissingDefault { path: path.clone() })?;
        let secret = secrets.secret(path).map_err(|source| Error::Secret {
            path: path.clone(),
            source,
        })?;
        let key = account.decrypt(&secret).map_err(|source| match source {
            wallet::Error::KeyMismatch => Error::KeyMismatch { path: path.clone() },
            source => Error::Decrypt {
                path: path.clone(),
                source,
            },
        })?;

        let identity = SignerIdentity::new(key, account.label.clone(), path.clone());
        let id = identity.id();
        if !seen.insert(id.clone()) {
            warn!(path = %path.display(), key = %id, "identity loaded from multiple wallets");
        }
        info!(path = %path.display(), key = %id, label = %account.label, "loaded identity");
        identities.push(identity);
    }
    Ok(identities)
}
