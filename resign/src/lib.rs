//! Retroactively co-sign committed block headers with local bookkeeper keys.
//!
//! Every header below the current tip carries a list of bookkeepers and their signatures over
//! the header's signable hash. [Engine] walks those headers in height order and, for each one,
//! appends a signature from every local identity that has not signed it yet ([reconcile]). A
//! modified header is written back through the store's append path before the next height is
//! visited.
//!
//! # Safety
//!
//! * Existing bookkeepers and signatures are never reordered or removed.
//! * A header is either fully co-signed by every missing identity or left untouched.
//! * The tip is never modified (it may still be collecting signatures from consensus).
//! * Every error aborts the run. Because present identities are skipped, a run can always be
//!   repeated from genesis.
//!
//! # Authorization
//!
//! Local identities are not checked against the authorized bookkeeper set: any loaded identity
//! signs. Identities outside the set are logged when the run starts.

use std::path::PathBuf;
use supplysign_ledger::KeyId;
use thiserror::Error;

mod engine;
pub use engine::{reconcile, Config, Engine, Pending, Progress, Reporter, Summary};
mod lock;
pub use lock::Lock;

/// Errors that can occur when co-signing headers.
#[derive(Debug, Error)]
pub enum Error {
    #[error("keyring error: {0}")]
    Keyring(#[from] supplysign_keyring::Error),
    #[error("invalid config: {0}")]
    Config(String),
    #[error("cannot fetch header {height}")]
    HeaderFetch {
        height: u32,
        #[source]
        source: Option<supplysign_ledger::Error>,
    },
    #[error("identity {identity} failed to sign header {height}: {source}")]
    Signing {
        height: u32,
        identity: KeyId,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("header {height} would carry {count} signers (at most {max})")]
    TooManyBookkeepers {
        height: u32,
        count: usize,
        max: usize,
    },
    #[error("cannot persist header {height} (last written: {last_written:?}): {source}")]
    Persist {
        height: u32,
        last_written: Option<u32>,
        #[source]
        source: supplysign_ledger::Error,
    },
    #[error("store error: {0}")]
    Store(#[source] supplysign_ledger::Error),
    #[error("cannot lock {}: {source}", .path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("halted before header {height}")]
    Halted { height: u32 },
}

/// A [Reporter] that logs every [Progress].
#[derive(Clone, Copy, Debug, Default)]
pub struct Logger;

impl Reporter for Logger {
    async fn report(&mut self, progress: Progress) {
        tracing::info!(
            height = progress.height,
            added = progress.added,
            missing = progress.missing,
            "processed header"
        );
    }
}
