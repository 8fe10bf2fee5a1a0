use crate::Error;
use commonware_runtime::Metrics;
use futures::channel::oneshot;
use prometheus_client::metrics::counter::Counter;
use std::future::Future;
use supplysign_ledger::{
    AuthorizedSigners, Bookkeeper, Header, HeaderStore, KeyId, PublicKey, Signature,
    MAX_BOOKKEEPERS, NAMESPACE,
};
use tracing::{debug, info, warn};

/// Progress made at a single height.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Progress {
    /// Height of the processed header.
    pub height: u32,

    /// Signatures appended to the header.
    pub added: usize,

    /// Authorized bookkeepers that still have not signed the header.
    pub missing: usize,
}

/// Observes the progress of an [Engine].
pub trait Reporter: Send {
    /// Called after each header is processed (and, if modified, persisted).
    fn report(&mut self, progress: Progress) -> impl Future<Output = ()> + Send;
}

impl Reporter for () {
    async fn report(&mut self, _: Progress) {}
}

/// Outcome of a completed [Engine::run].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    /// Heights visited.
    pub processed: u32,

    /// Headers that gained at least one signature.
    pub modified: u32,

    /// Signatures appended across all headers.
    pub signatures: usize,

    /// Last height written to the store during the run.
    pub last_written: Option<u32>,
}

/// Signatures produced for a single header that have not been applied yet.
#[derive(Default)]
pub struct Pending {
    bookkeepers: Vec<PublicKey>,
    signatures: Vec<Signature>,
}

impl Pending {
    pub fn len(&self) -> usize {
        self.bookkeepers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookkeepers.is_empty()
    }

    fn push(&mut self, bookkeeper: PublicKey, signature: Signature) {
        self.bookkeepers.push(bookkeeper);
        self.signatures.push(signature);
    }

    /// Append the pending entries after the header's existing ones.
    fn apply(self, header: &mut Header) {
        header.bookkeepers.extend(self.bookkeepers);
        header.signatures.extend(self.signatures);
    }
}

/// Sign `header` with every identity whose key is not yet among its bookkeepers.
///
/// New entries are appended in `identities` order (an identity repeated in `identities` signs
/// once). If any identity fails to sign, or the header would carry more than
/// [MAX_BOOKKEEPERS] signers, `header` is left untouched. Returns the number of signatures
/// appended.
pub fn reconcile<B: Bookkeeper>(header: &mut Header, identities: &[B]) -> Result<usize, Error> {
    let mut signed = header.signers();
    let mut missing = Vec::new();
    for identity in identities {
        let key = identity.public_key();
        let id = KeyId::from(&key);
        if signed.insert(id.clone()) {
            missing.push((identity, key, id));
        }
    }
    let count = header.bookkeepers.len() + missing.len();
    if !missing.is_empty() && count > MAX_BOOKKEEPERS {
        return Err(Error::TooManyBookkeepers {
            height: header.height,
            count,
            max: MAX_BOOKKEEPERS,
        });
    }

    let digest = header.digest();
    let mut pending = Pending::default();
    for (identity, key, id) in missing {
        let signature =
            identity
                .sign(NAMESPACE, digest.as_ref())
                .map_err(|err| Error::Signing {
                    height: header.height,
                    identity: id,
                    source: Box::new(err),
                })?;
        pending.push(key, signature);
    }
    let added = pending.len();
    pending.apply(header);
    Ok(added)
}

/// Configuration for the [Engine].
pub struct Config<B: Bookkeeper, R: Reporter> {
    /// Local identities, in the order their signatures are appended.
    pub identities: Vec<B>,

    /// Network-wide bookkeeper set.
    ///
    /// Used to report which bookkeepers are still missing from each header. Local identities are
    /// not filtered against it.
    pub authorized: AuthorizedSigners,

    /// Receives [Progress] after every height.
    pub reporter: R,

    /// Requests a stop, honored only between heights.
    pub halt: Option<oneshot::Receiver<()>>,
}

/// Walks every committed header below the tip and co-signs it with the local identities.
pub struct Engine<S: HeaderStore, B: Bookkeeper, R: Reporter> {
    store: S,

    identities: Vec<B>,
    authorized: AuthorizedSigners,
    reporter: R,
    halt: Option<oneshot::Receiver<()>>,

    heights_processed: Counter,
    headers_modified: Counter,
    signatures_added: Counter,
}

impl<S: HeaderStore, B: Bookkeeper, R: Reporter> Engine<S, B, R> {
    /// Create an engine that registers its metrics on `context`.
    pub fn new(context: impl Metrics, store: S, cfg: Config<B, R>) -> Self {
        let heights_processed = Counter::default();
        let headers_modified = Counter::default();
        let signatures_added = Counter::default();
        context.register(
            "heights_processed",
            "Number of heights processed",
            heights_processed.clone(),
        );
        context.register(
            "headers_modified",
            "Number of headers that gained signatures",
            headers_modified.clone(),
        );
        context.register(
            "signatures_added",
            "Number of signatures appended to headers",
            signatures_added.clone(),
        );

        Self {
            store,
            identities: cfg.identities,
            authorized: cfg.authorized,
            reporter: cfg.reporter,
            halt: cfg.halt,
            heights_processed,
            headers_modified,
            signatures_added,
        }
    }

    /// Returns whether a stop was requested.
    fn halted(&mut self) -> bool {
        let Some(halt) = &mut self.halt else {
            return false;
        };
        match halt.try_recv() {
            Ok(Some(())) => true,
            Ok(None) => false,
            Err(_) => {
                // Sender dropped without requesting a stop
                self.halt = None;
                false
            }
        }
    }

    /// Co-sign every header from genesis up to (but excluding) the current tip.
    ///
    /// Any error is fatal: heights before the failing one remain persisted and nothing at or
    /// after it is modified. Re-running after a failure is safe, as already present identities
    /// are skipped.
    pub async fn run(&mut self) -> Result<Summary, Error> {
        for identity in &self.identities {
            let key = identity.public_key();
            if !self.authorized.contains(&key) {
                warn!(
                    key = %KeyId::from(&key),
                    "local identity is not an authorized bookkeeper"
                );
            }
        }

        let tip = self.store.current_height();
        info!(
            tip,
            identities = self.identities.len(),
            "reconciling headers"
        );
        let mut summary = Summary::default();
        for height in 0..tip {
            if self.halted() {
                info!(height, "halt requested");
                return Err(Error::Halted { height });
            }

            // Fetch
            let mut header = match self.store.get(height).await {
                Ok(Some(header)) if header.height == height => header,
                Ok(_) => return Err(Error::HeaderFetch { height, source: None }),
                Err(err) => {
                    return Err(Error::HeaderFetch {
                        height,
                        source: Some(err),
                    })
                }
            };

            // Sign and persist
            let added = reconcile(&mut header, &self.identities)?;
            if added > 0 {
                self.store
                    .append(vec![header.clone()])
                    .await
                    .map_err(|source| Error::Persist {
                        height,
                        last_written: summary.last_written,
                        source,
                    })?;
                summary.modified += 1;
                summary.signatures += added;
                summary.last_written = Some(height);
                self.headers_modified.inc();
                self.signatures_added.inc_by(added as u64);
                info!(height, added, "co-signed header");
            } else {
                debug!(height, "header already signed by all identities");
            }
            summary.processed += 1;
            self.heights_processed.inc();

            let missing = self.authorized.missing(&header.signers());
            self.reporter
                .report(Progress {
                    height,
                    added,
                    missing,
                })
                .await;
        }
        info!(
            processed = summary.processed,
            modified = summary.modified,
            signatures = summary.signatures,
            "reconciliation complete"
        );
        Ok(summary)
    }

    /// Release the engine, returning its store.
    pub fn into_store(self) -> S {
        self.store
    }
}
