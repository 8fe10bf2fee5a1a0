use crate::{Error, Header};
use std::future::Future;

/// Interface to a sequence of committed headers, dense from height 0.
///
/// Headers are written through a single append path: a header at a new height extends the
/// chain, while a header at an existing height replaces the stored one (see [validate] for what
/// a replacement may change).
pub trait HeaderStore: Send {
    /// Height of the newest stored header (0 if only genesis, or nothing, is stored).
    fn current_height(&self) -> u32;

    /// Fetch the header stored at `height`, if any.
    fn get(&self, height: u32) -> impl Future<Output = Result<Option<Header>, Error>> + Send;

    /// Persist `headers` in order.
    ///
    /// Each header is durable once its own write completes. If an error is returned, headers
    /// before the failing one remain persisted.
    fn append(&mut self, headers: Vec<Header>) -> impl Future<Output = Result<(), Error>> + Send;

    /// Flush and release the store.
    fn close(self) -> impl Future<Output = Result<(), Error>> + Send;
}

/// Check that `header` may be written given the currently stored state.
///
/// * `tip` is the newest stored height (or `None` if the store is empty).
/// * `existing` is the header currently stored at `header.height` (if any).
/// * `parent` is the header stored at `header.height - 1` (if any).
///
/// A replacement must leave block content untouched (same [Header::digest]) and keep every
/// existing bookkeeper and signature at its index. A new header must extend the tip and
/// reference it as parent. Every written header must pass [Header::check].
pub fn validate(
    tip: Option<u32>,
    existing: Option<&Header>,
    parent: Option<&Header>,
    header: &Header,
) -> Result<(), Error> {
    let height = header.height;
    match tip {
        Some(tip) if height <= tip => {
            let existing = existing.ok_or(Error::MissingHeight(height))?;
            if existing.digest() != header.digest() {
                return Err(Error::ContentMismatch(height));
            }
            if !header.bookkeepers.starts_with(&existing.bookkeepers)
                || !header.signatures.starts_with(&existing.signatures)
            {
                return Err(Error::SignaturesRemoved(height));
            }
        }
        Some(tip) if tip.checked_add(1) == Some(height) => {
            let parent = parent.ok_or(Error::MissingHeight(tip))?;
            if header.parent != parent.digest() {
                return Err(Error::ParentMismatch(height));
            }
        }
        None if height == 0 => {}
        _ => return Err(Error::Gap { height, tip }),
    }
    header.check()
}
