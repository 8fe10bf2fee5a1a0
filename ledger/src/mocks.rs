//! In-memory [HeaderStore] for testing.

use crate::{validate, Error, Header, HeaderStore};
use std::collections::{BTreeMap, HashSet};

/// A [HeaderStore] backed by a map, with hooks to inject failures.
#[derive(Clone, Debug, Default)]
pub struct Store {
    headers: BTreeMap<u32, Header>,
    unavailable: HashSet<u32>,
    failing: HashSet<u32>,

    /// Number of calls to [HeaderStore::append].
    pub append_calls: usize,
}

impl Store {
    /// Create a store holding `headers`, which are inserted without validation.
    pub fn new(headers: impl IntoIterator<Item = Header>) -> Self {
        Self {
            headers: headers.into_iter().map(|h| (h.height, h)).collect(),
            ..Default::default()
        }
    }

    /// Make reads of `height` fail.
    pub fn fail_get(&mut self, height: u32) {
        self.unavailable.insert(height);
    }

    /// Make writes of `height` fail.
    pub fn fail_append(&mut self, height: u32) {
        self.failing.insert(height);
    }

    /// Drop the header at `height` without moving the tip (leaving a hole).
    pub fn remove(&mut self, height: u32) -> Option<Header> {
        self.headers.remove(&height)
    }

    /// Returns a copy of all stored headers in height order.
    pub fn headers(&self) -> Vec<Header> {
        self.headers.values().cloned().collect()
    }

    fn tip(&self) -> Option<u32> {
        self.headers.keys().next_back().copied()
    }
}

impl HeaderStore for Store {
    fn current_height(&self) -> u32 {
        self.tip().unwrap_or(0)
    }

    async fn get(&self, height: u32) -> Result<Option<Header>, Error> {
        if self.unavailable.contains(&height) {
            return Err(Error::Unavailable(height));
        }
        Ok(self.headers.get(&height).cloned())
    }

    async fn append(&mut self, headers: Vec<Header>) -> Result<(), Error> {
        self.append_calls += 1;
        for header in headers {
            let height = header.height;
            if self.failing.contains(&height) {
                return Err(Error::Unavailable(height));
            }
            let parent = height
                .checked_sub(1)
                .and_then(|parent| self.headers.get(&parent));
            validate(self.tip(), self.headers.get(&height), parent, &header)?;
            self.headers.insert(height, header);
        }
        Ok(())
    }

    async fn close(self) -> Result<(), Error> {
        Ok(())
    }
}
