//! A [HeaderStore] persisted on [commonware_runtime::Storage].
//!
//! # Format
//!
//! Each height owns two blobs in the configured partition, named by the height (big-endian `u32`)
//! followed by a slot byte (`0` or `1`). A blob holds a single record:
//!
//! ```text
//! +---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+
//! |   Length (u32)  |      Version (u64)      |  Header  ...  |   CRC32 (u32)   |
//! +---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+
//!
//! Length = size of Version + Header
//! CRC32 = checksum over Length, Version, and Header
//! ```
//!
//! Any bytes after the checksum are ignored, so a slot never needs to be shrunk when a shorter
//! record overwrites a longer one.
//!
//! # Atomic Replacement
//!
//! A header at an existing height is written to the slot that does not hold the newest version
//! and synced before it is considered authoritative. If the write is torn, the checksum of that
//! slot fails on the next read and the other slot (the previous version) is used instead. A torn
//! write at a new height leaves no valid record and is discarded when the [Ledger] is initialized.

use crate::{validate, Error, Header, HeaderStore};
use bytes::BufMut;
use commonware_codec::{DecodeExt, EncodeSize, FixedSize, Write};
use commonware_runtime::{Blob, Error as RError, Metrics, Storage};
use commonware_utils::hex;
use prometheus_client::metrics::{counter::Counter, gauge::Gauge};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Number of slots kept per height.
const SLOTS: u8 = 2;

/// Size of the length prefix and trailing checksum of a record.
const FRAME_SIZE: usize = u32::SIZE * 2;

/// Configuration for [Ledger] storage.
#[derive(Clone)]
pub struct Config {
    /// The [commonware_runtime::Storage] partition to use for storing headers.
    pub partition: String,

    /// Header written at height 0 when the partition is empty (and compared against the stored
    /// one otherwise).
    pub genesis: Header,
}

/// The newest valid record stored for a height.
struct Record {
    slot: u8,
    version: u64,
    header: Header,
}

/// Headers persisted in a [commonware_runtime::Storage] partition.
pub struct Ledger<E: Storage + Metrics> {
    context: E,
    partition: String,

    // Heights 0..=tip are stored, each with at least one valid record.
    tip: Option<u32>,

    // Slots that exist in the partition (opening a missing one would create it).
    blobs: BTreeSet<(u32, u8)>,

    headers: Gauge,
    appends: Counter,
    replacements: Counter,
}

fn blob_name(height: u32, slot: u8) -> [u8; 5] {
    let mut name = [0u8; 5];
    name[..4].copy_from_slice(&height.to_be_bytes());
    name[4] = slot;
    name
}

impl<E: Storage + Metrics> Ledger<E> {
    /// Initialize a [Ledger] from the given partition.
    ///
    /// Stored heights must be dense from 0. An incomplete append at the tip (no valid record) is
    /// discarded. If the partition is empty, `cfg.genesis` is written at height 0; otherwise the
    /// stored genesis must match it.
    pub async fn init(context: E, cfg: Config) -> Result<Self, Error> {
        // Collect stored heights
        let names = match context.scan(&cfg.partition).await {
            Ok(names) => names,
            Err(RError::PartitionMissing(_)) => Vec::new(),
            Err(err) => return Err(Error::Runtime(err)),
        };
        let mut blobs = BTreeSet::new();
        for name in names {
            let raw: [u8; 5] = match name.as_slice().try_into() {
                Ok(raw) => raw,
                Err(_) => return Err(Error::InvalidBlobName(hex(&name))),
            };
            if raw[4] >= SLOTS {
                return Err(Error::InvalidBlobName(hex(&name)));
            }
            blobs.insert((u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]), raw[4]));
        }
        let heights: BTreeSet<u32> = blobs.iter().map(|(height, _)| *height).collect();
        for (expected, height) in (0u32..).zip(heights.iter()) {
            if *height != expected {
                return Err(Error::MissingHeight(expected));
            }
        }
        let tip = heights.last().copied();
        debug!(partition = cfg.partition, ?tip, "scanned headers");

        // Initialize metrics
        let headers = Gauge::default();
        let appends = Counter::default();
        let replacements = Counter::default();
        context.register("headers", "Number of stored headers", headers.clone());
        context.register(
            "appends",
            "Number of headers written at a new height",
            appends.clone(),
        );
        context.register(
            "replacements",
            "Number of headers written over an existing height",
            replacements.clone(),
        );

        let mut ledger = Self {
            context,
            partition: cfg.partition,
            tip,
            blobs,
            headers,
            appends,
            replacements,
        };

        // Discard an append that never completed
        if let Some(tip) = ledger.tip {
            if ledger.newest(tip).await?.is_none() {
                warn!(height = tip, "tip has no valid record, discarding");
                for slot in 0..SLOTS {
                    ledger
                        .context
                        .remove(&ledger.partition, Some(&blob_name(tip, slot)))
                        .await
                        .or_else(|err| match err {
                            RError::BlobMissing(_, _) => Ok(()),
                            err => Err(err),
                        })?;
                    ledger.blobs.remove(&(tip, slot));
                }
                ledger.tip = tip.checked_sub(1);
            }
        }
        let stored = ledger.tip.map_or(0, |tip| i64::from(tip) + 1);
        ledger.headers.set(stored);

        // Check (or write) genesis
        match ledger.tip {
            Some(_) => {
                let stored = ledger.read(0).await?.ok_or(Error::MissingHeight(0))?;
                if stored.header.digest() != cfg.genesis.digest() {
                    return Err(Error::GenesisMismatch);
                }
            }
            None => {
                debug!("writing genesis");
                ledger.append(vec![cfg.genesis]).await?;
            }
        }
        Ok(ledger)
    }

    /// Read the record in `slot` for `height`, returning `None` if it is empty, torn, or fails
    /// its checksum.
    async fn read_slot(&self, height: u32, slot: u8) -> Result<Option<(u64, Header)>, Error> {
        if !self.blobs.contains(&(height, slot)) {
            return Ok(None);
        }
        let (blob, len) = self
            .context
            .open(&self.partition, &blob_name(height, slot))
            .await?;
        if len < FRAME_SIZE as u64 {
            return Ok(None);
        }

        // Read length prefix
        let prefix = blob.read_at(vec![0u8; u32::SIZE], 0).await?;
        let prefix: &[u8] = prefix.as_ref();
        let mut length = [0u8; u32::SIZE];
        length.copy_from_slice(prefix);
        let length = u32::from_be_bytes(length) as usize;
        let total = FRAME_SIZE + length;
        if (total as u64) > len || length < u64::SIZE {
            debug!(height, slot, length, len, "record truncated");
            return Ok(None);
        }

        // Read record and verify integrity
        let record = blob.read_at(vec![0u8; total], 0).await?;
        let record: &[u8] = record.as_ref();
        let (body, checksum) = record.split_at(total - u32::SIZE);
        let mut stored = [0u8; u32::SIZE];
        stored.copy_from_slice(checksum);
        let stored = u32::from_be_bytes(stored);
        let computed = crc32fast::hash(body);
        if stored != computed {
            warn!(height, slot, stored, computed, "checksum mismatch");
            return Ok(None);
        }

        // Decode version and header
        let (version, header) = body[u32::SIZE..].split_at(u64::SIZE);
        let mut raw = [0u8; u64::SIZE];
        raw.copy_from_slice(version);
        let version = u64::from_be_bytes(raw);
        let header = Header::decode(header)?;
        if header.height != height {
            return Err(Error::Corrupt(height));
        }
        Ok(Some((version, header)))
    }

    /// Returns the newest valid record for `height` (or `None` if neither slot holds one).
    async fn newest(&self, height: u32) -> Result<Option<Record>, Error> {
        let mut newest: Option<Record> = None;
        for slot in 0..SLOTS {
            let Some((version, header)) = self.read_slot(height, slot).await? else {
                continue;
            };
            if newest.as_ref().map_or(true, |record| version > record.version) {
                newest = Some(Record {
                    slot,
                    version,
                    header,
                });
            }
        }
        Ok(newest)
    }

    /// Returns the newest record for a stored `height` (or `None` if `height` is past the tip).
    async fn read(&self, height: u32) -> Result<Option<Record>, Error> {
        match self.tip {
            Some(tip) if height <= tip => self
                .newest(height)
                .await?
                .map(Some)
                .ok_or(Error::Corrupt(height)),
            _ => Ok(None),
        }
    }

    /// Durably write `header`, superseding `previous` (if any).
    async fn write(&mut self, header: &Header, previous: Option<&Record>) -> Result<(), Error> {
        let (slot, version) = match previous {
            Some(record) => ((record.slot + 1) % SLOTS, record.version + 1),
            None => (0, 0),
        };
        let length = u64::SIZE + header.encode_size();
        let mut buf = Vec::with_capacity(FRAME_SIZE + length);
        buf.put_u32(length as u32);
        buf.put_u64(version);
        header.write(&mut buf);
        let checksum = crc32fast::hash(&buf);
        buf.put_u32(checksum);

        let (blob, _) = self
            .context
            .open(&self.partition, &blob_name(header.height, slot))
            .await?;
        self.blobs.insert((header.height, slot));
        blob.write_at(buf, 0).await?;
        blob.sync().await?;
        debug!(height = header.height, slot, version, "wrote header");
        Ok(())
    }
}

impl<E: Storage + Metrics> HeaderStore for Ledger<E> {
    fn current_height(&self) -> u32 {
        self.tip.unwrap_or(0)
    }

    async fn get(&self, height: u32) -> Result<Option<Header>, Error> {
        Ok(self.read(height).await?.map(|record| record.header))
    }

    async fn append(&mut self, headers: Vec<Header>) -> Result<(), Error> {
        for header in headers {
            let height = header.height;
            let existing = self.read(height).await?;
            let parent = match (existing.is_none(), height.checked_sub(1)) {
                (true, Some(parent)) => self.read(parent).await?,
                _ => None,
            };
            validate(
                self.tip,
                existing.as_ref().map(|record| &record.header),
                parent.as_ref().map(|record| &record.header),
                &header,
            )?;
            self.write(&header, existing.as_ref()).await?;
            if existing.is_some() {
                self.replacements.inc();
            } else {
                self.tip = Some(height);
                self.headers.inc();
                self.appends.inc();
            }
        }
        Ok(())
    }

    async fn close(self) -> Result<(), Error> {
        // Every write is synced before `append` returns
        Ok(())
    }
}
