use crate::{Digest, Error, KeyId, PublicKey, Signature, NAMESPACE};
use bytes::{Buf, BufMut, Bytes};
use commonware_codec::{EncodeSize, Error as CodecError, FixedSize, Read, ReadExt, Write};
use commonware_cryptography::{Hasher, Sha256, Verifier};
use std::collections::HashSet;

/// Maximum number of bookkeepers (and signatures) a header may carry.
pub const MAX_BOOKKEEPERS: usize = 1024;

/// Maximum size of a header's consensus payload.
pub const MAX_PAYLOAD: usize = 64 * 1024;

/// A committed block header and the bookkeepers that endorsed it.
///
/// `bookkeepers[i]` produced `signatures[i]` over [Header::digest]. Neither list contributes to
/// the digest, so signatures can be added after the block was committed without changing what
/// they sign.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    pub version: u32,
    pub parent: Digest,
    pub transactions_root: Digest,
    pub block_root: Digest,
    pub timestamp: u32,
    pub height: u32,
    pub consensus_data: u64,
    pub consensus_payload: Bytes,
    pub next_bookkeeper: Digest,

    pub bookkeepers: Vec<PublicKey>,
    pub signatures: Vec<Signature>,
}

impl Header {
    fn write_unsigned(&self, buf: &mut impl BufMut) {
        self.version.write(buf);
        self.parent.write(buf);
        self.transactions_root.write(buf);
        self.block_root.write(buf);
        self.timestamp.write(buf);
        self.height.write(buf);
        self.consensus_data.write(buf);
        self.consensus_payload.write(buf);
        self.next_bookkeeper.write(buf);
    }

    fn unsigned_size(&self) -> usize {
        u32::SIZE
            + Digest::SIZE * 3
            + u32::SIZE * 2
            + u64::SIZE
            + self.consensus_payload.encode_size()
            + Digest::SIZE
    }

    /// Returns the signable hash of the header.
    ///
    /// The hash covers every field except `bookkeepers` and `signatures`.
    pub fn digest(&self) -> Digest {
        let mut buf = Vec::with_capacity(self.unsigned_size());
        self.write_unsigned(&mut buf);
        let mut hasher = Sha256::new();
        hasher.update(&buf);
        hasher.finalize()
    }

    /// Returns the canonical identifiers of all bookkeepers that already signed.
    pub fn signers(&self) -> HashSet<KeyId> {
        self.bookkeepers.iter().map(KeyId::from).collect()
    }

    /// Verify the signer metadata of the header.
    ///
    /// Both lists must be the same length (at most [MAX_BOOKKEEPERS]), no bookkeeper may appear
    /// twice, and every signature must verify against its bookkeeper and [Header::digest].
    pub fn check(&self) -> Result<(), Error> {
        if self.bookkeepers.len() > MAX_BOOKKEEPERS || self.signatures.len() > MAX_BOOKKEEPERS {
            return Err(Error::TooManyBookkeepers {
                height: self.height,
                count: self.bookkeepers.len().max(self.signatures.len()),
                max: MAX_BOOKKEEPERS,
            });
        }
        if self.bookkeepers.len() != self.signatures.len() {
            return Err(Error::LengthMismatch {
                height: self.height,
                bookkeepers: self.bookkeepers.len(),
                signatures: self.signatures.len(),
            });
        }
        let digest = self.digest();
        let mut seen = HashSet::with_capacity(self.bookkeepers.len());
        for (index, (key, signature)) in self
            .bookkeepers
            .iter()
            .zip(self.signatures.iter())
            .enumerate()
        {
            let id = KeyId::from(key);
            if !seen.insert(id.clone()) {
                return Err(Error::DuplicateBookkeeper {
                    height: self.height,
                    key: id,
                });
            }
            if !key.verify(Some(NAMESPACE), digest.as_ref(), signature) {
                return Err(Error::InvalidSignature {
                    height: self.height,
                    index,
                });
            }
        }
        Ok(())
    }
}

impl Write for Header {
    fn write(&self, buf: &mut impl BufMut) {
        self.write_unsigned(buf);
        self.bookkeepers.write(buf);
        self.signatures.write(buf);
    }
}

impl Read for Header {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        let version = u32::read(buf)?;
        let parent = Digest::read(buf)?;
        let transactions_root = Digest::read(buf)?;
        let block_root = Digest::read(buf)?;
        let timestamp = u32::read(buf)?;
        let height = u32::read(buf)?;
        let consensus_data = u64::read(buf)?;
        let consensus_payload = Bytes::read_cfg(buf, &(..=MAX_PAYLOAD).into())?;
        let next_bookkeeper = Digest::read(buf)?;
        let bookkeepers = Vec::<PublicKey>::read_cfg(buf, &((..=MAX_BOOKKEEPERS).into(), ()))?;
        let signatures = Vec::<Signature>::read_cfg(buf, &((..=MAX_BOOKKEEPERS).into(), ()))?;
        Ok(Self {
            version,
            parent,
            transactions_root,
            block_root,
            timestamp,
            height,
            consensus_data,
            consensus_payload,
            next_bookkeeper,
            bookkeepers,
            signatures,
        })
    }
}

impl EncodeSize for Header {
    fn encode_size(&self) -> usize {
        self.unsigned_size() + self.bookkeepers.encode_size() + self.signatures.encode_size()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use commonware_codec::{DecodeExt, Encode};
    use commonware_cryptography::{ed25519::PrivateKey, PrivateKeyExt as _, Signer as _};

    /// Build an unsigned header at `height` whose content is derived from `seed`.
    pub fn header(height: u32, parent: Digest, seed: u8) -> Header {
        Header {
            version: 0,
            parent,
            transactions_root: commonware_cryptography::sha256::hash(&[seed, 1]),
            block_root: commonware_cryptography::sha256::hash(&[seed, 2]),
            timestamp: 1_700_000_000 + height,
            height,
            consensus_data: u64::from(seed),
            consensus_payload: Bytes::from(vec![seed; 8]),
            next_bookkeeper: commonware_cryptography::sha256::hash(&[seed, 3]),
            bookkeepers: Vec::new(),
            signatures: Vec::new(),
        }
    }

    /// Append a valid signature from `signer` to `header`.
    pub fn endorse(header: &mut Header, signer: &PrivateKey) {
        let digest = header.digest();
        header.bookkeepers.push(signer.public_key());
        header
            .signatures
            .push(signer.sign(Some(NAMESPACE), digest.as_ref()));
    }

    #[test]
    fn test_codec() {
        let mut original = header(7, commonware_cryptography::sha256::hash(b"parent"), 9);
        endorse(&mut original, &PrivateKey::from_seed(1));
        endorse(&mut original, &PrivateKey::from_seed(2));

        let encoded = original.encode();
        assert_eq!(encoded.len(), original.encode_size());
        let decoded = Header::decode(encoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_digest_ignores_signer_metadata() {
        let mut signed = header(3, commonware_cryptography::sha256::hash(b"parent"), 1);
        let unsigned = signed.clone();
        endorse(&mut signed, &PrivateKey::from_seed(5));
        assert_eq!(signed.digest(), unsigned.digest());

        // Any content change moves the digest
        let mut changed = unsigned.clone();
        changed.timestamp += 1;
        assert_ne!(changed.digest(), unsigned.digest());
    }

    #[test]
    fn test_check() {
        let mut header = header(1, commonware_cryptography::sha256::hash(b"parent"), 4);
        assert!(header.check().is_ok());
        endorse(&mut header, &PrivateKey::from_seed(1));
        endorse(&mut header, &PrivateKey::from_seed(2));
        assert!(header.check().is_ok());

        // Misaligned lists
        let mut misaligned = header.clone();
        misaligned.signatures.pop();
        assert!(matches!(
            misaligned.check(),
            Err(Error::LengthMismatch {
                bookkeepers: 2,
                signatures: 1,
                ..
            })
        ));

        // Repeated bookkeeper
        let mut repeated = header.clone();
        endorse(&mut repeated, &PrivateKey::from_seed(1));
        assert!(matches!(
            repeated.check(),
            Err(Error::DuplicateBookkeeper { height: 1, .. })
        ));

        // Swapped signatures no longer line up with their bookkeepers
        let mut swapped = header.clone();
        swapped.signatures.swap(0, 1);
        assert!(matches!(
            swapped.check(),
            Err(Error::InvalidSignature { index: 0, .. })
        ));

        // Signature over different content
        let mut stale = header;
        stale.block_root = commonware_cryptography::sha256::hash(b"other");
        assert!(matches!(
            stale.check(),
            Err(Error::InvalidSignature { index: 0, .. })
        ));
    }

    #[test]
    fn test_decode_rejects_oversized_lists() {
        let mut original = header(0, commonware_cryptography::sha256::hash(b"parent"), 2);
        let signer = PrivateKey::from_seed(1);
        for _ in 0..=MAX_BOOKKEEPERS {
            original.bookkeepers.push(signer.public_key());
        }
        let encoded = original.encode();
        assert!(Header::decode(encoded).is_err());
    }

    #[test]
    fn test_check_rejects_undecodable_lists() {
        let mut full = header(1, commonware_cryptography::sha256::hash(b"parent"), 6);
        for seed in 0..MAX_BOOKKEEPERS as u64 {
            endorse(&mut full, &PrivateKey::from_seed(seed));
        }
        assert!(full.check().is_ok());
        assert_eq!(Header::decode(full.encode()).unwrap(), full);

        let mut oversized = full.clone();
        endorse(&mut oversized, &PrivateKey::from_seed(MAX_BOOKKEEPERS as u64));
        assert!(matches!(
            oversized.check(),
            Err(Error::TooManyBookkeepers {
                height: 1,
                count,
                max: MAX_BOOKKEEPERS,
            }) if count == MAX_BOOKKEEPERS + 1
        ));
    }
}
