use crate::{Digest, Error, KeyId, PublicKey};
use commonware_codec::{DecodeExt, Encode};
use commonware_cryptography::{Hasher, Sha256};
use commonware_utils::from_hex_formatted;
use std::collections::HashSet;

/// The network-wide set of bookkeepers authorized to endorse headers.
///
/// Members keep the order in which they were configured. The set is read-only once built.
#[derive(Clone, Debug)]
pub struct AuthorizedSigners {
    keys: Vec<PublicKey>,
    ids: HashSet<KeyId>,
}

impl AuthorizedSigners {
    /// Build the set from public keys, rejecting empty sets and repeated keys.
    pub fn new(keys: Vec<PublicKey>) -> Result<Self, Error> {
        if keys.is_empty() {
            return Err(Error::Config("no bookkeepers configured".into()));
        }
        let mut ids = HashSet::with_capacity(keys.len());
        for key in &keys {
            let id = KeyId::from(key);
            if !ids.insert(id.clone()) {
                return Err(Error::Config(format!("bookkeeper {id} configured twice")));
            }
        }
        Ok(Self { keys, ids })
    }

    /// Build the set from hex-encoded public keys.
    pub fn from_hex<I, S>(keys: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parsed = Vec::new();
        for key in keys {
            let key = key.as_ref();
            let raw = from_hex_formatted(key)
                .ok_or_else(|| Error::Config(format!("bookkeeper {key} is not hex")))?;
            let key = PublicKey::decode(raw.as_slice())
                .map_err(|err| Error::Config(format!("bookkeeper {key} is invalid: {err}")))?;
            parsed.push(key);
        }
        Self::new(parsed)
    }

    /// Returns whether `key` is an authorized bookkeeper.
    pub fn contains(&self, key: &PublicKey) -> bool {
        self.ids.contains(&KeyId::from(key))
    }

    /// Returns how many authorized bookkeepers are not in `signed`.
    pub fn missing(&self, signed: &HashSet<KeyId>) -> usize {
        self.ids.difference(signed).count()
    }

    /// Iterate over the authorized bookkeepers in configured order.
    pub fn iter(&self) -> impl Iterator<Item = &PublicKey> {
        self.keys.iter()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns a commitment to the ordered set (recorded as `next_bookkeeper` at genesis).
    pub fn digest(&self) -> Digest {
        let mut hasher = Sha256::new();
        for key in &self.keys {
            hasher.update(&key.encode());
        }
        hasher.finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commonware_cryptography::{ed25519::PrivateKey, PrivateKeyExt as _, Signer as _};
    use commonware_utils::hex;

    fn key(seed: u64) -> PublicKey {
        PrivateKey::from_seed(seed).public_key()
    }

    #[test]
    fn test_membership() {
        let set = AuthorizedSigners::new(vec![key(1), key(2), key(3)]).unwrap();
        assert_eq!(set.len(), 3);
        assert!(set.contains(&key(2)));
        assert!(!set.contains(&key(4)));
        assert_eq!(set.iter().cloned().collect::<Vec<_>>(), vec![key(1), key(2), key(3)]);

        let signed: HashSet<KeyId> = [KeyId::from(&key(1)), KeyId::from(&key(9))].into();
        assert_eq!(set.missing(&signed), 2);
    }

    #[test]
    fn test_from_hex() {
        let encoded = vec![hex(&key(1).encode()), format!("0x{}", hex(&key(2).encode()))];
        let set = AuthorizedSigners::from_hex(&encoded).unwrap();
        assert!(set.contains(&key(1)));
        assert!(set.contains(&key(2)));

        assert!(matches!(
            AuthorizedSigners::from_hex(["zz"]),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            AuthorizedSigners::from_hex(["abcd"]),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_rejects_empty_and_duplicates() {
        assert!(matches!(AuthorizedSigners::new(Vec::new()), Err(Error::Config(_))));
        assert!(matches!(
            AuthorizedSigners::new(vec![key(1), key(2), key(1)]),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_digest_depends_on_order() {
        let a = AuthorizedSigners::new(vec![key(1), key(2)]).unwrap();
        let b = AuthorizedSigners::new(vec![key(2), key(1)]).unwrap();
        assert_eq!(a.digest(), a.clone().digest());
        assert_ne!(a.digest(), b.digest());
    }
}
