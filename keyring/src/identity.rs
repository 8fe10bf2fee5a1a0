use commonware_cryptography::{ed25519::PrivateKey, Signer as _, Verifier as _};
use std::{
    fmt,
    path::{Path, PathBuf},
};
use supplysign_ledger::{Bookkeeper, KeyId, PublicKey, Signature};
use thiserror::Error;

/// A freshly produced signature did not verify against the identity's public key.
#[derive(Debug, Error)]
#[error("signature from {key} failed self-verification")]
pub struct InvalidSignature {
    pub key: KeyId,
}

/// A decrypted signing key loaded from a wallet.
///
/// Every signature is verified against the identity's public key before it is returned, so a
/// faulty key can never place an invalid signature next to its public key.
#[derive(Clone)]
pub struct SignerIdentity {
    key: PrivateKey,
    public: PublicKey,
    label: String,
    source: PathBuf,
}

impl SignerIdentity {
    pub fn new(key: PrivateKey, label: String, source: PathBuf) -> Self {
        let public = key.public_key();
        Self {
            key,
            public,
            label,
            source,
        }
    }

    /// Canonical identifier of the identity's public key.
    pub fn id(&self) -> KeyId {
        KeyId::from(&self.public)
    }

    /// Label of the wallet account the key was loaded from.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Wallet file the key was loaded from.
    pub fn source(&self) -> &Path {
        &self.source
    }
}

impl Bookkeeper for SignerIdentity {
    type Error = InvalidSignature;

    fn public_key(&self) -> PublicKey {
        self.public.clone()
    }

    fn sign(&self, namespace: &[u8], message: &[u8]) -> Result<Signature, Self::Error> {
        let signature = self.key.sign(Some(namespace), message);
        if !self.public.verify(Some(namespace), message, &signature) {
            return Err(InvalidSignature { key: self.id() });
        }
        Ok(signature)
    }
}

impl fmt::Debug for SignerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignerIdentity")
            .field("key", &self.id())
            .field("label", &self.label)
            .field("source", &self.source)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commonware_cryptography::PrivateKeyExt as _;

    #[test]
    fn test_sign_verifies() {
        let key = PrivateKey::from_seed(7);
        let identity = SignerIdentity::new(key.clone(), "main".into(), "a.dat".into());
        assert_eq!(Bookkeeper::public_key(&identity), key.public_key());

        let signature = Bookkeeper::sign(&identity, b"namespace", b"message").unwrap();
        assert!(key
            .public_key()
            .verify(Some(&b"namespace"[..]), b"message", &signature));
        assert!(!key
            .public_key()
            .verify(Some(&b"other"[..]), b"message", &signature));
    }

    #[test]
    fn test_debug_hides_key() {
        let key = PrivateKey::from_seed(7);
        let identity = SignerIdentity::new(key.clone(), "main".into(), "a.dat".into());
        let rendered = format!("{identity:?}");
        assert!(rendered.contains(&identity.id().to_string()));
        assert!(!rendered.contains(&format!("{key}")));
    }
}
