//! Encrypted wallet files (Argon2id + XChaCha20-Poly1305).
//!
//! A wallet is a JSON document listing accounts. Each account stores its public key in the clear
//! and its private key encrypted under a key derived from the wallet password:
//!
//! ```json
//! {
//!     "name": "bookkeeper",
//!     "version": 1,
//!     "accounts": [{
//!         "label": "default",
//!         "publicKey": "<hex>",
//!         "isDefault": true,
//!         "kdf": { "m_cost": 65536, "t_cost": 3, "p_cost": 4 },
//!         "salt": "<hex>",
//!         "nonce": "<hex>",
//!         "ciphertext": "<hex>"
//!     }]
//! }
//! ```
//!
//! The public key is authenticated as associated data, so editing it in place makes decryption
//! fail rather than pairing the private key with a different public key.

use argon2::{Algorithm, Argon2, ParamsBuilder, Version as ArgonVersion};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305,
};
use commonware_codec::{DecodeExt, Encode};
use commonware_cryptography::{ed25519::PrivateKey, Signer as _};
use commonware_utils::{from_hex, hex};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::{fs::OpenOptions, io::Write as _, path::Path};
use thiserror::Error;
use zeroize::Zeroizing;

/// Format version written by [Wallet::new].
pub const VERSION: u32 = 1;

const SALT_LENGTH: usize = 32;
const NONCE_LENGTH: usize = 24;
const KEY_LENGTH: usize = 32;

/// Errors that can occur when reading, writing, or unlocking a wallet.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported wallet version: {0}")]
    UnsupportedVersion(u32),
    #[error("field {0} is not valid hex")]
    InvalidHex(&'static str),
    #[error("invalid kdf parameters: {0}")]
    InvalidKdf(String),
    #[error("wrong password or corrupted ciphertext")]
    Cipher,
    #[error("decrypted key is malformed")]
    InvalidKey,
    #[error("decrypted key does not match the stored public key")]
    KeyMismatch,
}

/// Argon2id cost parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kdf {
    pub m_cost: u32,
    pub t_cost: u32,
    pub p_cost: u32,
}

impl Default for Kdf {
    fn default() -> Self {
        Self {
            m_cost: 65536,
            t_cost: 3,
            p_cost: 4,
        }
    }
}

impl Kdf {
    fn derive(&self, password: &str, salt: &[u8]) -> Result<Zeroizing<[u8; KEY_LENGTH]>, Error> {
        let params = ParamsBuilder::new()
            .m_cost(self.m_cost)
            .t_cost(self.t_cost)
            .p_cost(self.p_cost)
            .build()
            .map_err(|err| Error::InvalidKdf(err.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, ArgonVersion::V0x13, params);
        let mut key = Zeroizing::new([0u8; KEY_LENGTH]);
        argon2
            .hash_password_into(password.as_bytes(), salt, &mut key[..])
            .map_err(|err| Error::InvalidKdf(err.to_string()))?;
        Ok(key)
    }
}

/// A single key stored in a [Wallet].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub label: String,
    pub public_key: String,
    #[serde(default)]
    pub is_default: bool,
    pub kdf: Kdf,
    pub salt: String,
    pub nonce: String,
    pub ciphertext: String,
}

fn decode_hex(field: &'static str, value: &str) -> Result<Vec<u8>, Error> {
    from_hex(value).ok_or(Error::InvalidHex(field))
}

impl Account {
    /// Encrypt `key` under `password`.
    pub fn encrypt<R: RngCore + CryptoRng>(
        rng: &mut R,
        label: impl Into<String>,
        key: &PrivateKey,
        password: &str,
        kdf: Kdf,
    ) -> Result<Self, Error> {
        let public = key.public_key().encode();
        Self::seal(rng, label.into(), key.as_ref(), &public, password, kdf)
    }

    fn seal<R: RngCore + CryptoRng>(
        rng: &mut R,
        label: String,
        private: &[u8],
        public: &[u8],
        password: &str,
        kdf: Kdf,
    ) -> Result<Self, Error> {
        let mut salt = [0u8; SALT_LENGTH];
        let mut nonce = [0u8; NONCE_LENGTH];
        rng.fill_bytes(&mut salt);
        rng.fill_bytes(&mut nonce);

        let key = kdf.derive(password, &salt)?;
        let cipher = XChaCha20Poly1305::new(&(*key).into());
        let ciphertext = cipher
            .encrypt(
                &nonce.into(),
                Payload {
                    msg: private,
                    aad: public,
                },
            )
            .map_err(|_| Error::Cipher)?;
        Ok(Self {
            label,
            public_key: hex(public),
            is_default: false,
            kdf,
            salt: hex(&salt),
            nonce: hex(&nonce),
            ciphertext: hex(&ciphertext),
        })
    }

    /// Decrypt the account's private key with `password`.
    pub fn decrypt(&self, password: &str) -> Result<PrivateKey, Error> {
        let public = decode_hex("publicKey", &self.public_key)?;
        let salt = decode_hex("salt", &self.salt)?;
        let nonce: [u8; NONCE_LENGTH] = decode_hex("nonce", &self.nonce)?
            .try_into()
            .map_err(|_| Error::InvalidHex("nonce"))?;
        let ciphertext = decode_hex("ciphertext", &self.ciphertext)?;

        let key = self.kdf.derive(password, &salt)?;
        let cipher = XChaCha20Poly1305::new(&(*key).into());
        let plaintext = cipher
            .decrypt(
                &nonce.into(),
                Payload {
                    msg: &ciphertext,
                    aad: &public,
                },
            )
            .map(Zeroizing::new)
            .map_err(|_| Error::Cipher)?;
        let private = PrivateKey::decode(plaintext.as_slice()).map_err(|_| Error::InvalidKey)?;
        if &private.public_key().encode()[..] != public.as_slice() {
            return Err(Error::KeyMismatch);
        }
        Ok(private)
    }
}

/// A collection of encrypted accounts stored as JSON.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    #[serde(default)]
    pub name: String,
    pub version: u32,
    pub accounts: Vec<Account>,
}

impl Wallet {
    /// Create an empty wallet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: VERSION,
            accounts: Vec::new(),
        }
    }

    /// Read the wallet at `path`.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let data = std::fs::read(path)?;
        let wallet: Self = serde_json::from_slice(&data)?;
        if wallet.version != VERSION {
            return Err(Error::UnsupportedVersion(wallet.version));
        }
        Ok(wallet)
    }

    /// Write the wallet to `path`, which must not exist yet.
    pub fn save(&self, path: &Path) -> Result<(), Error> {
        let data = serde_json::to_vec_pretty(self)?;
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        file.write_all(&data)?;
        file.sync_all()?;
        Ok(())
    }

    /// Add `account`, making it the default if `default` is set.
    pub fn add(&mut self, mut account: Account, default: bool) {
        if default {
            for existing in &mut self.accounts {
                existing.is_default = false;
            }
        }
        account.is_default = default;
        self.accounts.push(account);
    }

    /// Returns the account marked as default (the first one, if several are marked).
    pub fn default_account(&self) -> Option<&Account> {
        self.accounts.iter().find(|account| account.is_default)
    }
}
