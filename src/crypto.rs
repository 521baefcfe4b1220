//! Password-based authenticated encryption of opaque strings
//!
//! The output of [`PasswordCipher::encrypt`] is the unpadded URL-safe base64 form of
//! `salt (16 bytes) || nonce (12 bytes) || ciphertext || tag (16 bytes)`.
//! The key is derived from the password with PBKDF2-HMAC-SHA256, and the payload is sealed with AES-256-GCM.

use std::error::Error;
use std::fmt::{Display, Formatter};

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::Sha256;

use crate::config::CryptoConfig;

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;

/// Symmetric, password-derived, authenticated encryption.
///
/// Implementors are stateless: every call is independent, and two encryptions of the same text never give the same output.
#[async_trait]
pub trait CryptoProvider: Send + Sync {
    async fn encrypt(&self, text: &str, password: &str) -> Result<String, Box<dyn Error + Send + Sync>>;
    /// Must fail (and never return partial plaintext) if the password is wrong or the input has been tampered with
    async fn decrypt(&self, ciphertext: &str, password: &str) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// The reason a decryption failed is deliberately not detailed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptionFailed;

impl Display for DecryptionFailed {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Decryption failed")
    }
}

impl Error for DecryptionFailed {}


/// PBKDF2-HMAC-SHA256 + AES-256-GCM
#[derive(Clone, Debug, Default)]
pub struct PasswordCipher {
    config: CryptoConfig,
}

impl PasswordCipher {
    pub fn new(config: CryptoConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CryptoConfig {
        &self.config
    }

    /// Key derivation is CPU-bound: inside a tokio runtime it runs on the blocking thread pool
    async fn derive_key(&self, password: &str, salt: &[u8]) -> Result<[u8; KEY_LEN], Box<dyn Error + Send + Sync>> {
        let iterations = self.config.iterations();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let password = password.to_string();
                let salt = salt.to_vec();
                let key = runtime.spawn_blocking(move || pbkdf2_sha256(&password, &salt, iterations)).await?;
                Ok(key)
            },
            Err(_) => Ok(pbkdf2_sha256(password, salt, iterations)),
        }
    }
}

fn pbkdf2_sha256(password: &str, salt: &[u8], iterations: u32) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key);
    key
}

#[async_trait]
impl CryptoProvider for PasswordCipher {
    async fn encrypt(&self, text: &str, password: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        getrandom::getrandom(&mut salt).map_err(|err| format!("Unable to generate a salt: {}", err))?;
        getrandom::getrandom(&mut nonce).map_err(|err| format!("Unable to generate a nonce: {}", err))?;

        let key = self.derive_key(password, &salt).await?;
        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|err| format!("Invalid key: {}", err))?;
        // The AEAD output already has the tag appended
        let sealed = cipher.encrypt(Nonce::from_slice(&nonce), text.as_bytes())
            .map_err(|_| "Encryption failed".to_string())?;

        let mut blob = Vec::with_capacity(SALT_LEN + NONCE_LEN + sealed.len());
        blob.extend_from_slice(&salt);
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&sealed);
        Ok(URL_SAFE_NO_PAD.encode(blob))
    }

    async fn decrypt(&self, ciphertext: &str, password: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
        let blob = URL_SAFE_NO_PAD.decode(ciphertext.trim()).map_err(|_| DecryptionFailed)?;
        if blob.len() < SALT_LEN + NONCE_LEN + TAG_LEN {
            return Err(DecryptionFailed.into());
        }
        let (salt, rest) = blob.split_at(SALT_LEN);
        let (nonce, sealed) = rest.split_at(NONCE_LEN);

        let key = self.derive_key(password, salt).await?;
        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| DecryptionFailed)?;
        let plain = cipher.decrypt(Nonce::from_slice(nonce), sealed).map_err(|_| DecryptionFailed)?;
        let text = String::from_utf8(plain).map_err(|_| DecryptionFailed)?;
        Ok(text)
    }
}
