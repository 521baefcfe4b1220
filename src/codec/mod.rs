//! Turning a whole [`CalendarState`] into a URL fragment, and back
//!
//! Encoding: compact against the defaults, serialize to JSON, compress to a URL-safe string, and, when a password is
//! given, encrypt the result and prefix it with `ENC:`.
//! Decoding runs the same pipeline backwards, and rebuilds a valid document with [`normalize`].

pub mod normalize;
pub mod wire;

use std::sync::Arc;

use crate::compress::{Compressor, DeflateCompressor};
use crate::config::CryptoConfig;
use crate::crypto::{CryptoProvider, PasswordCipher};
use crate::error::CodecError;
use crate::state::CalendarState;

pub use normalize::{normalize, normalize_with_report, ValidationIssue};
pub use wire::{compact, CompactState};

/// Marks fragments whose payload is encrypted
pub const ENCRYPTED_PREFIX: &str = "ENC:";

/// Whether this fragment (with or without its leading `#`) needs a password
pub fn is_encrypted(fragment: &str) -> bool {
    strip_hash(fragment).starts_with(ENCRYPTED_PREFIX)
}

fn strip_hash(fragment: &str) -> &str {
    fragment.strip_prefix('#').unwrap_or(fragment)
}

/// An empty password is no password
fn effective_password(password: Option<&str>) -> Option<&str> {
    password.filter(|p| !p.is_empty())
}

/// The canonical text form of a document
pub fn serialize(state: &CalendarState) -> Result<String, CodecError> {
    serde_json::to_string(&compact(state))
        .map_err(|err| CodecError::Encode(format!("Unable to serialize: {}", err)))
}

/// Parse a canonical text form, repairing whatever needs to be
pub fn parse(payload: &str) -> Result<CalendarState, CodecError> {
    let raw: serde_json::Value = serde_json::from_str(payload)
        .map_err(|err| CodecError::Decode(format!("Invalid JSON payload: {}", err)))?;
    Ok(normalize(&raw))
}


/// The fragment encoder/decoder.
///
/// It is cheap to clone, and holds no state of its own besides its two primitives.
#[derive(Clone)]
pub struct StateCodec {
    compressor: Arc<dyn Compressor>,
    crypto: Arc<dyn CryptoProvider>,
}

impl Default for StateCodec {
    fn default() -> Self {
        Self::with_crypto_config(CryptoConfig::default())
    }
}

impl std::fmt::Debug for StateCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateCodec").finish()
    }
}

impl StateCodec {
    pub fn new(compressor: Arc<dyn Compressor>, crypto: Arc<dyn CryptoProvider>) -> Self {
        Self { compressor, crypto }
    }

    /// The default primitives, with a custom key derivation setting
    pub fn with_crypto_config(config: CryptoConfig) -> Self {
        Self::new(Arc::new(DeflateCompressor::new()), Arc::new(PasswordCipher::new(config)))
    }

    /// Encode a document into a fragment (without the leading `#`)
    pub async fn encode(&self, state: &CalendarState, password: Option<&str>) -> Result<String, CodecError> {
        let payload = serialize(state)?;
        let compressed = self.compressor.compress(&payload).await
            .map_err(|err| CodecError::Encode(format!("Compression failed: {}", err)))?;

        match effective_password(password) {
            None => Ok(compressed),
            Some(password) => {
                let ciphertext = self.crypto.encrypt(&compressed, password).await
                    .map_err(|err| CodecError::Encode(format!("Encryption failed: {}", err)))?;
                Ok(format!("{}{}", ENCRYPTED_PREFIX, ciphertext))
            },
        }
    }

    /// Decode a fragment (with or without its leading `#`).
    ///
    /// An empty fragment is a fresh, default document.
    pub async fn decode(&self, fragment: &str, password: Option<&str>) -> Result<CalendarState, CodecError> {
        let fragment = strip_hash(fragment).trim();
        if fragment.is_empty() {
            return Ok(CalendarState::default());
        }

        let decrypted;
        let compressed = match fragment.strip_prefix(ENCRYPTED_PREFIX) {
            None => fragment,
            Some(ciphertext) => {
                let password = effective_password(password).ok_or(CodecError::PasswordRequired)?;
                decrypted = self.crypto.decrypt(ciphertext, password).await
                    .map_err(|err| {
                        log::debug!("Unable to decrypt fragment: {}", err);
                        CodecError::IncorrectPassword
                    })?;
                decrypted.as_str()
            },
        };

        let payload = self.compressor.decompress(compressed).await
            .map_err(|err| CodecError::Decode(format!("Decompression failed: {}", err)))?;
        parse(&payload)
    }
}
