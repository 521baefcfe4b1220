//! Reversible text compression into a URL-safe alphabet

use std::error::Error;
use std::io::{Read, Write};

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

/// A symmetric text codec whose output only uses URL-safe characters
#[async_trait]
pub trait Compressor: Send + Sync {
    async fn compress(&self, text: &str) -> Result<String, Box<dyn Error + Send + Sync>>;
    /// Fails for anything that has not been produced by `compress`
    async fn decompress(&self, compressed: &str) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// Raw DEFLATE, then unpadded URL-safe base64
#[derive(Clone, Debug, Default)]
pub struct DeflateCompressor {}

impl DeflateCompressor {
    pub fn new() -> Self {
        Self {}
    }
}

#[async_trait]
impl Compressor for DeflateCompressor {
    async fn compress(&self, text: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(text.as_bytes())?;
        let bytes = encoder.finish()?;
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }

    async fn decompress(&self, compressed: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
        let bytes = URL_SAFE_NO_PAD.decode(compressed.trim())
            .map_err(|err| format!("Invalid base64 payload: {}", err))?;

        let mut text = String::new();
        DeflateDecoder::new(bytes.as_slice())
            .read_to_string(&mut text)
            .map_err(|err| format!("Invalid compressed payload: {}", err))?;
        Ok(text)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deflate_is_reversible() {
        let compressor = DeflateCompressor::new();
        let text = r#"{"t":"Team offsite","e":[[28000000,60,"Kickoff ☕"]]}"#;

        let compressed = compressor.compress(text).await.unwrap();
        assert!(compressed.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_eq!(compressor.decompress(&compressed).await.unwrap(), text);
    }

    #[tokio::test]
    async fn garbage_is_rejected() {
        let compressor = DeflateCompressor::new();
        assert!(compressor.decompress("not base64 at all!").await.is_err());
        assert!(compressor.decompress("AAAAAAAAAAAA").await.is_err());
    }
}
