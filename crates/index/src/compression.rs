use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use zstd::{decode_all, encode_all};

use crate::IndexError;

/// Compression codec for stored values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionCodec {
    /// Plain JSON bytes; handy when inspecting a store by hand.
    None,
    /// Zstd (default).
    #[default]
    Zstd,
}

/// How documents are packed before they reach the backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    pub codec: CompressionCodec,
    /// Zstd level, 1-22.
    pub level: i32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            codec: CompressionCodec::default(),
            level: 3,
        }
    }
}

impl CompressionConfig {
    pub fn new(codec: CompressionCodec, level: i32) -> Self {
        Self { codec, level }
    }

    pub fn none() -> Self {
        Self::new(CompressionCodec::None, 0)
    }

    pub fn with_level(mut self, level: i32) -> Self {
        self.level = level;
        self
    }

    pub fn validate(&self) -> Result<(), IndexError> {
        if self.codec == CompressionCodec::Zstd && !(1..=22).contains(&self.level) {
            return Err(IndexError::Compression(format!(
                "zstd level must be within 1..=22, got {}",
                self.level
            )));
        }
        Ok(())
    }

    /// Serialize to JSON, then compress.
    pub fn encode_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, IndexError> {
        let bytes = serde_json::to_vec(value).map_err(|e| IndexError::Encode(e.to_string()))?;
        self.compress(&bytes)
    }

    /// Decompress, then parse JSON.
    pub fn decode_json<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, IndexError> {
        let bytes = self.decompress(data)?;
        serde_json::from_slice(&bytes).map_err(|e| IndexError::Decode(e.to_string()))
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, IndexError> {
        match self.codec {
            CompressionCodec::None => Ok(data.to_vec()),
            CompressionCodec::Zstd => Ok(encode_all(data, self.level)?),
        }
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, IndexError> {
        match self.codec {
            CompressionCodec::None => Ok(data.to_vec()),
            CompressionCodec::Zstd => Ok(decode_all(data)?),
        }
    }
}
