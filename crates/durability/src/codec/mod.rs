//! Storage codec abstraction
//!
//! Every blob is `codec(msgpack(record))`. The codec is chosen by id so
//! the configured one can be validated up front.

mod traits;

pub use traits::{CodecError, StorageCodec};

use std::io::Read;

/// Default zstd level: fast, still shrinks JSON-heavy event content well
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Pass-through codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCodec;

impl StorageCodec for IdentityCodec {
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(data.to_vec())
    }

    fn decode(&self, data: &[u8], limit: usize) -> Result<Vec<u8>, CodecError> {
        if data.len() > limit {
            return Err(CodecError::LimitExceeded { limit });
        }
        Ok(data.to_vec())
    }

    fn codec_id(&self) -> &str {
        "identity"
    }
}

/// zstd compression codec.
#[derive(Debug, Clone, Copy)]
pub struct ZstdCodec {
    level: i32,
}

impl ZstdCodec {
    /// Create a codec with the given compression level.
    pub fn new(level: i32) -> Self {
        ZstdCodec { level }
    }

    /// Compression level in use.
    pub fn level(&self) -> i32 {
        self.level
    }
}

impl Default for ZstdCodec {
    fn default() -> Self {
        ZstdCodec::new(DEFAULT_COMPRESSION_LEVEL)
    }
}

impl StorageCodec for ZstdCodec {
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        zstd::stream::encode_all(data, self.level)
            .map_err(|e| CodecError::encode(format!("zstd encoder: {}", e), self.codec_id()))
    }

    fn decode(&self, data: &[u8], limit: usize) -> Result<Vec<u8>, CodecError> {
        let decoder = zstd::stream::read::Decoder::new(data)
            .map_err(|e| CodecError::decode(format!("zstd decoder: {}", e), self.codec_id(), data.len()))?;

        let mut out = Vec::new();
        let initial = data.len().saturating_mul(4).min(limit);
        out.try_reserve(initial)
            .map_err(|_| CodecError::LimitExceeded { limit })?;

        // Read one byte past the limit to tell "exactly at limit" from "over".
        let mut bounded = decoder.take(limit as u64 + 1);
        bounded
            .read_to_end(&mut out)
            .map_err(|e| CodecError::decode(e.to_string(), self.codec_id(), data.len()))?;

        if out.len() > limit {
            return Err(CodecError::LimitExceeded { limit });
        }
        Ok(out)
    }

    fn codec_id(&self) -> &str {
        "zstd"
    }
}

/// Look up a codec by id.
pub fn get_codec(codec_id: &str, level: i32) -> Result<Box<dyn StorageCodec>, CodecError> {
    match codec_id {
        "zstd" => Ok(Box::new(ZstdCodec::new(level))),
        "identity" => Ok(Box::new(IdentityCodec)),
        other => Err(CodecError::UnknownCodec(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_codec() {
        assert_eq!(get_codec("zstd", 3).unwrap().codec_id(), "zstd");
        assert_eq!(get_codec("identity", 3).unwrap().codec_id(), "identity");
        assert!(matches!(
            get_codec("aes256", 3),
            Err(CodecError::UnknownCodec(_))
        ));
    }

    #[test]
    fn test_zstd_compresses_repetitive_data() {
        let codec = ZstdCodec::default();
        let data = vec![b'a'; 64 * 1024];
        let encoded = codec.encode(&data).unwrap();
        assert!(encoded.len() < data.len() / 10);
        assert_eq!(codec.decode(&encoded, data.len()).unwrap(), data);
    }

    #[test]
    fn test_zstd_decode_limit() {
        let codec = ZstdCodec::default();
        let data = vec![0u8; 4096];
        let encoded = codec.encode(&data).unwrap();

        assert_eq!(codec.decode(&encoded, 4096).unwrap().len(), 4096);
        assert_eq!(
            codec.decode(&encoded, 4095),
            Err(CodecError::LimitExceeded { limit: 4095 })
        );
    }

    #[test]
    fn test_zstd_rejects_garbage() {
        let codec = ZstdCodec::default();
        let err = codec.decode(b"definitely not zstd", 1024).unwrap_err();
        assert!(matches!(err, CodecError::DecodeError { .. }));
    }

    #[test]
    fn test_zstd_rejects_truncated_frame() {
        let codec = ZstdCodec::default();
        let data: Vec<u8> = (0..10_000u32).flat_map(|i| i.to_le_bytes()).collect();
        let encoded = codec.encode(&data).unwrap();
        let truncated = &encoded[..encoded.len() / 2];
        assert!(codec.decode(truncated, data.len()).is_err());
    }

    #[test]
    fn test_identity_limit() {
        let codec = IdentityCodec;
        assert!(codec.decode(b"abcd", 4).is_ok());
        assert!(matches!(
            codec.decode(b"abcde", 4),
            Err(CodecError::LimitExceeded { .. })
        ));
    }
}
