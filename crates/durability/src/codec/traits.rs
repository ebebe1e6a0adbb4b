//! Storage codec trait definitions.

/// Storage codec trait.
///
/// All bytes passing between the record encoder and the filesystem go
/// through the codec. The default codec compresses; the identity codec
/// exists for tests and debugging.
///
/// # Thread Safety
///
/// Codecs must be `Send + Sync` so the store can be shared with its worker.
///
/// # Output Limit
///
/// `decode` takes the maximum number of bytes it may produce. A payload that
/// would expand past it is rejected with [`CodecError::LimitExceeded`]
/// instead of exhausting memory.
pub trait StorageCodec: Send + Sync {
    /// Encode bytes for storage.
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;

    /// Decode bytes read from storage, producing at most `limit` bytes.
    fn decode(&self, data: &[u8], limit: usize) -> Result<Vec<u8>, CodecError>;

    /// Unique codec identifier.
    fn codec_id(&self) -> &str;
}

/// Codec errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Encoding failed.
    #[error("Encode error (codec={codec_id}): {detail}")]
    EncodeError {
        /// Human-readable error description
        detail: String,
        /// Codec ID that attempted the encode
        codec_id: String,
    },

    /// Decoding failed (invalid or truncated frame).
    ///
    /// Carries the codec identity and data length so callers can
    /// distinguish a wrong-codec error from data corruption.
    #[error("Decode error (codec={codec_id}, data_len={data_len}): {detail}")]
    DecodeError {
        /// Human-readable error description
        detail: String,
        /// Codec ID that attempted the decode
        codec_id: String,
        /// Length of the data that failed to decode
        data_len: usize,
    },

    /// Decoded output would exceed the allowed size, or the output buffer
    /// could not be allocated.
    #[error("Decoded size exceeds limit of {limit} bytes")]
    LimitExceeded {
        /// The limit that was hit
        limit: usize,
    },

    /// Unknown codec identifier.
    #[error("Unknown codec: {0}")]
    UnknownCodec(String),
}

impl CodecError {
    /// Create a decode error with full diagnostic context.
    pub fn decode(detail: impl Into<String>, codec_id: impl Into<String>, data_len: usize) -> Self {
        CodecError::DecodeError {
            detail: detail.into(),
            codec_id: codec_id.into(),
            data_len,
        }
    }

    /// Create an encode error.
    pub fn encode(detail: impl Into<String>, codec_id: impl Into<String>) -> Self {
        CodecError::EncodeError {
            detail: detail.into(),
            codec_id: codec_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{IdentityCodec, ZstdCodec};

    // Test that trait is object-safe
    fn _accepts_box_dyn_codec(_codec: Box<dyn StorageCodec>) {}

    #[test]
    fn test_codec_trait_object_safe() {
        let codecs: Vec<Box<dyn StorageCodec>> =
            vec![Box::new(IdentityCodec), Box::new(ZstdCodec::default())];

        for codec in codecs {
            let data = b"test data";
            let encoded = codec.encode(data).unwrap();
            let decoded = codec.decode(&encoded, 1024).unwrap();
            assert_eq!(decoded, data);
        }
    }

    #[test]
    fn test_codec_error_display() {
        let err = CodecError::decode("bad frame", "zstd", 42);
        let msg = err.to_string();
        assert!(msg.contains("bad frame"));
        assert!(msg.contains("zstd"));
        assert!(msg.contains("42"));

        let err = CodecError::UnknownCodec("mystery".to_string());
        assert!(err.to_string().contains("mystery"));

        let err = CodecError::LimitExceeded { limit: 16 };
        assert!(err.to_string().contains("16"));
    }

    #[test]
    fn test_codec_roundtrip_binary_data() {
        let codec: Box<dyn StorageCodec> = Box::new(ZstdCodec::default());

        // Data with all byte values including null bytes
        let data: Vec<u8> = (0..=255).collect();
        let encoded = codec.encode(&data).unwrap();
        let decoded = codec.decode(&encoded, data.len()).unwrap();

        assert_eq!(decoded, data);
    }
}
