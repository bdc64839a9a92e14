//! Artifact encoding and decoding
//!
//! Both directions are pure functions over byte buffers. Decoding either
//! returns a fully validated header and payload or an error; there is no
//! partially-valid result.

use crate::encoder::{ByteReader, ByteWriter};
use crate::header::{digest, BundleHeader, ContentFormat, FormatVersion, Platform};
use thiserror::Error;

/// Artifact encoding/decoding errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BundleError {
    /// Magic mismatch, short header, or an unknown enumerated field
    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    /// Header major version not understood by this decoder
    #[error("Unsupported format version: {0}")]
    UnsupportedVersion(FormatVersion),

    /// Fewer payload bytes available than the header declares
    #[error("Truncated payload: header declares {expected} bytes, {available} available")]
    TruncatedPayload {
        /// Declared content length
        expected: u32,
        /// Bytes present after the header
        available: usize,
    },

    /// More bytes present than the header declares (e.g. size padding)
    #[error("Unexpected trailing data: header declares {expected} bytes, {actual} present")]
    TrailingData {
        /// Declared content length
        expected: u32,
        /// Bytes present after the header
        actual: usize,
    },

    /// Recomputed digest disagrees with the header
    #[error("Digest mismatch: header {expected}, payload {actual}")]
    DigestMismatch {
        /// Digest stored in the header (hex)
        expected: String,
        /// Digest of the payload bytes (hex)
        actual: String,
    },

    /// Payload does not fit the 32-bit length field
    #[error("Payload of {0} bytes exceeds the 32-bit content length field")]
    PayloadTooLarge(usize),
}

/// A validated artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedBundle {
    /// Parsed header
    pub header: BundleHeader,
    /// Payload bytes, exactly `header.content_length` long
    pub payload: Vec<u8>,
}

impl DecodedBundle {
    /// Payload as UTF-8 text, if it is valid UTF-8
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}

/// Encode a payload into an artifact (`header || payload`)
///
/// The content length and digest are always computed from `payload`.
pub fn encode(
    payload: &[u8],
    platform: Platform,
    content_format: ContentFormat,
    format_version: FormatVersion,
) -> Result<Vec<u8>, BundleError> {
    if !format_version.is_supported() {
        return Err(BundleError::UnsupportedVersion(format_version));
    }

    let header = BundleHeader::for_payload(payload, platform, content_format, format_version)?;

    let mut writer = ByteWriter::with_capacity(header.artifact_len());
    header.write_to(&mut writer);
    writer.emit_bytes(payload);

    Ok(writer.into_bytes())
}

/// Decode and validate an artifact
pub fn decode(artifact: &[u8]) -> Result<DecodedBundle, BundleError> {
    let mut reader = ByteReader::new(artifact);
    let header = BundleHeader::read_from(&mut reader)?;

    let available = reader.remaining();
    let expected = header.content_length;
    if available < expected as usize {
        return Err(BundleError::TruncatedPayload {
            expected,
            available,
        });
    }
    if available > expected as usize {
        return Err(BundleError::TrailingData {
            expected,
            actual: available,
        });
    }

    let payload = reader
        .read_slice(expected as usize)
        .map_err(|e| BundleError::MalformedHeader(e.to_string()))?;

    let actual = digest(payload);
    if actual != header.content_digest {
        return Err(BundleError::DigestMismatch {
            expected: header.digest_hex(),
            actual: hex::encode(actual),
        });
    }

    Ok(DecodedBundle {
        header,
        payload: payload.to_vec(),
    })
}
