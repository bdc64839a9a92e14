//! Artifact header layout
//!
//! Every artifact is `header || payload`. The header is fixed-size for a
//! given format version:
//!
//! ```text
//! offset  size  field
//!      0     8  magic            b"LYNXBNDL"
//!      8     1  version major
//!      9     1  version minor
//!     10     4  platform id      u32 LE (0 unspecified, 1 ios, 2 android, 3 web)
//!     14     4  content format   u32 LE (1 plain js, 2 react, 3 vue)
//!     18     4  content length   u32 LE, exact payload byte length
//!     22    16  content digest   MD5 of the payload
//!     38     4  reserved         u32 LE, written as zero
//!     42        payload (UTF-8 JavaScript)
//! ```

use crate::artifact::BundleError;
use crate::encoder::{ByteReader, ByteWriter};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Magic bytes identifying a Lynx bundle: "LYNX" + "BNDL"
pub const MAGIC: [u8; 8] = *b"LYNXBNDL";

/// Size of the version 1.x header in bytes
pub const HEADER_SIZE: usize = 42;

/// Byte offset of the content length field
pub const CONTENT_LENGTH_OFFSET: usize = 18;

/// Byte offset of the content digest field
pub const DIGEST_OFFSET: usize = 22;

/// Header format version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FormatVersion {
    /// Major version; a decoder only accepts majors it knows
    pub major: u8,
    /// Minor version; additive changes only
    pub minor: u8,
}

impl FormatVersion {
    /// The version written by this crate
    pub const CURRENT: FormatVersion = FormatVersion { major: 1, minor: 0 };

    /// Create a version
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Whether a decoder of this crate understands the version
    pub fn is_supported(&self) -> bool {
        self.major == Self::CURRENT.major
    }

    /// Header size for this version
    pub fn header_size(&self) -> usize {
        HEADER_SIZE
    }
}

impl Default for FormatVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for FormatVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (major, minor) = s.split_once('.').unwrap_or((s, "0"));
        let major = major
            .trim()
            .parse::<u8>()
            .map_err(|_| format!("invalid format version: {}", s))?;
        let minor = minor
            .trim()
            .parse::<u8>()
            .map_err(|_| format!("invalid format version: {}", s))?;
        Ok(Self { major, minor })
    }
}

/// Target platform of an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// No platform recorded
    #[default]
    Unspecified,
    /// iOS
    Ios,
    /// Android
    Android,
    /// Web
    Web,
}

impl Platform {
    /// Wire id of the platform
    pub fn id(self) -> u32 {
        match self {
            Platform::Unspecified => 0,
            Platform::Ios => 1,
            Platform::Android => 2,
            Platform::Web => 3,
        }
    }

    /// Look up a platform by wire id
    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(Platform::Unspecified),
            1 => Some(Platform::Ios),
            2 => Some(Platform::Android),
            3 => Some(Platform::Web),
            _ => None,
        }
    }

    /// Lowercase name, as used in configuration and HTTP headers
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Unspecified => "unspecified",
            Platform::Ios => "ios",
            Platform::Android => "android",
            Platform::Web => "web",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ios" => Ok(Platform::Ios),
            "android" => Ok(Platform::Android),
            "web" => Ok(Platform::Web),
            "unspecified" => Ok(Platform::Unspecified),
            other => Err(format!(
                "unknown platform `{}` (expected ios, android or web)",
                other
            )),
        }
    }
}

/// Kind of JavaScript carried by the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentFormat {
    /// Plain JavaScript
    PlainJs,
    /// React bundle
    React,
    /// Vue bundle
    #[default]
    Vue,
}

impl ContentFormat {
    /// Wire id of the format
    pub fn id(self) -> u32 {
        match self {
            ContentFormat::PlainJs => 1,
            ContentFormat::React => 2,
            ContentFormat::Vue => 3,
        }
    }

    /// Look up a format by wire id
    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            1 => Some(ContentFormat::PlainJs),
            2 => Some(ContentFormat::React),
            3 => Some(ContentFormat::Vue),
            _ => None,
        }
    }

    /// Short name used in bundle metadata and HTTP headers
    pub fn as_str(self) -> &'static str {
        match self {
            ContentFormat::PlainJs => "js",
            ContentFormat::React => "react",
            ContentFormat::Vue => "vue",
        }
    }
}

impl fmt::Display for ContentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed-size record prefixed to every artifact
///
/// Built once from a finished payload by [`crate::encode`] and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleHeader {
    /// Magic number (must be "LYNXBNDL")
    pub magic: [u8; 8],
    /// Header format version
    pub format_version: FormatVersion,
    /// Target platform
    pub platform: Platform,
    /// Payload content kind
    pub content_format: ContentFormat,
    /// Exact byte length of the payload that follows the header
    pub content_length: u32,
    /// MD5 digest of the payload
    pub content_digest: [u8; 16],
    /// Reserved, zero when written by this crate
    pub reserved: u32,
}

impl BundleHeader {
    /// Build a header describing `payload`
    pub fn for_payload(
        payload: &[u8],
        platform: Platform,
        content_format: ContentFormat,
        format_version: FormatVersion,
    ) -> Result<Self, BundleError> {
        let content_length =
            u32::try_from(payload.len()).map_err(|_| BundleError::PayloadTooLarge(payload.len()))?;
        Ok(Self {
            magic: MAGIC,
            format_version,
            platform,
            content_format,
            content_length,
            content_digest: digest(payload),
            reserved: 0,
        })
    }

    /// Hex rendering of the content digest
    pub fn digest_hex(&self) -> String {
        hex::encode(self.content_digest)
    }

    /// Total artifact size described by this header
    pub fn artifact_len(&self) -> usize {
        self.format_version.header_size() + self.content_length as usize
    }

    /// Serialize the header
    pub fn write_to(&self, writer: &mut ByteWriter) {
        writer.emit_bytes(&self.magic);
        writer.emit_u8(self.format_version.major);
        writer.emit_u8(self.format_version.minor);
        writer.emit_u32(self.platform.id());
        writer.emit_u32(self.content_format.id());
        writer.emit_u32(self.content_length);
        writer.emit_bytes(&self.content_digest);
        writer.emit_u32(self.reserved);
    }

    /// Deserialize and validate a header
    ///
    /// Only the header itself is checked here; payload length and digest
    /// are checked by [`crate::decode`].
    pub fn read_from(reader: &mut ByteReader<'_>) -> Result<Self, BundleError> {
        let magic: [u8; 8] = reader
            .read_array()
            .map_err(|_| BundleError::MalformedHeader("artifact shorter than magic".to_string()))?;
        if magic != MAGIC {
            return Err(BundleError::MalformedHeader(format!(
                "invalid magic: expected {:?}, got {:?}",
                MAGIC, magic
            )));
        }

        let truncated =
            |_| BundleError::MalformedHeader(format!("header shorter than {} bytes", HEADER_SIZE));

        let major = reader.read_u8().map_err(truncated)?;
        let minor = reader.read_u8().map_err(truncated)?;
        let format_version = FormatVersion::new(major, minor);
        if !format_version.is_supported() {
            return Err(BundleError::UnsupportedVersion(format_version));
        }

        let platform_id = reader.read_u32().map_err(truncated)?;
        let platform = Platform::from_id(platform_id).ok_or_else(|| {
            BundleError::MalformedHeader(format!("unknown platform id {}", platform_id))
        })?;

        let format_id = reader.read_u32().map_err(truncated)?;
        let content_format = ContentFormat::from_id(format_id).ok_or_else(|| {
            BundleError::MalformedHeader(format!("unknown content format {}", format_id))
        })?;

        let content_length = reader.read_u32().map_err(truncated)?;
        let content_digest: [u8; 16] = reader.read_array().map_err(truncated)?;
        let reserved = reader.read_u32().map_err(truncated)?;

        Ok(Self {
            magic,
            format_version,
            platform,
            content_format,
            content_length,
            content_digest,
            reserved,
        })
    }
}

/// MD5 digest of a payload
pub fn digest(payload: &[u8]) -> [u8; 16] {
    md5::compute(payload).0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_size_matches_layout() {
        let header = BundleHeader::for_payload(
            b"x",
            Platform::Ios,
            ContentFormat::Vue,
            FormatVersion::CURRENT,
        )
        .unwrap();
        let mut writer = ByteWriter::new();
        header.write_to(&mut writer);
        assert_eq!(writer.offset(), HEADER_SIZE);
        assert_eq!(&writer.buffer()[..8], b"LYNXBNDL");
        assert_eq!(
            &writer.buffer()[CONTENT_LENGTH_OFFSET..CONTENT_LENGTH_OFFSET + 4],
            &1u32.to_le_bytes()
        );
        assert_eq!(
            &writer.buffer()[DIGEST_OFFSET..DIGEST_OFFSET + 16],
            &header.content_digest
        );
    }

    #[test]
    fn test_platform_ids() {
        assert_eq!(Platform::Ios.id(), 1);
        assert_eq!(Platform::Android.id(), 2);
        assert_eq!(Platform::Web.id(), 3);
        assert_eq!(Platform::from_id(0), Some(Platform::Unspecified));
        assert_eq!(Platform::from_id(9), None);
        assert_eq!("android".parse::<Platform>(), Ok(Platform::Android));
        assert!("symbian".parse::<Platform>().is_err());
    }

    #[test]
    fn test_content_format_ids() {
        assert_eq!(ContentFormat::PlainJs.id(), 1);
        assert_eq!(ContentFormat::React.id(), 2);
        assert_eq!(ContentFormat::Vue.id(), 3);
        assert_eq!(ContentFormat::from_id(4), None);
    }

    #[test]
    fn test_format_version_parse() {
        assert_eq!("1.0".parse::<FormatVersion>(), Ok(FormatVersion::new(1, 0)));
        assert_eq!("1".parse::<FormatVersion>(), Ok(FormatVersion::new(1, 0)));
        assert_eq!("1.3".parse::<FormatVersion>(), Ok(FormatVersion::new(1, 3)));
        assert!("one".parse::<FormatVersion>().is_err());
        assert!(FormatVersion::new(1, 7).is_supported());
        assert!(!FormatVersion::new(2, 0).is_supported());
    }

    #[test]
    fn test_digest_is_md5() {
        assert_eq!(
            hex::encode(digest(b"")),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
    }
}
