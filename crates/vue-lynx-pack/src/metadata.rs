//! Bundle metadata preamble
//!
//! Every payload starts with a preamble that binds the bundle descriptor
//! to a local constant and hands it to the host, if the host exposes the
//! `__LYNX_SET_BUNDLE_FORMAT__` hook. The payload reads no other global.

use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};
use vue_lynx_bundle::{ContentFormat, FormatVersion, Platform};

/// Bundle type recorded in every descriptor
pub const BUNDLE_TYPE: &str = "vue-lynx";

/// Host hook receiving the descriptor
pub const HOST_HOOK: &str = "__LYNX_SET_BUNDLE_FORMAT__";

/// Descriptor embedded at the top of a payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleMetadata {
    /// Always [`BUNDLE_TYPE`]
    #[serde(rename = "type")]
    pub kind: String,
    /// Container format version
    pub version: String,
    /// Lynx engine version
    pub engine: String,
    /// Target platform
    pub platform: Platform,
    /// Content format tag
    pub format: String,
    /// Entry the bundle boots
    pub entry: String,
    /// Build time, milliseconds since the Unix epoch
    pub timestamp: u64,
}

impl BundleMetadata {
    /// Describe a bundle built now
    pub fn new(
        entry: impl Into<String>,
        platform: Platform,
        content_format: ContentFormat,
        format_version: FormatVersion,
        engine: impl Into<String>,
    ) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            kind: BUNDLE_TYPE.to_string(),
            version: format_version.to_string(),
            engine: engine.into(),
            platform,
            format: content_format.as_str().to_string(),
            entry: entry.into(),
            timestamp,
        }
    }

    /// Pin the timestamp, for reproducible payloads
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// JavaScript preamble carrying this descriptor
    pub fn preamble(&self) -> String {
        let descriptor = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        format!(
            "const __VUE_LYNX_BUNDLE__ = {descriptor};\n\
             if (typeof {hook} === 'function') {{ {hook}(__VUE_LYNX_BUNDLE__); }}\n",
            descriptor = descriptor,
            hook = HOST_HOOK,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preamble() {
        let metadata = BundleMetadata::new(
            "main",
            Platform::Ios,
            ContentFormat::Vue,
            FormatVersion::CURRENT,
            "3.2",
        )
        .with_timestamp(1_700_000_000_000);

        assert_eq!(
            metadata.preamble(),
            "const __VUE_LYNX_BUNDLE__ = {\"type\":\"vue-lynx\",\"version\":\"1.0\",\"engine\":\"3.2\",\
             \"platform\":\"ios\",\"format\":\"vue\",\"entry\":\"main\",\"timestamp\":1700000000000};\n\
             if (typeof __LYNX_SET_BUNDLE_FORMAT__ === 'function') { __LYNX_SET_BUNDLE_FORMAT__(__VUE_LYNX_BUNDLE__); }\n"
        );
    }

    #[test]
    fn test_timestamp_defaults_to_now() {
        let metadata = BundleMetadata::new(
            "main",
            Platform::Web,
            ContentFormat::PlainJs,
            FormatVersion::CURRENT,
            "3.2",
        );
        assert!(metadata.timestamp > 1_600_000_000_000);
        assert_eq!(metadata.format, "js");
    }
}
