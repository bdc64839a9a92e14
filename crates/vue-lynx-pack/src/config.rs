//! Build configuration (vue-lynx.toml)
//!
//! ```toml
//! [build]
//! platform = "ios"
//! first-screen-sync-timing = "immediately"
//! out-dir = "dist"
//! filename = "[name].lynx.bundle"
//!
//! [entries]
//! main = "src/main.ts"
//!
//! [[rules]]
//! name = "ui"
//! layer = "main-thread"
//! pattern = "(^|/)components/"
//!
//! [[artifacts]]
//! name = "main"
//! entry = "main"
//! chunks = ["build/main.js"]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use vue_lynx_bundle::{ContentFormat, FormatVersion, Platform};
use vue_lynx_partition::{
    expand_entries, EntryPoint, EntrySpec, Layer, LayerRule, PartitionError, Partitioner, RuleSet,
    SyncTiming,
};

/// Conventional manifest file name
pub const CONFIG_FILE: &str = "vue-lynx.toml";

/// Errors that can occur while loading a build configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML, including unknown enumerated values
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Semantic validation failed
    #[error("Invalid config: {0}")]
    ValidationError(String),

    /// A classification rule does not compile
    #[error("Invalid rule: {0}")]
    Rule(#[from] PartitionError),
}

/// Build configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Global build settings
    #[serde(default)]
    pub build: BuildSection,

    /// Entry points by name
    #[serde(default)]
    pub entries: BTreeMap<String, EntrySpec>,

    /// Path classification rules in priority order
    #[serde(default)]
    pub rules: Vec<RuleConfig>,

    /// Artifacts to assemble
    #[serde(default)]
    pub artifacts: Vec<ArtifactConfig>,

    /// Directory relative paths resolve against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// `[build]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BuildSection {
    /// Target platform
    #[serde(default)]
    pub platform: Platform,

    /// First-screen synchronization policy
    #[serde(default)]
    pub first_screen_sync_timing: SyncTiming,

    /// Layer for modules no rule matches
    #[serde(default = "default_layer")]
    pub default_layer: Layer,

    /// Output directory
    #[serde(default = "default_out_dir")]
    pub out_dir: String,

    /// Artifact file name pattern; `[name]` is replaced by the artifact name
    #[serde(default = "default_filename")]
    pub filename: String,

    /// Lynx engine version recorded in bundle metadata
    #[serde(default = "default_engine_version")]
    pub engine_version: String,

    /// Container format version
    #[serde(default = "default_format_version")]
    pub format_version: String,

    /// Keys this version does not understand
    #[serde(flatten)]
    pub unknown: BTreeMap<String, toml::Value>,
}

fn default_layer() -> Layer {
    Layer::MainThread
}

fn default_out_dir() -> String {
    "dist".to_string()
}

fn default_filename() -> String {
    "[name].lynx.bundle".to_string()
}

fn default_engine_version() -> String {
    "3.2".to_string()
}

fn default_format_version() -> String {
    FormatVersion::CURRENT.to_string()
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            platform: Platform::default(),
            first_screen_sync_timing: SyncTiming::default(),
            default_layer: default_layer(),
            out_dir: default_out_dir(),
            filename: default_filename(),
            engine_version: default_engine_version(),
            format_version: default_format_version(),
            unknown: BTreeMap::new(),
        }
    }
}

/// `[[rules]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Rule name
    pub name: String,
    /// Layer assigned on match
    pub layer: Layer,
    /// Regular expression over the normalized module path
    pub pattern: String,
}

/// `[[artifacts]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ArtifactConfig {
    /// Artifact name, substituted into the file name pattern
    pub name: String,

    /// Expanded entry point whose bootstrap is injected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,

    /// Built chunks, concatenated in order
    pub chunks: Vec<String>,

    /// Platform override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,

    /// Payload content format
    #[serde(default)]
    pub content_format: ContentFormat,
}

impl BuildConfig {
    /// Parse a configuration file; relative paths resolve against its directory
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_str(&content)?;
        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(config)
    }

    /// Parse a configuration from a string
    ///
    /// Unknown keys in `[build]` are logged and ignored.
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: BuildConfig = toml::from_str(content)?;
        for key in config.build.unknown.keys() {
            tracing::warn!(key = %key, "unknown key in [build]");
        }
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let version = self.format_version()?;
        if !version.is_supported() {
            return Err(ConfigError::ValidationError(format!(
                "Unsupported format version: {}",
                version
            )));
        }

        if self.build.out_dir.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "out-dir cannot be empty".to_string(),
            ));
        }

        if self.artifacts.len() > 1 && !self.build.filename.contains("[name]") {
            return Err(ConfigError::ValidationError(format!(
                "filename `{}` must contain [name] when more than one artifact is configured",
                self.build.filename
            )));
        }

        let entry_names: Vec<String> = self.entry_points().into_iter().map(|e| e.name).collect();
        let mut seen = Vec::new();
        for artifact in &self.artifacts {
            if !is_valid_artifact_name(&artifact.name) {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid artifact name: `{}`. Use letters, digits, '-', '_' and '.'",
                    artifact.name
                )));
            }
            if seen.contains(&artifact.name) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate artifact: {}",
                    artifact.name
                )));
            }
            seen.push(artifact.name.clone());

            if artifact.chunks.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "Artifact `{}` has no chunks",
                    artifact.name
                )));
            }
            if let Some(entry) = &artifact.entry {
                if !entry_names.contains(entry) {
                    return Err(ConfigError::ValidationError(format!(
                        "Artifact `{}` refers to unknown entry `{}`",
                        artifact.name, entry
                    )));
                }
            }
        }

        self.rule_set()?;
        Ok(())
    }

    /// Parsed container format version
    pub fn format_version(&self) -> Result<FormatVersion, ConfigError> {
        self.build
            .format_version
            .parse()
            .map_err(ConfigError::ValidationError)
    }

    /// Compiled classification rules; the default set when none are configured
    pub fn rule_set(&self) -> Result<RuleSet, ConfigError> {
        if self.rules.is_empty() {
            return Ok(RuleSet::default());
        }
        let rules = self
            .rules
            .iter()
            .map(|rule| LayerRule::new(rule.name.as_str(), rule.layer, &rule.pattern))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RuleSet::new(rules))
    }

    /// Partitioner configured from rules and the default layer
    pub fn partitioner(&self) -> Result<Partitioner, ConfigError> {
        Ok(Partitioner::new(self.rule_set()?, self.build.default_layer))
    }

    /// Entry points after expansion
    pub fn entry_points(&self) -> Vec<EntryPoint> {
        expand_entries(&self.entries)
    }

    /// Look up an expanded entry point by name
    pub fn entry_point(&self, name: &str) -> Option<EntryPoint> {
        self.entry_points().into_iter().find(|e| e.name == name)
    }

    /// Look up an artifact by name
    pub fn artifact(&self, name: &str) -> Option<&ArtifactConfig> {
        self.artifacts.iter().find(|a| a.name == name)
    }

    /// Resolve a configured path against the manifest directory
    pub fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Output directory
    pub fn out_dir(&self) -> PathBuf {
        self.resolve(&self.build.out_dir)
    }

    /// Output path for an artifact
    pub fn output_path(&self, artifact: &ArtifactConfig) -> PathBuf {
        self.out_dir()
            .join(self.build.filename.replace("[name]", &artifact.name))
    }
}

fn is_valid_artifact_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BuildConfig::from_str("").unwrap();
        assert_eq!(config.build.platform, Platform::Unspecified);
        assert_eq!(config.build.first_screen_sync_timing, SyncTiming::AfterReady);
        assert_eq!(config.build.default_layer, Layer::MainThread);
        assert_eq!(config.build.filename, "[name].lynx.bundle");
        assert_eq!(config.format_version().unwrap(), FormatVersion::CURRENT);
        assert_eq!(config.rule_set().unwrap().rules().len(), 2);
    }

    #[test]
    fn test_unknown_build_keys_are_not_fatal() {
        let config = BuildConfig::from_str("[build]\nenable-css-selector = true\n").unwrap();
        assert!(config.build.unknown.contains_key("enable-css-selector"));
    }

    #[test]
    fn test_invalid_enumerations_are_errors() {
        assert!(matches!(
            BuildConfig::from_str("[build]\nplatform = \"symbian\"\n"),
            Err(ConfigError::ParseError(_))
        ));
        assert!(matches!(
            BuildConfig::from_str("[build]\nfirst-screen-sync-timing = \"later\"\n"),
            Err(ConfigError::ParseError(_))
        ));
        assert!(matches!(
            BuildConfig::from_str("[build]\nformat-version = \"2.0\"\n"),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_legacy_timing_spelling() {
        let config = BuildConfig::from_str("[build]\nfirst-screen-sync-timing = \"jsReady\"\n").unwrap();
        assert_eq!(config.build.first_screen_sync_timing, SyncTiming::AfterReady);
    }

    #[test]
    fn test_artifact_validation() {
        let err = BuildConfig::from_str(
            "[[artifacts]]\nname = \"../evil\"\nchunks = [\"a.js\"]\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("Invalid artifact name"));

        let err = BuildConfig::from_str("[[artifacts]]\nname = \"main\"\nchunks = []\n").unwrap_err();
        assert!(err.to_string().contains("no chunks"));

        let err = BuildConfig::from_str(
            "[[artifacts]]\nname = \"main\"\nentry = \"nope\"\nchunks = [\"a.js\"]\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown entry"));

        let err = BuildConfig::from_str(
            "[build]\nfilename = \"app.bundle\"\n\
             [[artifacts]]\nname = \"a\"\nchunks = [\"a.js\"]\n\
             [[artifacts]]\nname = \"b\"\nchunks = [\"b.js\"]\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("[name]"));
    }

    #[test]
    fn test_bad_rule_pattern() {
        let err = BuildConfig::from_str(
            "[[rules]]\nname = \"broken\"\nlayer = \"background\"\npattern = \"(\"\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Rule(_)));
    }

    #[test]
    fn test_paths_resolve_against_manifest_dir() {
        let mut config = BuildConfig::from_str(
            "[build]\nout-dir = \"out\"\n[[artifacts]]\nname = \"main\"\nchunks = [\"a.js\"]\n",
        )
        .unwrap();
        config.base_dir = PathBuf::from("/project");
        assert_eq!(config.resolve("build/a.js"), PathBuf::from("/project/build/a.js"));
        assert_eq!(
            config.output_path(&config.artifacts[0]),
            PathBuf::from("/project/out/main.lynx.bundle")
        );
    }
}
