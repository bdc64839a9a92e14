//! Subcommand implementations

pub mod glue;
pub mod inspect;
pub mod pack;
pub mod plan;
pub mod serve;

use std::path::Path;
use vue_lynx_pack::BuildConfig;

/// Load `path`, or fall back to defaults when it does not exist
pub fn load_config(path: &Path) -> anyhow::Result<BuildConfig> {
    if path.exists() {
        Ok(BuildConfig::from_file(path)?)
    } else {
        tracing::info!(path = %path.display(), "no configuration file, using defaults");
        Ok(BuildConfig::default())
    }
}
