//! Configuration-driven packing

use crate::assemble::{assemble, AssembleError, AssembleOptions, AssembleReport};
use crate::config::{ArtifactConfig, BuildConfig};
use crate::metadata::BundleMetadata;
use std::path::PathBuf;
use thiserror::Error;
use vue_lynx_partition::GlueOptions;

/// Errors raised while packing from configuration
#[derive(Debug, Error)]
pub enum PackError {
    /// No artifact with the requested name
    #[error("No artifact named `{0}` in the configuration")]
    UnknownArtifact(String),

    /// The configuration declares no artifacts
    #[error("No artifacts configured")]
    NothingToPack,

    /// Assembly failed
    #[error(transparent)]
    Assemble(#[from] AssembleError),

    /// The configuration is inconsistent
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}

/// Packing switches that do not belong in the configuration file
#[derive(Debug, Clone, Default)]
pub struct PackOptions {
    /// Only pack this artifact
    pub only: Option<String>,
    /// Write sidecar manifests
    pub write_manifest: bool,
    /// Skip `.backup` copies
    pub no_backup: bool,
}

/// Everything needed to assemble one configured artifact
#[derive(Debug, Clone)]
pub struct ArtifactJob {
    /// Artifact name
    pub name: String,
    /// Resolved chunk paths
    pub chunks: Vec<PathBuf>,
    /// Payload descriptor
    pub metadata: BundleMetadata,
    /// Output settings
    pub options: AssembleOptions,
}

impl ArtifactJob {
    /// Resolve an artifact against its configuration
    pub fn from_config(
        config: &BuildConfig,
        artifact: &ArtifactConfig,
        pack: &PackOptions,
    ) -> Result<Self, PackError> {
        let platform = artifact.platform.unwrap_or(config.build.platform);
        let format_version = config.format_version()?;

        let entry_glue = match &artifact.entry {
            Some(name) => {
                let point = config.entry_point(name).ok_or_else(|| {
                    crate::config::ConfigError::ValidationError(format!(
                        "Artifact `{}` refers to unknown entry `{}`",
                        artifact.name, name
                    ))
                })?;
                Some(
                    GlueOptions::new(point.name, point.layer)
                        .with_timing(config.build.first_screen_sync_timing),
                )
            }
            None => None,
        };

        let metadata = BundleMetadata::new(
            artifact.entry.as_deref().unwrap_or(&artifact.name),
            platform,
            artifact.content_format,
            format_version,
            config.build.engine_version.as_str(),
        );

        let options = AssembleOptions {
            output: config.output_path(artifact),
            platform,
            content_format: artifact.content_format,
            format_version,
            entry_glue,
            backup: !pack.no_backup,
            write_manifest: pack.write_manifest,
        };

        Ok(Self {
            name: artifact.name.clone(),
            chunks: artifact.chunks.iter().map(|c| config.resolve(c)).collect(),
            metadata,
            options,
        })
    }

    /// Assemble this artifact
    pub fn run(&self) -> Result<AssembleReport, AssembleError> {
        assemble(&self.chunks, &self.metadata, &self.options)
    }
}

/// Resolve the artifacts selected by `pack`
pub fn plan_jobs(config: &BuildConfig, pack: &PackOptions) -> Result<Vec<ArtifactJob>, PackError> {
    if config.artifacts.is_empty() {
        return Err(PackError::NothingToPack);
    }
    let selected: Vec<&ArtifactConfig> = match &pack.only {
        Some(name) => vec![config
            .artifact(name)
            .ok_or_else(|| PackError::UnknownArtifact(name.clone()))?],
        None => config.artifacts.iter().collect(),
    };
    selected
        .into_iter()
        .map(|artifact| ArtifactJob::from_config(config, artifact, pack))
        .collect()
}

/// Assemble every selected artifact, stopping at the first failure
pub fn pack_all(config: &BuildConfig, pack: &PackOptions) -> Result<Vec<AssembleReport>, PackError> {
    let jobs = plan_jobs(config, pack)?;
    let mut reports = Vec::with_capacity(jobs.len());
    for job in &jobs {
        tracing::debug!(artifact = %job.name, chunks = job.chunks.len(), "assembling");
        reports.push(job.run()?);
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
[build]
platform = "android"

[entries.main]
main-thread = "src/ui.ts"
background = "src/logic.ts"

[[artifacts]]
name = "main"
entry = "main-background"
chunks = ["build/background.js"]
platform = "ios"

[[artifacts]]
name = "ui"
chunks = ["build/ui.js", "build/vendor.js"]
content-format = "plain-js"
"#;

    #[test]
    fn test_jobs_resolve_configuration() {
        let mut config = BuildConfig::from_str(CONFIG).unwrap();
        config.base_dir = PathBuf::from("/app");
        let jobs = plan_jobs(&config, &PackOptions::default()).unwrap();
        assert_eq!(jobs.len(), 2);

        let main = &jobs[0];
        assert_eq!(main.options.platform, vue_lynx_bundle::Platform::Ios);
        assert_eq!(main.metadata.entry, "main-background");
        let glue = main.options.entry_glue.as_ref().unwrap();
        assert_eq!(glue.layer, vue_lynx_partition::Layer::Background);
        assert_eq!(main.options.output, PathBuf::from("/app/dist/main.lynx.bundle"));

        let ui = &jobs[1];
        assert_eq!(ui.options.platform, vue_lynx_bundle::Platform::Android);
        assert_eq!(ui.metadata.format, "js");
        assert!(ui.options.entry_glue.is_none());
        assert_eq!(
            ui.chunks,
            vec![PathBuf::from("/app/build/ui.js"), PathBuf::from("/app/build/vendor.js")]
        );
    }

    #[test]
    fn test_selecting_unknown_artifact() {
        let config = BuildConfig::from_str(CONFIG).unwrap();
        let pack = PackOptions {
            only: Some("nope".into()),
            ..PackOptions::default()
        };
        assert!(matches!(plan_jobs(&config, &pack), Err(PackError::UnknownArtifact(_))));
        assert!(matches!(
            plan_jobs(&BuildConfig::default(), &PackOptions::default()),
            Err(PackError::NothingToPack)
        ));
    }
}
