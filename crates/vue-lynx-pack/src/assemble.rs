//! Artifact assembly
//!
//! Payload layout, in order:
//!
//! 1. metadata preamble
//! 2. entry bootstrap glue (optional)
//! 3. chunk bodies, in the configured order
//!
//! Every input is read before anything is written, so a missing chunk
//! leaves the output directory untouched. The artifact is written to a
//! temporary file and renamed into place, and an existing artifact is
//! copied to `<artifact>.backup` first.

use crate::metadata::BundleMetadata;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use vue_lynx_bundle::{
    decode, encode, BundleError, BundleHeader, ContentFormat, DecodedBundle, FormatVersion,
    Platform, MAGIC,
};
use vue_lynx_partition::glue::entry_prologue;
use vue_lynx_partition::GlueOptions;

/// Characters of payload shown in a sidecar manifest
pub const PREVIEW_CHARS: usize = 200;

/// Errors that can occur while assembling an artifact
#[derive(Debug, Error)]
pub enum AssembleError {
    /// An input chunk does not exist
    #[error("Missing input chunk: {}", .0.display())]
    MissingInput(PathBuf),

    /// Reading or writing a file failed
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// The codec refused the payload
    #[error("Encoding failed: {0}")]
    Codec(#[from] BundleError),

    /// The sidecar manifest could not be serialized
    #[error("Failed to write manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> AssembleError + '_ {
    move |source| AssembleError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// How one artifact is produced
#[derive(Debug, Clone)]
pub struct AssembleOptions {
    /// Artifact path
    pub output: PathBuf,
    /// Platform tag
    pub platform: Platform,
    /// Content format tag
    pub content_format: ContentFormat,
    /// Container version
    pub format_version: FormatVersion,
    /// Bootstrap injected between the preamble and the chunks
    pub entry_glue: Option<GlueOptions>,
    /// Copy an existing artifact to `<output>.backup` before replacing it
    pub backup: bool,
    /// Write a `<output>.json` sidecar describing the artifact
    pub write_manifest: bool,
}

impl AssembleOptions {
    /// Defaults for `output`: unspecified platform, Vue content, backups on
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            platform: Platform::Unspecified,
            content_format: ContentFormat::Vue,
            format_version: FormatVersion::CURRENT,
            entry_glue: None,
            backup: true,
            write_manifest: false,
        }
    }
}

/// Outcome of a successful assembly
#[derive(Debug, Clone)]
pub struct AssembleReport {
    /// Artifact path
    pub path: PathBuf,
    /// Previous artifact, if one was backed up
    pub backup: Option<PathBuf>,
    /// Sidecar manifest, if written
    pub manifest: Option<PathBuf>,
    /// Header written
    pub header: BundleHeader,
}

/// Build the payload from already-read chunks
pub fn build_payload(
    metadata: &BundleMetadata,
    entry_glue: Option<&GlueOptions>,
    chunks: &[Vec<u8>],
) -> Vec<u8> {
    let mut payload = metadata.preamble().into_bytes();
    if let Some(glue) = entry_glue {
        payload.extend_from_slice(entry_prologue(glue).as_bytes());
    }
    for chunk in chunks {
        payload.extend_from_slice(chunk);
        if !chunk.ends_with(b"\n") {
            payload.push(b'\n');
        }
    }
    payload
}

/// Read chunks, encode the artifact and write it
///
/// A missing chunk fails before any file is created.
pub fn assemble(
    chunks: &[PathBuf],
    metadata: &BundleMetadata,
    options: &AssembleOptions,
) -> Result<AssembleReport, AssembleError> {
    let mut contents = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        match fs::read(chunk) {
            Ok(bytes) => contents.push(bytes),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(AssembleError::MissingInput(chunk.clone()));
            }
            Err(err) => return Err(io_error(chunk)(err)),
        }
    }

    let payload = build_payload(metadata, options.entry_glue.as_ref(), &contents);
    let artifact = encode(
        &payload,
        options.platform,
        options.content_format,
        options.format_version,
    )?;
    let header = decode(&artifact)?.header;

    let output = &options.output;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }

    let backup = if options.backup && output.is_file() {
        let backup = sibling(output, ".backup");
        fs::copy(output, &backup).map_err(io_error(&backup))?;
        tracing::info!(path = %backup.display(), "backed up previous artifact");
        Some(backup)
    } else {
        None
    };

    write_atomic(output, &artifact)?;
    tracing::info!(
        path = %output.display(),
        bytes = artifact.len(),
        digest = %header.digest_hex(),
        "artifact written"
    );

    let manifest = if options.write_manifest {
        let path = sibling(output, ".json");
        let decoded = DecodedBundle {
            header: header.clone(),
            payload,
        };
        let json = serde_json::to_vec_pretty(&ArtifactManifest::describe(&decoded))?;
        write_atomic(&path, &json)?;
        Some(path)
    } else {
        None
    };

    Ok(AssembleReport {
        path: output.clone(),
        backup,
        manifest,
        header,
    })
}

/// Write `bytes` to a temporary sibling and rename it over `path`
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), AssembleError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{}.tmp", name));

    if let Err(err) = fs::write(&tmp, bytes) {
        let _ = fs::remove_file(&tmp);
        return Err(io_error(&tmp)(err));
    }
    if let Err(err) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(io_error(path)(err));
    }
    Ok(())
}

/// `path` with `suffix` appended to its file name
pub fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    path.with_file_name(name)
}

/// Sidecar description of an artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactManifest {
    /// Magic bytes as text
    pub magic: String,
    /// Container version
    pub version: String,
    /// Platform tag
    pub platform: Platform,
    /// Content format tag
    pub format: String,
    /// Payload length
    pub content_length: u32,
    /// Hex MD5 of the payload
    pub digest: String,
    /// Header plus payload
    pub total_size: usize,
    /// Leading characters of the payload
    pub preview: String,
}

impl ArtifactManifest {
    /// Describe a decoded artifact
    pub fn describe(bundle: &DecodedBundle) -> Self {
        let header = &bundle.header;
        let preview = String::from_utf8_lossy(&bundle.payload)
            .chars()
            .take(PREVIEW_CHARS)
            .collect();
        Self {
            magic: String::from_utf8_lossy(&MAGIC).into_owned(),
            version: header.format_version.to_string(),
            platform: header.platform,
            format: header.content_format.as_str().to_string(),
            content_length: header.content_length,
            digest: header.digest_hex(),
            total_size: header.artifact_len(),
            preview,
        }
    }
}
