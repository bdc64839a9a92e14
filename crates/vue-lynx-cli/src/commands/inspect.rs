//! `vue-lynx inspect`: decode an artifact and print its header.

use crate::output::StyledOutput;
use anyhow::Context;
use std::path::Path;
use vue_lynx_bundle::decode;
use vue_lynx_pack::ArtifactManifest;

pub fn execute(out: &mut StyledOutput, file: &Path, json: bool) -> anyhow::Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let bundle = decode(&bytes).with_context(|| format!("{} is not a valid bundle", file.display()))?;
    let manifest = ArtifactManifest::describe(&bundle);

    if json {
        out.line(&serde_json::to_string_pretty(&manifest)?);
        return Ok(());
    }

    out.field("Magic", &manifest.magic);
    out.field("Version", &manifest.version);
    out.field("Platform", manifest.platform.as_str());
    out.field("Format", &manifest.format);
    out.field("Content length", &manifest.content_length.to_string());
    out.field("MD5", &manifest.digest);
    out.field("Total size", &manifest.total_size.to_string());
    out.newline();
    out.line(&manifest.preview);
    Ok(())
}
