//! `vue-lynx glue`: prepend the runtime bootstrap to an entry module.

use crate::output::StyledOutput;
use anyhow::{anyhow, Context};
use std::path::Path;
use vue_lynx_partition::{inject_entry_glue, GlueOptions, Layer, SyncTiming};

pub fn execute(
    out: &mut StyledOutput,
    file: &Path,
    entry: &str,
    layer: &str,
    timing: &str,
    in_place: bool,
) -> anyhow::Result<()> {
    let layer: Layer = layer.parse().map_err(|e: String| anyhow!(e))?;
    let timing: SyncTiming = timing.parse().map_err(|e: String| anyhow!(e))?;
    let source = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let options = GlueOptions::new(entry, layer).with_timing(timing);
    let glued = inject_entry_glue(&source, &options)
        .with_context(|| format!("Failed to prepare {}", file.display()))?;

    if in_place {
        if glued != source {
            std::fs::write(file, &glued)
                .with_context(|| format!("Failed to write {}", file.display()))?;
            tracing::info!(path = %file.display(), entry, layer = %layer, "entry glue injected");
        }
    } else {
        out.raw(glued.as_bytes());
    }
    Ok(())
}
