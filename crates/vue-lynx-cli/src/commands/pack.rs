//! `vue-lynx pack`: assemble bundle artifacts from build output.

use crate::commands::load_config;
use crate::output::StyledOutput;
use std::path::Path;
use vue_lynx_pack::{pack_all, watch, AssembleReport, PackOptions};

pub fn execute(
    out: &mut StyledOutput,
    config_path: &Path,
    options: &PackOptions,
    watch_mode: bool,
) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    if !watch_mode {
        let reports = pack_all(&config, options)?;
        print_reports(out, &reports);
        return Ok(());
    }

    out.info("Watching for changes. Press Ctrl+C to stop.");
    out.newline();
    watch(&config, options, |result| match result {
        Ok(count) => {
            out.success("Packed");
            out.line(&format!(" {} artifact(s)", count));
        }
        Err(e) => out.error_line(&format!("Error: {}", e)),
    })?;
    Ok(())
}

fn print_reports(out: &mut StyledOutput, reports: &[AssembleReport]) {
    for report in reports {
        out.success("Packed ");
        out.plain(&report.path.display().to_string());
        out.line(&format!(
            "  ({} bytes, md5 {})",
            report.header.artifact_len(),
            report.header.digest_hex()
        ));
        if let Some(backup) = &report.backup {
            out.line(&format!("  backup: {}", backup.display()));
        }
        if let Some(manifest) = &report.manifest {
            out.line(&format!("  manifest: {}", manifest.display()));
        }
    }
    out.flush();
}
