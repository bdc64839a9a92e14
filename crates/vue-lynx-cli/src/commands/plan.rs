//! `vue-lynx plan`: show the thread layer of every module.

use crate::commands::load_config;
use crate::output::StyledOutput;
use anyhow::bail;
use std::path::{Path, PathBuf};
use vue_lynx_partition::{collect_modules, Layer, Plan};

/// Modules scanned when no pattern is given
const DEFAULT_PATTERNS: &[&str] = &[
    "src/**/*.vue",
    "src/**/*.ts",
    "src/**/*.tsx",
    "src/**/*.js",
    "src/**/*.jsx",
];

pub fn execute(
    out: &mut StyledOutput,
    config_path: &Path,
    root: Option<PathBuf>,
    patterns: Vec<String>,
    json: bool,
) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let root = root.unwrap_or_else(|| {
        if config.base_dir.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            config.base_dir.clone()
        }
    });
    let patterns = if patterns.is_empty() {
        DEFAULT_PATTERNS.iter().map(|p| p.to_string()).collect()
    } else {
        patterns
    };

    let modules = collect_modules(&root, &patterns)?;
    let plan = config.partitioner()?.plan(&modules);

    if json {
        out.line(&serde_json::to_string_pretty(&plan)?);
    } else {
        print_plan(out, &plan);
    }

    if !plan.is_ok() {
        bail!(
            "{} background-only import(s) from main-thread modules",
            plan.violations.len()
        );
    }
    Ok(())
}

fn print_plan(out: &mut StyledOutput, plan: &Plan) {
    for decision in &plan.decisions {
        match decision.layer {
            Layer::MainThread => out.info(&format!("{:<12}", decision.layer)),
            Layer::Background => out.success(&format!("{:<12}", decision.layer)),
        }
        out.plain(&decision.path);
        out.line(&format!("  ({})", decision.origin));
    }
    for violation in &plan.violations {
        out.warning("forbidden   ");
        out.line(&violation.to_string());
    }
    out.newline();
    out.line(&format!(
        "{} module(s): {} main-thread, {} background",
        plan.decisions.len(),
        plan.modules_in(Layer::MainThread).count(),
        plan.modules_in(Layer::Background).count()
    ));
}
