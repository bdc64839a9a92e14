//! Entry bootstrap injection
//!
//! Each entry module receives its thread marker, a sentinel line and a
//! call to `initRuntime` carrying the entry's options. The bootstrap goes
//! right after the module's directive prologue, so `'use strict'` and
//! layer directives keep their meaning. The sentinel makes injection
//! idempotent.

use crate::directive::{detect_directive, prologue_end, thread_marker};
use crate::PartitionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use vue_lynx_thread::Layer;

/// Line marking a module that already carries entry glue
pub const GLUE_SENTINEL: &str = "// @vue-lynx-entry-glue";

/// Module the bootstrap imports `initRuntime` from
pub const RUNTIME_MODULE: &str = "@vue-lynx/runtime";

/// When the first screen is synchronized with the background thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SyncTiming {
    /// Render the first screen without waiting
    #[serde(rename = "immediately")]
    Immediately,
    /// Wait until the background script is ready
    #[default]
    #[serde(rename = "afterReady", alias = "jsReady")]
    AfterReady,
}

impl SyncTiming {
    /// Configuration spelling
    pub fn as_str(self) -> &'static str {
        match self {
            SyncTiming::Immediately => "immediately",
            SyncTiming::AfterReady => "afterReady",
        }
    }
}

impl fmt::Display for SyncTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncTiming {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "immediately" => Ok(SyncTiming::Immediately),
            "afterReady" | "jsReady" => Ok(SyncTiming::AfterReady),
            other => Err(format!(
                "invalid first-screen sync timing `{}` (expected immediately or afterReady)",
                other
            )),
        }
    }
}

/// Options forwarded to `initRuntime`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlueOptions {
    /// Entry name as configured
    pub entry_name: String,
    /// Layer the entry runs on
    pub layer: Layer,
    /// First-screen synchronization policy
    pub first_screen_sync_timing: SyncTiming,
}

impl GlueOptions {
    /// Options for `entry_name` on `layer` with the default timing
    pub fn new(entry_name: impl Into<String>, layer: Layer) -> Self {
        Self {
            entry_name: entry_name.into(),
            layer,
            first_screen_sync_timing: SyncTiming::default(),
        }
    }

    /// Override the sync timing
    pub fn with_timing(mut self, timing: SyncTiming) -> Self {
        self.first_screen_sync_timing = timing;
        self
    }
}

/// Whether `source` already carries entry glue
pub fn has_entry_glue(source: &str) -> bool {
    source.lines().any(|line| line.trim() == GLUE_SENTINEL)
}

/// The bootstrap prologue for an entry
pub fn entry_prologue(options: &GlueOptions) -> String {
    // JSON keeps entry names with quotes or backslashes from breaking out.
    let config = serde_json::to_string(options).unwrap_or_else(|_| "{}".to_string());
    format!(
        "{marker}\n{sentinel}\nimport {{ initRuntime }} from '{module}';\ninitRuntime({config});\n",
        marker = thread_marker(options.layer),
        sentinel = GLUE_SENTINEL,
        module = RUNTIME_MODULE,
        config = config,
    )
}

/// Insert the bootstrap prologue into an entry module
///
/// Returns `source` unchanged if it already carries glue. A module whose
/// own directive names the other layer is rejected, since the directive
/// would otherwise silently win over the requested layer.
pub fn inject_entry_glue(source: &str, options: &GlueOptions) -> Result<String, PartitionError> {
    if has_entry_glue(source) {
        return Ok(source.to_string());
    }
    if let Some(declared) = detect_directive(source) {
        if declared != options.layer {
            return Err(PartitionError::ConflictingDirective {
                declared,
                requested: options.layer,
            });
        }
    }

    let (head, tail) = source.split_at(prologue_end(source));
    let mut out = String::with_capacity(source.len() + 256);
    out.push_str(head);
    if !head.is_empty() && !head.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(&entry_prologue(options));
    out.push_str(tail.strip_prefix('\n').unwrap_or(tail));
    Ok(out)
}
