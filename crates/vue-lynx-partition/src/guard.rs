//! Background-only import guard
//!
//! Importing the `background-only` specifier marks a module as unusable on
//! the main thread. Background issuers get an empty module; main-thread
//! issuers are a build error.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;
use vue_lynx_thread::Layer;

/// Sentinel specifier
pub const BACKGROUND_ONLY: &str = "background-only";

static IMPORT_SPECIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)(?:^|[^\w$.])(?:import|export)\s*(?:[\w$*{}\s,]+\s*from\s*)?['"]([^'"\n]+)['"]|(?:^|[^\w$.])(?:require|import)\s*\(\s*['"]([^'"\n]+)['"]\s*\)"#,
    )
    .expect("import pattern is valid")
});

/// How an import of a guarded specifier resolves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardResolution {
    /// Replaced by an empty module
    Empty,
    /// Not allowed from this layer
    Forbidden,
    /// Not a guarded specifier
    NotGuarded,
}

/// Resolve `specifier` imported from a module on `issuer`
pub fn resolve_guard(specifier: &str, issuer: Layer) -> GuardResolution {
    if specifier != BACKGROUND_ONLY {
        return GuardResolution::NotGuarded;
    }
    match issuer {
        Layer::Background => GuardResolution::Empty,
        Layer::MainThread => GuardResolution::Forbidden,
    }
}

/// A main-thread module importing a background-only specifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardViolation {
    /// Offending module
    pub module: String,
    /// Specifier it imports
    pub specifier: String,
}

impl fmt::Display for GuardViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: '{}' cannot be imported from the main thread",
            self.module, self.specifier
        )
    }
}

/// Static import, re-export, `require` and dynamic `import` specifiers
pub fn scan_imports(source: &str) -> Vec<String> {
    IMPORT_SPECIFIER
        .captures_iter(source)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Guard violations for one module on `layer`
pub fn check_module(path: &str, source: &str, layer: Layer) -> Vec<GuardViolation> {
    scan_imports(source)
        .into_iter()
        .filter(|specifier| resolve_guard(specifier, layer) == GuardResolution::Forbidden)
        .map(|specifier| GuardViolation {
            module: path.to_string(),
            specifier,
        })
        .collect()
}
