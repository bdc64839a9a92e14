//! Layer assignment for a whole module set

use crate::directive::detect_directive;
use crate::guard::{check_module, GuardViolation};
use crate::rules::{normalize_path, Assignment, RuleSet};
use crate::PartitionError;
use rayon::prelude::*;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use vue_lynx_thread::Layer;

/// A module to classify
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSource {
    /// Module path, relative to the project root
    pub path: String,
    /// Source text
    pub source: String,
}

impl ModuleSource {
    /// Pair a path with its source
    pub fn new(path: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            source: source.into(),
        }
    }
}

/// Why a module landed on its layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "kind", content = "rule")]
pub enum Origin {
    /// An explicit directive in the module
    Directive,
    /// The named path rule
    Rule(String),
    /// No rule matched; the default layer applied
    Fallback,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Directive => f.write_str("directive"),
            Origin::Rule(name) => write!(f, "rule `{}`", name),
            Origin::Fallback => f.write_str("fallback"),
        }
    }
}

/// Layer decision for one module
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    /// Normalized module path
    pub path: String,
    /// Assigned layer
    pub layer: Layer,
    /// Source of the decision
    pub origin: Origin,
    /// Whether path rules of both layers matched
    pub ambiguous: bool,
}

/// Result of planning a module set
#[derive(Debug, Clone, Default, Serialize)]
pub struct Plan {
    /// One decision per module, sorted by path
    pub decisions: Vec<Decision>,
    /// Background-only imports from main-thread modules
    pub violations: Vec<GuardViolation>,
}

impl Plan {
    /// Layer assigned to `path`
    pub fn layer_of(&self, path: &str) -> Option<Layer> {
        let path = normalize_path(path);
        self.decisions
            .binary_search_by(|d| d.path.cmp(&path))
            .ok()
            .map(|index| self.decisions[index].layer)
    }

    /// Paths assigned to `layer`, in path order
    pub fn modules_in(&self, layer: Layer) -> impl Iterator<Item = &str> + '_ {
        self.decisions
            .iter()
            .filter(move |d| d.layer == layer)
            .map(|d| d.path.as_str())
    }

    /// Whether the plan can be built
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Assigns modules to layers
///
/// Priority: an explicit directive, then the first matching path rule,
/// then the default layer.
#[derive(Debug, Clone)]
pub struct Partitioner {
    rules: RuleSet,
    default_layer: Layer,
}

impl Default for Partitioner {
    fn default() -> Self {
        Self::new(RuleSet::default(), Layer::MainThread)
    }
}

impl Partitioner {
    /// Create a partitioner
    pub fn new(rules: RuleSet, default_layer: Layer) -> Self {
        Self {
            rules,
            default_layer,
        }
    }

    /// Rules in priority order
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Layer for unmatched paths
    pub fn default_layer(&self) -> Layer {
        self.default_layer
    }

    /// Classify a module by its path alone
    pub fn classify(&self, path: &str) -> Layer {
        self.rules.assign(path).resolve(self.default_layer)
    }

    /// Classify a module by path and source
    ///
    /// Pure: no logging and no shared state, so it can run on any thread.
    pub fn decide(&self, path: &str, source: &str) -> Decision {
        let normalized = normalize_path(path);
        let ambiguous = self.rules.is_ambiguous(&normalized);

        let (layer, origin) = if let Some(layer) = detect_directive(source) {
            (layer, Origin::Directive)
        } else if let Some(rule) = self.rules.first_match(&normalized) {
            (rule.layer, Origin::Rule(rule.name.clone()))
        } else {
            (Assignment::Unassigned.resolve(self.default_layer), Origin::Fallback)
        };

        Decision {
            path: normalized,
            layer,
            origin,
            ambiguous,
        }
    }

    /// Classify every module in parallel and check background-only imports
    pub fn plan(&self, modules: &[ModuleSource]) -> Plan {
        let mut results: Vec<(Decision, Vec<GuardViolation>)> = modules
            .par_iter()
            .map(|module| {
                let decision = self.decide(&module.path, &module.source);
                let violations = check_module(&decision.path, &module.source, decision.layer);
                (decision, violations)
            })
            .collect();
        results.sort_by(|a, b| a.0.path.cmp(&b.0.path));

        let mut plan = Plan::default();
        for (decision, violations) in results {
            if decision.ambiguous {
                tracing::warn!(
                    path = %decision.path,
                    layer = %decision.layer,
                    origin = %decision.origin,
                    "module matches rules for both layers"
                );
            }
            if decision.origin == Origin::Fallback {
                tracing::warn!(
                    path = %decision.path,
                    layer = %decision.layer,
                    "no rule matched, using default layer"
                );
            } else {
                tracing::debug!(path = %decision.path, layer = %decision.layer, origin = %decision.origin, "classified");
            }
            for violation in &violations {
                tracing::error!(module = %violation.module, specifier = %violation.specifier, "background-only import on the main thread");
            }
            plan.violations.extend(violations);
            plan.decisions.push(decision);
        }
        tracing::info!(
            modules = plan.decisions.len(),
            background = plan.modules_in(Layer::Background).count(),
            violations = plan.violations.len(),
            "partition planned"
        );
        plan
    }
}

/// Read every file under `root` matching any of `patterns`
///
/// Paths in the result are relative to `root`, with forward slashes, and
/// sorted. A file matched by several patterns appears once.
pub fn collect_modules(root: &Path, patterns: &[String]) -> Result<Vec<ModuleSource>, PartitionError> {
    let mut paths = Vec::new();
    for pattern in patterns {
        let full = root.join(pattern);
        for path in glob::glob(&full.to_string_lossy())?.flatten() {
            if path.is_file() {
                paths.push(path);
            }
        }
    }
    paths.sort();
    paths.dedup();

    paths
        .into_iter()
        .map(|path| {
            let relative = path.strip_prefix(root).unwrap_or(&path);
            let display = normalize_path(&relative.to_string_lossy());
            let source = std::fs::read_to_string(&path).map_err(|source| PartitionError::Io {
                path: display.clone(),
                source,
            })?;
            Ok(ModuleSource::new(display, source))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive_overrides_rules() {
        let partitioner = Partitioner::default();
        let decision = partitioner.decide("src/components/Chart.vue", "'use background';\n");
        assert_eq!(decision.layer, Layer::Background);
        assert_eq!(decision.origin, Origin::Directive);

        let decision = partitioner.decide("src/store/ui.ts", "// @lynx-main-thread\n");
        assert_eq!(decision.layer, Layer::MainThread);
    }

    #[test]
    fn test_fallback_uses_configured_default() {
        let decision = Partitioner::default().decide("src/main.ts", "");
        assert_eq!(decision.layer, Layer::MainThread);
        assert_eq!(decision.origin, Origin::Fallback);

        let background = Partitioner::new(RuleSet::default(), Layer::Background);
        assert_eq!(background.classify("src/main.ts"), Layer::Background);
        assert_eq!(background.classify("src/views/a.vue"), Layer::MainThread);
    }

    #[test]
    fn test_classify_is_deterministic() {
        let partitioner = Partitioner::default();
        for path in ["src/store/cart.ts", "src/views/a.vue", "lib/x.js", "src/pages/api/x.ts"] {
            let first = partitioner.classify(path);
            for _ in 0..50 {
                assert_eq!(partitioner.classify(path), first);
            }
        }
    }

    #[test]
    fn test_plan_sorted_with_lookup() {
        let modules = vec![
            ModuleSource::new("src/store/cart.ts", ""),
            ModuleSource::new("src/App.vue", ""),
            ModuleSource::new("src/components/Cart.vue", ""),
        ];
        let plan = Partitioner::default().plan(&modules);
        let paths: Vec<_> = plan.decisions.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, vec!["src/App.vue", "src/components/Cart.vue", "src/store/cart.ts"]);
        assert_eq!(plan.layer_of("src/store/cart.ts"), Some(Layer::Background));
        assert_eq!(plan.layer_of("src/missing.ts"), None);
        assert_eq!(plan.modules_in(Layer::Background).collect::<Vec<_>>(), vec!["src/store/cart.ts"]);
        assert!(plan.is_ok());
    }

    #[test]
    fn test_plan_reports_guard_violations() {
        let modules = vec![
            ModuleSource::new("src/components/Leak.vue", "import 'background-only';"),
            ModuleSource::new("src/store/secret.ts", "import 'background-only';"),
        ];
        let plan = Partitioner::default().plan(&modules);
        assert!(!plan.is_ok());
        assert_eq!(plan.violations.len(), 1);
        assert_eq!(plan.violations[0].module, "src/components/Leak.vue");
    }
}
