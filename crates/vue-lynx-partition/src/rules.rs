//! Path classification rules
//!
//! Rules are evaluated in declaration order and the first match wins.
//! Paths are normalized to forward slashes before matching, and anything
//! under a `node_modules` directory never matches a rule.

use crate::PartitionError;
use regex::Regex;
use vue_lynx_thread::Layer;

/// Rule assigning paths that match `pattern` to `layer`
#[derive(Debug, Clone)]
pub struct LayerRule {
    /// Name used in logs and plans
    pub name: String,
    /// Layer assigned on match
    pub layer: Layer,
    pattern: Regex,
}

impl LayerRule {
    /// Compile a rule
    pub fn new(name: impl Into<String>, layer: Layer, pattern: &str) -> Result<Self, PartitionError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(PartitionError::EmptyRuleName);
        }
        let pattern = Regex::new(pattern).map_err(|source| PartitionError::InvalidPattern {
            name: name.clone(),
            source,
        })?;
        Ok(Self {
            name,
            layer,
            pattern,
        })
    }

    /// Source text of the pattern
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Whether a normalized path matches
    pub fn matches(&self, path: &str) -> bool {
        self.pattern.is_match(path)
    }
}

/// Result of path-based classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Assignment {
    /// Matched a main-thread rule
    MainThread,
    /// Matched a background rule
    Background,
    /// No rule matched
    Unassigned,
}

impl Assignment {
    /// Concrete layer, using `default` for unassigned paths
    pub fn resolve(self, default: Layer) -> Layer {
        match self {
            Assignment::MainThread => Layer::MainThread,
            Assignment::Background => Layer::Background,
            Assignment::Unassigned => default,
        }
    }
}

impl From<Layer> for Assignment {
    fn from(layer: Layer) -> Self {
        match layer {
            Layer::MainThread => Assignment::MainThread,
            Layer::Background => Assignment::Background,
        }
    }
}

/// Ordered list of rules
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<LayerRule>,
}

impl Default for RuleSet {
    /// UI directories go to the main thread, data and service code to the
    /// background thread
    fn default() -> Self {
        let rules = [
            ("ui", Layer::MainThread, r"(^|/)(components|views|pages)(/|$)"),
            ("logic", Layer::Background, r"(^|/)(store|services|api)(/|$)"),
        ]
        .into_iter()
        .filter_map(|(name, layer, pattern)| LayerRule::new(name, layer, pattern).ok())
        .collect();
        Self { rules }
    }
}

impl RuleSet {
    /// Build a rule set from rules in priority order
    pub fn new(rules: Vec<LayerRule>) -> Self {
        Self { rules }
    }

    /// Compile `(name, layer, pattern)` triples in priority order
    pub fn from_patterns<'a, I>(patterns: I) -> Result<Self, PartitionError>
    where
        I: IntoIterator<Item = (&'a str, Layer, &'a str)>,
    {
        let rules = patterns
            .into_iter()
            .map(|(name, layer, pattern)| LayerRule::new(name, layer, pattern))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// Rules in priority order
    pub fn rules(&self) -> &[LayerRule] {
        &self.rules
    }

    /// First rule matching `path`
    pub fn first_match(&self, path: &str) -> Option<&LayerRule> {
        let path = normalize_path(path);
        if is_dependency(&path) {
            return None;
        }
        self.rules.iter().find(|rule| rule.matches(&path))
    }

    /// Classify a path by rules alone
    pub fn assign(&self, path: &str) -> Assignment {
        self.first_match(path)
            .map_or(Assignment::Unassigned, |rule| rule.layer.into())
    }

    /// Whether `path` matches rules for both layers
    pub fn is_ambiguous(&self, path: &str) -> bool {
        let path = normalize_path(path);
        if is_dependency(&path) {
            return false;
        }
        let mut matched = self.rules.iter().filter(|rule| rule.matches(&path));
        match matched.next() {
            Some(first) => matched.any(|rule| rule.layer != first.layer),
            None => false,
        }
    }
}

/// Forward-slash form of a module path
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

fn is_dependency(path: &str) -> bool {
    path.split('/').any(|segment| segment == "node_modules")
}
