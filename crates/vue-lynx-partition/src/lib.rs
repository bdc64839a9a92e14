//! Vue Lynx Module Partitioner
//!
//! Decides, for every module of an application, whether it runs on the
//! Lynx main thread or on the background thread, and prepares entry
//! modules with the runtime bootstrap each layer needs.
//!
//! # Example
//!
//! ```
//! use vue_lynx_partition::{Layer, Partitioner};
//!
//! let partitioner = Partitioner::default();
//! assert_eq!(partitioner.classify("src/store/cart.ts"), Layer::Background);
//! assert_eq!(partitioner.classify("src/components/Cart.vue"), Layer::MainThread);
//! ```

#![warn(rust_2018_idioms)]

pub mod directive;
pub mod entry;
pub mod glue;
pub mod guard;
pub mod partitioner;
pub mod rules;

pub use directive::{detect_directive, prologue_end};
pub use entry::{expand_entries, EntryPoint, EntrySpec};
pub use glue::{inject_entry_glue, GlueOptions, SyncTiming, GLUE_SENTINEL};
pub use guard::{resolve_guard, scan_imports, GuardResolution, GuardViolation, BACKGROUND_ONLY};
pub use partitioner::{collect_modules, Decision, ModuleSource, Origin, Partitioner, Plan};
pub use rules::{Assignment, LayerRule, RuleSet};
pub use vue_lynx_thread::Layer;

use thiserror::Error;

/// Errors raised while configuring or feeding the partitioner
#[derive(Debug, Error)]
pub enum PartitionError {
    /// A rule's pattern is not a valid regular expression
    #[error("Invalid pattern for rule `{name}`: {source}")]
    InvalidPattern {
        /// Rule name
        name: String,
        /// Underlying regex error
        #[source]
        source: regex::Error,
    },

    /// A rule without a name
    #[error("Rule names cannot be empty")]
    EmptyRuleName,

    /// A module glob could not be parsed
    #[error("Invalid module pattern: {0}")]
    Glob(#[from] glob::PatternError),

    /// An entry module already pins itself to the other layer
    #[error("Entry declares the {declared} layer but is being prepared for {requested}")]
    ConflictingDirective {
        /// Layer named by the module's own directive
        declared: Layer,
        /// Layer the glue was requested for
        requested: Layer,
    },

    /// A module could not be read
    #[error("Failed to read module {path}: {source}")]
    Io {
        /// Module path
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}
