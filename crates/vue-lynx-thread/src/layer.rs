//! Execution layers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logical thread a module or message belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Layer {
    /// UI / element operations
    MainThread,
    /// Application and business logic
    Background,
}

impl Layer {
    /// Wire and configuration spelling
    pub fn as_str(self) -> &'static str {
        match self {
            Layer::MainThread => "main-thread",
            Layer::Background => "background",
        }
    }

    /// The layer on the other side of the boundary
    pub fn peer(self) -> Layer {
        match self {
            Layer::MainThread => Layer::Background,
            Layer::Background => Layer::MainThread,
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Layer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "main-thread" | "main" => Ok(Layer::MainThread),
            "background" => Ok(Layer::Background),
            other => Err(format!(
                "unknown layer `{}` (expected main-thread or background)",
                other
            )),
        }
    }
}
