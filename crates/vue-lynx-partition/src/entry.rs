//! Entry point expansion

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use vue_lynx_thread::Layer;

/// An entry as written in configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntrySpec {
    /// `main = "src/main.ts"`: one main-thread entry
    Single(String),
    /// `[entries.main]` with one import per key
    Split(BTreeMap<String, String>),
}

/// An entry point after expansion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryPoint {
    /// Chunk name
    pub name: String,
    /// Module to import
    pub import: String,
    /// Layer the entry runs on
    pub layer: Layer,
}

/// Expand configured entries into one entry point per layer import
///
/// A single entry keeps its name and runs on the main thread. A split
/// entry yields `<entry>-<key>` per key, on the background thread when
/// the key is `background` and on the main thread otherwise. Output is
/// ordered by entry name, then key.
pub fn expand_entries(entries: &BTreeMap<String, EntrySpec>) -> Vec<EntryPoint> {
    let mut points = Vec::new();
    for (name, spec) in entries {
        match spec {
            EntrySpec::Single(import) => points.push(EntryPoint {
                name: name.clone(),
                import: import.clone(),
                layer: Layer::MainThread,
            }),
            EntrySpec::Split(imports) => {
                for (key, import) in imports {
                    let layer = if key == "background" {
                        Layer::Background
                    } else {
                        Layer::MainThread
                    };
                    points.push(EntryPoint {
                        name: format!("{}-{}", name, key),
                        import: import.clone(),
                        layer,
                    });
                }
            }
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_entries() {
        let mut entries = BTreeMap::new();
        entries.insert("main".to_string(), EntrySpec::Single("src/main.ts".into()));
        entries.insert(
            "app".to_string(),
            EntrySpec::Split(BTreeMap::from([
                ("main-thread".to_string(), "src/app/ui.ts".to_string()),
                ("background".to_string(), "src/app/logic.ts".to_string()),
            ])),
        );

        let points = expand_entries(&entries);
        let summary: Vec<_> = points
            .iter()
            .map(|p| (p.name.as_str(), p.import.as_str(), p.layer))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("app-background", "src/app/logic.ts", Layer::Background),
                ("app-main-thread", "src/app/ui.ts", Layer::MainThread),
                ("main", "src/main.ts", Layer::MainThread),
            ]
        );
    }

    #[test]
    fn test_entry_spec_deserializes_both_shapes() {
        let single: EntrySpec = serde_json::from_str(r#""src/main.ts""#).unwrap();
        assert_eq!(single, EntrySpec::Single("src/main.ts".into()));
        let split: EntrySpec = serde_json::from_str(r#"{"background":"b.ts"}"#).unwrap();
        assert!(matches!(split, EntrySpec::Split(map) if map["background"] == "b.ts"));
    }
}
