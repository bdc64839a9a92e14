//! Re-pack on input changes

use crate::config::BuildConfig;
use crate::pack::{pack_all, PackError, PackOptions};
use notify::{recommended_watcher, Event, EventKind, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

/// Quiet period before a burst of events triggers a rebuild
pub const DEBOUNCE: Duration = Duration::from_millis(150);

/// Errors raised by the watcher itself
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The OS watcher failed
    #[error("File watcher error: {0}")]
    Notify(#[from] notify::Error),
}

/// Input and output paths of a configuration
#[derive(Debug, Clone, Default)]
pub struct WatchSet {
    inputs: BTreeSet<PathBuf>,
    outputs: BTreeSet<PathBuf>,
}

impl WatchSet {
    /// Chunks and artifacts of every configured artifact
    pub fn from_config(config: &BuildConfig) -> Self {
        let mut set = Self::default();
        for artifact in &config.artifacts {
            for chunk in &artifact.chunks {
                set.inputs.insert(config.resolve(chunk));
            }
            set.outputs.insert(config.output_path(artifact));
        }
        set
    }

    /// Directories to watch
    pub fn directories(&self) -> BTreeSet<PathBuf> {
        self.inputs
            .iter()
            .filter_map(|p| p.parent().map(Path::to_path_buf))
            .map(|p| if p.as_os_str().is_empty() { PathBuf::from(".") } else { p })
            .collect()
    }

    /// Whether an event should trigger a rebuild
    ///
    /// Only modifications of input chunks count; events on artifacts and
    /// their backups, sidecars and temporary files are ignored.
    pub fn is_relevant(&self, event: &Event) -> bool {
        if matches!(event.kind, EventKind::Access(_)) {
            return false;
        }
        event.paths.iter().any(|path| {
            let produced = self.outputs.iter().any(|out| {
                path == out
                    || path
                        .file_name()
                        .zip(out.file_name())
                        .is_some_and(|(name, out)| {
                            name.to_string_lossy().contains(out.to_string_lossy().as_ref())
                        })
            });
            !produced && self.inputs.iter().any(|input| paths_match(path, input))
        })
    }
}

fn paths_match(event_path: &Path, input: &Path) -> bool {
    if event_path == input {
        return true;
    }
    match (event_path.canonicalize(), input.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Pack once, then re-pack after every relevant change until the watcher
/// channel closes
///
/// Failed rebuilds are reported to `on_cycle` and do not stop watching.
pub fn watch<F>(config: &BuildConfig, options: &PackOptions, mut on_cycle: F) -> Result<(), WatchError>
where
    F: FnMut(Result<usize, PackError>),
{
    let set = WatchSet::from_config(config);
    let (tx, rx) = mpsc::channel::<notify::Result<Event>>();
    let mut watcher = recommended_watcher(move |event: notify::Result<Event>| {
        let _ = tx.send(event);
    })?;
    for dir in set.directories() {
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        tracing::debug!(dir = %dir.display(), "watching");
    }

    on_cycle(pack_all(config, options).map(|reports| reports.len()));

    while let Ok(event) = rx.recv() {
        let mut dirty = relevant(&set, event);
        // Coalesce the burst a single save usually produces.
        while let Ok(event) = rx.recv_timeout(DEBOUNCE) {
            dirty |= relevant(&set, event);
        }
        if dirty {
            tracing::info!("inputs changed, re-packing");
            on_cycle(pack_all(config, options).map(|reports| reports.len()));
        }
    }
    Ok(())
}

fn relevant(set: &WatchSet, event: notify::Result<Event>) -> bool {
    match event {
        Ok(event) => set.is_relevant(&event),
        Err(err) => {
            tracing::warn!(error = %err, "watch error");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind};

    fn config() -> BuildConfig {
        let mut config = BuildConfig::from_str(
            "[[artifacts]]\nname = \"main\"\nchunks = [\"build/main.js\"]\n",
        )
        .unwrap();
        config.base_dir = PathBuf::from("/app");
        config
    }

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn test_input_changes_are_relevant() {
        let set = WatchSet::from_config(&config());
        assert!(set.is_relevant(&event(
            EventKind::Modify(ModifyKind::Any),
            "/app/build/main.js"
        )));
        assert!(set.is_relevant(&event(
            EventKind::Create(CreateKind::File),
            "/app/build/main.js"
        )));
    }

    #[test]
    fn test_outputs_and_reads_are_ignored() {
        let set = WatchSet::from_config(&config());
        assert!(!set.is_relevant(&event(
            EventKind::Access(AccessKind::Any),
            "/app/build/main.js"
        )));
        assert!(!set.is_relevant(&event(
            EventKind::Modify(ModifyKind::Any),
            "/app/dist/main.lynx.bundle"
        )));
        assert!(!set.is_relevant(&event(
            EventKind::Modify(ModifyKind::Any),
            "/app/dist/.main.lynx.bundle.tmp"
        )));
        assert!(!set.is_relevant(&event(
            EventKind::Modify(ModifyKind::Any),
            "/app/build/other.js"
        )));
    }

    #[test]
    fn test_directories() {
        let set = WatchSet::from_config(&config());
        assert_eq!(
            set.directories().into_iter().collect::<Vec<_>>(),
            vec![PathBuf::from("/app/build")]
        );
    }
}
