use std::path::Path;

use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher, recommended_watcher};

use crate::diff::has_extension;

/// Logs data files that show up in the local directory after start-up.
///
/// Purely informational: it never triggers downloads or ingestion. Dropping the value stops
/// the watch.
pub struct LocalObserver {
    _watcher: RecommendedWatcher,
}

impl LocalObserver {
    pub fn start(dir: &Path, ext: &str) -> notify::Result<Self> {
        Self::start_with(dir, ext, |name| tracing::info!("New file detected: {}", name))
    }

    /// Like [`LocalObserver::start`], handing each detected file name to `on_detect`.
    pub fn start_with<F>(dir: &Path, ext: &str, on_detect: F) -> notify::Result<Self>
    where
        F: Fn(String) + Send + 'static,
    {
        let ext = ext.to_string();
        let mut watcher = recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => detected_data_files(&event, &ext).into_iter().for_each(&on_detect),
            Err(e) => tracing::warn!("watch error: {}", e),
        })?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        tracing::info!("watching {}", dir.display());
        Ok(Self { _watcher: watcher })
    }
}

/// File names announced by a creation (or move-in) event that carry the data extension.
pub fn detected_data_files(event: &Event, ext: &str) -> Vec<String> {
    let arrived = matches!(
        event.kind,
        EventKind::Create(CreateKind::File)
            | EventKind::Create(CreateKind::Any)
            | EventKind::Modify(ModifyKind::Name(RenameMode::To))
    );
    if !arrived {
        return Vec::new();
    }
    event
        .paths
        .iter()
        .filter_map(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_string())
        .filter(|n| has_extension(n, ext))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn created_data_file_is_reported() {
        let ev = event(EventKind::Create(CreateKind::File), "/data/files/a.CSV");
        assert_eq!(detected_data_files(&ev, "csv"), vec!["a.CSV".to_string()]);
    }

    #[test]
    fn rename_into_directory_is_reported() {
        let ev = event(EventKind::Modify(ModifyKind::Name(RenameMode::To)), "files/b.csv");
        assert_eq!(detected_data_files(&ev, "csv"), vec!["b.csv".to_string()]);
    }

    #[test]
    fn other_events_and_extensions_are_ignored() {
        let removed = event(EventKind::Remove(notify::event::RemoveKind::File), "files/a.csv");
        assert!(detected_data_files(&removed, "csv").is_empty());
        let folder = event(EventKind::Create(CreateKind::Folder), "files/x.csv");
        assert!(detected_data_files(&folder, "csv").is_empty());
        let partial = event(EventKind::Create(CreateKind::File), "files/a.csv.part.42");
        assert!(detected_data_files(&partial, "csv").is_empty());
    }

    #[test]
    fn only_files_created_after_start_are_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("pre.csv"), "old").expect("write pre-existing");
        let (tx, rx) = crossbeam_channel::unbounded();
        let _observer = LocalObserver::start_with(dir.path(), "csv", move |name| {
            let _ = tx.send(name);
        })
        .expect("watch");

        std::fs::write(dir.path().join("new.csv"), "id\n1\n").expect("write new");
        std::fs::write(dir.path().join("notes.txt"), "x").expect("write other");

        let first = rx.recv_timeout(Duration::from_secs(5)).expect("new.csv reported");
        let mut seen = vec![first];
        while let Ok(name) = rx.recv_timeout(Duration::from_millis(200)) {
            seen.push(name);
        }
        assert!(seen.iter().all(|n| n == "new.csv"), "unexpected reports: {:?}", seen);
        assert!(!seen.iter().any(|n| n == "pre.csv"));
    }
}
