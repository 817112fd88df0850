use std::collections::HashSet;
use std::path::Path;

use walkdir::WalkDir;

use crate::error::SyncError;
use crate::remote::{RemoteFileEntry, RemoteStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileEntry {
    pub name: String,
}

/// Remote file names missing locally, in remote listing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingDownloadSet {
    names: Vec<String>,
}

impl PendingDownloadSet {
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl IntoIterator for PendingDownloadSet {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.names.into_iter()
    }
}

/// Result of one listing/diff pass.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub remote_count: usize,
    pub local_count: usize,
    pub pending: PendingDownloadSet,
    pub in_sync: bool,
}

/// Case-insensitive check for the recognized data-file extension.
pub fn has_extension(name: &str, ext: &str) -> bool {
    match name.rsplit_once('.') {
        Some((stem, tail)) => !stem.is_empty() && tail.eq_ignore_ascii_case(ext),
        None => false,
    }
}

/// Compute the pending set: remote data files whose name is absent locally.
///
/// Pure name comparison; a local file with the same name is always treated as synchronized.
pub fn pending_downloads(
    remote: &[RemoteFileEntry],
    local: &[LocalFileEntry],
    ext: &str,
) -> PendingDownloadSet {
    let local_names: HashSet<&str> = local
        .iter()
        .filter(|l| has_extension(&l.name, ext))
        .map(|l| l.name.as_str())
        .collect();
    let mut seen = HashSet::new();
    let names = remote
        .iter()
        .filter(|r| r.is_file && has_extension(&r.name, ext))
        .filter(|r| !local_names.contains(r.name.as_str()))
        .filter(|r| seen.insert(r.name.as_str()))
        .map(|r| r.name.clone())
        .collect();
    PendingDownloadSet { names }
}

/// Non-recursive listing of regular files in the local directory. A missing directory is empty.
pub fn list_local(dir: &Path) -> Result<Vec<LocalFileEntry>, SyncError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry
            .map_err(|e| SyncError::LocalListFailed(dir.display().to_string(), e.to_string()))?;
        if entry.file_type().is_file() {
            out.push(LocalFileEntry { name: entry.file_name().to_string_lossy().to_string() });
        }
    }
    Ok(out)
}

/// List both sides and compute the pending downloads, logging the listing sizes.
pub fn reconcile<S: RemoteStore + ?Sized>(
    store: &S,
    remote_dir: &str,
    local_dir: &Path,
    ext: &str,
) -> Result<Reconciliation, SyncError> {
    let remote = store.list_dir(remote_dir)?;
    let local = list_local(local_dir)?;

    let remote_names: HashSet<&str> = remote
        .iter()
        .filter(|r| r.is_file && has_extension(&r.name, ext))
        .map(|r| r.name.as_str())
        .collect();
    let local_names: HashSet<&str> =
        local.iter().filter(|l| has_extension(&l.name, ext)).map(|l| l.name.as_str()).collect();

    tracing::info!(
        "Remote directory: {} {} file(s) | Local directory: {} {} file(s)",
        remote_names.len(),
        ext.to_uppercase(),
        local_names.len(),
        ext.to_uppercase()
    );

    let pending = pending_downloads(&remote, &local, ext);
    let in_sync = !remote_names.is_empty() && remote_names == local_names;
    if in_sync {
        tracing::info!("All {} files are already synchronized", ext.to_uppercase());
    } else if !pending.is_empty() {
        tracing::debug!("pending downloads: {:?}", pending.names());
    }
    Ok(Reconciliation {
        remote_count: remote_names.len(),
        local_count: local_names.len(),
        pending,
        in_sync,
    })
}
