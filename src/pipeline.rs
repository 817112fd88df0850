use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::diff::PendingDownloadSet;
use crate::error::SyncError;
use crate::ingest::Ingest;
use crate::remote::{RemoteStore, remote_join};
use crate::util::human_bytes;

const COPY_BUF_SIZE: usize = 256 * 1024;

/// Per-file result of the ingestion hand-off, kept only for logging and reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingOutcome {
    pub file_name: String,
    pub success: bool,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub downloaded: Vec<String>,
    /// Names that appeared locally between listing and rename; left untouched.
    pub skipped: Vec<String>,
    pub outcomes: Vec<ProcessingOutcome>,
}

impl BatchReport {
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.success).count()
    }
}

/// Create the local directory (and parents) when missing.
pub fn ensure_local_dir(dir: &Path) -> Result<(), SyncError> {
    if dir.is_dir() {
        return Ok(());
    }
    std::fs::create_dir_all(dir)
        .map_err(|e| SyncError::CreateLocalDirFailed(dir.display().to_string(), e.to_string()))?;
    tracing::info!("Created local directory: {}", dir.display());
    Ok(())
}

/// Download each pending file then hand it to `ingest`, strictly in order.
///
/// A failed ingestion is recorded and the batch moves on. A failed download aborts the batch
/// and is returned so the caller can reconnect; files not attempted are rediscovered next cycle.
pub fn dispatch<S, I>(
    store: &S,
    pending: PendingDownloadSet,
    remote_dir: &str,
    local_dir: &Path,
    ingest: &I,
) -> Result<BatchReport, SyncError>
where
    S: RemoteStore + ?Sized,
    I: Ingest + ?Sized,
{
    let mut report = BatchReport::default();
    for name in pending {
        ensure_local_dir(local_dir)?;
        remove_stale_parts(local_dir, &name);
        let remote_path = remote_join(remote_dir, &name);
        let local_path = local_dir.join(&name);

        tracing::info!("Downloading: {}", name);
        let bytes = match download_file(store, &remote_path, &local_path)? {
            Some(bytes) => bytes,
            None => {
                tracing::warn!("{} appeared locally during download, keeping existing file", name);
                report.skipped.push(name);
                continue;
            }
        };
        tracing::info!("Downloaded: {} ({})", name, human_bytes(bytes));
        report.downloaded.push(name.clone());

        tracing::info!("Processing file: {}", name);
        let outcome = match ingest.ingest(&local_path) {
            Ok(()) => {
                tracing::info!("File processed successfully: {}", name);
                ProcessingOutcome { file_name: name, success: true, detail: None }
            }
            Err(e) => {
                tracing::error!("Error processing file {}: {}", name, e);
                ProcessingOutcome { file_name: name, success: false, detail: Some(e.to_string()) }
            }
        };
        report.outcomes.push(outcome);
    }
    Ok(report)
}

/// Stream one remote file into `local_path` via a temporary `.part` file.
///
/// Returns `Ok(None)` when `local_path` already exists at rename time; existing files are never
/// overwritten.
pub fn download_file<S: RemoteStore + ?Sized>(
    store: &S,
    remote_path: &str,
    local_path: &Path,
) -> Result<Option<u64>, SyncError> {
    let reader = store.open_read(remote_path)?;
    let tmp_path = part_path(local_path);
    let bytes = copy_stream_with_cleanup(reader, &tmp_path, COPY_BUF_SIZE).map_err(|e| {
        tracing::debug!("stream error for {}: {:?}", remote_path, e);
        SyncError::DownloadFailed(remote_path.to_string(), e.to_string())
    })?;
    match rename_no_clobber(&tmp_path, local_path) {
        Ok(true) => Ok(Some(bytes)),
        Ok(false) => {
            let _ = std::fs::remove_file(&tmp_path);
            Ok(None)
        }
        Err(e) => {
            let _ = std::fs::remove_file(&tmp_path);
            Err(SyncError::LocalWriteFailed(local_path.display().to_string(), e.to_string()))
        }
    }
}

fn part_path(local_path: &Path) -> PathBuf {
    let file_name =
        local_path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    let tmp_name = format!("{}.part.{}", file_name, std::process::id());
    local_path.with_file_name(tmp_name)
}

/// Delete `<name>.part.<pid>` leftovers of interrupted runs. Best effort; failures are logged.
pub(crate) fn remove_stale_parts(local_dir: &Path, name: &str) -> usize {
    let prefix = format!("{}.part.", name);
    let mut removed = 0;
    for entry in WalkDir::new(local_dir).min_depth(1).max_depth(1).into_iter().flatten() {
        let file_name = entry.file_name().to_string_lossy();
        let is_part = file_name
            .strip_prefix(&prefix)
            .is_some_and(|pid| !pid.is_empty() && pid.chars().all(|c| c.is_ascii_digit()));
        if !is_part || !entry.file_type().is_file() {
            continue;
        }
        match std::fs::remove_file(entry.path()) {
            Ok(()) => {
                tracing::info!("Removed stale partial download: {}", file_name);
                removed += 1;
            }
            Err(e) => tracing::warn!("cannot remove {}: {}", entry.path().display(), e),
        }
    }
    removed
}

/// Copy from a reader into a tmp file; on any read/write/sync error remove the tmp and
/// return the io::Error.
pub(crate) fn copy_stream_with_cleanup<R: Read>(
    mut reader: R,
    tmp_path: &Path,
    buf_size: usize,
) -> Result<u64, std::io::Error> {
    let mut local_f = File::create(tmp_path)?;
    let mut buf = vec![0u8; buf_size];
    let mut total = 0u64;
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if let Err(e) = local_f.write_all(&buf[..n]) {
                    let _ = std::fs::remove_file(tmp_path);
                    return Err(e);
                }
                total += n as u64;
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                let _ = std::fs::remove_file(tmp_path);
                return Err(e);
            }
        }
    }
    if let Err(e) = local_f.sync_all() {
        let _ = std::fs::remove_file(tmp_path);
        return Err(e);
    }
    Ok(total)
}

/// Move `tmp_path` to `target` unless `target` already exists. Returns whether it moved.
pub(crate) fn rename_no_clobber(tmp_path: &Path, target: &Path) -> Result<bool, std::io::Error> {
    if target.exists() {
        return Ok(false);
    }
    match std::fs::hard_link(tmp_path, target) {
        Ok(()) => {
            let _ = std::fs::remove_file(tmp_path);
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        // filesystems without hard links: fall back to a plain rename after the check above
        Err(_) => std::fs::rename(tmp_path, target).map(|()| true),
    }
}
