use std::io::Read;
use std::path::Path;

use crate::error::SyncError;

/// One entry of a remote directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFileEntry {
    pub name: String,
    pub is_file: bool,
}

impl RemoteFileEntry {
    pub fn file(name: impl Into<String>) -> Self {
        Self { name: name.into(), is_file: true }
    }

    pub fn dir(name: impl Into<String>) -> Self {
        Self { name: name.into(), is_file: false }
    }
}

/// Trait abstracting the SFTP operations used by the sync cycle, so tests can
/// inject an in-memory store. Every error is connection-class.
pub trait RemoteStore {
    fn list_dir(&self, dir: &str) -> Result<Vec<RemoteFileEntry>, SyncError>;
    fn open_read(&self, path: &str) -> Result<Box<dyn Read + '_>, SyncError>;
    /// Send a keep-alive if one is due; returns the seconds until the next one.
    fn keepalive(&self) -> Result<u32, SyncError>;
    /// Best-effort teardown before the store is dropped.
    fn close(&mut self) -> Result<(), SyncError>;
}

/// Opens fresh sessions. The connection manager owns one and calls it on every (re)connect.
pub trait Connector {
    type Store: RemoteStore;
    fn connect(&self) -> Result<Self::Store, SyncError>;
}

/// Adapter that owns an authenticated `ssh2::Session` with its SFTP channel.
pub struct Ssh2Store {
    pub(super) session: ssh2::Session,
    pub(super) sftp: ssh2::Sftp,
}

impl RemoteStore for Ssh2Store {
    fn list_dir(&self, dir: &str) -> Result<Vec<RemoteFileEntry>, SyncError> {
        let entries = self
            .sftp
            .readdir(Path::new(dir))
            .map_err(|e| SyncError::RemoteListFailed(dir.to_string(), e.to_string()))?;
        Ok(entries
            .into_iter()
            .filter_map(|(path, stat)| {
                let name = path.file_name()?.to_string_lossy().to_string();
                Some(RemoteFileEntry { name, is_file: stat.is_file() })
            })
            .collect())
    }

    fn open_read(&self, path: &str) -> Result<Box<dyn Read + '_>, SyncError> {
        match self.sftp.open(Path::new(path)) {
            Ok(f) => Ok(Box::new(f)),
            Err(e) => Err(SyncError::DownloadFailed(path.to_string(), e.to_string())),
        }
    }

    fn keepalive(&self) -> Result<u32, SyncError> {
        self.session.keepalive_send().map_err(|e| SyncError::KeepaliveFailed(e.to_string()))
    }

    fn close(&mut self) -> Result<(), SyncError> {
        self.session
            .disconnect(None, "sftpfeed reconnecting", None)
            .map_err(|e| SyncError::TeardownFailed(e.to_string()))
    }
}

/// Join a remote directory and file name with exactly one `/` between them.
pub fn remote_join(dir: &str, name: &str) -> String {
    let joined = format!("{}/{}", dir, name);
    let mut out = String::with_capacity(joined.len());
    for c in joined.chars() {
        if c == '/' && out.ends_with('/') {
            continue;
        }
        out.push(c);
    }
    out
}
