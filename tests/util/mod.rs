#![allow(dead_code)]
//! In-memory SFTP stand-ins shared by the integration tests.

use std::collections::{HashMap, HashSet};
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use sftpfeed::SyncError;
use sftpfeed::engine::EngineSettings;
use sftpfeed::ingest::Ingest;
use sftpfeed::remote::{Connector, RemoteFileEntry, RemoteStore};

#[derive(Default)]
pub struct RemoteState {
    /// Files in listing order.
    pub files: Vec<(String, Vec<u8>)>,
    pub dirs: Vec<String>,
    pub connect_failures: u32,
    pub list_failures: u32,
    pub broken_downloads: HashSet<String>,
    /// Local paths written by someone else while the named file is being downloaded.
    pub arrives_locally: HashMap<String, PathBuf>,
    pub keepalive_failures: u32,
    pub keepalives: u32,
    pub connects: u32,
    pub closes: u32,
    pub list_calls: u32,
    pub downloads: Vec<String>,
}

/// Shared handle to a fake server; also acts as the connector.
#[derive(Clone, Default)]
pub struct FakeRemote(Arc<Mutex<RemoteState>>);

impl FakeRemote {
    pub fn with_files(names: &[&str]) -> Self {
        let remote = FakeRemote::default();
        for name in names {
            remote.add_file(name, format!("id,value\n1,{}\n", name).as_bytes());
        }
        remote
    }

    pub fn add_file(&self, name: &str, data: &[u8]) {
        self.state().files.push((name.to_string(), data.to_vec()));
    }

    pub fn state(&self) -> MutexGuard<'_, RemoteState> {
        self.0.lock().expect("remote state poisoned")
    }
}

pub struct FakeStore {
    remote: FakeRemote,
}

impl RemoteStore for FakeStore {
    fn list_dir(&self, dir: &str) -> Result<Vec<RemoteFileEntry>, SyncError> {
        let mut st = self.remote.state();
        st.list_calls += 1;
        if st.list_failures > 0 {
            st.list_failures -= 1;
            return Err(SyncError::RemoteListFailed(dir.to_string(), "connection reset".into()));
        }
        let mut out: Vec<RemoteFileEntry> =
            st.files.iter().map(|(n, _)| RemoteFileEntry::file(n.clone())).collect();
        out.extend(st.dirs.iter().map(|d| RemoteFileEntry::dir(d.clone())));
        Ok(out)
    }

    fn open_read(&self, path: &str) -> Result<Box<dyn Read + '_>, SyncError> {
        let mut st = self.remote.state();
        let name = path.rsplit('/').next().unwrap_or(path).to_string();
        if st.broken_downloads.contains(&name) {
            return Err(SyncError::DownloadFailed(path.to_string(), "channel closed".into()));
        }
        let data = st
            .files
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, d)| d.clone())
            .ok_or_else(|| SyncError::DownloadFailed(path.to_string(), "no such file".into()))?;
        let arriving = st.arrives_locally.get(&name).cloned();
        st.downloads.push(name);
        match arriving {
            Some(path) => Ok(Box::new(ArrivingReader { inner: Cursor::new(data), path: Some(path) })),
            None => Ok(Box::new(Cursor::new(data))),
        }
    }

    fn keepalive(&self) -> Result<u32, SyncError> {
        let mut st = self.remote.state();
        st.keepalives += 1;
        if st.keepalive_failures > 0 {
            st.keepalive_failures -= 1;
            return Err(SyncError::KeepaliveFailed("connection reset".into()));
        }
        Ok(60)
    }

    fn close(&mut self) -> Result<(), SyncError> {
        self.remote.state().closes += 1;
        Ok(())
    }
}

/// Writes `path` with foreign content on the first read, then serves the remote data.
struct ArrivingReader {
    inner: Cursor<Vec<u8>>,
    path: Option<PathBuf>,
}

impl Read for ArrivingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(path) = self.path.take() {
            std::fs::write(path, "external")?;
        }
        self.inner.read(buf)
    }
}

impl Connector for FakeRemote {
    type Store = FakeStore;

    fn connect(&self) -> Result<FakeStore, SyncError> {
        let mut st = self.state();
        st.connects += 1;
        if st.connect_failures > 0 {
            st.connect_failures -= 1;
            return Err(SyncError::TcpConnectFailed("fake:22".into(), "refused".into()));
        }
        Ok(FakeStore { remote: self.clone() })
    }
}

/// Ingestion step that records every call and fails for selected names.
#[derive(Clone, Default)]
pub struct RecordingIngest {
    calls: Arc<Mutex<Vec<PathBuf>>>,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl RecordingIngest {
    pub fn failing_for(names: &[&str]) -> Self {
        let ingest = RecordingIngest::default();
        ingest.failing.lock().expect("lock").extend(names.iter().map(|n| n.to_string()));
        ingest
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .expect("lock")
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
            .collect()
    }
}

impl Ingest for RecordingIngest {
    fn ingest(&self, file: &Path) -> Result<(), SyncError> {
        assert!(file.is_file(), "ingestion must see the downloaded file: {}", file.display());
        self.calls.lock().expect("lock").push(file.to_path_buf());
        let name = file.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        if self.failing.lock().expect("lock").contains(&name) {
            return Err(SyncError::IngestExit(name, Some(1)));
        }
        Ok(())
    }
}

pub fn settings(local_dir: &Path, sync_interval: Duration, reconnect_delay: Duration) -> EngineSettings {
    EngineSettings {
        remote_dir: "/outbox".to_string(),
        local_dir: local_dir.to_path_buf(),
        extension: "csv".to_string(),
        sync_interval,
        reconnect_delay,
        keepalive_interval: Duration::from_secs(3600),
    }
}

/// In-memory sink for formatted log lines.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync + 'static {
        let sink = self.clone();
        tracing_subscriber::fmt().with_ansi(false).with_writer(move || sink.clone()).finish()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().expect("log buffer")).to_string()
    }
}

impl Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("log buffer").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn touch(dir: &Path, name: &str) {
    std::fs::create_dir_all(dir).expect("create local dir");
    std::fs::write(dir.join(name), "local copy").expect("write local file");
}

/// Poll `cond` until it holds or `timeout` elapses.
pub fn wait_for<F: Fn() -> bool>(timeout: Duration, cond: F) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}
