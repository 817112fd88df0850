/// How a failure is routed by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Remote session, transport, listing or download failures. Always answered with a reconnect.
    Connection,
    /// The ingestion command failed for one file; the batch continues.
    Ingestion,
    /// Local directory creation or listing failed; the cycle is dropped, the session kept.
    LocalFs,
    /// Invalid or missing configuration; only reported at start-up.
    Config,
}

/// Repository-wide structured errors for the sync engine.
#[derive(Debug, Clone)]
pub enum SyncError {
    // configuration
    MissingEnv(String),
    InvalidEnv(String, String),
    // SSH / connection related
    NoAddress(String),
    TcpConnectFailed(String, String),
    SessionCreateFailed(String),
    KexPreferenceRejected(String),
    HandshakeFailed(String, String),
    HostKeyMismatch { expected: String, offered: String },
    AuthFailed(String),
    SftpCreateFailed(String),
    TeardownFailed(String),
    NotConnected,
    KeepaliveFailed(String),
    // remote operations
    RemoteListFailed(String, String),
    DownloadFailed(String, String),
    // local filesystem
    CreateLocalDirFailed(String, String),
    LocalListFailed(String, String),
    LocalWriteFailed(String, String),
    // ingestion
    IngestSpawnFailed(String, String),
    IngestExit(String, Option<i32>),
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use SyncError::*;
        match self {
            MissingEnv(k) => write!(f, "missing required environment variable {}", k),
            InvalidEnv(k, msg) => write!(f, "invalid value for {}: {}", k, msg),
            NoAddress(addr) => write!(f, "cannot resolve address: {}", addr),
            TcpConnectFailed(addr, msg) => write!(f, "TCP connect to {} failed: {}", addr, msg),
            SessionCreateFailed(addr) => write!(f, "cannot create SSH session for {}", addr),
            KexPreferenceRejected(msg) => write!(f, "key exchange preference rejected: {}", msg),
            HandshakeFailed(addr, msg) => write!(f, "SSH handshake with {} failed: {}", addr, msg),
            HostKeyMismatch { expected, offered } => {
                write!(f, "host key mismatch: expected {}, server offered {}", expected, offered)
            }
            AuthFailed(user) => write!(f, "SSH authentication failed for user {}", user),
            SftpCreateFailed(msg) => write!(f, "SFTP subsystem failed to start: {}", msg),
            TeardownFailed(msg) => write!(f, "closing previous session failed: {}", msg),
            NotConnected => write!(f, "SFTP connection not available"),
            KeepaliveFailed(msg) => write!(f, "SSH keep-alive failed: {}", msg),
            RemoteListFailed(dir, msg) => write!(f, "listing remote {} failed: {}", dir, msg),
            DownloadFailed(path, msg) => write!(f, "download of {} failed: {}", path, msg),
            CreateLocalDirFailed(dir, msg) => {
                write!(f, "cannot create local directory {}: {}", dir, msg)
            }
            LocalListFailed(dir, msg) => write!(f, "listing local {} failed: {}", dir, msg),
            LocalWriteFailed(path, msg) => write!(f, "cannot write {}: {}", path, msg),
            IngestSpawnFailed(cmd, msg) => write!(f, "cannot start ingestion {}: {}", cmd, msg),
            IngestExit(file, Some(code)) => {
                write!(f, "ingestion of {} exited with code {}", file, code)
            }
            IngestExit(file, None) => write!(f, "ingestion of {} terminated by signal", file),
        }
    }
}

impl std::error::Error for SyncError {}

impl SyncError {
    pub fn class(&self) -> ErrorClass {
        use SyncError::*;
        match self {
            MissingEnv(_) | InvalidEnv(_, _) => ErrorClass::Config,
            NoAddress(_)
            | TcpConnectFailed(_, _)
            | SessionCreateFailed(_)
            | KexPreferenceRejected(_)
            | HandshakeFailed(_, _)
            | HostKeyMismatch { .. }
            | AuthFailed(_)
            | SftpCreateFailed(_)
            | TeardownFailed(_)
            | NotConnected
            | KeepaliveFailed(_)
            | RemoteListFailed(_, _)
            | DownloadFailed(_, _) => ErrorClass::Connection,
            CreateLocalDirFailed(_, _) | LocalListFailed(_, _) | LocalWriteFailed(_, _) => {
                ErrorClass::LocalFs
            }
            IngestSpawnFailed(_, _) | IngestExit(_, _) => ErrorClass::Ingestion,
        }
    }

    /// Whether the engine must tear the session down and schedule a reconnect.
    pub fn triggers_reconnect(&self) -> bool {
        self.class() == ErrorClass::Connection
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_failures_are_connection_class() {
        let errs = [
            SyncError::RemoteListFailed("/in".into(), "eof".into()),
            SyncError::DownloadFailed("/in/a.csv".into(), "eof".into()),
            SyncError::AuthFailed("bob".into()),
            SyncError::NotConnected,
            SyncError::KeepaliveFailed("socket closed".into()),
        ];
        for e in errs {
            assert!(e.triggers_reconnect(), "{} should reconnect", e);
        }
    }

    #[test]
    fn local_and_ingestion_failures_keep_the_session() {
        let local = SyncError::CreateLocalDirFailed("files".into(), "denied".into());
        assert_eq!(local.class(), ErrorClass::LocalFs);
        assert!(!local.triggers_reconnect());

        let ingest = SyncError::IngestExit("a.csv".into(), Some(2));
        assert_eq!(ingest.class(), ErrorClass::Ingestion);
        assert!(!ingest.triggers_reconnect());
        assert_eq!(ingest.to_string(), "ingestion of a.csv exited with code 2");
    }
}
