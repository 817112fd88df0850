use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::error::SyncError;

/// Key exchange algorithms offered to the server, most preferred first.
pub const DEFAULT_KEX: &[&str] = &[
    "diffie-hellman-group14-sha256",
    "diffie-hellman-group14-sha1",
    "diffie-hellman-group1-sha1",
    "ecdh-sha2-nistp256",
    "ecdh-sha2-nistp384",
];

pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(50 * 60);
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(30);
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(60);

/// Connection parameters for the SFTP server.
#[derive(Serialize, Debug, Clone)]
pub struct RemoteConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub kex: Vec<String>,
    /// Pinned `SHA256:<base64>` host fingerprint; any host key is accepted when unset.
    pub host_fingerprint: Option<String>,
    #[serde(with = "secs")]
    pub timeout: Duration,
    /// Idle interval after which an SSH keep-alive is sent on the open session.
    #[serde(with = "secs")]
    pub keepalive: Duration,
}

impl RemoteConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct Config {
    pub remote: RemoteConfig,
    pub remote_dir: String,
    pub local_dir: PathBuf,
    pub log_file: PathBuf,
    /// Recognized data-file extension, lowercase and without the leading dot.
    pub extension: String,
    pub ingest_command: Vec<String>,
    #[serde(with = "secs")]
    pub sync_interval: Duration,
    #[serde(with = "secs")]
    pub reconnect_delay: Duration,
}

impl Config {
    /// Build from the process environment. Callers load `.env` beforehand.
    pub fn from_env() -> Result<Self, SyncError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SyncError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &str| get(key).ok_or_else(|| SyncError::MissingEnv(key.to_string()));

        let port = match get("SFTP_PORT") {
            Some(v) => v
                .parse::<u16>()
                .map_err(|e| SyncError::InvalidEnv("SFTP_PORT".to_string(), e.to_string()))?,
            None => 22,
        };
        let kex = match get("SFTP_KEX") {
            Some(v) => v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect(),
            None => DEFAULT_KEX.iter().map(|s| s.to_string()).collect(),
        };
        let ingest_raw = require("INGEST_COMMAND")?;
        let ingest_command = shell_words::split(&ingest_raw)
            .map_err(|e| SyncError::InvalidEnv("INGEST_COMMAND".to_string(), e.to_string()))?;
        if ingest_command.is_empty() {
            return Err(SyncError::MissingEnv("INGEST_COMMAND".to_string()));
        }
        let extension = get("DATA_EXTENSION")
            .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
            .unwrap_or_else(|| "csv".to_string());

        Ok(Config {
            remote: RemoteConfig {
                host: require("SFTP_HOST")?,
                port,
                username: require("SFTP_USER")?,
                password: get("SFTP_PASSWORD"),
                kex,
                host_fingerprint: get("SFTP_HOST_FINGERPRINT"),
                timeout: secs_var(&get, "REMOTE_TIMEOUT_SECS", DEFAULT_REMOTE_TIMEOUT)?,
                keepalive: secs_var(&get, "KEEPALIVE_INTERVAL_SECS", DEFAULT_KEEPALIVE_INTERVAL)?,
            },
            remote_dir: get("REMOTE_PATH").unwrap_or_else(|| "/".to_string()),
            local_dir: PathBuf::from(get("LOCAL_PATH").unwrap_or_else(|| "files".to_string())),
            log_file: PathBuf::from(get("LOG_PATH").unwrap_or_else(|| "log.txt".to_string())),
            extension,
            ingest_command,
            sync_interval: secs_var(&get, "SYNC_INTERVAL_SECS", DEFAULT_SYNC_INTERVAL)?,
            reconnect_delay: secs_var(&get, "RECONNECT_DELAY_SECS", DEFAULT_RECONNECT_DELAY)?,
        })
    }

    pub fn pretty_json(&self) -> String {
        match serde_json::to_string_pretty(self) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("config serialization failed: {}", e);
                "{}".to_string()
            }
        }
    }
}

fn secs_var<G>(get: &G, key: &str, default: Duration) -> Result<Duration, SyncError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(v) => match v.parse::<u64>() {
            Ok(0) => Err(SyncError::InvalidEnv(key.to_string(), "must be greater than 0".into())),
            Ok(n) => Ok(Duration::from_secs(n)),
            Err(e) => Err(SyncError::InvalidEnv(key.to_string(), e.to_string())),
        },
        None => Ok(default),
    }
}

mod secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }
}
