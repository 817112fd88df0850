use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use ssh2::{HashType, MethodType};

use super::sftp_like::{Connector, Ssh2Store};
use crate::config::RemoteConfig;
use crate::error::SyncError;

/// Opens password- or key-authenticated SFTP sessions for one configured server.
#[derive(Debug, Clone)]
pub struct SftpConnector {
    remote: RemoteConfig,
}

impl SftpConnector {
    pub fn new(remote: RemoteConfig) -> Self {
        Self { remote }
    }
}

impl Connector for SftpConnector {
    type Store = Ssh2Store;

    fn connect(&self) -> Result<Ssh2Store, SyncError> {
        connect_session(&self.remote)
    }
}

/// Render a host key hash the way OpenSSH prints it: `SHA256:<base64 without padding>`.
pub fn format_fingerprint(hash: &[u8]) -> String {
    format!("SHA256:{}", STANDARD_NO_PAD.encode(hash))
}

/// Decide whether the offered host key is acceptable. Without a pinned value every key is
/// accepted and only logged.
pub fn check_host_key(offered: &str, pinned: Option<&str>) -> Result<(), SyncError> {
    match pinned {
        Some(expected) if expected.trim() != offered => Err(SyncError::HostKeyMismatch {
            expected: expected.trim().to_string(),
            offered: offered.to_string(),
        }),
        Some(_) => {
            tracing::info!("Host fingerprint {} matches pinned value", offered);
            Ok(())
        }
        None => {
            tracing::info!("Host fingerprint: {} (accepted, no pin configured)", offered);
            Ok(())
        }
    }
}

/// Create and configure the TCP connection.
fn create_tcp_connection(addr: &str, timeout: Duration) -> Result<TcpStream, SyncError> {
    let mut addrs = addr
        .to_socket_addrs()
        .map_err(|e| SyncError::TcpConnectFailed(addr.to_string(), e.to_string()))?;
    let sock = addrs.next().ok_or_else(|| SyncError::NoAddress(addr.to_string()))?;
    let tcp = TcpStream::connect_timeout(&sock, Duration::from_secs(10))
        .map_err(|e| SyncError::TcpConnectFailed(addr.to_string(), e.to_string()))?;
    let _ = tcp.set_read_timeout(Some(timeout));
    let _ = tcp.set_write_timeout(Some(timeout));
    Ok(tcp)
}

/// Key authentication fallback, tried when no password is configured or it was rejected.
fn try_key_authentication(sess: &ssh2::Session, username: &str) -> bool {
    if sess.authenticated() {
        return true;
    }
    if let Some(home_p) = dirs::home_dir() {
        for name in ["id_ed25519", "id_rsa", "id_ecdsa"] {
            let p = home_p.join(".ssh").join(name);
            if p.exists() {
                let _ = sess.userauth_pubkey_file(username, None, &p, None);
                if sess.authenticated() {
                    tracing::debug!("authenticated with key {}", p.display());
                    return true;
                }
            }
        }
    }
    false
}

pub fn connect_session(remote: &RemoteConfig) -> Result<Ssh2Store, SyncError> {
    let addr = remote.addr();
    let tcp = create_tcp_connection(&addr, remote.timeout)?;
    let mut sess =
        ssh2::Session::new().map_err(|_| SyncError::SessionCreateFailed(addr.clone()))?;
    if !remote.kex.is_empty() {
        sess.method_pref(MethodType::Kex, &remote.kex.join(","))
            .map_err(|e| SyncError::KexPreferenceRejected(e.to_string()))?;
    }
    sess.set_tcp_stream(tcp);
    // bounds every blocking libssh2 call, including SFTP reads
    sess.set_timeout(u32::try_from(remote.timeout.as_millis()).unwrap_or(u32::MAX));
    sess.handshake().map_err(|e| SyncError::HandshakeFailed(addr.clone(), e.to_string()))?;

    let offered = sess
        .host_key_hash(HashType::Sha256)
        .map(format_fingerprint)
        .unwrap_or_else(|| "<unavailable>".to_string());
    check_host_key(&offered, remote.host_fingerprint.as_deref())?;
    if let Some(kex) = sess.methods(MethodType::Kex) {
        tracing::debug!("negotiated kex {}", kex);
    }

    if let Some(password) = remote.password.as_deref()
        && let Err(e) = sess.userauth_password(&remote.username, password)
    {
        tracing::debug!("password authentication rejected: {}", e);
    }
    if !try_key_authentication(&sess, &remote.username) {
        return Err(SyncError::AuthFailed(remote.username.clone()));
    }

    // libssh2 only tracks the interval; the engine calls `keepalive_send` on its own timer
    sess.set_keepalive(true, u32::try_from(remote.keepalive.as_secs()).unwrap_or(u32::MAX));
    let sftp = sess.sftp().map_err(|e| SyncError::SftpCreateFailed(e.to_string()))?;
    Ok(Ssh2Store { session: sess, sftp })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_uses_openssh_layout() {
        let fp = format_fingerprint(&[0u8; 32]);
        assert!(fp.starts_with("SHA256:"));
        assert!(!fp.ends_with('='));
        assert_eq!(fp, "SHA256:AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA");
    }

    #[test]
    fn unpinned_host_key_is_accepted() {
        assert!(check_host_key("SHA256:abc", None).is_ok());
    }

    #[test]
    fn pinned_host_key_must_match() {
        assert!(check_host_key("SHA256:abc", Some("SHA256:abc ")).is_ok());
        let err = check_host_key("SHA256:abc", Some("SHA256:xyz")).unwrap_err();
        assert!(matches!(err, SyncError::HostKeyMismatch { .. }));
        assert!(err.triggers_reconnect());
    }

    #[test]
    fn unreachable_host_is_connection_class() {
        let remote = RemoteConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            username: "nobody".to_string(),
            password: None,
            kex: vec![],
            host_fingerprint: None,
            timeout: Duration::from_secs(2),
            keepalive: Duration::from_secs(60),
        };
        let err = connect_session(&remote).err().expect("no SSH server on port 1");
        assert!(err.triggers_reconnect());
    }
}
