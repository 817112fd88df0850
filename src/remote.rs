// remote module: SFTP session setup and the store abstraction used by the sync cycle
mod session;
mod sftp_like;

pub use session::{SftpConnector, check_host_key, connect_session, format_fingerprint};
pub use sftp_like::{Connector, RemoteFileEntry, RemoteStore, Ssh2Store, remote_join};
