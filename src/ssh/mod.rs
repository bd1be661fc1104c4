//! SSH client module
//!
//! Connection setup with configurable handshake algorithms, credential
//! resolution, interactive shells and SFTP downloads.

pub mod algorithms;
pub mod auth;
pub mod config;
pub mod connection;
pub mod handler;
pub mod sftp;
pub mod shell;

// Re-exports
pub use algorithms::AlgorithmConfig;
pub use auth::resolve_auth_methods;
pub use config::{AuthMethod, SshConfig};
pub use connection::SshConnection;
pub use handler::SshHandler;
pub use sftp::SftpClient;
pub use shell::{ShellExit, ShellSession};
