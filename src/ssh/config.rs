//! SSH configuration types
//!
//! Configuration for SSH connection parameters including authentication
//! and handshake algorithm preferences.

use std::sync::Arc;
use std::time::Duration;

use russh::keys::PrivateKey;
use russh::Preferred;

use crate::config::{dial_address, CONNECTION_TIMEOUT_SECS, DEFAULT_SSH_PORT};

/// One way of proving identity to the server
#[derive(Clone)]
pub enum AuthMethod {
    /// Password authentication
    Password(String),

    /// Public key authentication with a decoded private key
    PublicKey(Arc<PrivateKey>),
}

impl AuthMethod {
    /// Short name used in log lines
    pub fn name(&self) -> &'static str {
        match self {
            AuthMethod::Password(_) => "password",
            AuthMethod::PublicKey(_) => "publickey",
        }
    }
}

impl std::fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthMethod::Password(_) => f.write_str("Password(***)"),
            AuthMethod::PublicKey(key) => f
                .debug_tuple("PublicKey")
                .field(&key.algorithm().as_str())
                .finish(),
        }
    }
}

/// SSH connection configuration
#[derive(Debug, Clone)]
pub struct SshConfig {
    /// Remote hostname or IP address
    pub host: String,

    /// SSH port (default: 22)
    pub port: u16,

    /// Username for authentication
    pub username: String,

    /// Authentication methods, tried in order until one succeeds
    pub auth_methods: Vec<AuthMethod>,

    /// Algorithms offered during key exchange
    pub preferred: Preferred,

    /// Bound on TCP connect plus handshake
    pub connect_timeout: Duration,
}

impl SshConfig {
    /// Create a new SSH configuration with minimal required fields
    pub fn new(host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_SSH_PORT,
            username: username.into(),
            auth_methods: Vec::new(),
            preferred: Preferred::default(),
            connect_timeout: Duration::from_secs(CONNECTION_TIMEOUT_SECS),
        }
    }

    /// Set the SSH port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Add password authentication
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.auth_methods.push(AuthMethod::Password(password.into()));
        self
    }

    /// Append already resolved authentication methods
    pub fn with_auth_methods(mut self, methods: impl IntoIterator<Item = AuthMethod>) -> Self {
        self.auth_methods.extend(methods);
        self
    }

    /// Set handshake algorithm preferences
    pub fn with_preferred(mut self, preferred: Preferred) -> Self {
        self.preferred = preferred;
        self
    }

    /// Set the connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// `host:port` address to dial
    pub fn address(&self) -> String {
        dial_address(&self.host, self.port)
    }
}
