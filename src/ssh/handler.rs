//! SSH client handler implementation
//!
//! Implements the `russh::client::Handler` trait to handle SSH connection events.

use russh::keys::HashAlg;
use tracing::{debug, info};

/// SSH client handler for russh
///
/// Accepts every server key. This is a connectivity debugging tool, so the
/// key is only reported, never verified against known_hosts.
#[derive(Debug, Clone)]
pub struct SshHandler {
    host: String,
}

impl SshHandler {
    /// Create a new SSH handler for `host`
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }
}

impl russh::client::Handler for SshHandler {
    type Error = anyhow::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &russh::keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        info!(
            "{} host key {} {}",
            self.host,
            server_public_key.algorithm().as_str(),
            server_public_key.fingerprint(HashAlg::Sha256)
        );
        debug!("host key accepted without verification");
        Ok(true)
    }
}
