//! SSH connection
//!
//! Dials the server with a bounded timeout, authenticates with the configured
//! methods in order, and hands out session channels.

use std::sync::Arc;

use russh::client::{self, Handle};
use russh::keys::PrivateKeyWithHashAlg;
use russh::Channel;
use tokio::time::timeout;
use tracing::{debug, error, info};

use super::config::{AuthMethod, SshConfig};
use super::handler::SshHandler;
use crate::error::{JmsToolError, Result};

/// An authenticated SSH connection
pub struct SshConnection {
    /// SSH configuration
    config: SshConfig,

    /// Active SSH session handle
    session: Handle<SshHandler>,
}

impl SshConnection {
    /// Connect and authenticate
    ///
    /// There is no retry: a dial, handshake or authentication failure is
    /// returned to the caller as is.
    pub async fn connect(config: SshConfig) -> Result<Self> {
        info!(
            "Connecting to SSH server {}:{}...",
            config.host, config.port
        );

        let ssh_config = Arc::new(client::Config {
            preferred: config.preferred.clone(),
            ..Default::default()
        });

        let addr = config.address();
        let connect_result = timeout(
            config.connect_timeout,
            client::connect(ssh_config, addr.as_str(), SshHandler::new(&config.host)),
        )
        .await;

        let mut session = match connect_result {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => {
                error!("dial err: {}", e);
                return Err(JmsToolError::connection(e.to_string()));
            }
            Err(_) => {
                let secs = config.connect_timeout.as_secs();
                error!("SSH connection timeout after {}s", secs);
                return Err(JmsToolError::Timeout(secs));
            }
        };

        authenticate(&config, &mut session).await?;

        info!(
            "Successfully connected to {}@{}:{}",
            config.username, config.host, config.port
        );

        Ok(Self { config, session })
    }

    /// Open a new session channel
    pub async fn open_channel(&self) -> Result<Channel<client::Msg>> {
        self.session
            .channel_open_session()
            .await
            .map_err(|e| JmsToolError::session(format!("Failed to open channel: {}", e)))
    }

    /// Close the SSH connection
    pub async fn close(self) {
        if let Err(e) = self
            .session
            .disconnect(russh::Disconnect::ByApplication, "", "")
            .await
        {
            debug!("disconnect: {}", e);
        }
        info!("SSH connection to {} closed", self.config.host);
    }
}

/// Try each authentication method until the server accepts one
async fn authenticate(config: &SshConfig, session: &mut Handle<SshHandler>) -> Result<()> {
    if config.auth_methods.is_empty() {
        return Err(JmsToolError::auth("no authentication method available"));
    }

    for method in &config.auth_methods {
        debug!(
            "Attempting {} authentication for user '{}'",
            method.name(),
            config.username
        );

        let auth_result = match method {
            AuthMethod::Password(password) => session
                .authenticate_password(&config.username, password)
                .await
                .map_err(|e| JmsToolError::auth(e.to_string()))?,
            AuthMethod::PublicKey(key) => {
                // RSA keys sign with the best hash the server advertises
                let hash_alg = session
                    .best_supported_rsa_hash()
                    .await
                    .ok()
                    .flatten()
                    .flatten();
                let key_with_alg = PrivateKeyWithHashAlg::new(Arc::clone(key), hash_alg);
                session
                    .authenticate_publickey(&config.username, key_with_alg)
                    .await
                    .map_err(|e| JmsToolError::auth(e.to_string()))?
            }
        };

        if auth_result.success() {
            info!("{} authentication successful", method.name());
            return Ok(());
        }
        debug!("{} authentication rejected", method.name());
    }

    let tried: Vec<_> = config.auth_methods.iter().map(AuthMethod::name).collect();
    Err(JmsToolError::auth(format!(
        "unable to authenticate, attempted methods [{}]",
        tried.join(" ")
    )))
}

impl std::fmt::Debug for SshConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshConnection")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("username", &self.config.username)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_connection_refused() {
        // Bind then drop to get a port nothing listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = SshConfig::new("127.0.0.1", "root")
            .with_port(port)
            .with_password("secret");
        let err = SshConnection::connect(config).await.unwrap_err();
        assert!(matches!(err, JmsToolError::Connection(_)));
    }

    #[tokio::test]
    async fn test_handshake_timeout() {
        // A server that accepts TCP but never speaks SSH
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let _server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        let config = SshConfig::new("127.0.0.1", "root")
            .with_port(port)
            .with_password("secret")
            .with_connect_timeout(Duration::from_millis(200));
        let err = SshConnection::connect(config).await.unwrap_err();
        assert!(matches!(err, JmsToolError::Timeout(_)));
    }
}
