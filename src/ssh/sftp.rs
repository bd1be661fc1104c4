//! SFTP download
//!
//! Runs the `sftp` subsystem on a session channel and streams a remote file
//! to local disk.

use std::path::Path;

use russh_sftp::client::SftpSession;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{debug, info};

use super::connection::SshConnection;
use crate::error::{JmsToolError, Result};

/// SFTP session over an authenticated connection
pub struct SftpClient {
    session: SftpSession,
}

impl SftpClient {
    /// Start the `sftp` subsystem
    ///
    /// The server must have an sftp subsystem configured (`Subsystem sftp ...`
    /// in sshd_config).
    pub async fn open(connection: &SshConnection) -> Result<Self> {
        let channel = connection.open_channel().await?;
        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| JmsToolError::sftp(format!("sftp subsystem request failed: {}", e)))?;

        let session = SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| JmsToolError::sftp(format!("sftpClient failed: {}", e)))?;
        debug!("sftp session established");

        Ok(Self { session })
    }

    /// Download `remote_path` into `local_path`, returning the byte count
    pub async fn download(&self, remote_path: &str, local_path: &Path) -> Result<u64> {
        let remote_file = self
            .session
            .open(remote_path)
            .await
            .map_err(|e| JmsToolError::sftp(format!("Open failed: {}", e)))?;

        let copied = save_stream(remote_file, local_path).await?;
        info!(
            "Download file {} to {} success ({} bytes)",
            remote_path,
            local_path.display(),
            copied
        );
        Ok(copied)
    }

    /// End the SFTP session
    pub async fn close(self) {
        if let Err(e) = self.session.close().await {
            debug!("sftp close: {}", e);
        }
    }
}

/// Stream `reader` into a newly created file at `local_path`
pub async fn save_stream<R>(reader: R, local_path: &Path) -> Result<u64>
where
    R: AsyncRead + Unpin,
{
    let mut reader = reader;
    let mut local_file = tokio::fs::File::create(local_path).await.map_err(|e| {
        JmsToolError::sftp(format!("Create failed: {}: {}", local_path.display(), e))
    })?;

    let copied = tokio::io::copy(&mut reader, &mut local_file)
        .await
        .map_err(|e| JmsToolError::sftp(format!("Copy file failed: {}", e)))?;
    local_file.flush().await?;

    Ok(copied)
}
