//! `jmstool sftp`

use super::connect_ssh;
use crate::config::SftpCommandConfig;
use crate::error::Result;
use crate::ssh::SftpClient;

/// Download one remote file
pub async fn run(config: SftpCommandConfig) -> Result<()> {
    let connection = connect_ssh(&config.connect).await?;

    let client = match SftpClient::open(&connection).await {
        Ok(client) => client,
        Err(e) => {
            connection.close().await;
            return Err(e);
        }
    };

    let downloaded = client
        .download(&config.remote_path, &config.local_path)
        .await;

    client.close().await;
    connection.close().await;

    downloaded.map(|_| ())
}
