//! Credential resolution
//!
//! Turns the command-line credentials into an ordered list of
//! [`AuthMethod`]s: the `-P` password, a prompted password when no
//! credentials were given, then the `-i` identity file.

use std::path::Path;

use russh::keys::{decode_secret_key, PrivateKey};
use tracing::debug;

use super::config::AuthMethod;
use crate::config::SshConnectConfig;
use crate::error::{JmsToolError, Result};

/// Collect authentication methods for a connection
pub async fn resolve_auth_methods(config: &SshConnectConfig) -> Result<Vec<AuthMethod>> {
    let mut methods = Vec::with_capacity(2);

    if let Some(ref password) = config.password {
        methods.push(AuthMethod::Password(password.clone()));
    }

    if config.needs_password_prompt() {
        let prompt = format!("{} password: ", config.target);
        methods.push(AuthMethod::Password(prompt_secret(prompt).await?));
    }

    if let Some(ref key_path) = config.identity {
        let key = load_private_key(key_path).await?;
        methods.push(AuthMethod::PublicKey(std::sync::Arc::new(key)));
    }

    Ok(methods)
}

/// Read and decode a private key file
///
/// OpenSSH and PEM encodings are accepted. Encrypted keys trigger a
/// passphrase prompt.
pub async fn load_private_key(path: &Path) -> Result<PrivateKey> {
    let content = tokio::fs::read_to_string(path).await?;

    match decode_secret_key(&content, None) {
        Ok(key) => Ok(key),
        Err(russh::keys::Error::KeyIsEncrypted) => {
            debug!("{} is encrypted, prompting for passphrase", path.display());
            let passphrase =
                prompt_secret(format!("Enter passphrase for key {}: ", path.display())).await?;
            decode_key(&content, Some(&passphrase), path)
        }
        Err(e) => Err(key_error(path, e)),
    }
}

fn decode_key(content: &str, passphrase: Option<&str>, path: &Path) -> Result<PrivateKey> {
    decode_secret_key(content, passphrase).map_err(|e| key_error(path, e))
}

fn key_error(path: &Path, e: russh::keys::Error) -> JmsToolError {
    JmsToolError::SshKey(format!(
        "failed to parse private key {}: {}",
        path.display(),
        e
    ))
}

/// Prompt on the terminal without echo
async fn prompt_secret(prompt: String) -> Result<String> {
    tokio::task::spawn_blocking(move || rpassword::prompt_password(prompt))
        .await
        .map_err(|e| JmsToolError::auth(format!("password prompt failed: {e}")))?
        .map_err(JmsToolError::Io)
}
