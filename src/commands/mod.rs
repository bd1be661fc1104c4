//! Sub-command orchestration
//!
//! Each command validates its arguments, then runs
//! dial → session setup → bridge or transfer → teardown.

pub mod sftp;
pub mod ssh;
pub mod telnet;

use russh::Preferred;
use tracing::debug;

use crate::config::{
    Cli, Command, SftpCommandConfig, SshCommandConfig, SshConnectConfig, TelnetCommandConfig,
};
use crate::error::Result;
use crate::ssh::{resolve_auth_methods, AlgorithmConfig, SshConfig, SshConnection};

/// Run the parsed command line, returning the process exit code
pub async fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Ssh(args) => ssh::run(SshCommandConfig::from_args(args)?).await,
        Command::Sftp(args) => {
            sftp::run(SftpCommandConfig::from_args(args)?).await?;
            Ok(0)
        }
        Command::Telnet(args) => {
            telnet::run(TelnetCommandConfig::from_args(args)?).await?;
            Ok(0)
        }
    }
}

/// Resolve algorithms and credentials for an SSH or SFTP connection
pub async fn build_ssh_config(config: &SshConnectConfig) -> Result<SshConfig> {
    let preferred = match config.algorithms_file {
        Some(ref path) => AlgorithmConfig::load(path).await?.to_preferred()?,
        None => Preferred::default(),
    };

    let auth_methods = resolve_auth_methods(config).await?;
    debug!(
        "auth methods: {:?}",
        auth_methods.iter().map(|m| m.name()).collect::<Vec<_>>()
    );

    Ok(SshConfig::new(&config.target.host, &config.target.username)
        .with_port(config.port)
        .with_preferred(preferred)
        .with_auth_methods(auth_methods))
}

/// Dial and authenticate
pub(crate) async fn connect_ssh(config: &SshConnectConfig) -> Result<SshConnection> {
    SshConnection::connect(build_ssh_config(config).await?).await
}
