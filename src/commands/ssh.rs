//! `jmstool ssh`

use tracing::{debug, error, info};

use super::connect_ssh;
use crate::config::SshCommandConfig;
use crate::error::Result;
use crate::ssh::{ShellSession, SshConnection};
use crate::terminal::{
    termination_signal, LocalTerminal, ResizeNotifier, TerminalBridge, TerminalControl,
};

/// Open an interactive shell; returns the exit code to hand to the OS
pub async fn run(config: SshCommandConfig) -> Result<i32> {
    let connection = connect_ssh(&config.connect).await?;

    // The connection is closed on every path once it is up
    let code = run_shell(&connection, &config).await;
    connection.close().await;

    let code = code?;
    if code != 0 {
        error!("Wait err: remote shell exited with status {}", code);
    }
    Ok(code)
}

async fn run_shell(connection: &SshConnection, config: &SshCommandConfig) -> Result<i32> {
    let terminal = LocalTerminal;
    let size = terminal.size_or_default();

    let channel = connection.open_channel().await?;
    let mut shell = ShellSession::start(channel, &config.term_type, size).await?;
    info!(
        "Connected to {}:{}, shell started",
        config.connect.target, config.connect.port
    );

    let resize = ResizeNotifier::spawn()?;
    let input = shell.input();
    let end = TerminalBridge::new(&terminal, resize)
        .run(
            tokio::io::stdin(),
            tokio::io::stdout(),
            input,
            &mut shell,
            termination_signal(),
        )
        .await?;

    debug!("ssh session ended: {:?}, {:?}", end, shell.exit());
    Ok(shell.exit().exit_code())
}
