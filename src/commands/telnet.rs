//! `jmstool telnet`

use tracing::{debug, info};

use crate::config::{dial_address, TelnetCommandConfig};
use crate::error::Result;
use crate::telnet::{TelnetClient, TelnetConfig};
use crate::terminal::{
    termination_signal, LocalTerminal, ResizeNotifier, TerminalBridge, TerminalControl,
};

/// Log in and bridge the session to the local terminal
pub async fn run(config: TelnetCommandConfig) -> Result<()> {
    let terminal = LocalTerminal;
    let address = dial_address(&config.target.host, config.port);
    info!("Connecting to telnet server {}...", address);

    let telnet_config = TelnetConfig::new(config.target.username, config.password)
        .with_term_type(config.term_type)
        .with_window(terminal.size_or_default())
        .with_login_success(config.login_success);
    let mut client = TelnetClient::connect(&address, &telnet_config).await?;

    let resize = ResizeNotifier::spawn()?;
    let input = client.input();
    let end = TerminalBridge::new(&terminal, resize)
        .run(
            tokio::io::stdin(),
            tokio::io::stdout(),
            input,
            &mut client,
            termination_signal(),
        )
        .await;

    client.close().await;
    info!("close telnet client");

    debug!("telnet session ended: {:?}", end?);
    Ok(())
}
