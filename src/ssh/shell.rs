//! Interactive SSH shell
//!
//! Requests a PTY and a shell on a session channel and adapts the channel to
//! the terminal bridge.

use async_trait::async_trait;
use russh::client::Msg;
use russh::{Channel, ChannelMsg, Pty};
use tokio::io::AsyncWrite;
use tracing::debug;

use crate::error::{JmsToolError, Result};
use crate::terminal::{RemoteOutput, RemoteTerminal, WindowSize, WriterInput};

/// Nominal line speed reported to the remote PTY
const TTY_SPEED: u32 = 14_400;

/// Terminal modes sent with the PTY request
pub fn terminal_modes() -> Vec<(Pty, u32)> {
    vec![
        (Pty::ECHO, 1),
        (Pty::TTY_OP_ISPEED, TTY_SPEED),
        (Pty::TTY_OP_OSPEED, TTY_SPEED),
    ]
}

/// How the remote shell ended
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellExit {
    /// Exit status reported by the server
    pub status: Option<u32>,
    /// Signal that terminated the remote shell
    pub signal: Option<String>,
}

impl ShellExit {
    /// Process exit code to hand back to the caller
    ///
    /// The remote exit status is propagated; a remote signal maps to 1.
    pub fn exit_code(&self) -> i32 {
        match (self.status, &self.signal) {
            (Some(status), _) => i32::try_from(status).unwrap_or(1),
            (None, Some(_)) => 1,
            (None, None) => 0,
        }
    }
}

/// A shell running on a PTY session channel
pub struct ShellSession {
    channel: Channel<Msg>,
    exit: ShellExit,
}

impl ShellSession {
    /// Request a PTY and start the shell
    pub async fn start(
        mut channel: Channel<Msg>,
        term_type: &str,
        size: WindowSize,
    ) -> Result<Self> {
        channel
            .request_pty(
                true,
                term_type,
                u32::from(size.cols),
                u32::from(size.rows),
                0,
                0,
                &terminal_modes(),
            )
            .await
            .map_err(|e| JmsToolError::session(format!("RequestPty err: {}", e)))?;
        wait_reply(&mut channel, "RequestPty").await?;
        debug!("PTY {} {}x{} granted", term_type, size.cols, size.rows);

        channel
            .request_shell(true)
            .await
            .map_err(|e| JmsToolError::session(format!("Shell err: {}", e)))?;
        wait_reply(&mut channel, "Shell").await?;
        debug!("shell started");

        Ok(Self {
            channel,
            exit: ShellExit::default(),
        })
    }

    /// Writer feeding the remote shell's standard input
    pub fn input(&self) -> WriterInput<impl AsyncWrite + Send + 'static + use<'_>> {
        WriterInput::new(self.channel.make_writer())
    }

    /// Exit information collected so far
    pub fn exit(&self) -> &ShellExit {
        &self.exit
    }
}

/// Wait for the server's answer to a `want_reply` request
async fn wait_reply(channel: &mut Channel<Msg>, request: &str) -> Result<()> {
    loop {
        match channel.wait().await {
            Some(ChannelMsg::Success) => return Ok(()),
            Some(ChannelMsg::Failure) => {
                return Err(JmsToolError::session(format!(
                    "{} err: request rejected by server",
                    request
                )))
            }
            Some(ChannelMsg::Close) | None => {
                return Err(JmsToolError::session(format!(
                    "{} err: channel closed",
                    request
                )))
            }
            Some(other) => debug!("ignoring {:?} while waiting for {} reply", other, request),
        }
    }
}

#[async_trait]
impl RemoteTerminal for ShellSession {
    async fn next_output(&mut self) -> Result<RemoteOutput> {
        loop {
            match self.channel.wait().await {
                Some(ChannelMsg::Data { data }) => return Ok(RemoteOutput::Data(data.to_vec())),
                // stderr shares the terminal in PTY mode
                Some(ChannelMsg::ExtendedData { data, .. }) => {
                    return Ok(RemoteOutput::Data(data.to_vec()))
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    debug!("remote exit status {}", exit_status);
                    self.exit.status = Some(exit_status);
                }
                Some(ChannelMsg::ExitSignal { signal_name, .. }) => {
                    debug!("remote exit signal {:?}", signal_name);
                    self.exit.signal = Some(format!("{:?}", signal_name));
                }
                Some(ChannelMsg::Eof) => debug!("remote EOF"),
                Some(ChannelMsg::Close) | None => return Ok(RemoteOutput::Closed),
                Some(_) => {}
            }
        }
    }

    async fn resize(&mut self, size: WindowSize) -> Result<()> {
        self.channel
            .window_change(u32::from(size.cols), u32::from(size.rows), 0, 0)
            .await
            .map_err(|e| JmsToolError::session(format!("window change: {}", e)))
    }
}
