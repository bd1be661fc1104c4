//! jmstool - SSH, SFTP and Telnet connectivity debugging
//!
//! A small command-line tool for checking that a host is reachable and that
//! credentials work, including against servers that only speak legacy
//! algorithms.
//!
//! # Commands
//!
//! - `ssh` - interactive shell on a PTY, exit status propagated
//! - `sftp` - download a single remote file
//! - `telnet` - interactive session with automatic login
//!
//! # Example Usage
//!
//! ```bash
//! jmstool ssh root@127.0.0.1 -p 2222 -c algorithms.yaml
//! jmstool sftp root@127.0.0.1 -i ~/.ssh/id_ed25519 -d /var/log/syslog
//! jmstool telnet admin@10.0.0.1 -P 1212 -c '\]\s*$'
//! ```
//!
//! The terminal type defaults to `xterm-256color` and can be overridden with
//! `--term` or the `xterm` environment variable.

pub mod commands;
pub mod config;
pub mod error;
pub mod ssh;
pub mod telnet;
pub mod terminal;

// Re-exports for convenience
pub use config::{Cli, Command, Target};
pub use error::{JmsToolError, Result};
pub use ssh::{AlgorithmConfig, SshConfig, SshConnection};
pub use telnet::{TelnetClient, TelnetConfig};
pub use terminal::{TerminalBridge, WindowSize};
