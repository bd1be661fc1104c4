//! Configuration and CLI argument parsing for jmstool

use clap::{ArgAction, Args, Parser, Subcommand};
use regex::Regex;
use std::path::PathBuf;

use crate::error::{JmsToolError, Result};

/// Default SSH/SFTP port
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Default Telnet port
pub const DEFAULT_TELNET_PORT: u16 = 23;

/// Connection timeout in seconds (dial, handshake and Telnet login)
pub const CONNECTION_TIMEOUT_SECS: u64 = 30;

/// Terminal type requested from the remote side unless overridden
pub const DEFAULT_TERM_TYPE: &str = "xterm-256color";

/// Environment variable overriding the terminal type
pub const TERM_TYPE_ENV: &str = "xterm";

/// jmstool CLI arguments
#[derive(Parser, Debug, Clone)]
#[command(name = "jmstool")]
#[command(version)]
#[command(about = "Debug tool for SSH, SFTP and Telnet connectivity and authentication")]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Available sub-commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Open an interactive SSH shell
    ///
    /// For example: jmstool ssh root@127.0.0.1 -p 2222
    Ssh(SshArgs),

    /// Download a file over SFTP
    ///
    /// For example: jmstool sftp root@127.0.0.1 -p 2222 -d /tmp/file.txt
    Sftp(SftpArgs),

    /// Open an interactive Telnet session with automatic login
    ///
    /// For example: jmstool telnet root@127.0.0.1 -p 23 -P 1212
    Telnet(TelnetArgs),
}

/// Connection arguments shared by `ssh` and `sftp`
#[derive(Args, Debug, Clone)]
pub struct SshConnectArgs {
    /// Remote target in the form user@host
    pub target: String,

    /// SSH port
    #[arg(short, long, default_value_t = DEFAULT_SSH_PORT)]
    pub port: u16,

    /// SSH password
    #[arg(short = 'P', long)]
    pub password: Option<String>,

    /// Identity (private key) file
    #[arg(short, long)]
    pub identity: Option<PathBuf>,

    /// Config file for ciphers, kex, host key algorithms and MACs
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// `ssh` sub-command arguments
#[derive(Args, Debug, Clone)]
pub struct SshArgs {
    #[command(flatten)]
    pub connect: SshConnectArgs,

    /// Terminal type requested for the remote PTY
    #[arg(long, env = TERM_TYPE_ENV, default_value = DEFAULT_TERM_TYPE)]
    pub term: String,
}

/// `sftp` sub-command arguments
#[derive(Args, Debug, Clone)]
pub struct SftpArgs {
    #[command(flatten)]
    pub connect: SshConnectArgs,

    /// Remote file to download
    #[arg(short, long)]
    pub download: String,

    /// Local destination (defaults to the remote file name in the current directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// `telnet` sub-command arguments
#[derive(Args, Debug, Clone)]
pub struct TelnetArgs {
    /// Remote target in the form user@host
    pub target: String,

    /// Telnet port
    #[arg(short, long, default_value_t = DEFAULT_TELNET_PORT)]
    pub port: u16,

    /// Telnet password
    #[arg(short = 'P', long, default_value = "")]
    pub password: String,

    /// Custom regular expression marking a successful login
    #[arg(short, long)]
    pub custom: Option<String>,

    /// Terminal type announced to the server
    #[arg(long, env = TERM_TYPE_ENV, default_value = DEFAULT_TERM_TYPE)]
    pub term: String,
}

/// Username and host parsed from a `user@host` argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub username: String,
    pub host: String,
}

impl Target {
    /// Parse `user@host`
    ///
    /// Exactly one `@` is accepted, with non-empty text on both sides.
    pub fn parse(value: &str) -> Result<Self> {
        let mut parts = value.split('@');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(username), Some(host), None) if !username.is_empty() && !host.is_empty() => {
                Ok(Self {
                    username: username.to_string(),
                    host: host.to_string(),
                })
            }
            _ => Err(JmsToolError::usage(format!(
                "error format: {value} (expected user@host)"
            ))),
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.username, self.host)
    }
}

/// Validated SSH connection settings
#[derive(Debug, Clone)]
pub struct SshConnectConfig {
    pub target: Target,
    pub port: u16,
    pub password: Option<String>,
    pub identity: Option<PathBuf>,
    pub algorithms_file: Option<PathBuf>,
}

impl SshConnectConfig {
    /// Create SshConnectConfig from CLI args
    pub fn from_args(args: SshConnectArgs) -> Result<Self> {
        let target = Target::parse(&args.target)?;

        if let Some(ref key_path) = args.identity {
            if !key_path.exists() {
                return Err(JmsToolError::config(format!(
                    "identity file not found: {}",
                    key_path.display()
                )));
            }
        }

        Ok(Self {
            target,
            port: args.port,
            password: sanitize_password(args.password),
            identity: args.identity,
            algorithms_file: args.config,
        })
    }

    /// Whether the password has to be prompted for
    ///
    /// Only when neither a password nor an identity file was given.
    pub fn needs_password_prompt(&self) -> bool {
        self.password.is_none() && self.identity.is_none()
    }
}

/// Validated `ssh` settings
#[derive(Debug, Clone)]
pub struct SshCommandConfig {
    pub connect: SshConnectConfig,
    pub term_type: String,
}

impl SshCommandConfig {
    pub fn from_args(args: SshArgs) -> Result<Self> {
        Ok(Self {
            connect: SshConnectConfig::from_args(args.connect)?,
            term_type: resolve_term_type(&args.term),
        })
    }
}

/// Validated `sftp` settings
#[derive(Debug, Clone)]
pub struct SftpCommandConfig {
    pub connect: SshConnectConfig,
    pub remote_path: String,
    pub local_path: PathBuf,
}

impl SftpCommandConfig {
    pub fn from_args(args: SftpArgs) -> Result<Self> {
        let connect = SshConnectConfig::from_args(args.connect)?;

        if args.download.trim().is_empty() {
            return Err(JmsToolError::usage("download file is required"));
        }

        let local_path = match args.output {
            Some(path) => path,
            None => PathBuf::from(remote_file_name(&args.download)?),
        };

        Ok(Self {
            connect,
            remote_path: args.download,
            local_path,
        })
    }
}

/// Validated `telnet` settings
#[derive(Debug, Clone)]
pub struct TelnetCommandConfig {
    pub target: Target,
    pub port: u16,
    pub password: String,
    pub login_success: Option<Regex>,
    pub term_type: String,
}

impl TelnetCommandConfig {
    pub fn from_args(args: TelnetArgs) -> Result<Self> {
        let target = Target::parse(&args.target)?;

        let login_success = match args.custom.as_deref() {
            Some(pattern) if !pattern.is_empty() => Some(Regex::new(pattern).map_err(|e| {
                JmsToolError::usage(format!("invalid custom success pattern: {e}"))
            })?),
            _ => None,
        };

        Ok(Self {
            target,
            port: args.port,
            password: args.password,
            login_success,
            term_type: resolve_term_type(&args.term),
        })
    }
}

/// `host:port` dial address, bracketing IPv6 literals
pub fn dial_address(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// Last `/`-separated component of a remote path
pub fn remote_file_name(remote_path: &str) -> Result<String> {
    let name = remote_path.rsplit('/').next().unwrap_or(remote_path);
    if name.is_empty() {
        return Err(JmsToolError::usage(format!(
            "remote path has no file name: {remote_path}"
        )));
    }
    Ok(name.to_string())
}

/// Tracing filter directive for a `-v` count
pub fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Fall back to the default terminal type when the override is blank
fn resolve_term_type(term: &str) -> String {
    let term = term.trim();
    if term.is_empty() {
        DEFAULT_TERM_TYPE.to_string()
    } else {
        term.to_string()
    }
}

/// Sanitize password: return None if empty
fn sanitize_password(password: Option<String>) -> Option<String> {
    password.filter(|p| !p.is_empty())
}
