//! Error types for jmstool

use thiserror::Error;

/// Main error type for jmstool
#[derive(Debug, Error)]
pub enum JmsToolError {
    /// Malformed command line (bad target, invalid pattern)
    #[error("Usage error: {0}")]
    Usage(String),

    /// Algorithm config file could not be loaded or resolved
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport connection failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// Every authentication method was rejected
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Dial or login did not finish in time
    #[error("Timeout after {0}s")]
    Timeout(u64),

    /// SSH key parsing error
    #[error("SSH key error: {0}")]
    SshKey(String),

    /// Channel, PTY or shell setup failed
    #[error("Session error: {0}")]
    Session(String),

    /// SFTP subsystem or file operation failed
    #[error("SFTP error: {0}")]
    Sftp(String),

    /// Telnet protocol error
    #[error("Telnet error: {0}")]
    Telnet(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using JmsToolError
pub type Result<T> = std::result::Result<T, JmsToolError>;

impl JmsToolError {
    /// Create a usage error from a string
    pub fn usage(msg: impl Into<String>) -> Self {
        JmsToolError::Usage(msg.into())
    }

    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        JmsToolError::Config(msg.into())
    }

    /// Create a connection error from a string
    pub fn connection(msg: impl Into<String>) -> Self {
        JmsToolError::Connection(msg.into())
    }

    /// Create an authentication error from a string
    pub fn auth(msg: impl Into<String>) -> Self {
        JmsToolError::Authentication(msg.into())
    }

    /// Create a session error from a string
    pub fn session(msg: impl Into<String>) -> Self {
        JmsToolError::Session(msg.into())
    }

    /// Create an SFTP error from a string
    pub fn sftp(msg: impl Into<String>) -> Self {
        JmsToolError::Sftp(msg.into())
    }

    /// Create a Telnet error from a string
    pub fn telnet(msg: impl Into<String>) -> Self {
        JmsToolError::Telnet(msg.into())
    }

    /// Process exit code for this error
    ///
    /// Usage errors follow the clap convention (2); everything else is 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            JmsToolError::Usage(_) => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = JmsToolError::Connection("failed to connect".to_string());
        assert_eq!(err.to_string(), "Connection error: failed to connect");

        let err = JmsToolError::Timeout(30);
        assert_eq!(err.to_string(), "Timeout after 30s");
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(JmsToolError::usage("bad target").exit_code(), 2);
        assert_eq!(JmsToolError::auth("rejected").exit_code(), 1);
        assert_eq!(JmsToolError::config("unknown cipher").exit_code(), 1);
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: JmsToolError = io.into();
        assert!(matches!(err, JmsToolError::Io(_)));
    }
}
