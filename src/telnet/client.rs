//! Telnet client with automatic login
//!
//! Dials the server, answers option negotiation and types the credentials
//! when the login prompts appear. Once logged in the client is driven by the
//! terminal bridge like any other remote shell.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info, trace};

use super::protocol::{
    escape_iac, is_terminal_type_request, naws, negotiation, terminal_type_is, Negotiator,
    TelnetEvent, TelnetParser, Verb, OPT_NAWS, OPT_TTYPE,
};
use crate::config::{CONNECTION_TIMEOUT_SECS, DEFAULT_TERM_TYPE};
use crate::error::{JmsToolError, Result};
use crate::terminal::{RemoteInput, RemoteOutput, RemoteTerminal, WindowSize};

const READ_BUFFER_SIZE: usize = 4096;

/// Prompts answered before giving up on a login that never settles
const MAX_LOGIN_PROMPTS: usize = 6;

/// Login text kept for prompt matching
const MAX_SCREEN_BYTES: usize = 8192;

const USERNAME_PROMPT: &str = r"(?i)(login|user\s*name|user|name|用户名|用户|账\s*号)\s*[:：]\s*$";
const PASSWORD_PROMPT: &str = r"(?i)(password|passwd|密\s*码|口\s*令)\s*[:：]\s*$";
const LOGIN_FAILURE: &str = concat!(
    r"(?i)login incorrect|(password|login|authentication) (failed|incorrect)",
    r"|incorrect password|access denied|permission denied|失败|错误"
);
const LOGIN_SUCCESS: &str = r"(?i)last\s+login|success|成功|[#$>]\s*$";

type SharedWriter = Arc<Mutex<OwnedWriteHalf>>;

/// Telnet login settings
#[derive(Debug, Clone)]
pub struct TelnetConfig {
    pub username: String,
    pub password: String,
    /// Terminal type answered to `TERMINAL-TYPE SEND`
    pub term_type: String,
    /// Window size sent once the server agrees to NAWS
    pub window: WindowSize,
    /// Bound on dialing plus login
    pub login_timeout: Duration,
    /// Replaces the default login-success pattern
    pub login_success: Option<Regex>,
}

impl TelnetConfig {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            term_type: DEFAULT_TERM_TYPE.to_string(),
            window: WindowSize::default(),
            login_timeout: Duration::from_secs(CONNECTION_TIMEOUT_SECS),
            login_success: None,
        }
    }

    pub fn with_term_type(mut self, term_type: impl Into<String>) -> Self {
        self.term_type = term_type.into();
        self
    }

    pub fn with_window(mut self, window: WindowSize) -> Self {
        self.window = window;
        self
    }

    pub fn with_login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = timeout;
        self
    }

    pub fn with_login_success(mut self, pattern: Option<Regex>) -> Self {
        self.login_success = pattern;
        self
    }
}

/// What the login text asks for next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStep {
    Username,
    Password,
    Failed,
    LoggedIn,
}

/// Patterns recognised in the text received during login
#[derive(Debug, Clone)]
pub struct LoginPatterns {
    username: Regex,
    password: Regex,
    failure: Regex,
    success: Regex,
}

impl LoginPatterns {
    /// Default patterns, with `custom_success` replacing the success pattern
    pub fn new(custom_success: Option<Regex>) -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| JmsToolError::telnet(format!("bad pattern: {}", e)))
        };

        let success = match custom_success {
            Some(pattern) => pattern,
            None => compile(LOGIN_SUCCESS)?,
        };

        Ok(Self {
            username: compile(USERNAME_PROMPT)?,
            password: compile(PASSWORD_PROMPT)?,
            failure: compile(LOGIN_FAILURE)?,
            success,
        })
    }

    /// Classify the text received since the last answered prompt
    ///
    /// Failure messages only count once credentials have been sent.
    pub fn classify(&self, screen: &str, credentials_sent: bool) -> Option<LoginStep> {
        if credentials_sent && self.failure.is_match(screen) {
            Some(LoginStep::Failed)
        } else if self.username.is_match(screen) {
            Some(LoginStep::Username)
        } else if self.password.is_match(screen) {
            Some(LoginStep::Password)
        } else if self.success.is_match(screen) {
            Some(LoginStep::LoggedIn)
        } else {
            None
        }
    }
}

/// A logged-in Telnet session
pub struct TelnetClient {
    reader: OwnedReadHalf,
    writer: SharedWriter,
    parser: TelnetParser,
    negotiator: Negotiator,
    term_type: String,
    window: WindowSize,
    /// Login text not yet shown to the user
    replay: Vec<u8>,
    /// Decoded events not yet handled
    pending: VecDeque<TelnetEvent>,
    /// Replies not yet accepted by the socket
    outgoing: Vec<u8>,
}

impl TelnetClient {
    /// Dial `address` and log in, all within the configured timeout
    pub async fn connect(address: &str, config: &TelnetConfig) -> Result<Self> {
        let patterns = LoginPatterns::new(config.login_success.clone())?;

        match tokio::time::timeout(
            config.login_timeout,
            Self::dial_and_login(address, config, &patterns),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(JmsToolError::Timeout(config.login_timeout.as_secs())),
        }
    }

    async fn dial_and_login(
        address: &str,
        config: &TelnetConfig,
        patterns: &LoginPatterns,
    ) -> Result<Self> {
        let stream = TcpStream::connect(address)
            .await
            .map_err(|e| JmsToolError::connection(format!("dial {} err: {}", address, e)))?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!("set_nodelay: {}", e);
        }
        debug!("telnet connected to {}", address);

        let (reader, writer) = stream.into_split();
        let mut client = Self {
            reader,
            writer: Arc::new(Mutex::new(writer)),
            parser: TelnetParser::new(),
            negotiator: Negotiator::new(),
            term_type: config.term_type.clone(),
            window: config.window,
            replay: Vec::new(),
            pending: VecDeque::new(),
            outgoing: Vec::new(),
        };

        client
            .login(patterns, &config.username, &config.password)
            .await?;
        Ok(client)
    }

    async fn login(
        &mut self,
        patterns: &LoginPatterns,
        username: &str,
        password: &str,
    ) -> Result<()> {
        let mut screen: Vec<u8> = Vec::new();
        let mut answered = 0usize;

        loop {
            let data = match self.next_data().await? {
                Some(data) => data,
                None => return Err(JmsToolError::telnet("connection closed during login")),
            };

            self.replay.extend_from_slice(&data);
            screen.extend_from_slice(&data);
            if screen.len() > MAX_SCREEN_BYTES {
                screen.drain(..screen.len() - MAX_SCREEN_BYTES);
            }

            let step = patterns.classify(&String::from_utf8_lossy(&screen), answered > 0);
            match step {
                Some(LoginStep::Username) => {
                    debug!("username prompt, sending {}", username);
                    self.write_line(username).await?;
                }
                Some(LoginStep::Password) => {
                    debug!("password prompt, sending password");
                    self.write_line(password).await?;
                }
                Some(LoginStep::Failed) => {
                    let text = String::from_utf8_lossy(&screen);
                    return Err(JmsToolError::auth(format!(
                        "telnet login failed: {}",
                        text.trim()
                    )));
                }
                Some(LoginStep::LoggedIn) => {
                    info!("telnet login success");
                    return Ok(());
                }
                None => continue,
            }

            screen.clear();
            answered += 1;
            if answered > MAX_LOGIN_PROMPTS {
                return Err(JmsToolError::auth("telnet login did not complete"));
            }
        }
    }

    /// Writer feeding the remote session
    pub fn input(&self) -> TelnetInput {
        TelnetInput {
            writer: Arc::clone(&self.writer),
        }
    }

    /// Shut down the sending side of the connection
    pub async fn close(mut self) {
        if let Err(e) = self.flush_outgoing().await {
            debug!("telnet flush: {}", e);
        }
        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.shutdown().await {
            debug!("telnet shutdown: {}", e);
        }
    }

    /// Next chunk of application data; `None` on EOF
    ///
    /// Cancel safe: decoded events and unsent replies are kept in `self`, so
    /// a dropped call resumes where it stopped. Negotiation replies are
    /// queued and go out before the next socket read.
    async fn next_data(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            while let Some(event) = self.pending.pop_front() {
                match event {
                    TelnetEvent::Data(bytes) => return Ok(Some(bytes)),
                    TelnetEvent::Negotiate(verb, option) => self.negotiate(verb, option),
                    TelnetEvent::Subnegotiate(option, payload) => {
                        self.subnegotiate(option, &payload)
                    }
                    TelnetEvent::Command(command) => trace!("telnet command {}", command),
                }
            }

            self.flush_outgoing().await?;

            let mut buf = [0u8; READ_BUFFER_SIZE];
            let n = self.reader.read(&mut buf).await?;
            if n == 0 {
                return Ok(None);
            }
            self.pending.extend(self.parser.feed(&buf[..n]));
        }
    }

    fn negotiate(&mut self, verb: Verb, option: u8) {
        trace!("recv {:?} {}", verb, option);
        let Some(reply) = self.negotiator.handle(verb, option) else {
            return;
        };
        trace!("send {:?} {}", reply, option);

        self.outgoing.extend_from_slice(&negotiation(reply, option));
        if reply == Verb::Will && option == OPT_NAWS {
            self.outgoing.extend_from_slice(&naws(self.window));
        }
    }

    fn subnegotiate(&mut self, option: u8, payload: &[u8]) {
        if option == OPT_TTYPE && is_terminal_type_request(payload) {
            trace!("send terminal type {}", self.term_type);
            self.outgoing
                .extend_from_slice(&terminal_type_is(&self.term_type));
        } else {
            debug!("ignoring subnegotiation for option {}", option);
        }
    }

    async fn write_line(&mut self, text: &str) -> Result<()> {
        let line = format!("{}\r\n", text);
        self.outgoing.extend_from_slice(&escape_iac(line.as_bytes()));
        self.flush_outgoing().await
    }

    /// Send queued bytes; only what the socket accepted is removed
    async fn flush_outgoing(&mut self) -> Result<()> {
        if self.outgoing.is_empty() {
            return Ok(());
        }

        let mut writer = self.writer.lock().await;
        while !self.outgoing.is_empty() {
            let n = writer.write(&self.outgoing).await?;
            if n == 0 {
                return Err(std::io::Error::from(std::io::ErrorKind::WriteZero).into());
            }
            self.outgoing.drain(..n);
        }
        writer.flush().await?;
        Ok(())
    }
}

async fn write_shared(writer: &SharedWriter, data: &[u8]) -> Result<()> {
    let mut writer = writer.lock().await;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

#[async_trait]
impl RemoteTerminal for TelnetClient {
    async fn next_output(&mut self) -> Result<RemoteOutput> {
        if !self.replay.is_empty() {
            return Ok(RemoteOutput::Data(std::mem::take(&mut self.replay)));
        }

        match self.next_data().await? {
            Some(data) => Ok(RemoteOutput::Data(data)),
            None => Ok(RemoteOutput::Closed),
        }
    }

    async fn resize(&mut self, size: WindowSize) -> Result<()> {
        self.window = size;
        if !self.negotiator.local_enabled(OPT_NAWS) {
            debug!("NAWS not agreed, window change skipped");
            return Ok(());
        }
        self.outgoing.extend_from_slice(&naws(size));
        self.flush_outgoing().await
    }
}

/// Sending half of a [`TelnetClient`]
pub struct TelnetInput {
    writer: SharedWriter,
}

#[async_trait]
impl RemoteInput for TelnetInput {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        write_shared(&self.writer, &escape_iac(data)).await
    }
}
