//! Telnet wire protocol
//!
//! Incremental IAC parsing, option negotiation state and frame builders.
//! Only the options this client cares about are ever enabled: it offers
//! TERMINAL-TYPE and NAWS, and accepts the server's ECHO and
//! SUPPRESS-GO-AHEAD.

use std::borrow::Cow;
use std::collections::HashSet;

use crate::terminal::WindowSize;

/// Interpret As Command
pub const IAC: u8 = 255;
pub const DONT: u8 = 254;
pub const DO: u8 = 253;
pub const WONT: u8 = 252;
pub const WILL: u8 = 251;
/// Subnegotiation begin
pub const SB: u8 = 250;
/// Subnegotiation end
pub const SE: u8 = 240;

pub const OPT_ECHO: u8 = 1;
pub const OPT_SGA: u8 = 3;
pub const OPT_TTYPE: u8 = 24;
pub const OPT_NAWS: u8 = 31;

const TTYPE_IS: u8 = 0;
const TTYPE_SEND: u8 = 1;

const CR: u8 = b'\r';
const NUL: u8 = 0;

/// Negotiation verb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Will,
    Wont,
    Do,
    Dont,
}

impl Verb {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            WILL => Some(Verb::Will),
            WONT => Some(Verb::Wont),
            DO => Some(Verb::Do),
            DONT => Some(Verb::Dont),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Verb::Will => WILL,
            Verb::Wont => WONT,
            Verb::Do => DO,
            Verb::Dont => DONT,
        }
    }
}

/// Something decoded from the server's byte stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelnetEvent {
    /// Application data with protocol bytes removed
    Data(Vec<u8>),
    /// `IAC <verb> <option>`
    Negotiate(Verb, u8),
    /// `IAC SB <option> <payload> IAC SE`
    Subnegotiate(u8, Vec<u8>),
    /// Any other two-byte command (NOP, GA, ...)
    Command(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Data,
    Iac,
    Verb(Verb),
    SbOption,
    SbData,
    SbIac,
}

/// Incremental decoder; commands may be split across reads
#[derive(Debug)]
pub struct TelnetParser {
    state: State,
    after_cr: bool,
    sb_option: u8,
    sb_data: Vec<u8>,
}

impl Default for TelnetParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TelnetParser {
    pub fn new() -> Self {
        Self {
            state: State::Data,
            after_cr: false,
            sb_option: 0,
            sb_data: Vec::new(),
        }
    }

    /// Decode a chunk, returning events in stream order
    pub fn feed(&mut self, input: &[u8]) -> Vec<TelnetEvent> {
        let mut events = Vec::new();
        let mut data = Vec::new();

        for &b in input {
            match self.state {
                State::Data => {
                    if b == IAC {
                        self.state = State::Iac;
                        continue;
                    }
                    // CR NUL is a bare carriage return
                    if !(self.after_cr && b == NUL) {
                        data.push(b);
                    }
                    self.after_cr = b == CR;
                }
                State::Iac => {
                    self.state = State::Data;
                    match b {
                        IAC => {
                            data.push(IAC);
                            self.after_cr = false;
                        }
                        SB => self.state = State::SbOption,
                        _ => match Verb::from_byte(b) {
                            Some(verb) => self.state = State::Verb(verb),
                            None => {
                                flush_data(&mut data, &mut events);
                                events.push(TelnetEvent::Command(b));
                            }
                        },
                    }
                }
                State::Verb(verb) => {
                    flush_data(&mut data, &mut events);
                    events.push(TelnetEvent::Negotiate(verb, b));
                    self.state = State::Data;
                }
                State::SbOption => {
                    self.sb_option = b;
                    self.sb_data.clear();
                    self.state = State::SbData;
                }
                State::SbData => {
                    if b == IAC {
                        self.state = State::SbIac;
                    } else {
                        self.sb_data.push(b);
                    }
                }
                State::SbIac => match b {
                    SE => {
                        flush_data(&mut data, &mut events);
                        events.push(TelnetEvent::Subnegotiate(
                            self.sb_option,
                            std::mem::take(&mut self.sb_data),
                        ));
                        self.state = State::Data;
                    }
                    IAC => {
                        self.sb_data.push(IAC);
                        self.state = State::SbData;
                    }
                    _ => {
                        // Malformed; keep the byte and stay in the subnegotiation
                        self.sb_data.push(b);
                        self.state = State::SbData;
                    }
                },
            }
        }

        flush_data(&mut data, &mut events);
        events
    }
}

fn flush_data(data: &mut Vec<u8>, events: &mut Vec<TelnetEvent>) {
    if !data.is_empty() {
        events.push(TelnetEvent::Data(std::mem::take(data)));
    }
}

/// Option state for both sides of the connection
#[derive(Debug, Default)]
pub struct Negotiator {
    /// Options this client has agreed to perform
    local: HashSet<u8>,
    /// Options the server performs with our consent
    remote: HashSet<u8>,
    /// Requests already refused, answered only once
    refused: HashSet<(Verb, u8)>,
}

impl Negotiator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply for a request from the server, if one is due
    ///
    /// Replies are only sent when the option state changes, so a peer
    /// repeating itself never causes a negotiation loop.
    pub fn handle(&mut self, verb: Verb, option: u8) -> Option<Verb> {
        match verb {
            Verb::Do if matches!(option, OPT_TTYPE | OPT_NAWS) => {
                self.local.insert(option).then_some(Verb::Will)
            }
            Verb::Do => self.refuse(verb, option, Verb::Wont),
            Verb::Dont => self.local.remove(&option).then_some(Verb::Wont),
            Verb::Will if matches!(option, OPT_ECHO | OPT_SGA) => {
                self.remote.insert(option).then_some(Verb::Do)
            }
            Verb::Will => self.refuse(verb, option, Verb::Dont),
            Verb::Wont => self.remote.remove(&option).then_some(Verb::Dont),
        }
    }

    fn refuse(&mut self, verb: Verb, option: u8, reply: Verb) -> Option<Verb> {
        self.refused.insert((verb, option)).then_some(reply)
    }

    /// Whether this client agreed to perform `option`
    pub fn local_enabled(&self, option: u8) -> bool {
        self.local.contains(&option)
    }

    /// Whether the server performs `option`
    pub fn remote_enabled(&self, option: u8) -> bool {
        self.remote.contains(&option)
    }
}

/// `IAC <verb> <option>`
pub fn negotiation(verb: Verb, option: u8) -> [u8; 3] {
    [IAC, verb.as_byte(), option]
}

/// Double every IAC byte in outgoing data
pub fn escape_iac(data: &[u8]) -> Cow<'_, [u8]> {
    if !data.contains(&IAC) {
        return Cow::Borrowed(data);
    }

    let mut escaped = Vec::with_capacity(data.len() + 4);
    for &b in data {
        escaped.push(b);
        if b == IAC {
            escaped.push(IAC);
        }
    }
    Cow::Owned(escaped)
}

/// `IAC SB NAWS <cols16> <rows16> IAC SE`
pub fn naws(size: WindowSize) -> Vec<u8> {
    let mut payload = Vec::with_capacity(4);
    payload.extend_from_slice(&size.cols.to_be_bytes());
    payload.extend_from_slice(&size.rows.to_be_bytes());
    subnegotiation(OPT_NAWS, &payload)
}

/// `IAC SB TERMINAL-TYPE IS <term> IAC SE`
pub fn terminal_type_is(term_type: &str) -> Vec<u8> {
    let mut payload = Vec::with_capacity(term_type.len() + 1);
    payload.push(TTYPE_IS);
    payload.extend_from_slice(term_type.as_bytes());
    subnegotiation(OPT_TTYPE, &payload)
}

/// Whether a TERMINAL-TYPE subnegotiation asks for our terminal type
pub fn is_terminal_type_request(payload: &[u8]) -> bool {
    payload.first() == Some(&TTYPE_SEND)
}

fn subnegotiation(option: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + 6);
    frame.extend_from_slice(&[IAC, SB, option]);
    frame.extend_from_slice(&escape_iac(payload));
    frame.extend_from_slice(&[IAC, SE]);
    frame
}
