//! Telnet client module
//!
//! Protocol decoding and negotiation, plus a client that logs in on its own
//! before handing the session to the terminal bridge.

pub mod client;
pub mod protocol;

pub use client::{LoginPatterns, LoginStep, TelnetClient, TelnetConfig, TelnetInput};
