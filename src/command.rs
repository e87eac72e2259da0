//! Command protocol interpreter
//!
//! Inbound lines from the collector map to one [`Command`] each, and every
//! command produces exactly one [`Reply`]. Parsing and applying are pure with
//! respect to I/O: [`Command::apply`] mutates the [`SessionState`] and hands
//! the reply back for the caller to send.
//!
//! | Line        | Effect                          | Reply                    |
//! |-------------|---------------------------------|--------------------------|
//! | `SRATE <n>` | set rate if `n` is allowed      | `SRATE_OK` / `SRATE_ERR` |
//! | `START`     | begin streaming                 | `STARTED`                |
//! | `STOP`      | pause streaming                 | `STOPPED`                |
//! | `PING`      | none                            | `PONG`                   |
//! | other       | none                            | `UNK_CMD`                |

use std::fmt;
use tracing::{debug, info};

use crate::state::SessionState;

const SRATE_PREFIX: &str = "SRATE ";

/// A parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `SRATE <n>`; an argument without digits or a negative one reads as 0
    SetRate(u32),
    Start,
    Stop,
    Ping,
    Unknown(String),
}

/// Reply line sent back for every command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    RateOk,
    RateErr,
    Started,
    Stopped,
    Pong,
    UnknownCommand,
}

impl Command {
    /// Parse one line; trailing `\r`/`\n` are ignored, nothing else is trimmed.
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);

        if let Some(arg) = line.strip_prefix(SRATE_PREFIX) {
            return Command::SetRate(leading_rate(arg));
        }

        match line {
            "START" => Command::Start,
            "STOP" => Command::Stop,
            "PING" => Command::Ping,
            other => Command::Unknown(other.to_string()),
        }
    }

    /// Apply the command to `state` and return the reply to send
    pub fn apply(&self, state: &SessionState) -> Reply {
        match self {
            Command::SetRate(hz) => match state.set_rate(*hz) {
                Ok(rate) => {
                    info!(%rate, "Sample rate changed");
                    Reply::RateOk
                }
                Err(e) => {
                    debug!(error = %e, "Rejected rate change");
                    Reply::RateErr
                }
            },
            Command::Start => {
                state.set_sending(true);
                info!("START received, streaming samples");
                Reply::Started
            }
            Command::Stop => {
                state.set_sending(false);
                info!("STOP received, streaming paused (connection kept)");
                Reply::Stopped
            }
            Command::Ping => Reply::Pong,
            Command::Unknown(text) => {
                info!(command = %text, "Unknown command");
                Reply::UnknownCommand
            }
        }
    }
}

/// Integer prefix of an `SRATE` argument
///
/// Leading whitespace is skipped, an optional sign and the digit run that
/// follows are read, and anything after the digits is ignored. No digits or a
/// negative value give 0, which is never an allowed rate; values past
/// `u32::MAX` saturate.
fn leading_rate(arg: &str) -> u32 {
    let arg = arg.trim_start_matches(|c: char| c.is_ascii_whitespace() || c == '\u{0B}');
    let (negative, digits) = match arg.as_bytes().first() {
        Some(b'-') => (true, &arg[1..]),
        Some(b'+') => (false, &arg[1..]),
        _ => (false, arg),
    };

    let value = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0u32, |acc, d| acc.saturating_mul(10).saturating_add(u32::from(d - b'0')));

    if negative { 0 } else { value }
}

impl Reply {
    pub fn as_str(self) -> &'static str {
        match self {
            Reply::RateOk => "SRATE_OK",
            Reply::RateErr => "SRATE_ERR",
            Reply::Started => "STARTED",
            Reply::Stopped => "STOPPED",
            Reply::Pong => "PONG",
            Reply::UnknownCommand => "UNK_CMD",
        }
    }

    /// Newline-terminated wire form
    pub fn to_line(self) -> String {
        format!("{}\n", self.as_str())
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse `line`, apply it to `state` and return the reply
pub fn interpret(line: &str, state: &SessionState) -> Reply {
    Command::parse(line).apply(state)
}
