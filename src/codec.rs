//! Inbound line framing
//!
//! TCP gives no guarantee that a read ends on a line boundary, so command
//! lines are reassembled here across reads. Any run of `\r` and `\n` ends a
//! line and empty lines are dropped. A line longer than the configured limit
//! is discarded up to its terminator and surfaces as a single unknown command.

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;
use tracing::warn;

use crate::LinkError;
use crate::command::Command;

/// Decodes a byte stream into [`Command`]s
#[derive(Debug, Clone)]
pub struct CommandCodec {
    max_line_len: usize,
    /// Bytes already scanned for a terminator
    next_index: usize,
    /// Set while skipping the remainder of an overlong line
    discarding: bool,
}

impl CommandCodec {
    pub fn new(max_line_len: usize) -> Self {
        Self { max_line_len, next_index: 0, discarding: false }
    }

    pub fn max_line_len(&self) -> usize {
        self.max_line_len
    }

    fn overlong(&self) -> Command {
        Command::Unknown(format!("<line longer than {} bytes>", self.max_line_len))
    }
}

fn is_terminator(byte: &u8) -> bool {
    matches!(byte, b'\r' | b'\n')
}

impl Decoder for CommandCodec {
    type Item = Command;
    type Error = LinkError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Command>, LinkError> {
        loop {
            let Some(offset) = src[self.next_index..].iter().position(is_terminator) else {
                if src.len() > self.max_line_len {
                    if !self.discarding {
                        warn!(limit = self.max_line_len, "Discarding overlong command line");
                    }
                    self.discarding = true;
                    src.clear();
                    self.next_index = 0;
                } else {
                    self.next_index = src.len();
                }
                return Ok(None);
            };

            let end = self.next_index + offset;
            let line = src.split_to(end);
            src.advance(1);
            self.next_index = 0;

            if self.discarding {
                self.discarding = false;
                return Ok(Some(self.overlong()));
            }
            if line.is_empty() {
                continue;
            }
            if line.len() > self.max_line_len {
                warn!(limit = self.max_line_len, len = line.len(), "Discarding overlong command line");
                return Ok(Some(self.overlong()));
            }

            return Ok(Some(Command::parse(&String::from_utf8_lossy(&line))));
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Command>, LinkError> {
        if let Some(command) = self.decode(src)? {
            return Ok(Some(command));
        }
        // An unterminated tail at close is not a command.
        src.clear();
        self.next_index = 0;
        self.discarding = false;
        Ok(None)
    }
}
