//! Line-oriented `data: ` event framing shared by every streaming path.
//!
//! The relay writes one event per chunk:
//! ```text
//! data: {"content":"Hola "}\n\n
//! ```
//! Readers on both sides of the wire (the Gemini SSE parser and the client
//! reassembler) feed raw byte reads into a [`LineDecoder`] and pick out the
//! `data: ` lines with [`data_payload`].

use bytes::Bytes;

use crate::model::StreamChunk;

/// Prefix marking an event line.
pub const DATA_PREFIX: &str = "data: ";

/// Encode one chunk as a complete event, terminated by a blank line.
pub fn encode_event(chunk: &StreamChunk) -> Result<Bytes, serde_json::Error> {
    let json = serde_json::to_string(chunk)?;
    Ok(Bytes::from(format!("{}{}\n\n", DATA_PREFIX, json)))
}

/// Return the payload of an event line, or `None` for any other line.
pub fn data_payload(line: &str) -> Option<&str> {
    line.strip_prefix(DATA_PREFIX)
}

/// Incremental text decoder that yields complete lines.
///
/// Byte reads may end in the middle of a multi-byte character; those bytes
/// are held back until the rest arrives. Invalid sequences decode to U+FFFD.
/// Text after the last newline stays buffered for the next read.
#[derive(Debug, Default)]
pub struct LineDecoder {
    pending: Vec<u8>,
    buffer: String,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one read and drain every line it completes, without the line
    /// terminator (`\n` or `\r\n`).
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.decode(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let mut line: String = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
            lines.push(line);
        }
        lines
    }

    /// Text received after the last newline.
    pub fn remainder(&self) -> &str {
        &self.buffer
    }

    fn decode(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    self.pending.clear();
                    return;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    self.buffer
                        .push_str(std::str::from_utf8(&self.pending[..valid]).unwrap_or_default());
                    match err.error_len() {
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                        // Incomplete trailing character: wait for the next read.
                        None => {
                            self.pending.drain(..valid);
                            return;
                        }
                    }
                }
            }
        }
    }
}
