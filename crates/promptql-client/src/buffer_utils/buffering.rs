use std::collections::VecDeque;

use crate::error::{PromptQlError, Result};

/// Byte buffer that hands out complete lines as chunks arrive
/// Chunk boundaries may split lines and multi-byte characters
pub struct CircularLineBuffer {
    buffer: VecDeque<u8>,
}

impl CircularLineBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend(bytes);
    }

    /// Next complete line without its `\n` / `\r\n` terminator
    /// Returns None until a terminator has arrived
    pub fn next_line(&mut self) -> Option<Result<String>> {
        let newline_pos = self.buffer.iter().position(|&b| b == b'\n')?;
        let line_bytes: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
        Some(decode_line(&line_bytes))
    }

    /// Whatever is left once the stream has ended
    pub fn take_remaining(&mut self) -> Option<Result<String>> {
        if self.buffer.is_empty() {
            return None;
        }
        let line_bytes: Vec<u8> = self.buffer.drain(..).collect();
        Some(decode_line(&line_bytes))
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

fn decode_line(bytes: &[u8]) -> Result<String> {
    let line = std::str::from_utf8(bytes)
        .map_err(|e| PromptQlError::Protocol(format!("Invalid UTF-8 in event stream: {}", e)))?;
    Ok(line.trim_end_matches(['\n', '\r']).to_string())
}
