// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pane output capture: UTF-8-safe chunk decoding into a bounded line
//! buffer.

use std::collections::VecDeque;

/// Stateful UTF-8 decoder for PTY reads.
///
/// A multi-byte sequence can be split across 4096-byte read chunks;
/// decoding each chunk independently would mangle it into U+FFFD.
/// Incomplete trailing bytes are buffered and prepended to the next
/// chunk.
pub struct Utf8Decoder {
    incomplete: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self { incomplete: Vec::with_capacity(4) }
    }

    pub fn decode(&mut self, input: &[u8]) -> String {
        let mut data = std::mem::take(&mut self.incomplete);
        data.extend_from_slice(input);

        let mut out = String::new();
        let mut rest: &[u8] = &data;
        loop {
            match std::str::from_utf8(rest) {
                Ok(s) => {
                    out.push_str(s);
                    rest = &[];
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(std::str::from_utf8(&rest[..valid]).unwrap_or_default());
                    match e.error_len() {
                        // Invalid byte(s): skip and keep decoding.
                        Some(skip) => rest = &rest[valid + skip..],
                        // Incomplete sequence at the end - buffer it
                        None => {
                            rest = &rest[valid..];
                            break;
                        }
                    }
                }
            }
        }
        self.incomplete = rest.to_vec();
        out
    }
}

impl Default for Utf8Decoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Ring buffer of pane output lines, capped at `max` lines.
///
/// The last element is the in-progress line; a chunk without a trailing
/// newline leaves it open for the next chunk to extend.
pub struct OutputBuffer {
    lines: VecDeque<String>,
    max: usize,
}

impl OutputBuffer {
    pub fn new(max: usize) -> Self {
        Self { lines: VecDeque::new(), max }
    }

    pub fn push_chunk(&mut self, text: &str) {
        // Treat CRLF as LF; lone carriage returns restart the current line
        // (good enough for prompt redraws without a terminal emulator).
        let text = text.replace("\r\n", "\n");
        let mut parts = text.split('\n');

        if let Some(first) = parts.next() {
            let first = apply_carriage_returns(first);
            match self.lines.back_mut() {
                Some(last) if !first.restart => last.push_str(&first.text),
                Some(last) => *last = first.text,
                None => self.lines.push_back(first.text),
            }
        }
        for part in parts {
            self.lines.push_back(apply_carriage_returns(part).text);
        }

        while self.lines.len() > self.max {
            self.lines.pop_front();
        }
    }

    /// Last `n` lines (or all), newline-joined.
    pub fn tail(&self, n: Option<usize>) -> String {
        let len = self.lines.len();
        let start = match n {
            Some(n) if n < len => len - n,
            _ => 0,
        };
        let mut out = String::new();
        for (i, line) in self.lines.iter().enumerate().skip(start) {
            if i > start {
                out.push('\n');
            }
            out.push_str(line);
        }
        out
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }
}

struct CrResult {
    text: String,
    restart: bool,
}

/// Keep only the text after the last carriage return in a segment.
fn apply_carriage_returns(segment: &str) -> CrResult {
    match segment.rfind('\r') {
        Some(idx) => CrResult { text: segment[idx + 1..].to_string(), restart: true },
        None => CrResult { text: segment.to_string(), restart: false },
    }
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
