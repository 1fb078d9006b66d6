//! Pattern buffer with efficient tail-search optimization.
//!
//! Only the last N bytes of the accumulated output are searched for prompt
//! patterns, rather than the entire buffer. For large outputs (a full
//! running config, a long neighbor table) this keeps prompt detection cheap.

use regex::bytes::Regex;

/// Buffer for accumulating device output and searching for prompt patterns.
#[derive(Debug)]
pub struct PatternBuffer {
    /// The accumulated output buffer.
    buffer: Vec<u8>,

    /// How many bytes from the end to search for patterns.
    search_depth: usize,
}

impl PatternBuffer {
    /// Create a new pattern buffer with the specified search depth.
    pub fn new(search_depth: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            search_depth,
        }
    }

    /// Extend the buffer with new data, dropping carriage returns.
    ///
    /// PTY output uses CRLF line endings; stripping the CRs here means
    /// prompt patterns and the line-oriented scrapers downstream only ever
    /// see `\n`.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend(data.iter().copied().filter(|b| *b != b'\r'));
    }

    /// Search only the tail of the buffer for the pattern.
    pub fn search_tail(&self, pattern: &Regex) -> Option<regex::bytes::Match<'_>> {
        let start = self.buffer.len().saturating_sub(self.search_depth);
        let tail = &self.buffer[start..];
        pattern.find(tail)
    }

    /// Check if the tail contains a pattern match.
    pub fn tail_contains(&self, pattern: &Regex) -> bool {
        self.search_tail(pattern).is_some()
    }

    /// Take ownership of the buffer contents and reset.
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer)
    }

    /// Get a reference to the buffer contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
