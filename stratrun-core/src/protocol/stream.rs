//! Line framing for the process's stdout.
//!
//! Chunks arrive at arbitrary byte boundaries. The reader keeps the trailing
//! partial line between calls and only ever emits complete lines.

/// Splits a byte stream into `\n`-terminated lines.
#[derive(Debug, Default)]
pub struct StreamReader {
    pending: Vec<u8>,
    lines_emitted: u64,
}

impl StreamReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completes, in order.
    ///
    /// The terminator is removed, as is a `\r` before it. Bytes are decoded
    /// only once the line is complete, so a multi-byte character split across
    /// chunks decodes intact. Invalid UTF-8 is replaced, not rejected.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.pending[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            let mut line = &self.pending[start..end];
            if let Some((b'\r', rest)) = line.split_last() {
                line = rest;
            }
            lines.push(String::from_utf8_lossy(line).into_owned());
            start = end + 1;
        }
        self.pending.drain(..start);
        self.lines_emitted += lines.len() as u64;
        lines
    }

    pub fn feed_str(&mut self, chunk: &str) -> Vec<String> {
        self.feed(chunk.as_bytes())
    }

    pub fn lines_emitted(&self) -> u64 {
        self.lines_emitted
    }

    /// End of stream. An unterminated final line is discarded; returns its
    /// length in bytes.
    pub fn finish(self) -> usize {
        self.pending.len()
    }

    /// End of stream, keeping the unterminated final line instead of
    /// discarding it. Used for stderr, which is forwarded verbatim.
    pub fn into_remainder(self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        Some(String::from_utf8_lossy(&self.pending).into_owned())
    }
}
