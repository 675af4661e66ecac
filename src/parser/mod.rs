//! Line parser: accumulate bytes, split into records, separate URCs from
//! responses.
//!
//! Maintains a sliding buffer (≥16 KiB). On each chunk: append, then
//! repeatedly locate the next `\n`, strip surrounding `\r`, skip empty
//! records. Classification (URC / terminator / body) is protocol-specific
//! and lives in [`AtClassifier`] and [`SupplicantClassifier`].

pub mod at;
pub mod wpa;

use bytes::BytesMut;

use crate::error::{BridgeError, Result};

/// Minimum sliding-buffer capacity, per the spec.
pub const MIN_BUFFER_CAPACITY: usize = 16 * 1024;

/// Maximum argv entries accumulated for a multi-line response before the
/// tail collapses to `"..."`.
pub const MAX_ARGV: usize = 32;

/// What a classified record means for the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// An unsolicited record — never advances the command queue.
    Urc(String),
    /// Terminates the in-flight command. `Ok(())` for a success
    /// terminator (`OK`), `Err(reason)` otherwise.
    Terminator(std::result::Result<(), String>),
    /// One line of an in-flight command's multi-line response body.
    Body(String),
}

/// Splits a byte stream into newline-delimited records.
///
/// Growable up to `max_capacity`; a read that would overflow the buffer
/// without ever finding a newline is a fatal protocol violation (the peer
/// is not speaking the expected line protocol).
pub struct LineParser {
    buf: BytesMut,
    max_capacity: usize,
}

impl LineParser {
    /// Create a parser with the given maximum buffer size (clamped up to
    /// [`MIN_BUFFER_CAPACITY`]).
    pub fn new(max_capacity: usize) -> Self {
        let max_capacity = max_capacity.max(MIN_BUFFER_CAPACITY);
        Self {
            buf: BytesMut::with_capacity(MIN_BUFFER_CAPACITY),
            max_capacity,
        }
    }

    /// Append a freshly-read chunk to the buffer.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<()> {
        if self.buf.len() + chunk.len() > self.max_capacity && !self.buf.contains(&b'\n') {
            return Err(BridgeError::Fatal(format!(
                "line parser buffer exceeded {} bytes without a newline",
                self.max_capacity
            )));
        }
        self.buf.extend_from_slice(chunk);
        Ok(())
    }

    /// Pop the next complete, non-empty record (CR stripped) from the
    /// buffer, or `None` if no full line is available yet.
    pub fn next_record(&mut self) -> Option<String> {
        loop {
            let newline_at = self.buf.iter().position(|&b| b == b'\n')?;
            let mut line = self.buf.split_to(newline_at + 1);
            line.truncate(line.len() - 1); // drop '\n'
            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }
            if line.is_empty() {
                continue; // skip empty records, keep scanning
            }
            return Some(String::from_utf8_lossy(&line).into_owned());
        }
    }

    /// Bytes currently buffered but not yet split into a record.
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }
}

/// Accumulate body lines into a bounded argv, collapsing overflow to `"..."`.
#[derive(Debug, Default, Clone)]
pub struct Argv {
    entries: Vec<String>,
    overflowed: bool,
}

impl Argv {
    pub fn push(&mut self, line: String) {
        if self.entries.len() >= MAX_ARGV {
            self.overflowed = true;
            return;
        }
        self.entries.push(line);
    }

    pub fn as_slice(&self) -> &[String] {
        &self.entries
    }

    /// Render for diagnostics: the argv with `"..."` appended if it
    /// overflowed `MAX_ARGV` entries.
    pub fn rendered(&self) -> Vec<String> {
        let mut v = self.entries.clone();
        if self.overflowed {
            v.push("...".to_string());
        }
        v
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.overflowed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_crlf_records_and_skips_empties() {
        let mut p = LineParser::new(MIN_BUFFER_CAPACITY);
        p.feed(b"+CSQ: 17,2\r\n\r\nOK\r\n").unwrap();
        assert_eq!(p.next_record().as_deref(), Some("+CSQ: 17,2"));
        assert_eq!(p.next_record().as_deref(), Some("OK"));
        assert_eq!(p.next_record(), None);
    }

    #[test]
    fn partial_record_waits_for_more_bytes() {
        let mut p = LineParser::new(MIN_BUFFER_CAPACITY);
        p.feed(b"+CSQ: 17").unwrap();
        assert_eq!(p.next_record(), None);
        p.feed(b",2\r\n").unwrap();
        assert_eq!(p.next_record().as_deref(), Some("+CSQ: 17,2"));
    }

    #[test]
    fn overflow_without_newline_is_fatal() {
        let mut p = LineParser::new(MIN_BUFFER_CAPACITY);
        let chunk = vec![b'x'; MIN_BUFFER_CAPACITY + 1];
        let err = p.feed(&chunk).unwrap_err();
        assert!(matches!(err, BridgeError::Fatal(_)));
    }

    #[test]
    fn argv_overflow_collapses_to_ellipsis() {
        let mut argv = Argv::default();
        for i in 0..MAX_ARGV + 5 {
            argv.push(format!("row{i}"));
        }
        let rendered = argv.rendered();
        assert_eq!(rendered.len(), MAX_ARGV + 1);
        assert_eq!(rendered.last().unwrap(), "...");
    }
}
