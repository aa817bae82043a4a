//! Incremental line splitting over raw output chunks.
//!
//! Chunks arrive at arbitrary boundaries, so a line (or a `\r\n` pair) can
//! be split across two reads. `LineSplitter` keeps the incomplete tail and
//! treats `\n`, `\r\n`, and a bare `\r` as one line break each.

use bytes::{Bytes, BytesMut};
use memchr::memchr2;

/// Splits a byte stream into lines without their terminators.
#[derive(Debug, Default)]
pub struct LineSplitter {
    /// Bytes of the current, unterminated line.
    pending: BytesMut,

    /// The previous chunk ended in `\r`; a leading `\n` in the next chunk
    /// belongs to the same break.
    skip_lf: bool,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every line it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        if self.skip_lf {
            self.skip_lf = false;
            if let Some(stripped) = rest.strip_prefix(b"\n") {
                rest = stripped;
            }
        }

        while let Some(pos) = memchr2(b'\n', b'\r', rest) {
            self.pending.extend_from_slice(&rest[..pos]);
            lines.push(self.pending.split().freeze());

            let is_cr = rest[pos] == b'\r';
            rest = &rest[pos + 1..];

            if is_cr {
                match rest.first() {
                    Some(b'\n') => rest = &rest[1..],
                    Some(_) => {}
                    None => self.skip_lf = true,
                }
            }
        }

        self.pending.extend_from_slice(rest);
        lines
    }

    /// Return the unterminated tail once the stream has ended.
    pub fn finish(&mut self) -> Option<Bytes> {
        self.skip_lf = false;
        if self.pending.is_empty() {
            None
        } else {
            Some(self.pending.split().freeze())
        }
    }

    /// Bytes held for the current incomplete line.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
