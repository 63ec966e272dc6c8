//! Delimiter-terminated token extraction over a single log line.
//!
//! The cursor is the only component that decides what a "field" is; every
//! specifier decoder pulls its token through it.

use crate::util::trim_bytes;

/// Byte cursor over one raw line.
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(line: &'a str) -> Self {
        Self {
            buf: line.as_bytes(),
            pos: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    pub fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos.min(self.buf.len())..]
    }

    pub fn bump(&mut self) {
        if self.pos < self.buf.len() {
            self.pos += 1;
        }
    }

    pub fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.buf.len());
    }

    /// Extract the token ending at the `cnt`-th occurrence of a delimiter,
    /// or at end of input when `delims` is empty. A backslash escapes the
    /// following byte so it is not counted as a delimiter. The token is
    /// returned with surrounding whitespace trimmed and the cursor is left
    /// on the terminating delimiter (or at end of input).
    ///
    /// Only the first delimiter byte actually found in the remaining input
    /// terminates the field; the rest of `delims` are alternatives for that
    /// first hit.
    pub fn token(&mut self, delims: &[u8], cnt: usize) -> Option<String> {
        let rest = self.rest();

        let end = if delims.is_empty() {
            None
        } else {
            let hit = rest.iter().position(|b| delims.contains(b))?;
            Some(rest[hit])
        };

        let mut idx = 0usize;
        let mut i = 0usize;
        while i < rest.len() {
            let b = rest[i];
            if Some(b) == end {
                idx += 1;
                if idx == cnt {
                    let tkn = trim_bytes(&rest[..i]);
                    self.pos += i;
                    return Some(String::from_utf8_lossy(tkn).into_owned());
                }
            }
            if b == b'\\' {
                i += 1;
            }
            i += 1;
        }

        // ran off the end of the line
        let tkn = trim_bytes(rest);
        self.pos = self.buf.len();
        Some(String::from_utf8_lossy(tkn).into_owned())
    }

    /// Skip forward while on ASCII whitespace.
    pub fn skip_spaces(&mut self) {
        while self
            .peek()
            .map(|b| b.is_ascii_whitespace())
            .unwrap_or(false)
        {
            self.pos += 1;
        }
    }

    /// Length of the whitespace run starting at the first space in the
    /// remaining input. Used to absorb syslog-style date padding such as
    /// `"Dec  2"`.
    pub fn space_padding(&self) -> usize {
        let rest = self.rest();
        match rest.iter().position(|&b| b == b' ') {
            Some(i) => rest[i..]
                .iter()
                .take_while(|b| b.is_ascii_whitespace())
                .count(),
            None => 0,
        }
    }

    /// Advance to the next occurrence of `b`, or to end of input when it
    /// does not occur. Used to skip a field whose target is already set.
    pub fn advance_to(&mut self, b: Option<u8>) {
        match b {
            Some(b) => {
                if let Some(off) = self.rest().iter().position(|&c| c == b) {
                    self.pos += off;
                }
            }
            // a template without a following literal skips to the end
            None => self.pos = self.buf.len(),
        }
    }
}
