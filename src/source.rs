//! Character source with bounded push-back.
//!
//! [`CharacterSource`] hands out one byte at a time from a buffered reader,
//! folds `CR` and `CR LF` into a single `LF`, keeps the 1-based line number
//! and remembers every character handed out for the token being scanned, so
//! that the tokenizer can give them back one by one with
//! [`retract`](CharacterSource::retract) when a tentative scan fails.

use crate::{Error, Result};
use std::io::BufRead;

/// Byte-level reader used by the tokenizer.
///
/// `None` from [`next`](CharacterSource::next) means end of input. End of
/// input can be retracted like any other character.
///
/// # Examples
///
/// ```rust
/// use cif_sac::CharacterSource;
///
/// let mut src = CharacterSource::new("a\r\nb".as_bytes(), 16);
/// assert_eq!(src.next().unwrap(), Some(b'a'));
/// assert_eq!(src.next().unwrap(), Some(b'\n'));
/// assert_eq!(src.line(), 2);
/// src.retract().unwrap();
/// assert_eq!(src.line(), 1);
/// assert_eq!(src.next().unwrap(), Some(b'\n'));
/// assert_eq!(src.next().unwrap(), Some(b'b'));
/// ```
pub struct CharacterSource<R> {
    reader: R,
    // characters waiting to be handed out again, top of stack is next
    pushback: Vec<u8>,
    capacity: usize,
    // characters handed out since the last clear_token
    token: Vec<u8>,
    // end-of-input markers handed out since the last clear_token
    eof_count: usize,
    line: usize,
}

impl<R: BufRead> CharacterSource<R> {
    /// Creates a source starting at line 1 with the given push-back capacity.
    pub fn new(reader: R, capacity: usize) -> Self {
        Self::with_line(reader, capacity, 1)
    }

    /// Creates a source whose first character is on `line`.
    pub fn with_line(reader: R, capacity: usize, line: usize) -> Self {
        CharacterSource {
            reader,
            pushback: Vec::with_capacity(capacity.min(256)),
            capacity,
            token: Vec::with_capacity(256),
            eof_count: 0,
            line,
        }
    }

    /// The current line number (1-based).
    #[inline]
    pub fn line(&self) -> usize {
        self.line
    }

    /// Characters handed out since the last [`clear_token`](Self::clear_token).
    #[inline]
    pub fn token(&self) -> &[u8] {
        &self.token
    }

    /// Forgets the characters of the current token; they can no longer be retracted.
    pub fn clear_token(&mut self) {
        self.token.clear();
        self.eof_count = 0;
    }

    /// Mutable access to the underlying reader, for scanners that bypass tokenizing.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Drops all buffered state and continues at `line`, typically after the
    /// underlying reader was repositioned.
    pub fn reset(&mut self, line: usize) {
        self.pushback.clear();
        self.clear_token();
        self.line = line;
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        let first = loop {
            match self.reader.fill_buf() {
                Ok(buf) => break buf.first().copied(),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::io(&e.to_string())),
            }
        };
        if first.is_some() {
            self.reader.consume(1);
        }
        Ok(first)
    }

    /// Hands out the next character, or `None` at end of input.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Option<u8>> {
        let mut ch = match self.pushback.pop() {
            Some(b) => Some(b),
            None => self.read_byte()?,
        };

        if ch == Some(b'\r') {
            let lookahead = self.read_byte()?;
            if let Some(b) = lookahead {
                if b != b'\n' {
                    self.push(b)?;
                }
            }
            ch = Some(b'\n');
        }

        match ch {
            Some(b) => {
                self.token.push(b);
                if b == b'\n' {
                    self.line += 1;
                }
            }
            None => self.eof_count += 1,
        }

        Ok(ch)
    }

    /// Gives back the most recently handed out character.
    ///
    /// Fails with a lex error when the push-back stack is full or when there
    /// is nothing left to retract for the current token.
    pub fn retract(&mut self) -> Result<()> {
        if self.eof_count > 0 {
            // the reader keeps reporting end of input, nothing to store
            self.eof_count -= 1;
            return Ok(());
        }

        let ch = match self.token.last() {
            Some(&b) => b,
            None => return Err(Error::lex(self.line, "retract past start of token")),
        };
        self.push(ch)?;
        self.token.pop();
        if ch == b'\n' {
            self.line -= 1;
        }
        Ok(())
    }

    /// Retracts every character of the current token.
    pub fn retract_all(&mut self) -> Result<()> {
        while self.eof_count > 0 || !self.token.is_empty() {
            self.retract()?;
        }
        Ok(())
    }

    fn push(&mut self, ch: u8) -> Result<()> {
        if self.pushback.len() >= self.capacity {
            return Err(Error::lex(self.line, "Buffer overflow"));
        }
        self.pushback.push(ch);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(src: &mut CharacterSource<&[u8]>) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(b) = src.next().unwrap() {
            out.push(b);
        }
        out
    }

    #[test]
    fn test_crlf_folding() {
        let mut src = CharacterSource::new(&b"a\r\nb\rc\n"[..], 8);
        assert_eq!(drain(&mut src), b"a\nb\nc\n");
        assert_eq!(src.line(), 4);
    }

    #[test]
    fn test_retract_restores_line_and_char() {
        let mut src = CharacterSource::new(&b"x\ny\nz"[..], 8);
        src.next().unwrap();
        src.clear_token();
        for _ in 0..4 {
            src.next().unwrap();
        }
        assert_eq!(src.line(), 3);
        for _ in 0..4 {
            src.retract().unwrap();
        }
        assert_eq!(src.line(), 1);
        assert_eq!(src.next().unwrap(), Some(b'\n'));
    }

    #[test]
    fn test_retract_end_of_input() {
        let mut src = CharacterSource::new(&b"ab"[..], 8);
        assert_eq!(drain(&mut src), b"ab");
        src.retract().unwrap();
        src.retract().unwrap();
        assert_eq!(src.next().unwrap(), Some(b'b'));
        assert_eq!(src.next().unwrap(), None);
    }

    #[test]
    fn test_overflow_is_an_error() {
        let mut src = CharacterSource::new(&b"abcdef"[..], 2);
        for _ in 0..3 {
            src.next().unwrap();
        }
        src.retract().unwrap();
        src.retract().unwrap();
        let err = src.retract().unwrap_err();
        assert!(matches!(err, Error::Lex { .. }));
        assert!(err.to_string().contains("Buffer overflow"));
    }

    #[test]
    fn test_retract_without_token_fails() {
        let mut src = CharacterSource::new(&b"a"[..], 2);
        assert!(src.retract().is_err());
    }
}
