//! Raw scanners that locate datablocks without tokenizing.
//!
//! Both scanners walk the bytes of a stream once, skipping comments, quoted
//! strings and text fields with the same rules the tokenizer applies, and only
//! look for `data_` at a token boundary. That keeps `_a.b 'data_x'` or
//! `;data_x` inside a text field from producing false hits.
//!
//! - [`find_datablock`] stops right after the `data_<name>` it was asked for,
//!   so parsing can continue from there.
//! - [`index_datablocks`] records the byte offset and line of every
//!   datablock, for random access through [`Seek`](std::io::Seek).

use crate::lexer::{is_non_blank, is_space};
use crate::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use tracing::trace;

/// Where a datablock starts in a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Byte offset of the `d` of `data_`.
    pub offset: u64,
    /// Line the keyword is on.
    pub line: usize,
}

/// Datablock name to position, in stream order.
///
/// # Examples
///
/// ```rust
/// use cif_sac::index_datablocks;
///
/// let index = index_datablocks("data_A\n_x.y 1\ndata_B\n_x.y 2\n".as_bytes()).unwrap();
/// assert_eq!(index.len(), 2);
/// assert_eq!(index.get("B").unwrap().offset, 14);
/// assert_eq!(index.get("B").unwrap().line, 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatablockIndex(IndexMap<String, IndexEntry>);

impl DatablockIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact name lookup.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&IndexEntry> {
        self.0.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> indexmap::map::Keys<'_, String, IndexEntry> {
        self.0.keys()
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, IndexEntry> {
        self.0.iter()
    }

    // the first occurrence of a name wins
    fn insert(&mut self, name: String, entry: IndexEntry) {
        self.0.entry(name).or_insert(entry);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Boundary,
    InToken,
    Comment,
    Quoted(u8),
    QuoteEnd(u8),
    TextField,
    TextFieldLineStart,
}

struct RawScanner<'r, R> {
    reader: &'r mut R,
    offset: u64,
    line: usize,
    after_cr: bool,
    state: State,
    at_line_start: bool,
}

impl<'r, R: BufRead> RawScanner<'r, R> {
    fn new(reader: &'r mut R) -> Self {
        RawScanner {
            reader,
            offset: 0,
            line: 1,
            after_cr: false,
            state: State::Boundary,
            at_line_start: true,
        }
    }

    fn peek(&mut self) -> Result<Option<u8>> {
        loop {
            match self.reader.fill_buf() {
                Ok(buf) => return Ok(buf.first().copied()),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn bump(&mut self, ch: u8) {
        self.reader.consume(1);
        self.offset += 1;
        if ch == b'\r' || (ch == b'\n' && !self.after_cr) {
            self.line += 1;
        }
        self.after_cr = ch == b'\r';
    }

    /// Consumes `data_<name>` at the current position. Returns the name when
    /// the keyword is complete; otherwise the reader stays on the first byte
    /// that did not fit.
    fn datablock_keyword(&mut self) -> Result<Option<String>> {
        for expected in *b"DATA_" {
            match self.peek()? {
                Some(ch) if ch & !0x20 == expected & !0x20 => self.bump(ch),
                _ => return Ok(None),
            }
        }

        let mut name = Vec::new();
        while let Some(ch) = self.peek()? {
            if !is_non_blank(ch) {
                break;
            }
            name.push(ch);
            self.bump(ch);
        }

        if name.is_empty() {
            return Ok(None);
        }
        Ok(String::from_utf8(name).ok())
    }

    /// Advances to the next datablock keyword and consumes it. Returns the
    /// datablock name together with the offset and line of its `data_`.
    fn next_datablock(&mut self) -> Result<Option<(String, IndexEntry)>> {
        while let Some(ch) = self.peek()? {
            let newline = ch == b'\n' || ch == b'\r';

            match self.state {
                State::Boundary => {
                    if is_space(ch) {
                        self.at_line_start = newline;
                    } else if ch == b'd' || ch == b'D' {
                        let entry = IndexEntry {
                            offset: self.offset,
                            line: self.line,
                        };
                        self.state = State::InToken;
                        self.at_line_start = false;
                        if let Some(name) = self.datablock_keyword()? {
                            trace!(offset = entry.offset, line = entry.line, "data_{}", name);
                            return Ok(Some((name, entry)));
                        }
                        continue;
                    } else {
                        self.state = match ch {
                            b'#' => State::Comment,
                            b'\'' | b'"' => State::Quoted(ch),
                            b';' if self.at_line_start => State::TextField,
                            _ => State::InToken,
                        };
                        self.at_line_start = false;
                    }
                }
                State::InToken => {
                    if is_space(ch) {
                        self.state = State::Boundary;
                        self.at_line_start = newline;
                    }
                }
                State::Comment => {
                    if newline {
                        self.state = State::Boundary;
                        self.at_line_start = true;
                    }
                }
                State::Quoted(quote) => {
                    if ch == quote {
                        self.state = State::QuoteEnd(quote);
                    } else if newline {
                        self.state = State::Boundary;
                        self.at_line_start = true;
                    }
                }
                State::QuoteEnd(quote) => {
                    if is_space(ch) {
                        self.state = State::Boundary;
                        self.at_line_start = newline;
                    } else if ch == b'#' {
                        self.state = State::Comment;
                    } else if ch != quote {
                        self.state = State::Quoted(quote);
                    }
                }
                State::TextField => {
                    if newline {
                        self.state = State::TextFieldLineStart;
                    }
                }
                State::TextFieldLineStart => {
                    if ch == b';' {
                        self.state = State::Boundary;
                        self.at_line_start = false;
                    } else if !newline {
                        self.state = State::TextField;
                    }
                }
            }

            self.bump(ch);
        }
        Ok(None)
    }
}

/// Scans forward to `data_<name>` (name matched exactly) and consumes it.
///
/// On success the reader is positioned right after the name and the line
/// number at that position is returned. Returns `None` when the stream holds
/// no such datablock; the reader is then at end of input.
///
/// # Examples
///
/// ```rust
/// use cif_sac::find_datablock;
/// use std::io::Read;
///
/// let mut input = "# data_B in a comment\ndata_A\n_x.y 'data_B'\ndata_B\n_x.y 2\n".as_bytes();
/// assert_eq!(find_datablock(&mut input, "B").unwrap(), Some(4));
///
/// let mut rest = String::new();
/// input.read_to_string(&mut rest).unwrap();
/// assert_eq!(rest, "\n_x.y 2\n");
/// ```
pub fn find_datablock<R: BufRead>(reader: &mut R, name: &str) -> Result<Option<usize>> {
    let mut scanner = RawScanner::new(reader);
    while let Some((found, _)) = scanner.next_datablock()? {
        if found == name {
            return Ok(Some(scanner.line));
        }
    }
    Ok(None)
}

/// Builds the [`DatablockIndex`] of a stream without parsing it.
pub fn index_datablocks<R: BufRead>(mut reader: R) -> Result<DatablockIndex> {
    let mut scanner = RawScanner::new(&mut reader);
    let mut index = DatablockIndex::new();
    while let Some((name, entry)) = scanner.next_datablock()? {
        index.insert(name, entry);
    }
    Ok(index)
}
