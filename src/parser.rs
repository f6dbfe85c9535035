//! Recursive-descent CIF parser.
//!
//! The [`Parser`] reads tokens from a [`Tokenizer`] and reports what it finds
//! to a [`Builder`]. It keeps a single token of lookahead and never
//! backtracks; every grammar violation is fatal.
//!
//! ```text
//! file        := (global | datablock)*
//! global      := GLOBAL (TAG VALUE)*
//! datablock   := DATA (loop | item | saveframe)*
//! loop        := LOOP TAG+ VALUE*        ; VALUE count a multiple of TAG count
//! item        := TAG VALUE
//! saveframe   := SAVE+name (loop | item)* SAVE
//! ```
//!
//! Save frames are only accepted when [`CifOptions::save_frames`] is set.

use crate::lexer::{TokenKind, Tokenizer};
use crate::scan::{self, DatablockIndex};
use crate::{CifOptions, Error, Result};
use std::io::{BufRead, Seek, SeekFrom};
use tracing::debug;

/// Receives the structure found by the [`Parser`].
///
/// `open_row` always follows `open_category`, and every `set_item` names the
/// category that is currently open.
pub trait Builder {
    /// Called for `data_<name>`; everything up to the next datablock belongs to it.
    fn open_datablock(&mut self, name: &str) -> Result<()>;

    /// Called when a loop starts or a bare tag names a different category.
    fn open_category(&mut self, name: &str) -> Result<()>;

    /// Called once per loop row, and once for a run of bare tags.
    fn open_row(&mut self) -> Result<()>;

    /// Sets one value in the current row. `value` is the literal token text.
    fn set_item(&mut self, category: &str, item: &str, value: &str) -> Result<()>;

    /// Called for `save_<name>` in dictionary documents.
    fn open_save_frame(&mut self, _name: &str) -> Result<()> {
        Ok(())
    }

    /// Called for the bare `save_` ending a frame.
    fn close_save_frame(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Splits `_category.item` into its parts. A tag without a dot has an empty
/// category and the whole name as item.
///
/// # Examples
///
/// ```rust
/// use cif_sac::split_tag_name;
///
/// assert_eq!(split_tag_name("_atom_site.Cartn_x"), ("atom_site", "Cartn_x"));
/// assert_eq!(split_tag_name("_a.b.c"), ("a", "b.c"));
/// assert_eq!(split_tag_name("_plain"), ("", "plain"));
/// ```
#[must_use]
pub fn split_tag_name(tag: &str) -> (&str, &str) {
    let name = tag.strip_prefix('_').unwrap_or(tag);
    match name.split_once('.') {
        Some((category, item)) => (category, item),
        None => ("", name),
    }
}

/// Parser driving a [`Builder`].
///
/// # Examples
///
/// ```rust
/// use cif_sac::{CifOptions, DocumentBuilder, Parser};
///
/// let mut builder = DocumentBuilder::new();
/// let mut parser = Parser::new("data_x\n_a.b 1\n".as_bytes(), &mut builder, &CifOptions::new());
/// parser.parse_file().unwrap();
/// assert_eq!(builder.finish().datablocks()[0].name(), "x");
/// ```
pub struct Parser<'b, R, B> {
    lexer: Tokenizer<R>,
    builder: &'b mut B,
    save_frames: bool,
    lookahead: TokenKind,
}

impl<'b, R: BufRead, B: Builder> Parser<'b, R, B> {
    /// Creates a parser reporting to `builder`. Nothing is read until one of
    /// the `parse_*` methods is called.
    pub fn new(reader: R, builder: &'b mut B, options: &CifOptions) -> Self {
        Parser {
            lexer: Tokenizer::new(reader, options),
            builder,
            save_frames: options.save_frames,
            lookahead: TokenKind::Unknown,
        }
    }

    fn advance(&mut self) -> Result<()> {
        self.lookahead = self.lexer.advance()?;
        Ok(())
    }

    fn expect(&mut self, kind: TokenKind) -> Result<()> {
        if self.lookahead != kind {
            return Err(Error::unexpected_token(
                self.lexer.line(),
                kind.name(),
                self.lookahead.name(),
            ));
        }
        Ok(())
    }

    fn consume(&mut self, kind: TokenKind) -> Result<()> {
        self.expect(kind)?;
        self.advance()
    }

    /// Parses the whole stream.
    pub fn parse_file(&mut self) -> Result<()> {
        self.advance()?;

        while self.lookahead != TokenKind::EndOfInput {
            match self.lookahead {
                TokenKind::Global => self.parse_global()?,
                TokenKind::DataOpen => {
                    self.builder.open_datablock(self.lexer.text())?;
                    self.advance()?;
                    self.parse_datablock()?;
                }
                _ => {
                    return Err(Error::syntax(
                        self.lexer.line(),
                        "This file does not seem to be a CIF file",
                    ))
                }
            }
        }
        Ok(())
    }

    /// Parses only the datablock called `name`, found by a linear scan.
    /// Returns `false` when the stream has no such datablock.
    ///
    /// # Errors
    ///
    /// The datablock is held to the same grammar as in [`parse_file`](Self::parse_file):
    /// anything but a tag, loop or the start of the next block is an error.
    pub fn parse_single_datablock(&mut self, name: &str) -> Result<bool> {
        let line = match scan::find_datablock(self.lexer.get_mut(), name)? {
            Some(line) => line,
            None => return Ok(false),
        };

        self.lexer.reset(line, false);
        self.builder.open_datablock(name)?;
        self.advance()?;
        self.parse_datablock()?;
        Ok(true)
    }

    // tag/value pairs of a global block are read and dropped
    fn parse_global(&mut self) -> Result<()> {
        self.consume(TokenKind::Global)?;
        while self.lookahead == TokenKind::Tag {
            self.advance()?;
            self.consume(TokenKind::Value)?;
        }
        Ok(())
    }

    fn parse_datablock(&mut self) -> Result<()> {
        let mut category = String::new();

        loop {
            match self.lookahead {
                TokenKind::Loop => {
                    self.parse_loop()?;
                    category.clear();
                }
                TokenKind::Tag => self.parse_item(&mut category)?,
                TokenKind::SaveOpen => {
                    self.parse_save_frame()?;
                    category.clear();
                }
                TokenKind::SaveClose => {
                    return Err(Error::syntax(
                        self.lexer.line(),
                        "save_ without an open save frame",
                    ))
                }
                TokenKind::DataOpen | TokenKind::Global | TokenKind::EndOfInput => return Ok(()),
                other => {
                    return Err(Error::unexpected_token(
                        self.lexer.line(),
                        TokenKind::Tag.name(),
                        other.name(),
                    ))
                }
            }
        }
    }

    fn parse_loop(&mut self) -> Result<()> {
        self.consume(TokenKind::Loop)?;
        self.expect(TokenKind::Tag)?;

        let mut category = String::new();
        let mut items = Vec::new();

        while self.lookahead == TokenKind::Tag {
            let (cat, item) = split_tag_name(self.lexer.text());
            if items.is_empty() {
                category = cat.to_string();
                self.builder.open_category(&category)?;
            } else if !category.eq_ignore_ascii_case(cat) {
                return Err(Error::syntax(
                    self.lexer.line(),
                    "inconsistent categories in loop_",
                ));
            }
            items.push(item.to_string());
            self.advance()?;
        }

        while self.lookahead == TokenKind::Value {
            self.builder.open_row()?;
            for item in &items {
                self.expect(TokenKind::Value)?;
                self.builder.set_item(&category, item, self.lexer.text())?;
                self.advance()?;
            }
        }
        Ok(())
    }

    fn parse_item(&mut self, current: &mut String) -> Result<()> {
        let (cat, item) = split_tag_name(self.lexer.text());
        let item = item.to_string();
        if !current.eq_ignore_ascii_case(cat) || current.is_empty() {
            *current = cat.to_string();
            self.builder.open_category(current.as_str())?;
            self.builder.open_row()?;
        }

        self.advance()?;
        self.expect(TokenKind::Value)?;
        self.builder.set_item(current.as_str(), &item, self.lexer.text())?;
        self.advance()
    }

    fn parse_save_frame(&mut self) -> Result<()> {
        if !self.save_frames {
            return Err(Error::syntax(
                self.lexer.line(),
                "save frame not permitted here",
            ));
        }

        self.builder.open_save_frame(self.lexer.text())?;
        self.advance()?;

        let mut category = String::new();
        loop {
            match self.lookahead {
                TokenKind::Loop => {
                    self.parse_loop()?;
                    category.clear();
                }
                TokenKind::Tag => self.parse_item(&mut category)?,
                _ => break,
            }
        }

        self.consume(TokenKind::SaveClose)?;
        self.builder.close_save_frame()
    }
}

impl<'b, R: BufRead + Seek, B: Builder> Parser<'b, R, B> {
    /// Parses only the datablock called `name`, jumping straight to it with
    /// an index built by [`index_datablocks`](crate::index_datablocks) on the
    /// same stream. Returns `false` when the index has no such datablock.
    pub fn parse_datablock_at(&mut self, index: &DatablockIndex, name: &str) -> Result<bool> {
        let entry = match index.get(name) {
            Some(entry) => *entry,
            None => return Ok(false),
        };
        debug!(offset = entry.offset, line = entry.line, "seeking datablock {}", name);

        self.lexer.get_mut().seek(SeekFrom::Start(entry.offset))?;
        self.lexer.reset(entry.line, true);
        self.advance()?;

        if self.lookahead != TokenKind::DataOpen || self.lexer.text() != name {
            return Err(Error::syntax(
                entry.line,
                &format!("index entry for datablock {} does not match the stream", name),
            ));
        }

        self.builder.open_datablock(name)?;
        self.advance()?;
        self.parse_datablock()?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DocumentBuilder;

    /// Records every event as text.
    #[derive(Default)]
    struct Recorder(Vec<String>);

    impl Builder for Recorder {
        fn open_datablock(&mut self, name: &str) -> Result<()> {
            self.0.push(format!("datablock {name}"));
            Ok(())
        }
        fn open_category(&mut self, name: &str) -> Result<()> {
            self.0.push(format!("category {name}"));
            Ok(())
        }
        fn open_row(&mut self) -> Result<()> {
            self.0.push("row".to_string());
            Ok(())
        }
        fn set_item(&mut self, category: &str, item: &str, value: &str) -> Result<()> {
            self.0.push(format!("{category}.{item}={value}"));
            Ok(())
        }
        fn open_save_frame(&mut self, name: &str) -> Result<()> {
            self.0.push(format!("save {name}"));
            Ok(())
        }
        fn close_save_frame(&mut self) -> Result<()> {
            self.0.push("end save".to_string());
            Ok(())
        }
    }

    fn events(input: &str, options: &CifOptions) -> Result<Vec<String>> {
        let mut recorder = Recorder::default();
        Parser::new(input.as_bytes(), &mut recorder, options).parse_file()?;
        Ok(recorder.0)
    }

    #[test]
    fn test_loop_events() {
        let events = events("data_T\nloop_\n_t.a\n_T.b\n1 2\n3 4\n", &CifOptions::new()).unwrap();
        assert_eq!(
            events,
            vec!["datablock T", "category t", "row", "t.a=1", "t.b=2", "row", "t.a=3", "t.b=4"]
        );
    }

    #[test]
    fn test_bare_tags_share_a_row() {
        let events = events(
            "data_T\n_a.x 1\n_A.y 2\n_b.x 3\n_a.z 4\n",
            &CifOptions::new(),
        )
        .unwrap();
        assert_eq!(
            events,
            vec![
                "datablock T",
                "category a",
                "row",
                "a.x=1",
                "a.y=2",
                "category b",
                "row",
                "b.x=3",
                "category a",
                "row",
                "a.z=4"
            ]
        );
    }

    #[test]
    fn test_tag_after_loop_opens_category_again() {
        let events = events("data_T\nloop_\n_a.x\n1\n_a.y 2\n", &CifOptions::new()).unwrap();
        assert_eq!(
            events,
            vec!["datablock T", "category a", "row", "a.x=1", "category a", "row", "a.y=2"]
        );
    }

    #[test]
    fn test_global_block_is_dropped() {
        let events = events("global_\n_g.x 1\ndata_T\n_a.x 1\n", &CifOptions::new()).unwrap();
        assert_eq!(events, vec!["datablock T", "category a", "row", "a.x=1"]);
    }

    #[test]
    fn test_inconsistent_loop() {
        let err = events("data_T\nloop_\n_a.x\n_b.y\n1 2\n", &CifOptions::new()).unwrap_err();
        assert!(matches!(err, Error::Syntax { line: 4, .. }));
        assert!(err.to_string().contains("inconsistent categories in loop_"));
    }

    #[test]
    fn test_incomplete_loop_row() {
        let err = events("data_T\nloop_\n_a.x\n_a.y\n1 2\n3\n", &CifOptions::new()).unwrap_err();
        assert!(matches!(err, Error::UnexpectedToken { .. }));
        assert!(err.to_string().contains("expected Value but found End of file"));
    }

    #[test]
    fn test_loop_without_tags() {
        let err = events("data_T\nloop_\n1 2\n", &CifOptions::new()).unwrap_err();
        assert!(err.to_string().contains("expected Tag but found Value"));
    }

    #[test]
    fn test_tag_without_value() {
        let err = events("data_T\n_a.x\n_a.y 1\n", &CifOptions::new()).unwrap_err();
        assert!(err.to_string().contains("expected Value but found Tag"));
    }

    #[test]
    fn test_not_a_cif_file() {
        for input in ["hello", "_a.b 1", "data_\n_a.b 1", "loop_ _a.b 1"] {
            let err = events(input, &CifOptions::new()).unwrap_err();
            assert!(err.to_string().contains("does not seem to be a CIF file"), "{input}");
        }
    }

    #[test]
    fn test_leftover_tokens_in_datablock() {
        let err = events("data_T\n_a.b 1 2\n", &CifOptions::new()).unwrap_err();
        assert!(matches!(err, Error::UnexpectedToken { line: 2, .. }));
        assert!(err.to_string().contains("expected Tag but found Value"));

        let err = events("data_T\n_a.b 1\nstop_\n", &CifOptions::new()).unwrap_err();
        assert!(err.to_string().contains("expected Tag but found STOP"));
    }

    #[test]
    fn test_empty_input() {
        assert!(events("", &CifOptions::new()).unwrap().is_empty());
        assert!(events("# only a comment\n", &CifOptions::new()).unwrap().is_empty());
    }

    #[test]
    fn test_save_frame_rejected_in_plain_documents() {
        let err = events("data_D\nsave_x\n_a.b 1\nsave_\n", &CifOptions::new()).unwrap_err();
        assert!(err.to_string().contains("save frame not permitted here"));
    }

    #[test]
    fn test_save_frames_in_dictionaries() {
        let events = events(
            "data_D\n_d.title x\nsave_f\n_a.b 1\nloop_\n_c.d\n2\nsave_\n_d.version 1\n",
            &CifOptions::dictionary(),
        )
        .unwrap();
        assert_eq!(
            events,
            vec![
                "datablock D",
                "category d",
                "row",
                "d.title=x",
                "save f",
                "category a",
                "row",
                "a.b=1",
                "category c",
                "row",
                "c.d=2",
                "end save",
                "category d",
                "row",
                "d.version=1"
            ]
        );
    }

    #[test]
    fn test_unclosed_save_frame() {
        let err = events("data_D\nsave_f\n_a.b 1\n", &CifOptions::dictionary()).unwrap_err();
        assert!(err.to_string().contains("expected SAVE but found End of file"));
    }

    #[test]
    fn test_stray_save_close() {
        let err = events("data_D\n_a.b 1\nsave_\n", &CifOptions::dictionary()).unwrap_err();
        assert!(err.to_string().contains("save_ without an open save frame"));
    }

    #[test]
    fn test_single_datablock_by_scan() {
        let input = "data_A\n_a.x 1\ndata_B\n_b.x\n;\ntext\n;\ndata_C\n_c.x 3\n";
        let mut recorder = Recorder::default();
        let mut parser = Parser::new(input.as_bytes(), &mut recorder, &CifOptions::new());
        assert!(parser.parse_single_datablock("B").unwrap());
        assert_eq!(
            recorder.0,
            vec!["datablock B", "category b", "row", "b.x=text"]
        );
    }

    #[test]
    fn test_single_datablock_leftover_value() {
        let input = "data_A\n_a.x 1\ndata_B\n_b.x 1 2\n";
        let mut recorder = Recorder::default();
        let mut parser = Parser::new(input.as_bytes(), &mut recorder, &CifOptions::new());
        let err = parser.parse_single_datablock("B").unwrap_err();
        assert!(matches!(err, Error::UnexpectedToken { line: 4, .. }));
    }

    #[test]
    fn test_single_datablock_stops_at_next_datablock() {
        let input = "data_A\n_a.x 1\ndata_B\n_b.x 2\nglobal_\n_g.x 3\n";
        let mut recorder = Recorder::default();
        let mut parser = Parser::new(input.as_bytes(), &mut recorder, &CifOptions::new());
        assert!(parser.parse_single_datablock("B").unwrap());
        assert_eq!(recorder.0, vec!["datablock B", "category b", "row", "b.x=2"]);
    }

    #[test]
    fn test_datablock_at_index_leftover_value() {
        let input = "data_A\n_a.x 1\ndata_B\n_b.x 1 2\n";
        let index = crate::index_datablocks(input.as_bytes()).unwrap();
        let mut recorder = Recorder::default();
        let mut parser = Parser::new(
            std::io::Cursor::new(input.as_bytes()),
            &mut recorder,
            &CifOptions::new(),
        );
        let err = parser.parse_datablock_at(&index, "B").unwrap_err();
        assert!(matches!(err, Error::UnexpectedToken { line: 4, .. }));
    }

    #[test]
    fn test_single_datablock_missing() {
        let mut builder = DocumentBuilder::new();
        let mut parser = Parser::new("data_A\n_a.x 1\n".as_bytes(), &mut builder, &CifOptions::new());
        assert!(!parser.parse_single_datablock("B").unwrap());
        assert!(builder.finish().is_empty());
    }

    #[test]
    fn test_datablock_at_index() {
        let input = "data_A\n_a.x 1\ndata_B\nloop_\n_b.x\n2\n3\n";
        let index = crate::index_datablocks(input.as_bytes()).unwrap();

        let mut recorder = Recorder::default();
        let mut parser = Parser::new(
            std::io::Cursor::new(input.as_bytes()),
            &mut recorder,
            &CifOptions::new(),
        );
        assert!(parser.parse_datablock_at(&index, "B").unwrap());
        assert!(!parser.parse_datablock_at(&index, "Z").unwrap());
        assert_eq!(
            recorder.0,
            vec!["datablock B", "category b", "row", "b.x=2", "row", "b.x=3"]
        );
    }

    #[test]
    fn test_line_numbers_after_seek() {
        let input = "data_A\n_a.x 1\ndata_B\n_b.x\n";
        let index = crate::index_datablocks(input.as_bytes()).unwrap();
        let mut recorder = Recorder::default();
        let mut parser = Parser::new(
            std::io::Cursor::new(input.as_bytes()),
            &mut recorder,
            &CifOptions::new(),
        );
        let err = parser.parse_datablock_at(&index, "B").unwrap_err();
        assert_eq!(err.line(), Some(5));
    }

    #[test]
    fn test_stale_index_is_detected() {
        let index = crate::index_datablocks("data_A\n_a.x 1\ndata_B\n".as_bytes()).unwrap();
        let mut recorder = Recorder::default();
        let mut parser = Parser::new(
            std::io::Cursor::new("data_A\n_a.x 12345\n".as_bytes()),
            &mut recorder,
            &CifOptions::new(),
        );
        let err = parser.parse_datablock_at(&index, "B").unwrap_err();
        assert!(err.to_string().contains("does not match the stream"));
    }
}
