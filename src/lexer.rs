//! CIF tokenizer.
//!
//! The [`Tokenizer`] pulls characters from a [`CharacterSource`] and turns
//! them into [`Token`]s. Unquoted runs go through a cascade of scanners,
//! tried in order:
//!
//! 1. floating point number
//! 2. integer
//! 3. reserved word (see [`KeywordAutomaton`])
//! 4. generic unquoted value
//!
//! When a scanner's grammar is violated before a blank terminates the run,
//! every character it consumed is retracted and the next scanner starts over
//! from the first character. Tags, quoted strings, text fields, comments and
//! the lone `?` are recognized directly.
//!
//! The text of the current token lives in a buffer owned by the tokenizer and
//! is handed out as a borrow, so it cannot outlive the next call to
//! [`advance`](Tokenizer::advance).

use crate::keyword::{Keyword, KeywordAutomaton, Step};
use crate::source::CharacterSource;
use crate::{CifOptions, Error, Result};
use std::fmt;
use std::io::BufRead;
use tracing::{trace, warn};

/// Space, tab, newline, carriage return, vertical tab or form feed.
#[inline]
pub(crate) fn is_space(ch: u8) -> bool {
    matches!(ch, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c)
}

/// Terminates numbers and quoted strings: whitespace, a comment start or end of input.
#[inline]
pub(crate) fn is_white(ch: Option<u8>) -> bool {
    match ch {
        None => true,
        Some(c) => is_space(c) || c == b'#',
    }
}

/// Printable and not a space. Bytes above 0x7f are part of UTF-8 sequences.
#[inline]
pub(crate) fn is_non_blank(ch: u8) -> bool {
    (0x21..=0x7e).contains(&ch) || ch >= 0x80
}

/// May start an unquoted value.
#[inline]
pub(crate) fn is_ordinary(ch: u8) -> bool {
    is_non_blank(ch) && !matches!(ch, b'#' | b'$' | b'\'' | b'"' | b'_' | b';' | b'[' | b']')
}

/// Allowed inside comments, quoted strings and text fields.
#[inline]
pub(crate) fn is_any_print(ch: u8) -> bool {
    ch == b'\t' || ch == b' ' || is_non_blank(ch)
}

/// May start a continuation line of a text field.
#[inline]
pub(crate) fn is_text_lead(ch: u8) -> bool {
    is_any_print(ch) && ch != b';'
}

/// Returns `true` when `text` can be written without quotes: it must start
/// with an ordinary character, contain no blanks and must not read as a
/// reserved word.
///
/// # Examples
///
/// ```rust
/// use cif_sac::is_unquoted_string;
///
/// assert!(is_unquoted_string("ALA"));
/// assert!(is_unquoted_string("loops"));
/// assert!(!is_unquoted_string("loop_"));
/// assert!(!is_unquoted_string("data_1abc"));
/// assert!(!is_unquoted_string("two words"));
/// assert!(!is_unquoted_string("'quoted"));
/// ```
#[must_use]
pub fn is_unquoted_string(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut result = bytes.first().map_or(true, |&b| is_ordinary(b));
    if result {
        let mut automaton = KeywordAutomaton::new();
        for &ch in bytes {
            if !is_non_blank(ch) {
                result = false;
                break;
            }
            automaton.step(Some(ch));
        }
        if automaton.matched() {
            result = false;
        }
    }
    result
}

/// Kind of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// `_category.item`, text includes the underscore.
    Tag,
    /// Any value: number, unquoted, quoted, text field, `?` or `.`.
    Value,
    /// `data_<name>`, text is the name.
    DataOpen,
    /// `global_`
    Global,
    /// `loop_`
    Loop,
    /// `save_<name>`, text is the name.
    SaveOpen,
    /// bare `save_`
    SaveClose,
    /// `stop_`
    Stop,
    EndOfInput,
    /// No token read yet.
    Unknown,
}

impl TokenKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            TokenKind::Tag => "Tag",
            TokenKind::Value => "Value",
            TokenKind::DataOpen => "DATA",
            TokenKind::Global => "GLOBAL",
            TokenKind::Loop => "LOOP",
            TokenKind::SaveOpen => "SAVE+name",
            TokenKind::SaveClose => "SAVE",
            TokenKind::Stop => "STOP",
            TokenKind::EndOfInput => "End of file",
            TokenKind::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<Keyword> for TokenKind {
    fn from(keyword: Keyword) -> Self {
        match keyword {
            Keyword::DataOpen => TokenKind::DataOpen,
            Keyword::Global => TokenKind::Global,
            Keyword::Loop => TokenKind::Loop,
            Keyword::SaveOpen => TokenKind::SaveOpen,
            Keyword::SaveClose => TokenKind::SaveClose,
            Keyword::Stop => TokenKind::Stop,
        }
    }
}

/// A token with a view on its literal text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    White,
    Comment,
    QuestionMark,
    TextField,
    TextFieldNewline,
    QuotedString,
    QuotedStringQuote,
    Tag,
    Float,
    FloatSign,
    FloatDigits,
    FloatFraction,
    FloatExponent,
    FloatExponentSign,
    FloatExponentDigits,
    Int,
    IntSign,
    IntDigits,
    Reserved,
    Value,
}

/// Pull tokenizer over a buffered reader.
///
/// # Examples
///
/// ```rust
/// use cif_sac::{CifOptions, TokenKind, Tokenizer};
///
/// let mut lexer = Tokenizer::new("data_1CBS\nloop_ _a.b 1.5e3 'x y'".as_bytes(), &CifOptions::new());
/// let mut kinds = Vec::new();
/// loop {
///     let token = lexer.next_token().unwrap();
///     if token.kind == TokenKind::EndOfInput {
///         break;
///     }
///     kinds.push((token.kind, token.text.to_string()));
/// }
/// assert_eq!(kinds[0], (TokenKind::DataOpen, "1CBS".to_string()));
/// assert_eq!(kinds[1].0, TokenKind::Loop);
/// assert_eq!(kinds[3], (TokenKind::Value, "1.5e3".to_string()));
/// assert_eq!(kinds[4], (TokenKind::Value, "x y".to_string()));
/// ```
pub struct Tokenizer<R> {
    source: CharacterSource<R>,
    at_line_start: bool,
    warn_invalid_characters: bool,
    kind: TokenKind,
    text: String,
}

impl<R: BufRead> Tokenizer<R> {
    /// Creates a tokenizer at line 1, at the start of a line. Push-back
    /// capacity and character warnings come from `options`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cif_sac::{CifOptions, Tokenizer, TokenKind};
    ///
    /// let mut lexer = Tokenizer::new(";text\n;\n".as_bytes(), &CifOptions::new());
    /// assert_eq!(lexer.advance().unwrap(), TokenKind::Value);
    /// assert_eq!(lexer.text(), "text");
    /// assert_eq!(lexer.line(), 2);
    /// ```
    pub fn new(reader: R, options: &CifOptions) -> Self {
        Tokenizer {
            source: CharacterSource::new(reader, options.pushback_capacity),
            at_line_start: true,
            warn_invalid_characters: options.warn_invalid_characters,
            kind: TokenKind::Unknown,
            text: String::with_capacity(256),
        }
    }

    /// Current line number.
    #[inline]
    pub fn line(&self) -> usize {
        self.source.line()
    }

    /// Kind of the current token.
    #[inline]
    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    /// Text of the current token, valid until the next advance.
    #[inline]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[inline]
    pub fn token(&self) -> Token<'_> {
        Token {
            kind: self.kind,
            text: &self.text,
        }
    }

    /// Mutable access to the underlying reader. Only meaningful before the
    /// first token is read or right after [`reset`](Self::reset).
    pub fn get_mut(&mut self) -> &mut R {
        self.source.get_mut()
    }

    /// Forgets all buffered characters and continues on `line`, typically
    /// after the reader was repositioned.
    pub fn reset(&mut self, line: usize, at_line_start: bool) {
        self.source.reset(line);
        self.at_line_start = at_line_start;
        self.kind = TokenKind::Unknown;
        self.text.clear();
    }

    /// Advances and returns the new current token.
    pub fn next_token(&mut self) -> Result<Token<'_>> {
        self.advance()?;
        Ok(self.token())
    }

    fn restart(&mut self, start: State) -> Result<State> {
        self.source.retract_all()?;
        match start {
            State::Start => Ok(State::Float),
            State::Float => Ok(State::Int),
            State::Int => Ok(State::Reserved),
            State::Reserved => Ok(State::Value),
            _ => Err(Error::lex(self.source.line(), "Invalid state in tokenizer")),
        }
    }

    fn invalid_character(&self, ch: u8, context: &str) {
        if self.warn_invalid_characters {
            warn!(
                line = self.source.line(),
                "invalid character in {}: {:#04x}",
                context,
                ch
            );
        }
    }

    fn set_text(&mut self, from: usize, to: usize) -> Result<()> {
        let bytes = &self.source.token()[from..to];
        let text = std::str::from_utf8(bytes)
            .map_err(|_| Error::lex(self.source.line(), "invalid UTF-8 in token"))?;
        self.text.clear();
        self.text.push_str(text);
        Ok(())
    }

    /// Reads the next token and makes it current.
    pub fn advance(&mut self) -> Result<TokenKind> {
        let mut bol = std::mem::replace(&mut self.at_line_start, false);
        self.source.clear_token();
        self.text.clear();

        let mut state = State::Start;
        let mut start = State::Start;
        let mut quote = 0u8;
        let mut automaton = KeywordAutomaton::new();

        let kind = loop {
            let ch = self.source.next()?;

            match state {
                State::Start => match ch {
                    None => break TokenKind::EndOfInput,
                    Some(b'\n') => {
                        bol = true;
                        state = State::White;
                    }
                    Some(c) if is_space(c) => {
                        bol = false;
                        state = State::White;
                    }
                    Some(b'#') => state = State::Comment,
                    Some(b'_') => state = State::Tag,
                    Some(b';') if bol => state = State::TextField,
                    Some(b'?') => state = State::QuestionMark,
                    Some(c @ (b'\'' | b'"')) => {
                        quote = c;
                        state = State::QuotedString;
                    }
                    Some(c) if !is_non_blank(c) => {
                        return Err(Error::lex(
                            self.source.line(),
                            &format!("invalid character {:#04x}", c),
                        ))
                    }
                    Some(_) => {
                        start = self.restart(start)?;
                        state = start;
                        bol = false;
                    }
                },

                State::White => match ch {
                    None => break TokenKind::EndOfInput,
                    Some(c) if is_space(c) => bol = c == b'\n',
                    Some(_) => {
                        self.source.retract()?;
                        self.source.clear_token();
                        state = State::Start;
                    }
                },

                State::Comment => match ch {
                    None => break TokenKind::EndOfInput,
                    Some(b'\n') => {
                        bol = true;
                        self.source.clear_token();
                        state = State::Start;
                    }
                    Some(c) if !is_any_print(c) => {
                        return Err(Error::lex(self.source.line(), "invalid character in comment"))
                    }
                    Some(_) => {}
                },

                State::QuestionMark => {
                    if ch.map_or(false, is_non_blank) {
                        start = self.restart(start)?;
                        state = start;
                        bol = false;
                    } else {
                        self.source.retract()?;
                        self.set_text(0, 1)?;
                        break TokenKind::Value;
                    }
                }

                State::TextField => match ch {
                    Some(b'\n') => state = State::TextFieldNewline,
                    None => return Err(Error::lex(self.source.line(), "unterminated textfield")),
                    Some(c) if !is_any_print(c) => self.invalid_character(c, "text field"),
                    Some(_) => {}
                },

                State::TextFieldNewline => match ch {
                    Some(b';') => {
                        let len = self.source.token().len();
                        let mut from = 1;
                        if self.source.token()[1] == b'\n' && len > 3 {
                            from = 2;
                        }
                        self.set_text(from, len - 2)?;
                        break TokenKind::Value;
                    }
                    Some(b'\n') => {}
                    Some(c) if is_text_lead(c) => state = State::TextField,
                    None => return Err(Error::lex(self.source.line(), "unterminated textfield")),
                    Some(_) => {
                        return Err(Error::lex(
                            self.source.line(),
                            "invalid character in text field",
                        ))
                    }
                },

                State::QuotedString => match ch {
                    None => {
                        return Err(Error::lex(self.source.line(), "unterminated quoted string"))
                    }
                    Some(b'\n') => {
                        self.source.retract()?;
                        return Err(Error::lex(self.source.line(), "unterminated quoted string"));
                    }
                    Some(c) if c == quote => state = State::QuotedStringQuote,
                    Some(c) if !is_any_print(c) => self.invalid_character(c, "quoted string"),
                    Some(_) => {}
                },

                State::QuotedStringQuote => {
                    if is_white(ch) {
                        self.source.retract()?;
                        let len = self.source.token().len();
                        self.set_text(1, len - 1)?;
                        break TokenKind::Value;
                    }
                    match ch {
                        Some(c) if c == quote => {}
                        Some(c) if is_any_print(c) => state = State::QuotedString,
                        _ => {
                            return Err(Error::lex(
                                self.source.line(),
                                "invalid character in quoted string",
                            ))
                        }
                    }
                }

                State::Tag => {
                    if !ch.map_or(false, is_non_blank) {
                        self.source.retract()?;
                        let len = self.source.token().len();
                        self.set_text(0, len)?;
                        break TokenKind::Tag;
                    }
                }

                State::Float => match ch {
                    Some(b'+' | b'-') => state = State::FloatSign,
                    Some(c) if c.is_ascii_digit() => state = State::FloatDigits,
                    _ => {
                        start = self.restart(start)?;
                        state = start;
                    }
                },

                State::FloatSign | State::FloatExponentSign => match ch {
                    Some(c) if c.is_ascii_digit() => {
                        state = if state == State::FloatSign {
                            State::FloatDigits
                        } else {
                            State::FloatExponentDigits
                        }
                    }
                    _ => {
                        start = self.restart(start)?;
                        state = start;
                    }
                },

                State::FloatDigits | State::FloatFraction => match ch {
                    Some(c) if c.is_ascii_digit() => {}
                    Some(b'.') if state == State::FloatDigits => state = State::FloatFraction,
                    Some(b'e' | b'E') => state = State::FloatExponent,
                    _ if is_white(ch) => {
                        self.source.retract()?;
                        let len = self.source.token().len();
                        self.set_text(0, len)?;
                        break TokenKind::Value;
                    }
                    _ => {
                        start = self.restart(start)?;
                        state = start;
                    }
                },

                State::FloatExponent => match ch {
                    Some(b'+' | b'-') => state = State::FloatExponentSign,
                    Some(c) if c.is_ascii_digit() => state = State::FloatExponentDigits,
                    _ => {
                        start = self.restart(start)?;
                        state = start;
                    }
                },

                State::FloatExponentDigits | State::IntDigits => match ch {
                    Some(c) if c.is_ascii_digit() => {}
                    _ if is_white(ch) => {
                        self.source.retract()?;
                        let len = self.source.token().len();
                        self.set_text(0, len)?;
                        break TokenKind::Value;
                    }
                    _ => {
                        start = self.restart(start)?;
                        state = start;
                    }
                },

                State::Int => match ch {
                    Some(b'+' | b'-') => state = State::IntSign,
                    Some(c) if c.is_ascii_digit() => state = State::IntDigits,
                    _ => {
                        start = self.restart(start)?;
                        state = start;
                    }
                },

                State::IntSign => match ch {
                    Some(c) if c.is_ascii_digit() => state = State::IntDigits,
                    _ => {
                        start = self.restart(start)?;
                        state = start;
                    }
                },

                State::Reserved => match automaton.step(ch) {
                    Step::Undefined => {}
                    Step::NoKeyword => {
                        start = self.restart(start)?;
                        state = start;
                    }
                    Step::Keyword(keyword) => {
                        self.source.retract()?;
                        let len = self.source.token().len();
                        match keyword {
                            Keyword::DataOpen | Keyword::SaveOpen => self.set_text(5, len)?,
                            _ => self.set_text(0, len)?,
                        }
                        break TokenKind::from(keyword);
                    }
                },

                State::Value => {
                    if !ch.map_or(false, is_non_blank) {
                        self.source.retract()?;
                        let len = self.source.token().len();
                        self.set_text(0, len)?;
                        break TokenKind::Value;
                    }
                }
            }
        };

        trace!(line = self.source.line(), "{} {:?}", kind, self.text);
        self.kind = kind;
        Ok(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<(TokenKind, String)> {
        let mut lexer = Tokenizer::new(input.as_bytes(), &CifOptions::new());
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token().unwrap();
            if token.kind == TokenKind::EndOfInput {
                return out;
            }
            out.push((token.kind, token.text.to_string()));
        }
    }

    fn values(input: &str) -> Vec<String> {
        tokens(input)
            .into_iter()
            .map(|(kind, text)| {
                assert_eq!(kind, TokenKind::Value, "{text}");
                text
            })
            .collect()
    }

    fn lex_error(input: &str) -> Error {
        let mut lexer = Tokenizer::new(input.as_bytes(), &CifOptions::new());
        loop {
            match lexer.advance() {
                Ok(TokenKind::EndOfInput) => panic!("expected an error for {input:?}"),
                Ok(_) => {}
                Err(e) => return e,
            }
        }
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            values("1 -2 +3 1.5 -0.25 1. 1e10 1.5E-3 2e+7"),
            vec!["1", "-2", "+3", "1.5", "-0.25", "1.", "1e10", "1.5E-3", "2e+7"]
        );
    }

    #[test]
    fn test_numeric_prefix_falls_back_to_value() {
        assert_eq!(
            values("12abc 1.2.3 1e 1e+ - + 3.14(2) 1-2"),
            vec!["12abc", "1.2.3", "1e", "1e+", "-", "+", "3.14(2)", "1-2"]
        );
    }

    #[test]
    fn test_number_terminated_by_comment() {
        assert_eq!(values("12# a comment\n13"), vec!["12", "13"]);
    }

    #[test]
    fn test_keywords() {
        let kinds: Vec<_> = tokens("global_ loop_ LOOP_ stop_ save_x save_ data_abc")
            .into_iter()
            .collect();
        assert_eq!(
            kinds,
            vec![
                (TokenKind::Global, "global_".to_string()),
                (TokenKind::Loop, "loop_".to_string()),
                (TokenKind::Loop, "LOOP_".to_string()),
                (TokenKind::Stop, "stop_".to_string()),
                (TokenKind::SaveOpen, "x".to_string()),
                (TokenKind::SaveClose, "save_".to_string()),
                (TokenKind::DataOpen, "abc".to_string()),
            ]
        );
    }

    #[test]
    fn test_keyword_lookalikes_are_values() {
        assert_eq!(values("loops data_ loop_x dat"), vec!["loops", "data_", "loop_x", "dat"]);
    }

    #[test]
    fn test_keyword_at_end_of_input() {
        assert_eq!(tokens("loop_"), vec![(TokenKind::Loop, "loop_".to_string())]);
        assert_eq!(tokens("data_x"), vec![(TokenKind::DataOpen, "x".to_string())]);
    }

    #[test]
    fn test_tags() {
        assert_eq!(
            tokens("_atom_site.id 1"),
            vec![
                (TokenKind::Tag, "_atom_site.id".to_string()),
                (TokenKind::Value, "1".to_string())
            ]
        );
    }

    #[test]
    fn test_question_mark() {
        assert_eq!(values("? ?x ."), vec!["?", "?x", "."]);
    }

    #[test]
    fn test_quoted_strings() {
        assert_eq!(values("'a b' \"c d\""), vec!["a b", "c d"]);
        // a quote not followed by a blank is part of the text
        assert_eq!(values("'it's here' \"O5'\""), vec!["it's here", "O5'"]);
        assert_eq!(values("''"), vec![""]);
        assert_eq!(values("'x'# comment"), vec!["x"]);
        assert_eq!(values("'at end'"), vec!["at end"]);
    }

    #[test]
    fn test_quote_inside_unquoted_value() {
        assert_eq!(values("O5' C4'"), vec!["O5'", "C4'"]);
    }

    #[test]
    fn test_text_field() {
        assert_eq!(values(";line one\nline two\n;\n"), vec!["line one\nline two"]);
        assert_eq!(values("x\n;\nabc\n;"), vec!["x", "abc"]);
        assert_eq!(values(";\n;"), vec![""]);
        assert_eq!(values(";a;b\n c\n;"), vec!["a;b\n c"]);
    }

    #[test]
    fn test_semicolon_not_at_line_start() {
        assert_eq!(values("a ;b"), vec!["a", ";b"]);
        assert_eq!(values(" ;v"), vec![";v"]);
        assert_eq!(values("#c\n ;v"), vec![";v"]);
        assert_eq!(values("x\n\t;v\n"), vec!["x", ";v"]);
        assert_eq!(values("x \n;v\n;"), vec!["x", "v"]);
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(values("# c1\na # c2\n#c3"), vec!["a"]);
    }

    #[test]
    fn test_crlf_input() {
        assert_eq!(values("a\r\n;x\r\ny\r\n;\r\nb"), vec!["a", "x\ny", "b"]);
    }

    #[test]
    fn test_line_numbers_in_errors() {
        let err = lex_error("data_x\n_a.b\n;never closed\n");
        assert!(matches!(err, Error::Lex { .. }));
        assert!(err.to_string().contains("unterminated textfield"));

        let err = lex_error("data_x\n_a.b 'open\n_c.d 1");
        assert_eq!(err.line(), Some(2));
        assert!(err.to_string().contains("unterminated quoted string"));
    }

    #[test]
    fn test_invalid_characters() {
        let err = lex_error("a \x01 b");
        assert!(err.to_string().contains("invalid character"));
        let err = lex_error("# bad \x02 comment\n");
        assert!(err.to_string().contains("invalid character in comment"));
    }

    #[test]
    fn test_utf8_passes_through() {
        assert_eq!(values("Å 'naïve text'"), vec!["Å", "naïve text"]);
    }

    #[test]
    fn test_pushback_overflow() {
        let options = CifOptions::new().with_pushback_capacity(4);
        let mut lexer = Tokenizer::new("123456789x".as_bytes(), &options);
        let err = lexer.advance().unwrap_err();
        assert!(err.to_string().contains("Buffer overflow"));
    }

    #[test]
    fn test_is_unquoted_string() {
        assert!(is_unquoted_string("1.5"));
        assert!(is_unquoted_string("C4'"));
        assert!(is_unquoted_string(""));
        assert!(!is_unquoted_string("_tag"));
        assert!(!is_unquoted_string(";x"));
        assert!(!is_unquoted_string("save_"));
        assert!(!is_unquoted_string("STOP_"));
        assert!(!is_unquoted_string("a\tb"));
    }
}
