//! Reserved word recognition.
//!
//! [`KeywordAutomaton`] is fed one character at a time and decides, as early
//! as possible, whether the run being scanned is one of the reserved words
//! `data_<name>`, `global_`, `loop_`, `save_<name>`, `save_` or `stop_`.
//! Matching is case-insensitive. The automaton never consumes anything on its
//! own: when it answers [`Step::NoKeyword`] the caller rescans every character
//! fed so far as an ordinary value.

use crate::lexer::is_non_blank;

/// A reserved word recognized by the automaton.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    /// `data_` followed by a non-empty name.
    DataOpen,
    /// `global_`
    Global,
    /// `loop_`
    Loop,
    /// `save_` followed by a non-empty name.
    SaveOpen,
    /// A bare `save_`, closing a save frame.
    SaveClose,
    /// `stop_`
    Stop,
}

/// Outcome of feeding one character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Still matching, feed the next character.
    Undefined,
    /// The input cannot be a reserved word.
    NoKeyword,
    /// A reserved word was terminated by a blank (or end of input).
    Keyword(Keyword),
}

struct Node {
    ch: u8,
    on_match: i8,
    on_mismatch: i8,
}

const fn node(ch: u8, on_match: i8, on_mismatch: i8) -> Node {
    Node {
        ch,
        on_match,
        on_mismatch,
    }
}

// Terminal states are negative: the fixed prefix has been seen and only the
// terminating blank (or a trailing name) is still missing.
const DATA: i8 = -1;
const GLOBAL: i8 = -2;
const LOOP: i8 = -3;
const SAVE: i8 = -4;
const STOP: i8 = -5;

// Index 0 is the dead state. Characters are compared with bit 0x20 cleared.
const TRANSITIONS: [Node; 27] = [
    node(0, 0, 0),
    node(b'D', 5, 2),
    node(b'G', 9, 3),
    node(b'L', 15, 4),
    node(b'S', 19, 0),
    node(b'A', 6, 0),
    node(b'T', 7, 0),
    node(b'A', 8, 0),
    node(b'_', DATA, 0),
    node(b'L', 10, 0),
    node(b'O', 11, 0),
    node(b'B', 12, 0),
    node(b'A', 13, 0),
    node(b'L', 14, 0),
    node(b'_', GLOBAL, 0),
    node(b'O', 16, 0),
    node(b'O', 17, 0),
    node(b'P', 18, 0),
    node(b'_', LOOP, 0),
    node(b'A', 21, 20),
    node(b'T', 24, 0),
    node(b'V', 22, 0),
    node(b'E', 23, 0),
    node(b'_', SAVE, 0),
    node(b'O', 25, 0),
    node(b'P', 26, 0),
    node(b'_', STOP, 0),
];

/// Incremental, table-driven matcher for reserved words.
///
/// # Examples
///
/// ```rust
/// use cif_sac::{Keyword, KeywordAutomaton, Step};
///
/// assert_eq!(KeywordAutomaton::classify(b"LOOP_"), Step::Keyword(Keyword::Loop));
/// assert_eq!(KeywordAutomaton::classify(b"loops"), Step::NoKeyword);
/// assert_eq!(KeywordAutomaton::classify(b"data_1ABC"), Step::Keyword(Keyword::DataOpen));
/// ```
#[derive(Debug, Clone)]
pub struct KeywordAutomaton {
    state: i8,
    seen_trailing_chars: bool,
}

impl Default for KeywordAutomaton {
    fn default() -> Self {
        Self::new()
    }
}

impl KeywordAutomaton {
    #[must_use]
    pub fn new() -> Self {
        KeywordAutomaton {
            state: 1,
            seen_trailing_chars: false,
        }
    }

    /// `true` once a result other than [`Step::Undefined`] was produced, or
    /// when a complete prefix is waiting for its terminator.
    #[must_use]
    pub fn finished(&self) -> bool {
        self.state <= 0
    }

    /// `true` while a complete reserved prefix (e.g. `loop_`) has been seen.
    #[must_use]
    pub fn matched(&self) -> bool {
        self.state < 0
    }

    /// Feeds one character; `None` stands for end of input and counts as blank.
    pub fn step(&mut self, ch: Option<u8>) -> Step {
        let blank = !ch.map_or(false, is_non_blank);

        let result = match self.state {
            0 => Step::Undefined,
            DATA | SAVE => {
                if !blank {
                    self.seen_trailing_chars = true;
                    Step::Undefined
                } else if self.state == DATA {
                    if self.seen_trailing_chars {
                        Step::Keyword(Keyword::DataOpen)
                    } else {
                        Step::NoKeyword
                    }
                } else if self.seen_trailing_chars {
                    Step::Keyword(Keyword::SaveOpen)
                } else {
                    Step::Keyword(Keyword::SaveClose)
                }
            }
            GLOBAL | LOOP | STOP => {
                if !blank {
                    Step::NoKeyword
                } else {
                    Step::Keyword(match self.state {
                        GLOBAL => Keyword::Global,
                        LOOP => Keyword::Loop,
                        _ => Keyword::Stop,
                    })
                }
            }
            _ => self.advance(ch),
        };

        if result != Step::Undefined {
            self.state = 0;
        }
        result
    }

    fn advance(&mut self, ch: Option<u8>) -> Step {
        let folded = match ch {
            Some(c) => c & !0x20,
            None => return Step::NoKeyword,
        };

        loop {
            let node = &TRANSITIONS[self.state as usize];
            if node.ch == folded {
                self.state = node.on_match;
                return Step::Undefined;
            }
            self.state = node.on_mismatch;
            if self.state == 0 {
                return Step::NoKeyword;
            }
        }
    }

    /// Classifies a complete run of characters, as if followed by a blank.
    #[must_use]
    pub fn classify(text: &[u8]) -> Step {
        let mut automaton = KeywordAutomaton::new();
        for &ch in text {
            match automaton.step(Some(ch)) {
                Step::Undefined => {}
                other => return other,
            }
        }
        automaton.step(None)
    }
}
