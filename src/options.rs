//! Configuration for parsing and validation.
//!
//! All knobs live in an explicitly constructed [`CifOptions`] value that is
//! handed to the parser, the tokenizer and the validator. Nothing is read
//! from process-wide state.
//!
//! ## Examples
//!
//! ```rust
//! use cif_sac::{parse_str_with_options, CifOptions};
//!
//! // Dictionaries use save frames, plain documents may not
//! let options = CifOptions::dictionary();
//! let doc = parse_str_with_options("data_d\nsave_x\n_a.b 1\nsave_\n", options).unwrap();
//! assert_eq!(doc.datablocks()[0].save_frames().len(), 1);
//! ```

/// Number of characters the tokenizer may push back by default.
pub const DEFAULT_PUSHBACK_CAPACITY: usize = 8192;

/// How the validator reacts to a violation.
///
/// # Examples
///
/// ```rust
/// use cif_sac::ValidationMode;
///
/// assert_eq!(ValidationMode::default(), ValidationMode::Lenient);
/// assert!(ValidationMode::Strict.is_strict());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ValidationMode {
    /// Abort on the first violation.
    Strict,
    /// Log the violation, record it and carry on.
    #[default]
    Lenient,
}

impl ValidationMode {
    #[must_use]
    pub const fn is_strict(self) -> bool {
        matches!(self, ValidationMode::Strict)
    }
}

/// Configuration options for reading CIF documents.
///
/// # Examples
///
/// ```rust
/// use cif_sac::{CifOptions, ValidationMode};
///
/// let options = CifOptions::new()
///     .with_pushback_capacity(256)
///     .with_mode(ValidationMode::Strict);
/// assert_eq!(options.pushback_capacity, 256);
/// assert!(!options.save_frames);
/// ```
#[derive(Clone, Debug)]
pub struct CifOptions {
    /// Capacity of the character push-back stack used while backtracking.
    pub pushback_capacity: usize,
    /// Accept `save_` frames inside datablocks (schema documents).
    pub save_frames: bool,
    /// Log non-printable characters found in quoted strings and text fields.
    pub warn_invalid_characters: bool,
    /// Strictness of any validator built with these options.
    pub mode: ValidationMode,
}

impl Default for CifOptions {
    fn default() -> Self {
        CifOptions {
            pushback_capacity: DEFAULT_PUSHBACK_CAPACITY,
            save_frames: false,
            warn_invalid_characters: false,
            mode: ValidationMode::default(),
        }
    }
}

impl CifOptions {
    /// Default options: plain document grammar, lenient validation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for reading a dictionary (schema) document.
    ///
    /// ```rust
    /// use cif_sac::CifOptions;
    ///
    /// assert!(CifOptions::dictionary().save_frames);
    /// ```
    #[must_use]
    pub fn dictionary() -> Self {
        CifOptions {
            save_frames: true,
            ..Default::default()
        }
    }

    /// Options with strict validation.
    #[must_use]
    pub fn strict() -> Self {
        CifOptions {
            mode: ValidationMode::Strict,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_pushback_capacity(mut self, capacity: usize) -> Self {
        self.pushback_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_save_frames(mut self, save_frames: bool) -> Self {
        self.save_frames = save_frames;
        self
    }

    #[must_use]
    pub fn with_warn_invalid_characters(mut self, warn: bool) -> Self {
        self.warn_invalid_characters = warn;
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: ValidationMode) -> Self {
        self.mode = mode;
        self
    }
}
