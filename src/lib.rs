//! # cif_sac
//!
//! A streaming parser and dictionary validator for CIF (Crystallographic
//! Information File) and mmCIF documents.
//!
//! ## What is CIF?
//!
//! CIF is the STAR-based text format used to exchange crystallographic and
//! macromolecular structure data. A document holds named datablocks, a
//! datablock holds categories, and a category is a table of items:
//!
//! ```text
//! data_1CBS
//! _entry.id 1CBS
//! loop_
//! _atom_site.id
//! _atom_site.type_symbol
//! 1 N
//! 2 C
//! ```
//!
//! ## Key Features
//!
//! - **Event driven**: the [`Parser`] reports datablocks, categories, rows and
//!   items to a [`Builder`]; [`DocumentBuilder`] turns them into a [`Document`]
//! - **Fast extraction**: [`find_datablock`] and [`index_datablocks`] locate
//!   datablocks in raw bytes, skipping comments, quoted strings and text fields
//! - **Dictionary validation**: [`load_dictionary`] reads a DDL2 dictionary
//!   into a [`Validator`] checking types, enumerations, mandatory items and links
//! - **Round trip**: [`to_string`] writes a document back with minimal quoting
//! - **Serde**: the document model serializes with serde
//!
//! ## Quick Start
//!
//! ```rust
//! use cif_sac::parse_str;
//!
//! let doc = parse_str(
//!     "data_TEST\n#\nloop_\n_test.id\n_test.name\n1 aap\n2 noot\n3 mies\n",
//! )
//! .unwrap();
//!
//! let test = doc.get("TEST").unwrap().category("test").unwrap();
//! assert_eq!(test.len(), 3);
//! assert_eq!(test.rows()[1].get("name"), Some("noot"));
//! ```
//!
//! ### One datablock out of many
//!
//! ```rust
//! use cif_sac::{index_datablocks, parse_datablock_at, CifOptions};
//! use std::io::Cursor;
//!
//! let text = "data_A\n_a.x 1\ndata_B\n_b.x 2\n";
//! let index = index_datablocks(text.as_bytes()).unwrap();
//!
//! let block = parse_datablock_at(Cursor::new(text), &index, "B", &CifOptions::new())
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(block.categories().len(), 1);
//! ```
//!
//! ### Validation
//!
//! ```rust
//! use cif_sac::{parse_str, ValidateCategory, ValidateItem, ValidationMode, Validator};
//!
//! let mut validator = Validator::new(ValidationMode::Lenient);
//! validator.add_category_validator(ValidateCategory::new("entity", vec![], false));
//! validator
//!     .add_item_validator("entity", ValidateItem::new("type", false, None).with_enums(["polymer", "water"]))
//!     .unwrap();
//!
//! let doc = parse_str("data_x\n_entity.type ice\n").unwrap();
//! let report = validator.validate_datablock(&doc.datablocks()[0]).unwrap();
//! assert!(!report.is_valid());
//! ```
//!
//! ## Input encoding
//!
//! Input is read as bytes. `CR` and `CR LF` line ends are folded into `LF`.
//! Bytes above 0x7f are ordinary characters, so UTF-8 text passes through;
//! a token that is not valid UTF-8 is a [`Error::Lex`] error.
//!
//! ## Logging
//!
//! The crate logs through [`tracing`]: tokens and scanner hits at `trace`,
//! structural events and failed lookups at `debug`, lenient validation
//! diagnostics at `warn`. No subscriber is installed.
//!
//! ## Demos
//!
//! The `demos/` directory has runnable programs:
//!
//! - **`parse_file.rs`** - parse a file and print a summary
//! - **`validate.rs`** - validate a file against a dictionary
//! - **`extract_block.rs`** - pull one datablock out of a large file
//!
//! Run any of them with: `cargo run --example <name> -- <args>`

pub mod dictionary;
pub mod error;
pub mod keyword;
pub mod lexer;
pub mod model;
pub mod options;
pub mod parser;
pub mod row;
pub mod scan;
pub mod ser;
pub mod source;
pub mod validate;

pub use dictionary::load_dictionary;
pub use error::{Error, Result, ValidationError};
pub use keyword::{Keyword, KeywordAutomaton, Step};
pub use lexer::{is_unquoted_string, Token, TokenKind, Tokenizer};
pub use model::{Category, Datablock, Document, DocumentBuilder, SaveFrame};
pub use options::{CifOptions, ValidationMode, DEFAULT_PUSHBACK_CAPACITY};
pub use parser::{split_tag_name, Builder, Parser};
pub use row::{is_null_value, Row, INAPPLICABLE, UNKNOWN};
pub use scan::{find_datablock, index_datablocks, DatablockIndex, IndexEntry};
pub use ser::Writer;
pub use source::CharacterSource;
pub use validate::{
    PrimitiveType, ValidateCategory, ValidateItem, ValidateLink, ValidateType,
    ValidationReport, Validator,
};

use std::io::{self, BufRead, Seek};

/// Parse a CIF document from a string.
///
/// # Examples
///
/// ```rust
/// use cif_sac::parse_str;
///
/// let doc = parse_str("data_x\n_cell.length_a 10.5\n").unwrap();
/// assert_eq!(doc.datablocks()[0].name(), "x");
/// ```
///
/// # Errors
///
/// Returns a lex or syntax error, with its line number, for malformed input.
pub fn parse_str(s: &str) -> Result<Document> {
    parse_reader(s.as_bytes(), &CifOptions::default())
}

/// Parse a CIF document from a string with custom options.
///
/// # Errors
///
/// Returns a lex or syntax error, with its line number, for malformed input.
pub fn parse_str_with_options(s: &str, options: CifOptions) -> Result<Document> {
    parse_reader(s.as_bytes(), &options)
}

/// Parse a CIF document from raw bytes.
///
/// # Errors
///
/// Returns a lex or syntax error for malformed input, including tokens that
/// are not valid UTF-8.
pub fn parse_slice(v: &[u8]) -> Result<Document> {
    parse_reader(v, &CifOptions::default())
}

/// Parse a CIF document from a buffered reader.
///
/// # Examples
///
/// ```rust
/// use cif_sac::{parse_reader, CifOptions};
/// use std::io::BufReader;
///
/// let input = BufReader::new("data_x\n_a.b 1\n".as_bytes());
/// let doc = parse_reader(input, &CifOptions::new()).unwrap();
/// assert_eq!(doc.datablocks().len(), 1);
/// ```
///
/// # Errors
///
/// Returns an I/O error when reading fails, and a lex or syntax error for
/// malformed input.
pub fn parse_reader<R: BufRead>(reader: R, options: &CifOptions) -> Result<Document> {
    let mut builder = DocumentBuilder::new();
    Parser::new(reader, &mut builder, options).parse_file()?;
    Ok(builder.finish())
}

/// Parse only the datablock called `name`, found by scanning the stream.
/// Returns `None` when there is no such datablock.
///
/// # Examples
///
/// ```rust
/// use cif_sac::{parse_datablock, CifOptions};
///
/// let text = "data_A\n_a.x 1\ndata_B\n_b.x 2\n";
/// let block = parse_datablock(text.as_bytes(), "B", &CifOptions::new()).unwrap().unwrap();
/// assert_eq!(block.name(), "B");
/// assert!(block.category("a").is_none());
/// ```
///
/// # Errors
///
/// Returns a lex or syntax error for malformed input within the datablock.
pub fn parse_datablock<R: BufRead>(
    reader: R,
    name: &str,
    options: &CifOptions,
) -> Result<Option<Datablock>> {
    let mut builder = DocumentBuilder::new();
    let found = Parser::new(reader, &mut builder, options).parse_single_datablock(name)?;
    Ok(if found {
        builder.finish().datablocks.into_iter().next()
    } else {
        None
    })
}

/// Parse only the datablock called `name`, seeking to the position recorded
/// in `index`. Returns `None` when the index has no such datablock.
///
/// # Errors
///
/// Returns an I/O error when seeking fails, a syntax error when the stream
/// no longer matches the index, and lex or syntax errors for malformed input.
pub fn parse_datablock_at<R: BufRead + Seek>(
    reader: R,
    index: &DatablockIndex,
    name: &str,
    options: &CifOptions,
) -> Result<Option<Datablock>> {
    let mut builder = DocumentBuilder::new();
    let found = Parser::new(reader, &mut builder, options).parse_datablock_at(index, name)?;
    Ok(if found {
        builder.finish().datablocks.into_iter().next()
    } else {
        None
    })
}

/// Render a document as CIF text.
///
/// # Examples
///
/// ```rust
/// use cif_sac::{parse_str, to_string};
///
/// let doc = parse_str("data_x _a.b 'one two'").unwrap();
/// assert_eq!(to_string(&doc).unwrap(), "data_x\n#\n_a.b 'one two'\n#\n");
/// ```
///
/// # Errors
///
/// Returns a model error when a value has a line starting with `;`, which
/// no CIF quoting style can carry. Parsed documents never contain one.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn to_string(document: &Document) -> Result<String> {
    let mut writer = Writer::new();
    writer.write_document(document)?;
    Ok(writer.into_inner())
}

/// Write a document as CIF text.
///
/// # Errors
///
/// Returns an error if writing to the writer fails, or a model error as for
/// [`to_string`].
pub fn to_writer<W: io::Write>(mut writer: W, document: &Document) -> Result<()> {
    let text = to_string(document)?;
    writer
        .write_all(text.as_bytes())
        .map_err(|e| Error::io(&e.to_string()))?;
    Ok(())
}
