//! CIF writer.
//!
//! This module provides the [`Writer`] that renders a [`Document`] back to CIF
//! text. Output is laid out the usual way:
//!
//! - **Single-row categories**: one aligned `_category.item value` line per item
//! - **Multi-row categories**: a `loop_` header followed by one line per row
//! - **Save frames**: `save_<name>` ... `save_` after the datablock's own categories
//! - **Quote minimization**: values are written bare when the tokenizer would
//!   read them back unchanged
//!
//! Values are quoted with the first style that reads back as the same text:
//! bare, single quotes, double quotes, and finally a text field. A value
//! with a line starting with `;` fits none of them and is an error.
//!
//! ## Usage
//!
//! ```rust
//! use cif_sac::{parse_str, to_string};
//!
//! let doc = parse_str("data_x\nloop_\n_a.id\n_a.name\n1 'two words'\n2 ?\n").unwrap();
//! let text = to_string(&doc).unwrap();
//! assert_eq!(
//!     text,
//!     "data_x\n#\nloop_\n_a.id\n_a.name\n1 'two words'\n2 ?\n#\n"
//! );
//! assert_eq!(parse_str(&text).unwrap(), doc);
//! ```

use crate::lexer::{is_any_print, is_unquoted_string, is_white};
use crate::model::{Category, Datablock, Document};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    Bare,
    Single,
    Double,
    TextField,
}

// The quote may appear inside the value as long as it is not followed by
// something that would end the string.
fn quotable(value: &str, quote: u8) -> bool {
    let bytes = value.as_bytes();
    bytes.iter().enumerate().all(|(i, &ch)| {
        is_any_print(ch)
            && (ch != quote || bytes.get(i + 1).map_or(true, |&next| !is_white(Some(next))))
    })
}

fn style(value: &str) -> Style {
    if value == "?" || value == "." {
        Style::Bare
    } else if value.is_empty() {
        Style::Single
    } else if value.contains('\n') {
        Style::TextField
    } else if is_unquoted_string(value) && !value.contains('#') {
        Style::Bare
    } else if quotable(value, b'\'') {
        Style::Single
    } else if quotable(value, b'"') {
        Style::Double
    } else {
        Style::TextField
    }
}

/// Renders documents into a string buffer.
///
/// # Examples
///
/// ```rust
/// use cif_sac::{Datablock, Writer};
///
/// let mut writer = Writer::new();
/// writer.write_datablock(&Datablock::new("empty")).unwrap();
/// assert_eq!(writer.into_inner(), "data_empty\n#\n");
/// ```
pub struct Writer {
    output: String,
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}

impl Writer {
    #[must_use]
    pub fn new() -> Self {
        Writer {
            output: String::with_capacity(4096),
        }
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.output
    }

    fn at_line_start(&self) -> bool {
        self.output.is_empty() || self.output.ends_with('\n')
    }

    /// Appends one value. Text fields always start on a line of their own
    /// and are followed by a newline.
    fn write_value(&mut self, tag: &str, value: &str) -> Result<()> {
        match style(value) {
            Style::Bare => self.output.push_str(value),
            Style::Single => {
                self.output.push('\'');
                self.output.push_str(value);
                self.output.push('\'');
            }
            Style::Double => {
                self.output.push('"');
                self.output.push_str(value);
                self.output.push('"');
            }
            Style::TextField => {
                if value.starts_with(';') || value.contains("\n;") {
                    return Err(Error::model(format!(
                        "value of {} has a line starting with ';' and cannot be written",
                        tag
                    )));
                }
                if !self.at_line_start() {
                    self.output.push('\n');
                }
                self.output.push_str(";\n");
                self.output.push_str(value);
                self.output.push_str("\n;\n");
            }
        }
        Ok(())
    }

    /// Appends every datablock of `document`.
    ///
    /// # Errors
    ///
    /// Returns a model error for a value no CIF quoting can carry.
    pub fn write_document(&mut self, document: &Document) -> Result<()> {
        for datablock in document.datablocks() {
            self.write_datablock(datablock)?;
        }
        Ok(())
    }

    /// Appends `data_<name>`, the categories and then the save frames.
    ///
    /// # Errors
    ///
    /// Returns a model error for a value no CIF quoting can carry.
    pub fn write_datablock(&mut self, datablock: &Datablock) -> Result<()> {
        self.output.push_str("data_");
        self.output.push_str(datablock.name());
        self.output.push_str("\n#\n");

        for category in datablock.categories() {
            self.write_category(category)?;
        }

        for frame in datablock.save_frames() {
            self.output.push_str("save_");
            self.output.push_str(&frame.name);
            self.output.push('\n');
            for category in frame.categories() {
                self.write_category(category)?;
            }
            self.output.push_str("save_\n#\n");
        }
        Ok(())
    }

    /// Appends one category followed by a `#` line: aligned tag/value pairs
    /// for a single row, a `loop_` otherwise. Empty categories are skipped.
    ///
    /// # Errors
    ///
    /// Returns a model error for a value no CIF quoting can carry.
    pub fn write_category(&mut self, category: &Category) -> Result<()> {
        match category.rows() {
            [] => return Ok(()),
            [row] => {
                let width = category
                    .columns()
                    .iter()
                    .map(|item| item.len())
                    .max()
                    .unwrap_or(0)
                    + category.name().len()
                    + 3;

                for item in category.columns() {
                    let tag = format!("_{}.{}", category.name(), item);
                    self.output.push_str(&tag);
                    let value = row.get(item).unwrap_or("?");
                    if style(value) != Style::TextField {
                        for _ in tag.len()..width {
                            self.output.push(' ');
                        }
                    }
                    self.write_value(&tag, value)?;
                    if !self.at_line_start() {
                        self.output.push('\n');
                    }
                }
            }
            rows => {
                self.output.push_str("loop_\n");
                let tags: Vec<String> = category
                    .columns()
                    .iter()
                    .map(|item| format!("_{}.{}", category.name(), item))
                    .collect();
                for tag in &tags {
                    self.output.push_str(tag);
                    self.output.push('\n');
                }

                for row in rows {
                    for (i, (item, tag)) in category.columns().iter().zip(&tags).enumerate() {
                        if i > 0 && !self.at_line_start() {
                            self.output.push(' ');
                        }
                        self.write_value(tag, row.get(item).unwrap_or("?"))?;
                    }
                    if !self.at_line_start() {
                        self.output.push('\n');
                    }
                }
            }
        }
        self.output.push_str("#\n");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parse_str, Row};

    fn written(value: &str) -> String {
        let mut writer = Writer::new();
        writer.write_value("_t.v", value).unwrap();
        writer.into_inner()
    }

    #[test]
    fn test_value_styles() {
        assert_eq!(written("?"), "?");
        assert_eq!(written("."), ".");
        assert_eq!(written(""), "''");
        assert_eq!(written("ALA"), "ALA");
        assert_eq!(written("O5'"), "O5'");
        assert_eq!(written("1.5e3"), "1.5e3");
        assert_eq!(written("two words"), "'two words'");
        assert_eq!(written("_tag"), "'_tag'");
        assert_eq!(written("loop_"), "'loop_'");
        assert_eq!(written("data_x"), "'data_x'");
        assert_eq!(written("a#b"), "'a#b'");
        assert_eq!(written("it's ok"), "'it's ok'");
        assert_eq!(written("it' s"), "\"it' s\"");
        assert_eq!(written("end'"), "end'");
        assert_eq!(written("x 'end'"), "'x 'end''");
        assert_eq!(written("a' \"b\" c"), ";\na' \"b\" c\n;\n");
        assert_eq!(written("two\nlines"), ";\ntwo\nlines\n;\n");
    }

    #[test]
    fn test_value_with_semicolon_line_is_rejected() {
        let mut category = Category::new("a");
        let row: Row = [("id", "1"), ("text", "one\n;two")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        category.push_row(row.clone());
        category.push_row(row);

        let err = Writer::new().write_category(&category).unwrap_err();
        assert!(matches!(err, crate::Error::Model(_)));
        assert!(err.to_string().contains("_a.text"));

        let mut writer = Writer::new();
        assert!(writer.write_value("_t.v", ";x\ny").is_err());
        assert!(writer.write_value("_t.v", "x\n ;y").is_ok());
    }

    #[test]
    fn test_single_row_alignment() {
        let mut category = Category::new("cell");
        let row: Row = [("length_a", "10.5"), ("b", "?")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        category.push_row(row);

        let mut writer = Writer::new();
        writer.write_category(&category).unwrap();
        assert_eq!(
            writer.into_inner(),
            "_cell.length_a 10.5\n_cell.b        ?\n#\n"
        );
    }

    #[test]
    fn test_text_field_in_loop() {
        let doc = parse_str("data_x\nloop_\n_a.id\n_a.text\n1\n;\nline\n;\n2 x\n").unwrap();
        let text = crate::to_string(&doc).unwrap();
        assert_eq!(
            text,
            "data_x\n#\nloop_\n_a.id\n_a.text\n1\n;\nline\n;\n2 x\n#\n"
        );
        assert_eq!(parse_str(&text).unwrap(), doc);
    }

    #[test]
    fn test_missing_item_written_as_unknown() {
        let doc = parse_str("data_x\nloop_\n_a.id\n1\n_a.name n\n").unwrap();
        let text = crate::to_string(&doc).unwrap();
        assert!(text.contains("loop_\n_a.id\n_a.name\n1 ?\n? n\n"), "{text}");
    }

    #[test]
    fn test_save_frames_round_trip() {
        let options = crate::CifOptions::dictionary();
        let input = "data_d\n_d.title t\nsave_x\n_a.b 1\nsave_\n";
        let doc = crate::parse_str_with_options(input, options.clone()).unwrap();
        let text = crate::to_string(&doc).unwrap();
        assert_eq!(
            text,
            "data_d\n#\n_d.title t\n#\nsave_x\n_a.b 1\n#\nsave_\n#\n"
        );
        assert_eq!(crate::parse_str_with_options(&text, options).unwrap(), doc);
    }
}
