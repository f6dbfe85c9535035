//! Generic document model.
//!
//! A [`Document`] holds [`Datablock`]s, a datablock holds [`Category`]s and,
//! for dictionaries, [`SaveFrame`]s. A category is a table: an ordered list
//! of column (item) names and a list of [`Row`]s. Values are kept as the
//! literal text the parser produced, `?` and `.` included.
//!
//! The model is built by [`DocumentBuilder`], the default [`Builder`] the
//! parse entry points use. Every type serializes with serde, so a parsed
//! document can be exported to any serde format.
//!
//! ## Examples
//!
//! ```rust
//! use cif_sac::parse_str;
//!
//! let doc = parse_str("data_TEST\n_entry.id TEST\nloop_\n_test.id\n1\n2\n").unwrap();
//! let block = doc.get("TEST").unwrap();
//! assert_eq!(block.category("entry").unwrap().rows()[0].get("id"), Some("TEST"));
//! assert_eq!(block.category("TEST").unwrap().len(), 2);
//! ```

use crate::parser::Builder;
use crate::row::Row;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A parsed CIF document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Document {
    pub datablocks: Vec<Datablock>,
}

impl Document {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn datablocks(&self) -> &[Datablock] {
        &self.datablocks
    }

    /// Finds a datablock by name, case-insensitively.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Datablock> {
        self.datablocks
            .iter()
            .find(|db| db.name.eq_ignore_ascii_case(name))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.datablocks.is_empty()
    }
}

/// A `data_<name>` block.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Datablock {
    pub name: String,
    pub categories: Vec<Category>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub save_frames: Vec<SaveFrame>,
}

impl Datablock {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Datablock {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Finds a category by name, case-insensitively.
    #[must_use]
    pub fn category(&self, name: &str) -> Option<&Category> {
        find_category(&self.categories, name)
    }

    #[must_use]
    pub fn save_frames(&self) -> &[SaveFrame] {
        &self.save_frames
    }

    #[must_use]
    pub fn save_frame(&self, name: &str) -> Option<&SaveFrame> {
        self.save_frames
            .iter()
            .find(|frame| frame.name.eq_ignore_ascii_case(name))
    }
}

/// A `save_<name>` frame inside a datablock.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SaveFrame {
    pub name: String,
    pub categories: Vec<Category>,
}

impl SaveFrame {
    #[must_use]
    pub fn new(name: &str) -> Self {
        SaveFrame {
            name: name.to_string(),
            categories: Vec::new(),
        }
    }

    #[must_use]
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    #[must_use]
    pub fn category(&self, name: &str) -> Option<&Category> {
        find_category(&self.categories, name)
    }
}

fn find_category<'a>(categories: &'a [Category], name: &str) -> Option<&'a Category> {
    categories
        .iter()
        .find(|cat| cat.name.eq_ignore_ascii_case(name))
}

/// A category: ordered columns and the rows holding their values.
///
/// # Examples
///
/// ```rust
/// use cif_sac::{Category, Row};
///
/// let mut cat = Category::new("test");
/// let mut row = Row::new();
/// row.insert("id".to_string(), "1".to_string());
/// cat.push_row(row);
/// assert_eq!(cat.columns(), ["id"]);
/// assert_eq!(cat.values("id").collect::<Vec<_>>(), vec![Some("1")]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Category {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Category {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn has_column(&self, item: &str) -> bool {
        self.columns
            .iter()
            .any(|c| c == item || c.eq_ignore_ascii_case(item))
    }

    /// Appends a row, extending the column list with any item not seen before.
    pub fn push_row(&mut self, row: Row) {
        for item in row.keys() {
            self.add_column(item);
        }
        self.rows.push(row);
    }

    /// The value of `item` in each row, `None` where a row lacks it.
    pub fn values<'a>(&'a self, item: &'a str) -> impl Iterator<Item = Option<&'a str>> + 'a {
        self.rows.iter().map(move |row| row.get(item))
    }

    fn add_column(&mut self, item: &str) {
        if !self.columns.iter().any(|c| c == item) {
            self.columns.push(item.to_string());
        }
    }
}

/// [`Builder`] producing a [`Document`].
///
/// Re-opening a datablock, save frame or category that already exists
/// (names compared case-insensitively) continues filling it.
///
/// # Examples
///
/// ```rust
/// use cif_sac::{Builder, DocumentBuilder};
///
/// let mut builder = DocumentBuilder::new();
/// builder.open_datablock("x").unwrap();
/// builder.open_category("cell").unwrap();
/// builder.open_row().unwrap();
/// builder.set_item("cell", "length_a", "10.5").unwrap();
/// let doc = builder.finish();
/// assert_eq!(doc.datablocks()[0].category("cell").unwrap().rows()[0].get("length_a"), Some("10.5"));
/// ```
#[derive(Debug, Default)]
pub struct DocumentBuilder {
    document: Document,
    datablock: Option<usize>,
    frame: Option<usize>,
    category: Option<usize>,
}

impl DocumentBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Finish building and return the document.
    #[must_use]
    pub fn finish(self) -> Document {
        self.document
    }

    fn datablock_mut(&mut self) -> Result<&mut Datablock> {
        let index = self
            .datablock
            .ok_or_else(|| Error::model("no datablock is open"))?;
        Ok(&mut self.document.datablocks[index])
    }

    fn categories_mut(&mut self) -> Result<&mut Vec<Category>> {
        let frame = self.frame;
        let datablock = self.datablock_mut()?;
        Ok(match frame {
            Some(index) => &mut datablock.save_frames[index].categories,
            None => &mut datablock.categories,
        })
    }

    fn category_mut(&mut self) -> Result<&mut Category> {
        let index = self
            .category
            .ok_or_else(|| Error::model("no category is open"))?;
        let categories = self.categories_mut()?;
        Ok(&mut categories[index])
    }
}

impl Builder for DocumentBuilder {
    fn open_datablock(&mut self, name: &str) -> Result<()> {
        debug!("datablock {}", name);
        let datablocks = &mut self.document.datablocks;
        let index = match datablocks
            .iter()
            .position(|db| db.name.eq_ignore_ascii_case(name))
        {
            Some(index) => index,
            None => {
                datablocks.push(Datablock::new(name));
                datablocks.len() - 1
            }
        };
        self.datablock = Some(index);
        self.frame = None;
        self.category = None;
        Ok(())
    }

    fn open_category(&mut self, name: &str) -> Result<()> {
        debug!("category {}", name);
        let categories = self.categories_mut()?;
        let index = match categories
            .iter()
            .position(|cat| cat.name.eq_ignore_ascii_case(name))
        {
            Some(index) => index,
            None => {
                categories.push(Category::new(name));
                categories.len() - 1
            }
        };
        self.category = Some(index);
        Ok(())
    }

    fn open_row(&mut self) -> Result<()> {
        let category = self.category_mut()?;
        category.rows.push(Row::new());
        Ok(())
    }

    fn set_item(&mut self, category: &str, item: &str, value: &str) -> Result<()> {
        debug!("_{}.{} {:?}", category, item, value);
        let current = self.category_mut()?;
        if !current.name.eq_ignore_ascii_case(category) {
            return Err(Error::model(format!(
                "item _{}.{} set while category {} is open",
                category, item, current.name
            )));
        }
        current.add_column(item);
        let row = current
            .rows
            .last_mut()
            .ok_or_else(|| Error::model(format!("no row open in category {}", category)))?;
        row.insert(item.to_string(), value.to_string());
        Ok(())
    }

    fn open_save_frame(&mut self, name: &str) -> Result<()> {
        debug!("save frame {}", name);
        let datablock = self.datablock_mut()?;
        let index = match datablock
            .save_frames
            .iter()
            .position(|frame| frame.name.eq_ignore_ascii_case(name))
        {
            Some(index) => index,
            None => {
                datablock.save_frames.push(SaveFrame::new(name));
                datablock.save_frames.len() - 1
            }
        };
        self.frame = Some(index);
        self.category = None;
        Ok(())
    }

    fn close_save_frame(&mut self) -> Result<()> {
        if self.frame.take().is_none() {
            return Err(Error::model("no save frame is open"));
        }
        self.category = None;
        Ok(())
    }
}
