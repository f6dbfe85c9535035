//! Dictionary-driven validation.
//!
//! A [`Validator`] holds the rules of a dictionary:
//!
//! - [`ValidateType`]: a named type with a primitive kind and a value pattern
//! - [`ValidateCategory`]: the items of a category, its keys and mandatory items
//! - [`ValidateItem`]: one item, with an optional type and enumeration
//! - [`ValidateLink`]: a parent/child key relation between two categories
//!
//! The validator is filled once, usually by
//! [`load_dictionary`](crate::load_dictionary), and then only read. It is
//! `Send + Sync` and can be shared between threads parsing different files.
//!
//! In [`ValidationMode::Strict`] the first violation is returned as
//! [`Error::Validation`]. In [`ValidationMode::Lenient`] violations are logged
//! and collected in a [`ValidationReport`]. Inconsistencies in the dictionary
//! itself are [`Error::Schema`] errors in both modes.
//!
//! ## Examples
//!
//! ```rust
//! use cif_sac::{
//!     parse_str, PrimitiveType, ValidateCategory, ValidateItem, ValidateType, ValidationMode,
//!     Validator,
//! };
//!
//! let mut validator = Validator::new(ValidationMode::Lenient);
//! validator.add_type_validator(ValidateType::new("int", PrimitiveType::Numb, "[+-]?[0-9]+").unwrap());
//! validator.add_category_validator(ValidateCategory::new("test", vec!["id".to_string()], false));
//! let int = validator.get_validator_for_type("int").cloned();
//! validator.add_item_validator("test", ValidateItem::new("id", true, int)).unwrap();
//!
//! let doc = parse_str("data_x\nloop_\n_test.id\n1\nx\n").unwrap();
//! let report = validator.validate_datablock(&doc.datablocks()[0]).unwrap();
//! assert_eq!(report.len(), 1);
//! assert_eq!(
//!     report.errors()[0].to_string(),
//!     "When validating _test.id: Value 'x' does not match type expression for type int"
//! );
//! ```

use crate::model::{Category, Datablock};
use crate::parser::split_tag_name;
use crate::row::is_null_value;
use crate::{Error, Result, ValidationError, ValidationMode};
use indexmap::{IndexMap, IndexSet};
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// The primitive kind of a type, deciding how values compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    /// Case-sensitive text.
    Char,
    /// Case-insensitive text.
    UChar,
    /// Numbers.
    Numb,
}

impl PrimitiveType {
    /// Maps a DDL primitive code (`char`, `uchar`, `numb`, any case).
    ///
    /// ```rust
    /// use cif_sac::PrimitiveType;
    ///
    /// assert_eq!(PrimitiveType::from_code("UCHAR").unwrap(), PrimitiveType::UChar);
    /// assert!(PrimitiveType::from_code("float").is_err());
    /// ```
    pub fn from_code(code: &str) -> Result<Self> {
        if code.eq_ignore_ascii_case("char") {
            Ok(PrimitiveType::Char)
        } else if code.eq_ignore_ascii_case("uchar") {
            Ok(PrimitiveType::UChar)
        } else if code.eq_ignore_ascii_case("numb") {
            Ok(PrimitiveType::Numb)
        } else {
            Err(Error::schema(format!("Not a known primitive type: {}", code)))
        }
    }
}

/// Converts a POSIX extended expression to the `regex` crate's syntax.
///
/// Inside bracket expressions POSIX treats `\` and `[` as literals and
/// allows `]` as the first member. The `regex` crate would read those as
/// escapes, nested classes or set operators, so they are escaped here.
fn translate_posix(expression: &str) -> String {
    let mut out = String::with_capacity(expression.len() + 16);
    let mut chars = expression.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                out.push('\\');
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '[' => {
                out.push('[');
                if chars.peek() == Some(&'^') {
                    chars.next();
                    out.push('^');
                }
                if chars.peek() == Some(&']') {
                    chars.next();
                    out.push_str("\\]");
                }
                while let Some(c) = chars.next() {
                    match c {
                        ']' => {
                            out.push(']');
                            break;
                        }
                        '[' if chars.peek() == Some(&':') => {
                            out.push('[');
                            while let Some(n) = chars.next() {
                                out.push(n);
                                if n == ':' && chars.peek() == Some(&']') {
                                    chars.next();
                                    out.push(']');
                                    break;
                                }
                            }
                        }
                        '[' | '\\' | '&' | '~' => {
                            out.push('\\');
                            out.push(c);
                        }
                        '-' if chars.peek() == Some(&'-') => out.push_str("\\-"),
                        c => out.push(c),
                    }
                }
            }
            c => out.push(c),
        }
    }
    out
}

// Leading number of a numeric value, without a standard uncertainty such as
// the `(4)` in `50.123(4)`.
fn parse_number(value: &str) -> Option<f64> {
    match value.find('(') {
        Some(open) => {
            let close = value[open..].find(')')? + open;
            let mut stripped = String::with_capacity(value.len());
            stripped.push_str(&value[..open]);
            stripped.push_str(&value[close + 1..]);
            stripped.trim().parse().ok()
        }
        None => value.trim().parse().ok(),
    }
}

fn compare_text(a: &str, b: &str, fold_case: bool) -> Ordering {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let (mut i, mut j) = (0, 0);

    loop {
        let (ca, cb) = match (a.get(i), b.get(j)) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(&ca), Some(&cb)) if fold_case => (ca.to_ascii_uppercase(), cb.to_ascii_uppercase()),
            (Some(&ca), Some(&cb)) => (ca, cb),
        };

        if ca != cb {
            return ca.cmp(&cb);
        }

        // a run of spaces counts as one
        if ca == b' ' {
            while a.get(i + 1) == Some(&b' ') {
                i += 1;
            }
            while b.get(j + 1) == Some(&b' ') {
                j += 1;
            }
        }

        i += 1;
        j += 1;
    }
}

/// A named type: its primitive kind and the pattern values must match in full.
#[derive(Debug, Clone)]
pub struct ValidateType {
    pub name: String,
    pub primitive: PrimitiveType,
    expression: String,
    pattern: Regex,
}

impl ValidateType {
    /// Compiles `expression`, a POSIX extended regular expression that has to
    /// match the whole value.
    pub fn new(name: &str, primitive: PrimitiveType, expression: &str) -> Result<Self> {
        let anchored = format!("^(?:{})$", translate_posix(expression));
        let pattern = Regex::new(&anchored).map_err(|e| {
            Error::schema(format!(
                "invalid type expression for type {}: {}",
                name, e
            ))
        })?;
        Ok(ValidateType {
            name: name.to_string(),
            primitive,
            expression: expression.to_string(),
            pattern,
        })
    }

    /// The expression as it was declared.
    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression
    }

    #[must_use]
    pub fn is_match(&self, value: &str) -> bool {
        self.pattern.is_match(value)
    }

    /// Compares two values of this type.
    ///
    /// Empty values sort first. Numbers are equal when they differ by no more
    /// than `f64::EPSILON`; a value that is not a number sorts after one that
    /// is. Text compares byte by byte, ignoring case for
    /// [`PrimitiveType::UChar`], with runs of spaces counting as one space.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cif_sac::{PrimitiveType, ValidateType};
    /// use std::cmp::Ordering;
    ///
    /// let numb = ValidateType::new("float", PrimitiveType::Numb, ".*").unwrap();
    /// assert_eq!(numb.compare("1.0", "1"), Ordering::Equal);
    /// assert_eq!(numb.compare("2", "10"), Ordering::Less);
    ///
    /// let uchar = ValidateType::new("ucode", PrimitiveType::UChar, ".*").unwrap();
    /// assert_eq!(uchar.compare("AB  C", "ab c"), Ordering::Equal);
    /// ```
    #[must_use]
    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        match (a.is_empty(), b.is_empty()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            (false, false) => {}
        }

        match self.primitive {
            PrimitiveType::Numb => match (parse_number(a), parse_number(b)) {
                (Some(da), Some(db)) => {
                    let d = da - db;
                    if d.abs() <= f64::EPSILON {
                        Ordering::Equal
                    } else if d > 0.0 {
                        Ordering::Greater
                    } else {
                        Ordering::Less
                    }
                }
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (None, None) => compare_text(a, b, false),
            },
            PrimitiveType::Char => compare_text(a, b, false),
            PrimitiveType::UChar => compare_text(a, b, true),
        }
    }
}

/// Rules for one item of a category.
#[derive(Debug, Clone)]
pub struct ValidateItem {
    /// The item name, without category.
    pub tag: String,
    pub mandatory: bool,
    /// Shared with other items using the same type, or inherited from a
    /// link parent.
    pub item_type: Option<Arc<ValidateType>>,
    /// Allowed values; empty means any value.
    pub enums: IndexSet<String>,
    category: String,
}

impl ValidateItem {
    /// Creates a validator for item `tag` (without category). The category
    /// is filled in when the item is added to one.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cif_sac::{PrimitiveType, ValidateItem, ValidateType};
    /// use std::sync::Arc;
    ///
    /// let int = Arc::new(ValidateType::new("int", PrimitiveType::Numb, "[+-]?[0-9]+").unwrap());
    /// let item = ValidateItem::new("id", true, Some(int));
    /// assert!(item.validate("42").is_ok());
    /// assert!(item.validate("4.2").is_err());
    /// ```
    pub fn new(tag: &str, mandatory: bool, item_type: Option<Arc<ValidateType>>) -> Self {
        ValidateItem {
            tag: tag.to_string(),
            mandatory,
            item_type,
            enums: IndexSet::new(),
            category: String::new(),
        }
    }

    #[must_use]
    pub fn with_enums<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enums.extend(values.into_iter().map(Into::into));
        self
    }

    /// Name of the category this item was added to.
    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Checks one value. The empty string, `?` and `.` always pass.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cif_sac::ValidateItem;
    ///
    /// let item = ValidateItem::new("type_symbol", false, None).with_enums(["C", "N", "O"]);
    /// assert!(item.validate("N").is_ok());
    /// assert!(item.validate("?").is_ok());
    /// assert!(item
    ///     .validate("X")
    ///     .unwrap_err()
    ///     .to_string()
    ///     .contains("Value 'X' is not in the list of allowed values"));
    /// ```
    pub fn validate(&self, value: &str) -> std::result::Result<(), ValidationError> {
        if is_null_value(value) {
            return Ok(());
        }

        if let Some(item_type) = &self.item_type {
            if !item_type.is_match(value) {
                return Err(ValidationError::new(
                    &self.category,
                    Some(&self.tag),
                    format!(
                        "Value '{}' does not match type expression for type {}",
                        value, item_type.name
                    ),
                ));
            }
        }

        if !self.enums.is_empty() && !self.enums.contains(value) {
            return Err(ValidationError::new(
                &self.category,
                Some(&self.tag),
                format!("Value '{}' is not in the list of allowed values", value),
            ));
        }

        Ok(())
    }
}

/// Rules for one category.
#[derive(Debug, Clone)]
pub struct ValidateCategory {
    pub name: String,
    pub keys: Vec<String>,
    /// The category must be present in every datablock.
    pub mandatory: bool,
    mandatory_fields: IndexSet<String>,
    items: IndexMap<String, ValidateItem>,
}

impl ValidateCategory {
    /// Creates a category validator. `keys` are item names without the
    /// category; `mandatory` requires the category in every datablock.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cif_sac::{ValidateCategory, ValidateItem};
    ///
    /// let mut atom = ValidateCategory::new("atom", vec!["id".to_string()], false);
    /// atom.add_item_validator(ValidateItem::new("id", true, None));
    /// assert_eq!(atom.mandatory_fields().collect::<Vec<_>>(), vec!["id"]);
    /// assert!(atom.get_validator_for_item("id").is_some());
    /// ```
    pub fn new(name: &str, keys: Vec<String>, mandatory: bool) -> Self {
        ValidateCategory {
            name: name.to_string(),
            keys,
            mandatory,
            mandatory_fields: IndexSet::new(),
            items: IndexMap::new(),
        }
    }

    /// Adds an item. A second item with the same tag is ignored.
    pub fn add_item_validator(&mut self, mut item: ValidateItem) {
        if self.items.contains_key(&item.tag) {
            debug!("Could not add validator for item {} to category {}", item.tag, self.name);
            return;
        }
        if item.mandatory {
            self.mandatory_fields.insert(item.tag.clone());
        }
        item.category = self.name.clone();
        self.items.insert(item.tag.clone(), item);
    }

    /// Exact tag lookup.
    #[must_use]
    pub fn get_validator_for_item(&self, tag: &str) -> Option<&ValidateItem> {
        let result = self.items.get(tag);
        if result.is_none() {
            debug!("No validator for tag {}", tag);
        }
        result
    }

    fn item_mut(&mut self, tag: &str) -> Option<&mut ValidateItem> {
        self.items.get_mut(tag)
    }

    /// Tags of the items marked mandatory, in the order they were added.
    pub fn mandatory_fields(&self) -> impl Iterator<Item = &str> {
        self.mandatory_fields.iter().map(String::as_str)
    }

    /// Every item validator, in the order they were added.
    pub fn items(&self) -> impl Iterator<Item = &ValidateItem> {
        self.items.values()
    }
}

/// A parent/child relation: the child's key items refer to the parent's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidateLink {
    pub parent_category: String,
    pub parent_keys: Vec<String>,
    pub child_category: String,
    pub child_keys: Vec<String>,
}

/// Violations collected by a lenient validation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    errors: Vec<ValidationError>,
}

impl ValidationReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` when nothing was reported.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Appends the errors of another report, e.g. link validation after
    /// datablock validation.
    pub fn extend(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for error in &self.errors {
            writeln!(f, "{}", error)?;
        }
        Ok(())
    }
}

impl IntoIterator for ValidationReport {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

/// The complete rule set of a dictionary.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    title: Option<String>,
    version: Option<String>,
    mode: ValidationMode,
    types: IndexMap<String, Arc<ValidateType>>,
    categories: IndexMap<String, ValidateCategory>,
    links: Vec<ValidateLink>,
}

impl Validator {
    /// Creates an empty validator. `mode` decides whether violations are
    /// returned as errors or logged and collected.
    #[must_use]
    pub fn new(mode: ValidationMode) -> Self {
        Validator {
            mode,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    /// Switches between strict and lenient reporting.
    pub fn set_mode(&mut self, mode: ValidationMode) {
        self.mode = mode;
    }

    /// `_dictionary.title` of the loaded dictionary.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = Some(title.to_string());
    }

    pub fn set_version(&mut self, version: &str) {
        self.version = Some(version.to_string());
    }

    /// Adds a type. A second type with the same name is ignored.
    pub fn add_type_validator(&mut self, validator: ValidateType) {
        let key = validator.name.to_ascii_lowercase();
        if self.types.contains_key(&key) {
            debug!("Could not add validator for type {}", validator.name);
            return;
        }
        self.types.insert(key, Arc::new(validator));
    }

    /// Case-insensitive type lookup.
    #[must_use]
    pub fn get_validator_for_type(&self, code: &str) -> Option<&Arc<ValidateType>> {
        let result = self.types.get(&code.to_ascii_lowercase());
        if result.is_none() {
            debug!("No validator for type {}", code);
        }
        result
    }

    /// Adds a category. A second category with the same name is ignored.
    pub fn add_category_validator(&mut self, validator: ValidateCategory) {
        let key = validator.name.to_ascii_lowercase();
        if self.categories.contains_key(&key) {
            debug!("Could not add validator for category {}", validator.name);
            return;
        }
        self.categories.insert(key, validator);
    }

    /// Case-insensitive category lookup.
    #[must_use]
    pub fn get_validator_for_category(&self, category: &str) -> Option<&ValidateCategory> {
        let result = self.categories.get(&category.to_ascii_lowercase());
        if result.is_none() {
            debug!("No validator for category {}", category);
        }
        result
    }

    fn category_mut(&mut self, category: &str) -> Option<&mut ValidateCategory> {
        self.categories.get_mut(&category.to_ascii_lowercase())
    }

    /// Adds an item to an existing category.
    pub fn add_item_validator(&mut self, category: &str, item: ValidateItem) -> Result<()> {
        match self.category_mut(category) {
            Some(validator) => {
                validator.add_item_validator(item);
                Ok(())
            }
            None => Err(Error::schema(format!(
                "item _{}.{} refers to undefined category",
                category, item.tag
            ))),
        }
    }

    /// Looks up `_category.item`.
    ///
    /// ```rust
    /// use cif_sac::{ValidateCategory, ValidateItem, ValidationMode, Validator};
    ///
    /// let mut validator = Validator::new(ValidationMode::Lenient);
    /// validator.add_category_validator(ValidateCategory::new("cell", vec![], false));
    /// validator.add_item_validator("cell", ValidateItem::new("length_a", false, None)).unwrap();
    /// assert!(validator.get_validator_for_item("_CELL.length_a").is_some());
    /// assert!(validator.get_validator_for_item("_cell.Length_a").is_none());
    /// ```
    #[must_use]
    pub fn get_validator_for_item(&self, tag: &str) -> Option<&ValidateItem> {
        let (category, item) = split_tag_name(tag);
        let result = self
            .get_validator_for_category(category)
            .and_then(|cv| cv.get_validator_for_item(item));
        if result.is_none() {
            debug!("No validator for item {}", tag);
        }
        result
    }

    /// Adds a link. Both key lists must have the same length and name
    /// existing items. A child key item without a type takes the parent's.
    pub fn add_link_validator(&mut self, link: ValidateLink) -> Result<()> {
        if link.parent_keys.len() != link.child_keys.len() {
            return Err(Error::schema(
                "unequal number of keys for parent and child in link",
            ));
        }

        let parent = self
            .get_validator_for_category(&link.parent_category)
            .ok_or_else(|| {
                Error::schema(format!("unknown parent category {}", link.parent_category))
            })?;
        if self.get_validator_for_category(&link.child_category).is_none() {
            return Err(Error::schema(format!(
                "unknown child category {}",
                link.child_category
            )));
        }

        let mut parent_types = Vec::with_capacity(link.parent_keys.len());
        for key in &link.parent_keys {
            let item = parent.get_validator_for_item(key).ok_or_else(|| {
                Error::schema(format!(
                    "unknown parent tag _{}.{}",
                    link.parent_category, key
                ))
            })?;
            parent_types.push(item.item_type.clone());
        }

        let child_category = link.child_category.clone();
        let child = self
            .category_mut(&child_category)
            .ok_or_else(|| Error::schema(format!("unknown child category {}", child_category)))?;
        for (key, parent_type) in link.child_keys.iter().zip(parent_types) {
            let item = child.item_mut(key).ok_or_else(|| {
                Error::schema(format!("unknown child tag _{}.{}", child_category, key))
            })?;
            if item.item_type.is_none() {
                item.item_type = parent_type;
            }
        }

        self.links.push(link);
        Ok(())
    }

    #[must_use]
    pub fn get_links_for_parent(&self, category: &str) -> Vec<&ValidateLink> {
        self.links
            .iter()
            .filter(|link| link.parent_category.eq_ignore_ascii_case(category))
            .collect()
    }

    #[must_use]
    pub fn get_links_for_child(&self, category: &str) -> Vec<&ValidateLink> {
        self.links
            .iter()
            .filter(|link| link.child_category.eq_ignore_ascii_case(category))
            .collect()
    }

    pub fn types(&self) -> impl Iterator<Item = &Arc<ValidateType>> {
        self.types.values()
    }

    pub fn categories(&self) -> impl Iterator<Item = &ValidateCategory> {
        self.categories.values()
    }

    pub fn links(&self) -> &[ValidateLink] {
        &self.links
    }

    /// Returns the error in strict mode or when `fatal` is set; otherwise
    /// logs it and carries on.
    pub fn report_error(&self, error: ValidationError, fatal: bool) -> Result<()> {
        if self.mode.is_strict() || fatal {
            return Err(Error::Validation(error));
        }
        warn!("{}", error);
        Ok(())
    }

    fn record(&self, report: &mut ValidationReport, error: ValidationError) -> Result<()> {
        self.report_error(error.clone(), false)?;
        report.push(error);
        Ok(())
    }

    /// Validates a single value of `_category.item`. Unknown items are not an
    /// error here.
    pub fn validate_value(&self, tag: &str, value: &str) -> Result<()> {
        match self.get_validator_for_item(tag) {
            Some(item) => match item.validate(value) {
                Ok(()) => Ok(()),
                Err(error) => self.report_error(error, false),
            },
            None => Ok(()),
        }
    }

    /// Checks every category, row and value of a datablock.
    pub fn validate_datablock(&self, datablock: &Datablock) -> Result<ValidationReport> {
        let mut report = ValidationReport::new();

        for category in datablock.categories() {
            self.validate_category(category, &mut report)?;
        }

        for validator in self.categories.values() {
            if validator.mandatory && datablock.category(&validator.name).is_none() {
                self.record(
                    &mut report,
                    ValidationError::new(&validator.name, None, "mandatory category is missing"),
                )?;
            }
        }

        Ok(report)
    }

    fn validate_category(&self, category: &Category, report: &mut ValidationReport) -> Result<()> {
        let validator = match self.get_validator_for_category(category.name()) {
            Some(validator) => validator,
            None => {
                return self.record(
                    report,
                    ValidationError::new(
                        category.name(),
                        None,
                        "category is not defined in the dictionary",
                    ),
                )
            }
        };

        for column in category.columns() {
            if validator.get_validator_for_item(column).is_none() {
                self.record(
                    report,
                    ValidationError::new(
                        category.name(),
                        Some(column),
                        "item is not defined in the dictionary",
                    ),
                )?;
            }
        }

        for (index, row) in category.rows().iter().enumerate() {
            for (item, value) in row {
                if let Some(item_validator) = validator.get_validator_for_item(item) {
                    if let Err(error) = item_validator.validate(value) {
                        self.record(report, error)?;
                    }
                }
            }

            for field in validator.mandatory_fields() {
                if !row.contains(field) {
                    self.record(
                        report,
                        ValidationError::new(
                            category.name(),
                            Some(field),
                            format!("missing mandatory item in row {}", index + 1),
                        ),
                    )?;
                }
            }
        }
        Ok(())
    }

    /// Checks that every child row refers to an existing parent row, for
    /// every link. Child rows with a `?` or `.` key are skipped. Keys are
    /// compared with the parent item's type.
    pub fn validate_links(&self, datablock: &Datablock) -> Result<ValidationReport> {
        let mut report = ValidationReport::new();

        for link in &self.links {
            let child = match datablock.category(&link.child_category) {
                Some(child) => child,
                None => continue,
            };
            let parent = datablock.category(&link.parent_category);
            let parent_types: Vec<Option<&Arc<ValidateType>>> = link
                .parent_keys
                .iter()
                .map(|key| {
                    self.get_validator_for_category(&link.parent_category)
                        .and_then(|cv| cv.get_validator_for_item(key))
                        .and_then(|item| item.item_type.as_ref())
                })
                .collect();

            for (index, row) in child.rows().iter().enumerate() {
                let keys: Option<Vec<&str>> = link
                    .child_keys
                    .iter()
                    .map(|key| row.get(key).filter(|v| !is_null_value(v)))
                    .collect();
                let keys = match keys {
                    Some(keys) => keys,
                    None => continue,
                };

                let found = parent.map_or(false, |parent| {
                    parent.rows().iter().any(|prow| {
                        link.parent_keys
                            .iter()
                            .zip(&keys)
                            .zip(&parent_types)
                            .all(|((pkey, value), item_type)| match prow.get(pkey) {
                                Some(pvalue) => match item_type {
                                    Some(t) => t.compare(pvalue, value) == Ordering::Equal,
                                    None => pvalue == *value,
                                },
                                None => false,
                            })
                    })
                });

                if !found {
                    let described: Vec<String> = link
                        .child_keys
                        .iter()
                        .zip(&keys)
                        .map(|(key, value)| format!("{}={}", key, value))
                        .collect();
                    self.record(
                        &mut report,
                        ValidationError::new(
                            &link.child_category,
                            None,
                            format!(
                                "row {} ({}) has no parent in {}",
                                index + 1,
                                described.join(", "),
                                link.parent_category
                            ),
                        ),
                    )?;
                }
            }
        }

        Ok(report)
    }
}
