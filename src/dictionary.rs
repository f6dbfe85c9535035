//! Loading a [`Validator`] from a DDL2 dictionary.
//!
//! A dictionary is itself a CIF document, using save frames. The loader reads
//! it with the dictionary grammar and picks up:
//!
//! | source                                      | becomes                     |
//! |---------------------------------------------|-----------------------------|
//! | `_item_type_list` (datablock level)         | [`ValidateType`]s           |
//! | `_category`, `_category_key` (save frames)  | [`ValidateCategory`]s       |
//! | `_item`, `_item_type`, `_item_enumeration`  | [`ValidateItem`]s           |
//! | `_item_linked`, `_pdbx_item_linked_group_list` | [`ValidateLink`]s        |
//! | `_dictionary.title`, `_dictionary.version`  | validator metadata          |
//!
//! ```rust
//! use cif_sac::{load_dictionary, CifOptions};
//!
//! let dict = r#"data_test.dic
//! _dictionary.title test.dic
//! _dictionary.version 1.0
//! loop_
//! _item_type_list.code
//! _item_type_list.primitive_code
//! _item_type_list.construct
//! int numb '[+-]?[0-9]+'
//! save_cell
//! _category.id cell
//! _category.mandatory_code no
//! _category_key.name '_cell.entry_id'
//! save_
//! save__cell.entry_id
//! _item.name '_cell.entry_id'
//! _item.category_id cell
//! _item.mandatory_code yes
//! _item_type.code int
//! save_
//! "#;
//!
//! let validator = load_dictionary(dict.as_bytes(), &CifOptions::new()).unwrap();
//! assert_eq!(validator.title(), Some("test.dic"));
//! assert!(validator.get_validator_for_item("_cell.entry_id").unwrap().mandatory);
//! ```

use crate::model::{Category, Datablock, SaveFrame};
use crate::parser::{split_tag_name, Parser};
use crate::row::is_null_value;
use crate::validate::{
    PrimitiveType, ValidateCategory, ValidateItem, ValidateLink, ValidateType, Validator,
};
use crate::{CifOptions, DocumentBuilder, Error, Result};
use indexmap::{IndexMap, IndexSet};
use std::io::BufRead;
use tracing::debug;

fn column<'a>(category: Option<&'a Category>, item: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    category
        .into_iter()
        .flat_map(move |cat| cat.values(item))
        .flatten()
        .filter(|v| !is_null_value(v))
}

fn first<'a>(category: Option<&'a Category>, item: &'a str) -> Option<&'a str> {
    column(category, item).next()
}

fn is_yes(code: Option<&str>) -> bool {
    code.map_or(false, |c| c.eq_ignore_ascii_case("yes"))
}

fn load_types(datablock: &Datablock, validator: &mut Validator) -> Result<()> {
    let list = match datablock.category("item_type_list") {
        Some(list) => list,
        None => return Ok(()),
    };

    for row in list.rows() {
        let code = row
            .get("code")
            .ok_or_else(|| Error::schema("_item_type_list row without code"))?;
        let primitive = PrimitiveType::from_code(row.get("primitive_code").unwrap_or(""))?;
        let construct: String = row
            .get("construct")
            .filter(|c| !is_null_value(c))
            .unwrap_or(".*")
            .chars()
            .filter(|&c| c != '\n' && c != '\r')
            .collect();
        validator.add_type_validator(ValidateType::new(code, primitive, &construct)?);
    }
    Ok(())
}

fn load_category(frame: &SaveFrame, validator: &mut Validator) {
    let category = frame.category("category");
    let name = match first(category, "id") {
        Some(name) => name,
        None => return,
    };
    let keys = column(frame.category("category_key"), "name")
        .map(|tag| split_tag_name(tag).1.to_string())
        .collect();
    let mandatory = is_yes(first(category, "mandatory_code"));

    debug!("dictionary category {}", name);
    validator.add_category_validator(ValidateCategory::new(name, keys, mandatory));
}

fn load_items(frame: &SaveFrame, validator: &mut Validator) -> Result<()> {
    let items = match frame.category("item") {
        Some(items) => items,
        None => return Ok(()),
    };

    let item_type = match first(frame.category("item_type"), "code") {
        Some(code) => Some(
            validator
                .get_validator_for_type(code)
                .cloned()
                .ok_or_else(|| {
                    Error::schema(format!("undefined type code {} in frame {}", code, frame.name))
                })?,
        ),
        None => None,
    };
    let enums: Vec<&str> = column(frame.category("item_enumeration"), "value").collect();

    for row in items.rows() {
        let tag = match row.get("name") {
            Some(tag) => tag,
            None => continue,
        };
        let (tag_category, item) = split_tag_name(tag);
        let category = row
            .get("category_id")
            .filter(|c| !is_null_value(c))
            .unwrap_or(tag_category);
        let mandatory = is_yes(row.get("mandatory_code"));

        validator.add_item_validator(
            category,
            ValidateItem::new(item, mandatory, item_type.clone()).with_enums(enums.iter().copied()),
        )?;
    }
    Ok(())
}

fn category_of(tag: &str) -> String {
    split_tag_name(tag).0.to_ascii_lowercase()
}

fn item_of(tag: &str) -> String {
    split_tag_name(tag).1.to_string()
}

// (child tag, parent tag) pairs from every `_item_linked` loop, in order
fn linked_pairs(datablock: &Datablock) -> IndexSet<(String, String)> {
    let mut pairs = IndexSet::new();
    for frame in datablock.save_frames() {
        if let Some(linked) = frame.category("item_linked") {
            for row in linked.rows() {
                if let (Some(child), Some(parent)) = (row.get("child_name"), row.get("parent_name")) {
                    pairs.insert((child.to_string(), parent.to_string()));
                }
            }
        }
    }
    pairs
}

fn build_links(datablock: &Datablock) -> Vec<ValidateLink> {
    // group key -> (parent category, child category, parent keys, child keys)
    let mut groups: IndexMap<(String, String, String), ValidateLink> = IndexMap::new();
    let mut add = |group: String, child: &str, parent: &str| {
        let parent_category = category_of(parent);
        let child_category = category_of(child);
        let link = groups
            .entry((parent_category.clone(), child_category.clone(), group))
            .or_insert_with(|| ValidateLink {
                parent_category,
                parent_keys: Vec::new(),
                child_category,
                child_keys: Vec::new(),
            });
        link.parent_keys.push(item_of(parent));
        link.child_keys.push(item_of(child));
    };

    match datablock.category("pdbx_item_linked_group_list") {
        Some(list) => {
            for row in list.rows() {
                if let (Some(group), Some(child), Some(parent)) = (
                    row.get("link_group_id"),
                    row.get("child_name"),
                    row.get("parent_name"),
                ) {
                    add(group.to_string(), child, parent);
                }
            }
        }
        None => {
            for (child, parent) in linked_pairs(datablock) {
                add(String::new(), &child, &parent);
            }
        }
    }

    groups.into_values().collect()
}

/// Reads a DDL2 dictionary and builds the [`Validator`] it describes.
///
/// The validator takes its strictness from `options.mode`. Save frames are
/// always enabled for the dictionary itself.
pub fn load_dictionary<R: BufRead>(reader: R, options: &CifOptions) -> Result<Validator> {
    let parse_options = options.clone().with_save_frames(true);
    let mut builder = DocumentBuilder::new();
    Parser::new(reader, &mut builder, &parse_options).parse_file()?;
    let document = builder.finish();

    let datablock = document
        .datablocks()
        .first()
        .ok_or_else(|| Error::schema("dictionary has no datablock"))?;

    let mut validator = Validator::new(options.mode);

    let info = datablock.category("dictionary");
    if let Some(title) = first(info, "title") {
        validator.set_title(title);
    }
    if let Some(version) = first(info, "version") {
        validator.set_version(version);
    }

    load_types(datablock, &mut validator)?;
    for frame in datablock.save_frames() {
        load_category(frame, &mut validator);
    }
    for frame in datablock.save_frames() {
        load_items(frame, &mut validator)?;
    }
    for link in build_links(datablock) {
        validator.add_link_validator(link)?;
    }

    debug!(
        types = validator.types().count(),
        categories = validator.categories().count(),
        links = validator.links().len(),
        "loaded dictionary {}",
        validator.title().unwrap_or(datablock.name())
    );
    Ok(validator)
}
