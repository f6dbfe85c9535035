use cif_sac::{
    index_datablocks, load_dictionary, parse_datablock, parse_datablock_at, parse_str,
    parse_str_with_options, to_string, Builder, CifOptions, Error, Parser, Result,
    ValidationMode,
};
use std::io::Cursor;

const MMCIF: &str = r#"data_1CBS
#
_entry.id 1CBS
#
_struct.title
;CELLULAR RETINOIC ACID BINDING PROTEIN TYPE II
COMPLEXED WITH ALL-TRANS-RETINOIC ACID
;
#
loop_
_atom_site.group_PDB
_atom_site.id
_atom_site.type_symbol
_atom_site.label_atom_id
_atom_site.label_comp_id
_atom_site.Cartn_x
ATOM 1 N N   PRO 16.979
ATOM 2 C CA  PRO 18.065
ATOM 3 O "O5'" PRO 19.100
HETATM 4 C C1 REA ?
#
"#;

const DICT: &str = r#"data_mini.dic
_dictionary.title mini.dic
_dictionary.version 0.1
loop_
_item_type_list.code
_item_type_list.primitive_code
_item_type_list.construct
code  char  '[A-Za-z0-9_]+'
ucode uchar '[A-Za-z0-9_]+'
int   numb  '[+-]?[0-9]+'
save_entity
_category.id entity
_category.mandatory_code yes
_category_key.name '_entity.id'
save_
save__entity.id
loop_
_item.name
_item.category_id
_item.mandatory_code
'_entity.id' entity yes
'_atom.entity_id' atom yes
_item_type.code code
loop_
_item_linked.child_name
_item_linked.parent_name
'_atom.entity_id' '_entity.id'
save_
save__entity.type
_item.name '_entity.type'
_item.category_id entity
_item.mandatory_code no
_item_type.code ucode
loop_
_item_enumeration.value
polymer
water
save_
save_atom
_category.id atom
_category.mandatory_code no
_category_key.name '_atom.id'
save_
save__atom.id
_item.name '_atom.id'
_item.category_id atom
_item.mandatory_code yes
_item_type.code int
save_
"#;

#[derive(Default)]
struct Recorder {
    events: Vec<String>,
}

impl Builder for Recorder {
    fn open_datablock(&mut self, name: &str) -> Result<()> {
        self.events.push(format!("data {}", name));
        Ok(())
    }

    fn open_category(&mut self, name: &str) -> Result<()> {
        self.events.push(format!("category {}", name));
        Ok(())
    }

    fn open_row(&mut self) -> Result<()> {
        self.events.push("row".to_string());
        Ok(())
    }

    fn set_item(&mut self, category: &str, item: &str, value: &str) -> Result<()> {
        self.events.push(format!("{}.{}={}", category, item, value));
        Ok(())
    }
}

#[test]
fn test_loop_of_three_rows() {
    let doc = parse_str("data_TEST\n#\nloop_\n_test.id\n_test.name\n1 aap\n2 noot\n3 mies\n")
        .unwrap();

    let test = doc.get("TEST").unwrap().category("test").unwrap();
    let names: Vec<Option<&str>> = test.values("name").collect();
    assert_eq!(names, vec![Some("aap"), Some("noot"), Some("mies")]);
    assert_eq!(test.values("id").collect::<Vec<_>>(), vec![Some("1"), Some("2"), Some("3")]);
}

#[test]
fn test_mmcif_document() {
    let doc = parse_str(MMCIF).unwrap();
    let block = doc.get("1cbs").unwrap();
    assert_eq!(block.categories().len(), 3);

    let title = block.category("struct").unwrap().rows()[0].get("title").unwrap();
    assert_eq!(
        title,
        "CELLULAR RETINOIC ACID BINDING PROTEIN TYPE II\nCOMPLEXED WITH ALL-TRANS-RETINOIC ACID"
    );

    let atoms = block.category("atom_site").unwrap();
    assert_eq!(atoms.len(), 4);
    assert_eq!(atoms.rows()[2].get("label_atom_id"), Some("O5'"));
    assert_eq!(atoms.rows()[3].get("group_pdb"), Some("HETATM"));
    assert!(!atoms.rows()[3].has_value("Cartn_x"));
}

#[test]
fn test_mmcif_round_trip() {
    let doc = parse_str(MMCIF).unwrap();
    let text = to_string(&doc).unwrap();
    assert_eq!(parse_str(&text).unwrap(), doc);
    assert!(text.contains("_entry.id 1CBS\n"));
}

#[test]
fn test_single_datablock_events() {
    let input = "data_A\n_a.x 1\ndata_B\n_b.x 2\n";
    let mut recorder = Recorder::default();
    let found = Parser::new(input.as_bytes(), &mut recorder, &CifOptions::new())
        .parse_single_datablock("B")
        .unwrap();

    assert!(found);
    assert_eq!(recorder.events, vec!["data B", "category b", "row", "b.x=2"]);
}

#[test]
fn test_single_datablock_skips_look_alikes() {
    let input = "data_A\n_a.t\n;\ndata_B\n;\n_a.q 'data_B'\n# data_B\ndata_B\n_b.x 2\n";

    let index = index_datablocks(input.as_bytes()).unwrap();
    assert_eq!(index.names().collect::<Vec<_>>(), vec!["A", "B"]);
    assert_eq!(index.get("B").unwrap().line, 8);

    let block = parse_datablock(input.as_bytes(), "B", &CifOptions::new())
        .unwrap()
        .unwrap();
    assert_eq!(block.categories().len(), 1);
    assert_eq!(block.category("b").unwrap().rows()[0].get("x"), Some("2"));
}

#[test]
fn test_indexed_access() {
    let input = "data_A\n_a.t\n;\ndata_B\n;\ndata_B\n_b.x 2\ndata_C\n_c.x 3\n";
    let index = index_datablocks(input.as_bytes()).unwrap();
    let entry = index.get("B").unwrap();
    assert_eq!((entry.offset, entry.line), (23, 6));

    let mut recorder = Recorder::default();
    let found = Parser::new(Cursor::new(input), &mut recorder, &CifOptions::new())
        .parse_datablock_at(&index, "B")
        .unwrap();
    assert!(found);
    assert_eq!(recorder.events, vec!["data B", "category b", "row", "b.x=2"]);

    let c = parse_datablock_at(Cursor::new(input), &index, "C", &CifOptions::new())
        .unwrap()
        .unwrap();
    assert_eq!(c.name(), "C");

    assert!(parse_datablock_at(Cursor::new(input), &index, "D", &CifOptions::new())
        .unwrap()
        .is_none());
}

#[test]
fn test_error_lines_with_crlf() {
    let err = parse_str("data_x\r\n_a.b 1\r\n_a.c 'oops\r\n").unwrap_err();
    assert!(matches!(err, Error::Lex { line: 3, .. }));
    assert_eq!(err.line(), Some(3));
}

#[test]
fn test_dictionary_validation_passes() {
    let validator = load_dictionary(DICT.as_bytes(), &CifOptions::new()).unwrap();
    let doc = parse_str(
        "data_x\n_entity.id A\n_entity.type polymer\nloop_\n_atom.id\n_atom.entity_id\n1 A\n2 A\n",
    )
    .unwrap();
    let block = &doc.datablocks()[0];

    assert!(validator.validate_datablock(block).unwrap().is_valid());
    assert!(validator.validate_links(block).unwrap().is_valid());
}

#[test]
fn test_dictionary_validation_lenient_collects() {
    let validator = load_dictionary(DICT.as_bytes(), &CifOptions::new()).unwrap();
    assert_eq!(validator.mode(), ValidationMode::Lenient);

    let doc = parse_str(
        "data_x\n_entity.id A\n_entity.type ice\nloop_\n_atom.id\n_atom.entity_id\n1 A\nx B\n",
    )
    .unwrap();
    let block = &doc.datablocks()[0];

    let report = validator.validate_datablock(block).unwrap();
    let messages: Vec<String> = report.errors().iter().map(ToString::to_string).collect();
    assert_eq!(messages.len(), 2, "{:?}", messages);
    assert_eq!(
        messages[0],
        "When validating _entity.type: Value 'ice' is not in the list of allowed values"
    );
    assert_eq!(
        messages[1],
        "When validating _atom.id: Value 'x' does not match type expression for type int"
    );

    let links = validator.validate_links(block).unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links.errors()[0].category, "atom");
    assert!(links.errors()[0].message.contains("entity_id=B"));
}

#[test]
fn test_dictionary_validation_strict_stops() {
    let validator = load_dictionary(DICT.as_bytes(), &CifOptions::strict()).unwrap();
    let doc = parse_str("data_x\nloop_\n_atom.id\n_atom.entity_id\n1 A\n").unwrap();
    let block = &doc.datablocks()[0];

    match validator.validate_datablock(block).unwrap_err() {
        Error::Validation(error) => {
            assert_eq!(error.category, "entity");
            assert_eq!(error.message, "mandatory category is missing");
        }
        other => panic!("unexpected error: {other}"),
    }

    assert!(matches!(
        validator.validate_links(block),
        Err(Error::Validation(_))
    ));
}

#[test]
fn test_missing_mandatory_item() {
    let validator = load_dictionary(DICT.as_bytes(), &CifOptions::new()).unwrap();
    let doc = parse_str("data_x\n_entity.id A\nloop_\n_atom.id\n1\n2\n").unwrap();

    let report = validator.validate_datablock(&doc.datablocks()[0]).unwrap();
    assert_eq!(report.len(), 2);
    assert!(report
        .errors()
        .iter()
        .all(|e| e.item.as_deref() == Some("entity_id")));
}

#[test]
fn test_dictionary_with_save_frames_as_document() {
    let doc = parse_str_with_options(DICT, CifOptions::dictionary()).unwrap();
    let block = &doc.datablocks()[0];
    assert_eq!(block.save_frames().len(), 5);
    assert!(block.save_frame("_entity.type").is_some());

    let err = parse_str(DICT).unwrap_err();
    assert!(matches!(err, Error::Syntax { .. }));
}

#[test]
fn test_json_export() {
    let doc = parse_str("data_TEST\nloop_\n_test.id\n_test.name\n1 aap\n2 ?\n").unwrap();
    let json = serde_json::to_value(&doc).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "datablocks": [{
                "name": "TEST",
                "categories": [{
                    "name": "test",
                    "columns": ["id", "name"],
                    "rows": [
                        {"id": "1", "name": "aap"},
                        {"id": "2", "name": "?"}
                    ]
                }]
            }]
        })
    );
}
