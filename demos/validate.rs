//! Validate a CIF file against a DDL2 dictionary.
//!
//! Run with: cargo run --example validate -- mmcif_pdbx.dic file.cif [--strict]

use cif_sac::{load_dictionary, parse_reader, CifOptions};
use std::error::Error;
use std::fs::File;
use std::io::BufReader;

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (dictionary, file) = match args.as_slice() {
        [dictionary, file, ..] => (dictionary, file),
        _ => return Err("usage: validate <dictionary> <file.cif> [--strict]".into()),
    };
    let options = if args.iter().any(|a| a == "--strict") {
        CifOptions::strict()
    } else {
        CifOptions::new()
    };

    let validator = load_dictionary(BufReader::new(File::open(dictionary)?), &options)?;
    println!(
        "Loaded {} version {}",
        validator.title().unwrap_or("dictionary"),
        validator.version().unwrap_or("?")
    );

    let doc = parse_reader(BufReader::new(File::open(file)?), &options)?;
    let mut errors = 0;
    for datablock in doc.datablocks() {
        let mut report = validator.validate_datablock(datablock)?;
        report.extend(validator.validate_links(datablock)?);

        for error in report.errors() {
            println!("data_{}: {}", datablock.name(), error);
        }
        errors += report.len();
    }

    if errors == 0 {
        println!("✓ {} is valid", file);
    } else {
        println!("{} problems found", errors);
    }
    Ok(())
}
