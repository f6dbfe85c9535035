//! Parse a CIF file and print a summary of its datablocks.
//!
//! Run with: cargo run --example parse_file -- path/to/file.cif

use cif_sac::{parse_reader, CifOptions};
use std::error::Error;
use std::fs::File;
use std::io::BufReader;

fn main() -> Result<(), Box<dyn Error>> {
    let path = std::env::args()
        .nth(1)
        .ok_or("usage: parse_file <file.cif>")?;

    let reader = BufReader::new(File::open(&path)?);
    let doc = parse_reader(reader, &CifOptions::dictionary())?;

    for datablock in doc.datablocks() {
        println!("data_{}", datablock.name());
        for category in datablock.categories() {
            println!(
                "  {:<32} {:>3} items {:>8} rows",
                category.name(),
                category.columns().len(),
                category.len()
            );
        }
        if !datablock.save_frames().is_empty() {
            println!("  {} save frames", datablock.save_frames().len());
        }
    }

    Ok(())
}
