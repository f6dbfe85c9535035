//! Pull a single datablock out of a large multi-block file and write it to
//! standard output.
//!
//! Run with: cargo run --example extract_block -- file.cif BLOCK

use cif_sac::{index_datablocks, parse_datablock_at, to_writer, CifOptions, Document};
use std::error::Error;
use std::fs::File;
use std::io::{self, BufReader};

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (path, name) = match args.as_slice() {
        [path, name] => (path, name),
        _ => return Err("usage: extract_block <file.cif> <name>".into()),
    };

    let index = index_datablocks(BufReader::new(File::open(path)?))?;
    eprintln!("{} datablocks in {}", index.len(), path);

    let reader = BufReader::new(File::open(path)?);
    let datablock = parse_datablock_at(reader, &index, name, &CifOptions::dictionary())?
        .ok_or_else(|| format!("no datablock named {}", name))?;

    let doc = Document {
        datablocks: vec![datablock],
    };
    to_writer(io::stdout().lock(), &doc)?;
    Ok(())
}
