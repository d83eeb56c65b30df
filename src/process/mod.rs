// src/process/mod.rs
pub mod columns;
pub mod convert;
pub mod date_parser;
pub mod derive;
pub mod pipeline;
pub mod raw_table;
pub mod utils;

pub use raw_table::RawTable;

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use std::{fs::File, io::Read, path::Path};
use tracing::{debug, warn};

/// Parse a delimited export with a header row into a `RawTable`.
///
/// Rows with a different field count are kept (padded or cut to the header
/// width); blank lines are skipped by the reader.
pub fn read_source<R: Read>(reader: R, delimiter: u8) -> Result<RawTable> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()
        .context("reading header row")?
        .iter()
        .enumerate()
        // exports saved from spreadsheet tools often start with a BOM
        .map(|(i, h)| if i == 0 { h.trim_start_matches('\u{feff}') } else { h })
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    let mut ragged = 0usize;
    for (idx, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("parse error at record {}", idx))?;
        if record.len() != headers.len() {
            ragged += 1;
        }
        rows.push(record.iter().map(str::to_string).collect());
    }
    if ragged > 0 {
        warn!(rows = ragged, "rows with unexpected field count");
    }
    debug!(columns = headers.len(), rows = rows.len(), "read source");

    Ok(RawTable::new(headers, rows))
}

/// Open `path` and read it with `read_source`.
pub fn load_source(path: impl AsRef<Path>, delimiter: u8) -> Result<RawTable> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    read_source(file, delimiter).with_context(|| format!("reading {}", path.display()))
}
