use std::io::{self, BufRead};

use anyhow::{Context, Result};

use crate::args::BatchSource;

/// Addresses for a batch run, in input order.
pub fn read_addresses(source: &BatchSource) -> Result<Vec<String>> {
    match &source.file {
        Some(path) => {
            let file = std::fs::File::open(path)
                .with_context(|| format!("open {}", path.display()))?;
            parse_csv(file).with_context(|| format!("read {}", path.display()))
        }
        None => parse_lines(io::stdin().lock()).context("read stdin"),
    }
}

/// One address per non-blank line.
pub fn parse_lines<R: BufRead>(reader: R) -> Result<Vec<String>> {
    let mut addresses = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if !line.is_empty() {
            addresses.push(line.to_string());
        }
    }
    Ok(addresses)
}

/// First column of every non-empty row; a leading `email` header is skipped.
#[cfg(feature = "with-csv")]
pub fn parse_csv<R: io::Read>(reader: R) -> Result<Vec<String>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);
    let mut addresses = Vec::new();
    for (idx, record) in rdr.records().enumerate() {
        let record = record?;
        let Some(first) = record.get(0).map(str::trim) else {
            continue;
        };
        if first.is_empty() || (idx == 0 && first.eq_ignore_ascii_case("email")) {
            continue;
        }
        addresses.push(first.to_string());
    }
    Ok(addresses)
}

#[cfg(not(feature = "with-csv"))]
pub fn parse_csv<R: io::Read>(_reader: R) -> Result<Vec<String>> {
    anyhow::bail!("--file requires the 'with-csv' feature")
}
