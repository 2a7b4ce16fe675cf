//! Parser for the beer metadata table.
//!
//! Format (tab-separated, UTF-8):
//!
//! ```text
//! beer_id<TAB>beer_brewery<TAB>style<TAB>score
//! 1234<TAB>Pliny the Elder;Russian River<TAB>American Double / Imperial IPA<TAB>4.59
//! ```
//!
//! The header line is optional and may follow leading blank lines or a
//! byte-order mark. Blank lines are skipped.

use crate::error::{CatalogError, Result};
use crate::types::*;
use std::fs;
use std::path::Path;

const EXPECTED_FIELDS: usize = 4;
const BOM: char = '\u{feff}';

/// Read a file into lines, replacing invalid UTF-8 instead of failing.
///
/// Brewery names scraped upstream occasionally carry stray bytes; a lossy
/// replacement keeps the row usable.
fn read_lines_lossy(path: &Path) -> Result<Vec<String>> {
    let bytes = fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => CatalogError::FileNotFound {
            path: path.display().to_string(),
        },
        _ => CatalogError::IoError(e),
    })?;
    let content = String::from_utf8_lossy(&bytes);
    Ok(content.lines().map(|s| s.to_string()).collect())
}

/// Parse the beer metadata file into records, in file order
pub fn parse_beers(path: &Path) -> Result<Vec<BeerRecord>> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let lines = read_lines_lossy(path)?;
    parse_beer_lines(&file_name, lines.iter().map(String::as_str))
}

/// Parse already-read lines. `file` is only used in error messages.
pub fn parse_beer_lines<'a>(
    file: &str,
    lines: impl IntoIterator<Item = &'a str>,
) -> Result<Vec<BeerRecord>> {
    let mut beers = Vec::new();
    let mut seen_content = false;

    for (idx, line) in lines.into_iter().enumerate() {
        let line_no = idx + 1;
        // Only strip the line terminator; tabs are significant
        let mut line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            continue;
        }
        if !seen_content {
            seen_content = true;
            line = line.trim_start_matches(BOM);
            if is_header(line) {
                continue;
            }
        }
        beers.push(parse_beer_line(file, line_no, line)?);
    }

    Ok(beers)
}

fn is_header(line: &str) -> bool {
    line.split('\t').next().map(str::trim) == Some("beer_id")
}

fn parse_beer_line(file: &str, line_no: usize, line: &str) -> Result<BeerRecord> {
    let parts: Vec<&str> = line.split('\t').collect();
    if parts.len() != EXPECTED_FIELDS {
        return Err(CatalogError::ParseError {
            file: file.to_string(),
            line: line_no,
            reason: format!(
                "Expected {} fields but found {}",
                EXPECTED_FIELDS,
                parts.len()
            ),
        });
    }

    let id: BeerId = parts[0].trim().parse().map_err(|e| CatalogError::ParseError {
        file: file.to_string(),
        line: line_no,
        reason: format!("Invalid beer_id: {}", e),
    })?;

    let display_name = parts[1].trim();
    if display_name.is_empty() {
        return Err(CatalogError::ParseError {
            file: file.to_string(),
            line: line_no,
            reason: "Missing beer_brewery".to_string(),
        });
    }

    let mean_score: f64 = parts[3].trim().parse().map_err(|e| CatalogError::ParseError {
        file: file.to_string(),
        line: line_no,
        reason: format!("Invalid score: {}", e),
    })?;

    Ok(BeerRecord::new(id, display_name, parts[2].trim(), mean_score))
}
