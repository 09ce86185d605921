use std::path::{Path, PathBuf};

use crate::data::error::DataError;
use crate::data::prepare::{RawRecord, RawValue};

/// CSV file data source. Every cell is read as text.
#[derive(Debug, Clone)]
pub struct CsvSource {
    pub path: PathBuf,
    pub delimiter: char,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            delimiter: ',',
        }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole file into raw records.
    pub fn load(&self) -> Result<Vec<RawRecord>, DataError> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| DataError::Io {
            path: self.path.clone(),
            source,
        })?;
        parse_csv(&content, self.delimiter)
    }
}

/// Parse CSV text with a header row into raw records.
pub fn parse_csv(content: &str, delimiter: char) -> Result<Vec<RawRecord>, DataError> {
    let mut lines = content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty());

    let (_, header) = lines.next().ok_or(DataError::Empty)?;
    let columns = split_line(header.trim_start_matches('\u{feff}'), delimiter);

    let mut rows = Vec::new();
    for (index, line) in lines {
        let cells = split_line(line, delimiter);
        if cells.len() != columns.len() {
            return Err(DataError::MalformedRow {
                line: index + 1,
                expected: columns.len(),
                found: cells.len(),
            });
        }
        rows.push(
            columns
                .iter()
                .cloned()
                .zip(cells.into_iter().map(RawValue::Text))
                .collect(),
        );
    }

    Ok(rows)
}

/// Split one line, honouring double-quoted cells and `""` escapes.
fn split_line(line: &str, delimiter: char) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.trim_end_matches('\r').chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            c if c == delimiter && !in_quotes => cells.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    cells.push(current);
    cells
}
