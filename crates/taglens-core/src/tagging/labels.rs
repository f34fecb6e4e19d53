//! Label tables for the local multi-label classifier.
//!
//! Label files come from wherever the model was downloaded, so parsing is
//! deliberately forgiving:
//! - Encodings are tried in order: UTF-8 with BOM, UTF-8, Windows-1252,
//!   Latin-1, and finally lossy UTF-8. Reading never fails on bad bytes.
//! - Delimited tables (`,` `\t` `;` `|`) with or without a header row
//! - Plain text with one label per line
//!
//! The table's order must match the classifier's output vector exactly.
//!
//! # Format
//!
//! ```csv
//! tag_id,name,category,count
//! 9999999,general,9,807375
//! 470575,1girl,0,4225150
//! ```

use std::borrow::Cow;
use std::path::Path;

use csv::ReaderBuilder;
use encoding_rs::WINDOWS_1252;

use crate::error::{PipelineError, PipelineResult};

/// Header names recognized as the label column, in priority order.
const LABEL_COLUMN_ALIASES: &[&str] = &["name", "tag", "label", "class", "tag_name"];

/// Delimiters recognized in tabular label files.
const DELIMITERS: &[u8] = b",\t;|";

/// Ordered labels, index-aligned with the classifier's outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
    labels: Vec<String>,
}

impl LabelTable {
    /// Read and parse a label file.
    pub fn load(path: &Path) -> PipelineResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| PipelineError::Labels {
            path: path.to_path_buf(),
            message: format!("Failed to read label file: {e}"),
        })?;

        let table = Self::parse(&decode_label_bytes(&bytes));
        if table.is_empty() {
            return Err(PipelineError::Labels {
                path: path.to_path_buf(),
                message: "No labels found".to_string(),
            });
        }

        tracing::debug!("Loaded {} labels from {:?}", table.len(), path);
        Ok(table)
    }

    /// Parse already-decoded label text.
    pub fn parse(text: &str) -> Self {
        let lines: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();

        let labels = match detect_delimiter(&lines) {
            Some(delimiter) => parse_table(&lines, delimiter),
            None => lines.iter().map(|line| line.to_string()).collect(),
        };
        Self { labels }
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.labels
    }
}

/// Bytes left undefined by the strict windows-1252 code page.
const CP1252_UNDEFINED: &[u8] = &[0x81, 0x8D, 0x8F, 0x90, 0x9D];

type Decoder = fn(&[u8]) -> Option<Cow<'_, str>>;

/// Decoders tried in order; the first success wins.
const DECODERS: &[(&str, Decoder)] = &[
    ("utf-8-bom", decode_utf8_bom),
    ("utf-8", decode_utf8),
    ("windows-1252", decode_windows_1252),
    ("latin-1", decode_latin1),
];

/// Decode label file bytes with the encoding fallback chain.
pub fn decode_label_bytes(bytes: &[u8]) -> Cow<'_, str> {
    for (name, decode) in DECODERS {
        if let Some(text) = decode(bytes) {
            tracing::debug!("Label file decoded as {name}");
            return text;
        }
    }
    tracing::warn!("Label file is not valid in any known encoding; decoding lossily");
    String::from_utf8_lossy(bytes)
}

fn decode_utf8_bom(bytes: &[u8]) -> Option<Cow<'_, str>> {
    let rest = bytes.strip_prefix(b"\xEF\xBB\xBF")?;
    std::str::from_utf8(rest).ok().map(Cow::Borrowed)
}

fn decode_utf8(bytes: &[u8]) -> Option<Cow<'_, str>> {
    std::str::from_utf8(bytes).ok().map(Cow::Borrowed)
}

fn decode_windows_1252(bytes: &[u8]) -> Option<Cow<'_, str>> {
    if bytes.iter().any(|b| CP1252_UNDEFINED.contains(b)) {
        return None;
    }
    WINDOWS_1252.decode_without_bom_handling_and_without_replacement(bytes)
}

fn decode_latin1(bytes: &[u8]) -> Option<Cow<'_, str>> {
    Some(Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect()))
}

/// The first delimiter that appears on every line. A delimiter that only
/// shows up on some lines is part of a label (`;)`, `:|`), not a column break.
fn detect_delimiter(lines: &[&str]) -> Option<u8> {
    if lines.is_empty() {
        return None;
    }
    DELIMITERS
        .iter()
        .copied()
        .find(|&d| lines.iter().all(|line| line.as_bytes().contains(&d)))
}

/// One label per data row. A row with no usable label cell still occupies
/// its slot as an empty string so later labels keep their output index.
fn parse_table(lines: &[&str], delimiter: u8) -> Vec<String> {
    let joined = lines.join("\n");
    let rows: Vec<csv::StringRecord> = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .delimiter(delimiter)
        .from_reader(joined.as_bytes())
        .records()
        .enumerate()
        .map(|(line, record)| {
            record.unwrap_or_else(|e| {
                tracing::warn!("Malformed label row {}: {e}", line + 1);
                csv::StringRecord::new()
            })
        })
        .collect();

    let Some(first) = rows.first() else {
        return vec![];
    };

    let header: Vec<String> = first.iter().map(|h| h.to_lowercase()).collect();
    let header_column = LABEL_COLUMN_ALIASES
        .iter()
        .find_map(|alias| header.iter().position(|h| h == alias));

    let (column, data_rows) = match header_column {
        Some(column) => (column, &rows[1..]),
        None => (guess_label_column(first), &rows[..]),
    };

    let labels: Vec<String> = data_rows
        .iter()
        .map(|row| row.get(column).unwrap_or_default().to_string())
        .collect();
    let blank = labels.iter().filter(|label| label.is_empty()).count();
    if blank > 0 {
        tracing::warn!("{blank} label rows have an empty label cell; their outputs are ignored");
    }
    labels
}

/// First column that isn't numeric and has at least one letter.
fn guess_label_column(row: &csv::StringRecord) -> usize {
    row.iter()
        .position(|value| value.parse::<f64>().is_err() && value.chars().any(char::is_alphabetic))
        .unwrap_or(0)
}
