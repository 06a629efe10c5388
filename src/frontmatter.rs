//! Header-comment metadata.
//!
//! A page may open with an HTML comment holding `key: value` lines:
//!
//! ```text
//! <!--
//! title: Getting started
//! url: /docs/start
//! -->
//! ```
//!
//! The fields feed the variable mapping of the page's own render.

use crate::document::Document;
use crate::error::{Result, WeaveError};
use serde_json::{Map, Value};

/// Lines examined for header fields, opening marker included
pub const HEADER_SCAN_LINES: usize = 10;

const HEADER_OPEN: &str = "<!--";

/// Parses the header fields of `contents`.
///
/// Returns an empty map when the first line is not exactly `<!--`. Parsing
/// stops at the first line without a `:`.
pub fn parse_header(contents: &str) -> Map<String, Value> {
    let mut fields = Map::new();
    let mut lines = contents.lines().take(HEADER_SCAN_LINES);

    if lines.next() != Some(HEADER_OPEN) {
        return fields;
    }
    for line in lines {
        let Some((key, value)) = line.split_once(':') else {
            break;
        };
        fields.insert(key.trim().to_string(), Value::String(value.trim().to_string()));
    }
    fields
}

/// Parses a document's header and checks required fields.
///
/// The document path is added under `path` unless the header sets one.
///
/// # Errors
///
/// Returns `WeaveError::MissingField` for the first required field absent from the header.
pub fn parse_page(document: &Document, required: &[&str]) -> Result<Map<String, Value>> {
    let mut fields = parse_header(&document.contents);

    if let Some(field) = required.iter().find(|field| !fields.contains_key(**field)) {
        return Err(WeaveError::MissingField {
            field: (*field).to_string(),
            path: document.path.clone(),
        });
    }
    fields
        .entry("path")
        .or_insert_with(|| Value::String(document.path.display().to_string()));
    Ok(fields)
}
