//! CSV rendering of a collection, written next to the JSON file so the data
//! opens directly in a spreadsheet.
//!
//! The header is the key set of the **first** row. Later rows missing one of
//! those keys get an empty cell; keys that only later rows carry are not
//! exported. That is an accepted limitation of the mirror, the JSON file
//! stays the source of truth.

use crate::error::{RapportError, Result};
use crate::model::Row;
use serde_json::Value;

pub fn render_csv(rows: &[Row]) -> Result<Vec<u8>> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    let header: Vec<&str> = first.keys().map(String::as_str).collect();

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&header)?;
    for row in rows {
        writer.write_record(header.iter().map(|key| cell(row.get(*key))))?;
    }
    writer
        .into_inner()
        .map_err(|e| RapportError::Csv(e.into_error().into()))
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(nested) => nested.to_string(),
    }
}
