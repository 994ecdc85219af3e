//! In-memory tabular dataset
//!
//! Cells are kept as display strings. Only the serialized content of a
//! dataset matters to the answer cache, so no column typing is attempted.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TabulaError};

/// Rows x named columns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Dataset {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { columns, rows }
    }

    /// Build from a JSON array of objects.
    ///
    /// Column order follows the first appearance of each key. Missing keys
    /// become empty cells, `null` becomes an empty cell, strings are taken
    /// verbatim and every other value uses its JSON text.
    pub fn from_records(records: &serde_json::Value) -> Result<Self> {
        let items = records
            .as_array()
            .ok_or_else(|| TabulaError::Parse("expected an array of records".to_string()))?;

        let mut columns: Vec<String> = Vec::new();
        for item in items {
            let object = item
                .as_object()
                .ok_or_else(|| TabulaError::Parse("record is not an object".to_string()))?;
            for key in object.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }

        let rows = items
            .iter()
            .filter_map(|item| item.as_object())
            .map(|object| {
                columns
                    .iter()
                    .map(|col| object.get(col).map(cell_text).unwrap_or_default())
                    .collect()
            })
            .collect();

        Ok(Self { columns, rows })
    }

    /// Parse delimited text; the first record is the header.
    pub fn from_delimited(content: &str, delimiter: u8) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(content.as_bytes());

        let columns: Vec<String> = reader
            .headers()
            .map_err(|e| TabulaError::Parse(e.to_string()))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| TabulaError::Parse(e.to_string()))?;
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            row.resize(columns.len(), String::new());
            rows.push(row);
        }

        Ok(Self { columns, rows })
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Comma-delimited text with a header line and no row index.
    pub fn to_csv(&self) -> Result<String> {
        self.rows_to_csv(self.rows.iter())
    }

    /// Same serialization as [`Dataset::to_csv`] restricted to the given rows,
    /// in the given order.
    pub fn rows_to_csv<'a, I>(&self, rows: I) -> Result<String>
    where
        I: IntoIterator<Item = &'a Vec<String>>,
    {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(Vec::new());

        writer
            .write_record(&self.columns)
            .map_err(|e| TabulaError::Parse(e.to_string()))?;
        for row in rows {
            writer
                .write_record(row)
                .map_err(|e| TabulaError::Parse(e.to_string()))?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| TabulaError::Parse(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| TabulaError::Parse(e.to_string()))
    }

    /// First `n` rows, used for agent prompts.
    pub fn head(&self, n: usize) -> Dataset {
        Dataset {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }
}

fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
