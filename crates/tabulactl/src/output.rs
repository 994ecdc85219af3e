//! Terminal rendering of answers and cache snapshots

use std::collections::BTreeMap;
use tabula_common::{AnswerEntry, ChatAnswer, ResultValue};

/// Text printed for a chat answer
pub fn render_answer(answer: &ChatAnswer) -> String {
    match answer {
        ChatAnswer::Chart(path) => format!("Chart: {}", path),
        ChatAnswer::PlotCode(code) => format!("No chart was rendered. Plot code:\n{}", code),
        ChatAnswer::Value(ResultValue::Table(ds)) => render_table(&ds.columns, &ds.rows),
        ChatAnswer::Value(value) => value.to_string(),
    }
}

/// Column-aligned table
pub fn render_table(columns: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
    }

    let line = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = vec![line(columns)];
    out.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    out.extend(rows.iter().map(|r| line(r.as_slice())));
    out.join("\n")
}

pub fn render_snapshot(snapshot: &BTreeMap<String, AnswerEntry>) -> serde_json::Result<String> {
    serde_json::to_string_pretty(snapshot)
}
