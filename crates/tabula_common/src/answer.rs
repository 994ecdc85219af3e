//! Answer types returned by the agent and stored in the cache

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::dataset::Dataset;

/// Substring identifying a chart written by the agent
pub const CHART_MARKER: &str = "exports/charts";

/// Lowercase phrases that mark a textual answer as an upstream failure
pub const ERROR_MARKERS: &[&str] = &["error code:", "unfortunately"];

/// Result produced by the agent for one question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ResultValue {
    Scalar(serde_json::Number),
    Text(String),
    Table(Dataset),
    /// Text pointing at a generated chart file
    ImagePath(String),
}

impl ResultValue {
    /// Text carried by textual variants
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResultValue::Text(s) | ResultValue::ImagePath(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn references_chart(&self) -> bool {
        match self {
            ResultValue::ImagePath(_) => true,
            ResultValue::Text(s) => s.contains(CHART_MARKER),
            _ => false,
        }
    }

    /// Case-insensitive match against [`ERROR_MARKERS`]
    pub fn is_error_shaped(&self) -> bool {
        self.as_text()
            .map(|text| {
                let lower = text.to_lowercase();
                ERROR_MARKERS.iter().any(|marker| lower.contains(marker))
            })
            .unwrap_or(false)
    }

    /// First absolute path found on any line of a chart-referencing result.
    pub fn chart_path(&self) -> Option<String> {
        if !self.references_chart() {
            return None;
        }
        static ABSOLUTE_PATH: OnceLock<Regex> = OnceLock::new();
        let pattern =
            ABSOLUTE_PATH.get_or_init(|| Regex::new(r"/[^\s]+").expect("static regex"));

        let text = self.as_text()?;
        text.lines()
            .map(str::trim)
            .find_map(|line| pattern.find(line).map(|m| m.as_str().to_string()))
    }
}

impl std::fmt::Display for ResultValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultValue::Scalar(n) => write!(f, "{}", n),
            ResultValue::Text(s) | ResultValue::ImagePath(s) => write!(f, "{}", s),
            ResultValue::Table(ds) => {
                writeln!(f, "{}", ds.columns.join(" | "))?;
                for row in &ds.rows {
                    writeln!(f, "{}", row.join(" | "))?;
                }
                Ok(())
            }
        }
    }
}

/// Cached pair of result and the code that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerEntry {
    pub result: ResultValue,
    pub code: String,
}

impl AnswerEntry {
    pub fn new(result: ResultValue, code: impl Into<String>) -> Self {
        Self {
            result,
            code: code.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_markers_are_case_insensitive() {
        let soft = ResultValue::Text(
            "Unfortunately, I was not able to answer your question".to_string(),
        );
        assert!(soft.is_error_shaped());
        assert!(ResultValue::Text("Error code: 429".to_string()).is_error_shaped());
        assert!(!ResultValue::Text("Alice".to_string()).is_error_shaped());
        assert!(!ResultValue::Scalar(3.into()).is_error_shaped());
    }

    #[test]
    fn test_chart_reference() {
        let text = ResultValue::Text("/tmp/work/exports/charts/temp_chart.png".to_string());
        assert!(text.references_chart());
        assert!(ResultValue::ImagePath("chart".to_string()).references_chart());
        assert!(!ResultValue::Text("Bob".to_string()).references_chart());
    }

    #[test]
    fn test_chart_path_extraction() {
        let value = ResultValue::ImagePath(
            "Chart saved.\n  see /srv/exports/charts/temp_chart.png here".to_string(),
        );
        assert_eq!(
            value.chart_path().as_deref(),
            Some("/srv/exports/charts/temp_chart.png")
        );
        assert_eq!(ResultValue::Text("Alice".to_string()).chart_path(), None);
        assert_eq!(ResultValue::ImagePath(String::new()).chart_path(), None);

        let second = ResultValue::Text("see /a/exports/charts/b.png".to_string());
        assert_eq!(second.chart_path().as_deref(), Some("/a/exports/charts/b.png"));
    }

    #[test]
    fn test_serialized_shape() {
        let entry = AnswerEntry::new(ResultValue::Text("Alice".to_string()), "df['name'][0]");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["result"]["type"], "text");
        assert_eq!(json["result"]["value"], "Alice");
        assert_eq!(json["code"], "df['name'][0]");
    }
}
