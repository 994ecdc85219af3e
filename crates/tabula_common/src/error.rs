//! Error types for Tabula.

use thiserror::Error;

use crate::agent::AgentError;

#[derive(Error, Debug)]
pub enum TabulaError {
    #[error("Invalid model: {model}. Allowed models: {}", format_allowed(.allowed))]
    InvalidModel {
        model: String,
        allowed: Vec<String>,
    },

    #[error("Please provide a valid URL to fetch the data.")]
    InvalidDatasetSource(String),

    #[error("Please provide a valid URL to fetch the column descriptions.")]
    InvalidColumnDescriptions(String),

    #[error("Dataset fetch error: {0}")]
    Fetch(String),

    #[error("Dataset parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Renders the allow-list the way users see it in the error text: `['a', 'b']`.
fn format_allowed(allowed: &[String]) -> String {
    let quoted: Vec<String> = allowed.iter().map(|m| format!("'{}'", m)).collect();
    format!("[{}]", quoted.join(", "))
}

pub type Result<T> = std::result::Result<T, TabulaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_model_message() {
        let err = TabulaError::InvalidModel {
            model: "gpt-100".to_string(),
            allowed: vec![
                "gpt-4o".to_string(),
                "gpt-4-turbo".to_string(),
                "gpt-3.5-turbo".to_string(),
            ],
        };
        assert_eq!(
            err.to_string(),
            "Invalid model: gpt-100. Allowed models: ['gpt-4o', 'gpt-4-turbo', 'gpt-3.5-turbo']"
        );
    }
}
