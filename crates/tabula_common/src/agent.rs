//! Agent boundary
//!
//! The agent turns a normalized question into a result and the code it wrote
//! to get there. [`LlmAgent`] drives any [`LlmClient`] with a JSON contract;
//! tests substitute their own [`DataAgent`].

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::answer::ResultValue;
use crate::dataset::Dataset;
use crate::fingerprint::{canonical_csv, SAMPLE_THRESHOLD};
use crate::llm_client::{LlmClient, LlmError};

/// Column name -> human description
pub type ColumnDescriptions = BTreeMap<String, String>;

/// Text returned in place of an answer when the model cannot be used
pub const MODEL_ACCESS_SOFT_FAILURE: &str = "Unfortunately, I was not able to answer your question, because of the following error:\n\nSorry, I cannot answer this question. Please check if you've enabled paid tier in OpenAI.\n";

const RESPONSE_SCHEMA: &str = r#"{"type": "string" | "number" | "dataframe" | "plot", "value": <answer; for dataframe an array of row objects; for plot an empty string>, "code": "<python pandas code operating on dfs[0] that computes the answer>"}"#;

/// Agent errors
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("Malformed agent response: {0}")]
    MalformedResponse(String),
}

/// The agent contract used by the orchestrator
pub trait DataAgent {
    /// Answer an already-normalized request.
    fn ask(&mut self, request: &str) -> Result<ResultValue, AgentError>;

    /// Cleaned code behind the most recent answer; empty if none.
    fn last_generated_code(&self) -> String;
}

/// Agent behaviour switches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Answer caching lives in the orchestrator, never in the agent.
    pub enable_cache: bool,
    pub open_charts: bool,
    pub save_charts: bool,
    pub verbose: bool,
    /// Previous exchanges replayed as conversation context
    pub memory_size: usize,
    /// Cap on dataset rows shown to the model. `None` sends the whole
    /// dataset, sampled like the fingerprint above its threshold.
    pub preview_rows: Option<usize>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            enable_cache: false,
            open_charts: false,
            save_charts: false,
            verbose: false,
            memory_size: 10,
            preview_rows: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AgentReply {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    code: String,
}

/// Agent backed by an LLM completion provider
pub struct LlmAgent<C: LlmClient> {
    client: C,
    dataset: Dataset,
    column_descriptions: Option<ColumnDescriptions>,
    config: AgentConfig,
    memory: VecDeque<(String, String)>,
    last_code: String,
}

impl<C: LlmClient> LlmAgent<C> {
    pub fn new(
        client: C,
        dataset: Dataset,
        column_descriptions: Option<ColumnDescriptions>,
        config: AgentConfig,
    ) -> Self {
        Self {
            client,
            dataset,
            column_descriptions,
            config,
            memory: VecDeque::new(),
            last_code: String::new(),
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    fn system_prompt(&self) -> String {
        let total = self.dataset.row_count();
        let (shown, data) = match self.config.preview_rows {
            Some(n) if n < total.min(SAMPLE_THRESHOLD) => (n, self.dataset.head(n).to_csv()),
            _ => (total.min(SAMPLE_THRESHOLD), canonical_csv(&self.dataset)),
        };
        let data = data.unwrap_or_else(|e| {
            warn!("Failed to serialize dataset for the prompt: {}", e);
            String::new()
        });

        let mut prompt = format!(
            "You are a data analyst working with a pandas DataFrame available as dfs[0].\n\
             It has {} rows and {} columns.\n",
            total,
            self.dataset.columns.len()
        );
        if shown < total {
            prompt.push_str(&format!(
                "Only {} of its rows are included below; do not guess at the rest.\n",
                shown
            ));
        }
        prompt.push_str(&format!("Data as CSV:\n{}\n", data));

        if let Some(descriptions) = &self.column_descriptions {
            prompt.push_str("Column descriptions:\n");
            for (column, description) in descriptions {
                prompt.push_str(&format!("- {}: {}\n", column, description));
            }
        }

        prompt.push_str(
            "Charts cannot be rendered here. For a chart request reply with type \"plot\", \
             an empty value and the plotting code.\n",
        );
        if self.config.save_charts {
            prompt.push_str("The plotting code should save the figure under exports/charts/.\n");
        }
        if !self.config.open_charts {
            prompt.push_str("Never call plt.show().\n");
        }

        prompt
    }

    fn user_prompt(&self, request: &str) -> String {
        if self.memory.is_empty() {
            return request.to_string();
        }
        let mut prompt = String::from("Conversation so far:\n");
        for (question, answer) in &self.memory {
            prompt.push_str(&format!("Q: {}\nA: {}\n", question, answer));
        }
        prompt.push_str(&format!("\nQ: {}", request));
        prompt
    }

    fn remember(&mut self, request: &str, result: &ResultValue) {
        if self.config.memory_size == 0 {
            return;
        }
        self.memory.push_back((request.to_string(), result.to_string()));
        while self.memory.len() > self.config.memory_size {
            self.memory.pop_front();
        }
    }
}

impl<C: LlmClient> DataAgent for LlmAgent<C> {
    fn ask(&mut self, request: &str) -> Result<ResultValue, AgentError> {
        self.last_code.clear();

        let system = self.system_prompt();
        let user = self.user_prompt(request);
        if self.config.verbose {
            debug!("Agent system prompt:\n{}", system);
            debug!("Agent user prompt:\n{}", user);
        }

        let reply = match self.client.call_json(&system, &user, RESPONSE_SCHEMA) {
            Ok(json) => json,
            Err(LlmError::ModelNotFound(model)) => {
                warn!("Model {} is not accessible with the configured key", model);
                return Ok(ResultValue::Text(MODEL_ACCESS_SOFT_FAILURE.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let reply: AgentReply = serde_json::from_value(reply)
            .map_err(|e| AgentError::MalformedResponse(e.to_string()))?;
        let result = parse_result(&reply.kind, reply.value)?;

        self.last_code = clean_code(&reply.code);
        self.remember(request, &result);
        Ok(result)
    }

    fn last_generated_code(&self) -> String {
        self.last_code.clone()
    }
}

fn parse_result(kind: &str, value: serde_json::Value) -> Result<ResultValue, AgentError> {
    use serde_json::Value;

    match (kind, value) {
        ("number", Value::Number(n)) => Ok(ResultValue::Scalar(n)),
        ("number", Value::String(s)) => Ok(s
            .trim()
            .parse::<serde_json::Number>()
            .map(ResultValue::Scalar)
            .unwrap_or(ResultValue::Text(s))),
        ("string", Value::String(s)) => Ok(ResultValue::Text(s)),
        ("string", other) => Ok(ResultValue::Text(other.to_string())),
        ("plot", Value::String(path)) => Ok(ResultValue::ImagePath(path)),
        ("plot", Value::Null) => Ok(ResultValue::ImagePath(String::new())),
        ("dataframe", records @ Value::Array(_)) => Dataset::from_records(&records)
            .map(ResultValue::Table)
            .map_err(|e| AgentError::MalformedResponse(e.to_string())),
        ("dataframe", Value::Object(split)) => table_from_split(&split),
        (kind, other) => Err(AgentError::MalformedResponse(format!(
            "unexpected {} value: {}",
            kind, other
        ))),
    }
}

/// `{"columns": [...], "data": [[...], ...]}`, the pandas "split" layout.
fn table_from_split(
    split: &serde_json::Map<String, serde_json::Value>,
) -> Result<ResultValue, AgentError> {
    let text = |v: &serde_json::Value| match v {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    };

    let columns: Vec<String> = split
        .get("columns")
        .and_then(|c| c.as_array())
        .ok_or_else(|| AgentError::MalformedResponse("dataframe without columns".to_string()))?
        .iter()
        .map(text)
        .collect();

    let rows = split
        .get("data")
        .and_then(|d| d.as_array())
        .map(|rows| {
            rows.iter()
                .filter_map(|r| r.as_array())
                .map(|r| r.iter().map(text).collect())
                .collect()
        })
        .unwrap_or_default();

    Ok(ResultValue::Table(Dataset::new(columns, rows)))
}

/// Tidy generated code for display: refer to the single frame as `df`, drop
/// inline fixtures and the trailing result declaration.
pub fn clean_code(code: &str) -> String {
    static LEADING_ALIAS: OnceLock<Regex> = OnceLock::new();
    static INLINE_FIXTURE: OnceLock<Regex> = OnceLock::new();

    let leading_alias =
        LEADING_ALIAS.get_or_init(|| Regex::new(r"^df\s*=\s*df").expect("static regex"));
    let inline_fixture = INLINE_FIXTURE.get_or_init(|| {
        Regex::new(r"(?s)dfs\s*=\s*\[pd.DataFrame.*?\}\)\]").expect("static regex")
    });

    let code = code.replace("dfs[0]", "df");
    let code = leading_alias.replace(&code, "").into_owned();
    let code = inline_fixture.replace_all(&code, "").into_owned();
    let code = code.replace("Assuming dfs", "Assuming df");
    let code = code
        .trim()
        .replace("# Write code here", "# We assume that df is already loaded");

    let mut lines: Vec<&str> = code.split('\n').collect();
    let mut drop = 0;
    if lines.last().map_or(false, |l| l.trim().starts_with("result =")) {
        drop = 1;
        if lines.len() >= 2 && lines[lines.len() - 2].trim().starts_with("# Declare result var") {
            drop = 2;
        }
    }
    lines.truncate(lines.len() - drop);

    lines.join("\n").trim_end().to_string()
}
