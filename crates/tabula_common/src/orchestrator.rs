//! Answer retrieval orchestrator
//!
//! Decides per question whether the cached answer can be served or the agent
//! has to be asked, and keeps the cache up to date.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::agent::{AgentConfig, DataAgent, LlmAgent};
use crate::answer::{AnswerEntry, ResultValue};
use crate::cache::{AnswerCache, EntryStatus};
use crate::config::{validate_model, TabulaConfig};
use crate::dataset::Dataset;
use crate::error::{Result, TabulaError};
use crate::fingerprint::fingerprint;
use crate::llm_client::HttpLlmClient;
use crate::normalizer::normalize;
use crate::source::{DatasetSource, DescriptionsSource};

/// Construction options
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub model: String,
    pub cache_enabled: bool,
    pub cache_base_path: PathBuf,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            cache_enabled: true,
            cache_base_path: PathBuf::from(".tabula_cache"),
        }
    }
}

impl From<&TabulaConfig> for OrchestratorOptions {
    fn from(config: &TabulaConfig) -> Self {
        Self {
            model: config.llm.model.clone(),
            cache_enabled: config.cache.enabled,
            cache_base_path: config.cache.path.clone(),
        }
    }
}

/// What `chat` hands back to the user
#[derive(Debug, Clone, PartialEq)]
pub enum ChatAnswer {
    Value(ResultValue),
    /// Path of a chart written by the agent
    Chart(String),
    /// Plotting code for a chart that was never written to disk
    PlotCode(String),
}

pub struct Orchestrator<A: DataAgent> {
    agent: A,
    cache: AnswerCache,
    cache_enabled: bool,
    fingerprint: String,
}

impl<A: DataAgent> Orchestrator<A> {
    pub fn new(dataset: &Dataset, agent: A, options: OrchestratorOptions) -> Result<Self> {
        validate_model(&options.model)?;

        let fingerprint = fingerprint(dataset)?;
        let cache = if options.cache_enabled {
            AnswerCache::open(&options.cache_base_path, &fingerprint)
        } else {
            AnswerCache::detached(&options.cache_base_path, &fingerprint)
        };

        info!(
            "Dataset fingerprint {:?}, cache {}",
            fingerprint,
            if options.cache_enabled { "enabled" } else { "disabled" }
        );

        Ok(Self {
            agent,
            cache,
            cache_enabled: options.cache_enabled,
            fingerprint,
        })
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache_enabled
    }

    pub fn agent(&self) -> &A {
        &self.agent
    }

    /// Serve `question` from the cache when the stored answer is usable,
    /// otherwise ask the agent and store the fresh answer.
    ///
    /// Agent failures propagate unchanged. Error-shaped answers are returned
    /// but never cached.
    pub fn resolve(&mut self, question: &str, allow_image_cache: bool) -> Result<AnswerEntry> {
        if self.cache_enabled {
            let status = self.cache.status(question, allow_image_cache);
            debug!("Cache lookup for {:?}: {}", question, status.as_str());
            if status == EntryStatus::Fresh {
                if let Some(entry) = self.cache.get(question) {
                    return Ok(entry.clone());
                }
            }
        }

        let request = normalize(question);
        debug!("Asking agent: {:?}", request);
        let result = self.agent.ask(&request).map_err(TabulaError::Agent)?;
        let entry = AnswerEntry::new(result, self.agent.last_generated_code());

        if self.cache_enabled {
            match self.cache.put(question, entry.clone()) {
                Ok(true) => debug!("Cached answer for {:?}", question),
                Ok(false) => info!("Answer for {:?} looks like an error, not cached", question),
                Err(e) => warn!(
                    "Failed to persist answer cache {}: {}",
                    self.cache.path().display(),
                    e
                ),
            }
        }

        Ok(entry)
    }

    /// Result for a question. Chart answers are never served from cache here
    /// since the chart file may be gone. A chart whose file does not exist
    /// comes back as its plotting code.
    pub fn chat(&mut self, question: &str) -> Result<ChatAnswer> {
        let entry = self.resolve(question, false)?;
        if !entry.result.references_chart() {
            return Ok(ChatAnswer::Value(entry.result));
        }
        match entry.result.chart_path() {
            Some(path) if Path::new(&path).is_file() => Ok(ChatAnswer::Chart(path)),
            _ => {
                debug!("No chart file for {:?}, returning plot code", question);
                Ok(ChatAnswer::PlotCode(entry.code))
            }
        }
    }

    /// Code behind the answer to a question; cached chart answers are reused.
    pub fn code(&mut self, question: &str) -> Result<String> {
        Ok(self.resolve(question, true)?.code)
    }

    /// Forget this dataset's answers and delete its cache file.
    pub fn clear_cache(&mut self) -> Result<()> {
        self.cache.clear()?;
        Ok(())
    }

    /// Delete every cache file under the configured base path.
    pub fn clear_all_caches(&mut self) -> Result<usize> {
        Ok(self.cache.clear_all()?)
    }

    pub fn cache_snapshot(&self) -> BTreeMap<String, AnswerEntry> {
        self.cache.snapshot()
    }
}

/// Orchestrator over an OpenAI-compatible backend, built from user config.
///
/// `api_key` must already be resolved; a missing key only fails once the
/// agent is actually needed.
pub fn connect(
    source: DatasetSource,
    descriptions: Option<DescriptionsSource>,
    config: &TabulaConfig,
    api_key: Option<String>,
) -> anyhow::Result<Orchestrator<LlmAgent<HttpLlmClient>>> {
    let options = OrchestratorOptions::from(config);
    validate_model(&options.model)?;

    let dataset = source.load()?;
    let descriptions = descriptions.map(DescriptionsSource::load).transpose()?;

    let client = HttpLlmClient::new(config.llm.to_llm_config(api_key))?;
    let agent = LlmAgent::new(
        client,
        dataset.clone(),
        descriptions,
        AgentConfig {
            verbose: config.verbose,
            ..AgentConfig::default()
        },
    );

    Ok(Orchestrator::new(&dataset, agent, options)?)
}
