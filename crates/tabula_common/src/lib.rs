//! Tabula Common - answer cache and agent plumbing for questions about tabular data.
//!
//! The orchestrator serves answers from a per-dataset cache and only calls the
//! LLM-backed agent on a miss.

pub mod agent;
pub mod answer;
pub mod cache;
pub mod config;
pub mod dataset;
pub mod error;
pub mod fingerprint;
pub mod llm_client;
pub mod normalizer;
pub mod orchestrator;
pub mod source;

pub use agent::{AgentConfig, AgentError, ColumnDescriptions, DataAgent, LlmAgent};
pub use answer::{AnswerEntry, ResultValue};
pub use cache::{AnswerCache, EntryStatus};
pub use config::TabulaConfig;
pub use dataset::Dataset;
pub use error::{Result, TabulaError};
pub use orchestrator::{connect, ChatAnswer, Orchestrator, OrchestratorOptions};
pub use source::{DatasetSource, DescriptionsSource};
