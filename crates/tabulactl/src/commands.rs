//! Command implementations

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tabula_common::agent::ColumnDescriptions;
use tabula_common::config::validate_model;
use tabula_common::llm_client::HttpLlmClient;
use tabula_common::source::is_valid_url;
use tabula_common::{
    connect, AnswerCache, DatasetSource, DescriptionsSource, LlmAgent, Orchestrator, TabulaConfig,
};
use tracing::info;

use crate::output::{render_answer, render_snapshot};

/// Arguments shared by every subcommand
#[derive(Debug, Clone)]
pub struct CommonArgs {
    pub source: String,
    pub sep: char,
    pub columns: Option<String>,
    pub cache_path: Option<PathBuf>,
    pub no_cache: bool,
    pub model: Option<String>,
    pub api_key: Option<String>,
}

/// User config with command-line overrides applied
pub fn effective_config(args: &CommonArgs, verbose: bool) -> Result<TabulaConfig> {
    effective_config_from(TabulaConfig::load()?, args, verbose)
}

pub fn effective_config_from(
    mut config: TabulaConfig,
    args: &CommonArgs,
    verbose: bool,
) -> Result<TabulaConfig> {
    if let Some(model) = &args.model {
        validate_model(model)?;
        config.llm.model = model.clone();
    }
    if let Some(path) = &args.cache_path {
        config.cache.path = path.clone();
    }
    if args.no_cache {
        config.cache.enabled = false;
    }
    config.verbose |= verbose;
    Ok(config)
}

/// `--columns` is either a URL or an inline JSON object.
pub fn descriptions_source(raw: &str) -> Result<DescriptionsSource> {
    if is_valid_url(raw) {
        return Ok(DescriptionsSource::Url(raw.to_string()));
    }
    let map: ColumnDescriptions = serde_json::from_str(raw)
        .context("--columns must be a URL or a JSON object of column descriptions")?;
    Ok(DescriptionsSource::Inline(map))
}

fn delimiter(sep: char) -> Result<u8> {
    u8::try_from(sep)
        .ok()
        .filter(|b| b.is_ascii())
        .with_context(|| format!("Unsupported separator {:?}", sep))
}

fn open(args: CommonArgs, config: &TabulaConfig) -> Result<Orchestrator<LlmAgent<HttpLlmClient>>> {
    let source = DatasetSource::from_arg(&args.source, delimiter(args.sep)?)
        .with_context(|| format!("Failed to open dataset {}", args.source))?;
    let descriptions = args.columns.as_deref().map(descriptions_source).transpose()?;
    let api_key = args.api_key.clone().or_else(|| config.api_key_from_env());

    connect(source, descriptions, config, api_key)
}

pub fn ask(args: CommonArgs, question: &str, verbose: bool) -> Result<()> {
    let config = effective_config(&args, verbose)?;
    let mut orchestrator = open(args, &config)?;
    let answer = orchestrator.chat(question)?;
    println!("{}", render_answer(&answer));
    Ok(())
}

pub fn code(args: CommonArgs, question: &str, verbose: bool) -> Result<()> {
    let config = effective_config(&args, verbose)?;
    let mut orchestrator = open(args, &config)?;
    println!("{}", orchestrator.code(question)?);
    Ok(())
}

/// Cache commands always look at the store, whatever `--no-cache` says.
fn cache_config(args: &CommonArgs, verbose: bool) -> Result<TabulaConfig> {
    Ok(force_cache(effective_config(args, verbose)?))
}

fn force_cache(mut config: TabulaConfig) -> TabulaConfig {
    config.cache.enabled = true;
    config
}

pub fn cache_show(args: CommonArgs, verbose: bool) -> Result<()> {
    let config = cache_config(&args, verbose)?;
    let orchestrator = open(args, &config)?;
    println!("{}", render_snapshot(&orchestrator.cache_snapshot())?);
    Ok(())
}

pub fn cache_clear(args: CommonArgs, verbose: bool) -> Result<()> {
    let config = cache_config(&args, verbose)?;
    let mut orchestrator = open(args, &config)?;
    orchestrator.clear_cache()?;
    info!("Cleared cache for fingerprint {}", orchestrator.fingerprint());
    println!("Cache cleared.");
    Ok(())
}

/// Only the base path matters here; no dataset is loaded.
pub fn cache_clear_all(cache_path: Option<PathBuf>) -> Result<()> {
    let base = match cache_path {
        Some(path) => path,
        None => TabulaConfig::load()?.cache.path,
    };
    let removed = clear_all_under(&base)?;
    println!("Removed {} cache file(s).", removed);
    Ok(())
}

fn clear_all_under(base: &Path) -> Result<usize> {
    AnswerCache::detached(base, "")
        .clear_all()
        .with_context(|| format!("Failed to clear caches under {}", base.display()))
}
