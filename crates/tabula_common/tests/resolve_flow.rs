//! End-to-end answer resolution against a fake LLM backend

use serde_json::json;
use std::sync::Arc;
use tabula_common::agent::MODEL_ACCESS_SOFT_FAILURE;
use tabula_common::llm_client::{FakeLlmClient, LlmClient, LlmError};
use tabula_common::{
    AgentConfig, ChatAnswer, Dataset, LlmAgent, Orchestrator, OrchestratorOptions, ResultValue,
};
use tempfile::tempdir;

/// Shares one fake between the agent and the test body
struct SharedClient(Arc<FakeLlmClient>);

impl LlmClient for SharedClient {
    fn call_json(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        schema_description: &str,
    ) -> Result<serde_json::Value, LlmError> {
        self.0.call_json(system_prompt, user_prompt, schema_description)
    }
}

fn names() -> Dataset {
    Dataset::from_records(&json!([
        {"name": "Alice"},
        {"name": "Bob"},
        {"name": "Charlie"},
    ]))
    .unwrap()
}

fn orchestrator(
    dataset: &Dataset,
    fake: &Arc<FakeLlmClient>,
    cache_base: &std::path::Path,
    cache_enabled: bool,
) -> Orchestrator<LlmAgent<SharedClient>> {
    let agent = LlmAgent::new(
        SharedClient(Arc::clone(fake)),
        dataset.clone(),
        None,
        AgentConfig::default(),
    );
    Orchestrator::new(
        dataset,
        agent,
        OrchestratorOptions {
            cache_enabled,
            cache_base_path: cache_base.to_path_buf(),
            ..OrchestratorOptions::default()
        },
    )
    .unwrap()
}

fn alice_reply() -> serde_json::Value {
    json!({
        "type": "string",
        "value": "Alice",
        "code": "result = {'type': 'string', 'value': dfs[0]['name'].iloc[0]}",
    })
}

#[test]
fn first_person_is_fetched_once_then_cached() {
    let dir = tempdir().unwrap();
    let base = dir.path().join(".tabula_cache");
    let fake = Arc::new(FakeLlmClient::always_valid(alice_reply()));
    let mut orch = orchestrator(&names(), &fake, &base, true);

    let first = orch.resolve("first person's name?", false).unwrap();
    assert_eq!(first.result, ResultValue::Text("Alice".to_string()));
    assert_eq!(fake.call_count(), 1);
    assert!(dir
        .path()
        .join(format!(".tabula_cache_{}", orch.fingerprint()))
        .exists());

    let second = orch.resolve("first person's name?", false).unwrap();
    assert_eq!(second, first);
    assert_eq!(fake.call_count(), 1);
}

#[test]
fn identical_datasets_share_cache_across_instances() {
    let dir = tempdir().unwrap();
    let base = dir.path().join(".tabula_cache");
    let fake = Arc::new(FakeLlmClient::always_valid(alice_reply()));

    orchestrator(&names(), &fake, &base, true)
        .resolve("first person's name?", false)
        .unwrap();

    let mut again = orchestrator(&names(), &fake, &base, true);
    assert_eq!(
        again.chat("first person's name?").unwrap(),
        ChatAnswer::Value(ResultValue::Text("Alice".to_string()))
    );
    assert_eq!(fake.call_count(), 1);
}

#[test]
fn different_datasets_never_share_entries() {
    let dir = tempdir().unwrap();
    let base = dir.path().join(".tabula_cache");
    let fake = Arc::new(FakeLlmClient::always_valid(alice_reply()));

    let mut a = orchestrator(&names(), &fake, &base, true);
    a.resolve("first person's name?", false).unwrap();

    let mut other = names();
    other.rows.push(vec!["Dana".to_string()]);
    let mut b = orchestrator(&other, &fake, &base, true);
    assert_ne!(a.fingerprint(), b.fingerprint());
    assert!(b.cache_snapshot().is_empty());

    b.resolve("first person's name?", false).unwrap();
    assert_eq!(fake.call_count(), 2);
}

#[test]
fn soft_failures_are_returned_but_never_persisted() {
    let dir = tempdir().unwrap();
    let base = dir.path().join(".tabula_cache");
    let fake = Arc::new(FakeLlmClient::always_error(LlmError::ModelNotFound(
        "gpt-4o".to_string(),
    )));
    let mut orch = orchestrator(&names(), &fake, &base, true);

    let answer = orch
        .chat("Whatever! Probably I don't have permissions?")
        .unwrap();
    assert_eq!(
        answer,
        ChatAnswer::Value(ResultValue::Text(MODEL_ACCESS_SOFT_FAILURE.to_string()))
    );
    assert!(orch.cache_snapshot().is_empty());
    assert!(!dir
        .path()
        .join(format!(".tabula_cache_{}", orch.fingerprint()))
        .exists());
}

#[test]
fn disabled_cache_asks_every_time() {
    let dir = tempdir().unwrap();
    let base = dir.path().join(".tabula_cache");
    let fake = Arc::new(FakeLlmClient::always_valid(alice_reply()));
    let mut orch = orchestrator(&names(), &fake, &base, false);

    for _ in 0..4 {
        orch.resolve("first person's name?", false).unwrap();
    }
    assert_eq!(fake.call_count(), 4);
}

#[test]
fn corrupt_cache_file_is_ignored() {
    let dir = tempdir().unwrap();
    let base = dir.path().join(".tabula_cache");
    let fake = Arc::new(FakeLlmClient::always_valid(alice_reply()));

    let fingerprint = orchestrator(&names(), &fake, &base, true)
        .fingerprint()
        .to_string();
    std::fs::write(
        dir.path().join(format!(".tabula_cache_{}", fingerprint)),
        b"\x00\x01 definitely not json",
    )
    .unwrap();

    let mut orch = orchestrator(&names(), &fake, &base, true);
    assert!(orch.cache_snapshot().is_empty());
    orch.resolve("first person's name?", false).unwrap();
    assert_eq!(fake.call_count(), 1);
    assert_eq!(orch.cache_snapshot().len(), 1);
}

#[test]
fn code_request_returns_cleaned_code() {
    let dir = tempdir().unwrap();
    let base = dir.path().join(".tabula_cache");
    let fake = Arc::new(FakeLlmClient::always_valid(json!({
        "type": "number",
        "value": 3,
        "code": "# Write code here\nn = len(dfs[0])\n# Declare result var\nresult = {'type': 'number', 'value': n}",
    })));
    let mut orch = orchestrator(&names(), &fake, &base, true);

    assert_eq!(
        orch.code("how many people?").unwrap(),
        "# We assume that df is already loaded\nn = len(df)"
    );
    assert_eq!(
        orch.cache_snapshot()["how many people?"].result,
        ResultValue::Scalar(3.into())
    );
}

#[test]
fn clear_all_evicts_every_namespace() {
    let dir = tempdir().unwrap();
    let base = dir.path().join(".tabula_cache");
    let fake = Arc::new(FakeLlmClient::always_valid(alice_reply()));

    let mut a = orchestrator(&names(), &fake, &base, true);
    a.resolve("q", false).unwrap();
    let mut other = names();
    other.rows.reverse();
    let mut b = orchestrator(&other, &fake, &base, true);
    b.resolve("q", false).unwrap();

    assert_eq!(a.clear_all_caches().unwrap(), 2);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
