//! End-to-end flow: an agent writes memories through the tool contract in
//! one tick, then retrieves them semantically in a later tick.

use serde_json::json;
use tempfile::TempDir;
use vigil::boundary::BoundaryLog;
use vigil::embedding::SimEmbeddingProvider;
use vigil::index::{SearchFilter, SemanticMemory};
use vigil::llm::ScriptedChatProvider;
use vigil::runner::{AgentProfile, BurstConfig, BurstRunner};
use vigil::vault::{VaultConfig, VaultStore};

fn tool_step(name: &str, args: serde_json::Value) -> String {
    json!({
        "step_summary": format!("Calling {name}."),
        "action": "tool",
        "tool_name": name,
        "tool_args": args,
    })
    .to_string()
}

fn stop_step(reason: &str) -> String {
    json!({ "step_summary": "Done.", "action": "stop", "stop_reason": reason }).to_string()
}

#[tokio::test]
async fn memory_written_in_tick_one_is_searchable_in_tick_two() {
    let dir = TempDir::new().unwrap();
    let vault = VaultStore::open(dir.path().join("vault.jsonl"), VaultConfig::default()).unwrap();
    let mut memory = SemanticMemory::open(vault, SimEmbeddingProvider::new())
        .await
        .unwrap();

    let profile = AgentProfile::new("orion", "You are Orion.");
    let client = ScriptedChatProvider::with_replies([
        // Tick 0: store a fact via the tool contract.
        tool_step(
            "memory",
            json!({
                "action": "add",
                "text": "The deployment pipeline runs on self-hosted runners",
                "scope": "shared",
                "category": "project",
                "tags": ["infra"],
            }),
        ),
        stop_step("stored"),
        // Tick 1: search for it.
        tool_step(
            "memory",
            json!({ "action": "search", "query": "deployment pipeline runners" }),
        ),
        stop_step("found"),
    ]);

    let mut runner = BurstRunner::new(
        &profile,
        &client,
        BurstConfig::new().with_burst_ticks(2).with_max_steps_per_tick(3),
    )
    .with_memory(&mut memory)
    .with_boundary_log(BoundaryLog::new(dir.path().join("boundary_events.jsonl")));

    let report = runner.run().await;
    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.outcomes[0].tools_used, vec!["memory.add"]);
    assert_eq!(report.outcomes[1].tools_used, vec!["memory.search"]);
    assert_eq!(report.total_errors, 0);

    // The write is durable and semantically retrievable outside the burst.
    drop(runner);
    let hits = memory
        .search("self-hosted deployment runners", &SearchFilter::new())
        .await
        .unwrap();
    assert!(!hits.is_empty());
    assert!(hits[0].memory.text.contains("deployment pipeline"));
    assert_eq!(hits[0].memory.scope, "shared");

    // And the raw vault file holds exactly one line for it.
    let contents = std::fs::read_to_string(dir.path().join("vault.jsonl")).unwrap();
    assert_eq!(contents.lines().count(), 1);
}
