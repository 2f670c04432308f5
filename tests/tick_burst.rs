//! Tick/burst runner tests against scripted model responses: termination,
//! tool caps, denial feedback, memory flushes, and burst continuation.

use serde_json::json;
use tempfile::TempDir;
use vigil::boundary::BoundaryLog;
use vigil::embedding::SimEmbeddingProvider;
use vigil::index::SemanticMemory;
use vigil::llm::{ProviderError, ScriptedChatProvider};
use vigil::metering::PriceTable;
use vigil::runner::{AgentProfile, BurstConfig, BurstRunner};
use vigil::tools::TaskQueueTool;
use vigil::vault::{RecallFilter, VaultConfig, VaultStore};

fn step(value: serde_json::Value) -> String {
    value.to_string()
}

fn think(summary: &str) -> String {
    step(json!({ "step_summary": summary, "action": "think" }))
}

fn stop(reason: &str) -> String {
    step(json!({ "step_summary": "Wrapping up.", "action": "stop", "stop_reason": reason }))
}

fn tool(name: &str, args: serde_json::Value) -> String {
    step(json!({
        "step_summary": format!("Calling {name}."),
        "action": "tool",
        "tool_name": name,
        "tool_args": args,
    }))
}

async fn make_memory(dir: &TempDir) -> SemanticMemory<SimEmbeddingProvider> {
    let vault = VaultStore::open(dir.path().join("vault.jsonl"), VaultConfig::default()).unwrap();
    SemanticMemory::open(vault, SimEmbeddingProvider::new())
        .await
        .unwrap()
}

fn boundary_log(dir: &TempDir) -> BoundaryLog {
    BoundaryLog::new(dir.path().join("boundary_events.jsonl"))
}

#[tokio::test]
async fn think_then_stop_consumes_two_steps() {
    let dir = TempDir::new().unwrap();
    let profile = AgentProfile::new("orion", "You are Orion.");
    let client = ScriptedChatProvider::with_replies([think("Considering."), stop("done")]);

    let mut runner: BurstRunner<'_, _, SimEmbeddingProvider> = BurstRunner::new(
        &profile,
        &client,
        BurstConfig::new().with_burst_ticks(1).with_max_steps_per_tick(3),
    )
    .with_boundary_log(boundary_log(&dir));

    let outcome = runner.run_tick(0).await;
    assert_eq!(outcome.steps_taken, 2);
    assert_eq!(outcome.stop_reason.as_deref(), Some("done"));
    assert!(outcome.tools_used.is_empty());
    assert!(outcome.errors.is_empty());
}

#[tokio::test]
async fn tick_never_exceeds_step_budget() {
    let dir = TempDir::new().unwrap();
    let profile = AgentProfile::new("orion", "You are Orion.");
    // More thinking queued than the budget allows.
    let client = ScriptedChatProvider::with_replies([
        think("one"),
        think("two"),
        think("three"),
        think("four"),
        think("five"),
    ]);

    let mut runner: BurstRunner<'_, _, SimEmbeddingProvider> = BurstRunner::new(
        &profile,
        &client,
        BurstConfig::new().with_burst_ticks(1).with_max_steps_per_tick(3),
    )
    .with_boundary_log(boundary_log(&dir));

    let outcome = runner.run_tick(0).await;
    assert_eq!(outcome.steps_taken, 3);
    assert_eq!(client.call_count(), 3);
    assert!(outcome.stop_reason.is_none());
}

#[tokio::test]
async fn tool_cap_blocks_third_call_in_order() {
    let dir = TempDir::new().unwrap();
    let mut memory = make_memory(&dir).await;
    let profile = AgentProfile::new("orion", "You are Orion.");
    let client = ScriptedChatProvider::with_replies([
        tool("memory", json!({ "action": "stats" })),
        tool("memory", json!({ "action": "stats" })),
        tool("memory", json!({ "action": "stats" })),
        stop("done"),
    ]);

    let mut runner = BurstRunner::new(
        &profile,
        &client,
        BurstConfig::new()
            .with_burst_ticks(1)
            .with_max_steps_per_tick(4)
            .with_max_tool_calls_per_tick(2),
    )
    .with_memory(&mut memory)
    .with_boundary_log(boundary_log(&dir));

    let outcome = runner.run_tick(0).await;
    // Exactly two successful uses, then the block, in that order.
    assert_eq!(outcome.tools_used.len(), 2);
    assert_eq!(outcome.tools_used[0], "memory.stats");
    assert_eq!(outcome.errors.len(), 1);
    assert!(outcome.errors[0].contains("tool call blocked"));
    assert!(outcome.errors[0].starts_with("step_2"));
}

#[tokio::test]
async fn out_of_policy_tool_is_denied_and_audited() {
    let dir = TempDir::new().unwrap();
    let profile = AgentProfile::new("orion", "You are Orion.");
    let client = ScriptedChatProvider::with_replies([
        tool("web", json!({ "action": "search", "query": "latest news" })),
        stop("done"),
    ]);
    let log = boundary_log(&dir);

    let mut runner: BurstRunner<'_, _, SimEmbeddingProvider> = BurstRunner::new(
        &profile,
        &client,
        BurstConfig::new().with_burst_ticks(1).with_max_steps_per_tick(3),
    )
    .with_boundary_log(log.clone());

    let outcome = runner.run_tick(0).await;
    assert!(outcome.tools_used.is_empty());
    assert!(outcome.errors[0].contains("'web.search' not in allowed_tools"));
    // The tick still ran to the scripted stop instead of crashing.
    assert_eq!(outcome.stop_reason.as_deref(), Some("done"));

    let events = log.read_all().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].requested_capability, "web.search");
    assert_eq!(events[0].profile, "orion");
    assert_eq!(events[0].tick_index, Some(0));
    assert_eq!(events[0].denial_payload.error, "TOOL_NOT_ALLOWED");
}

#[tokio::test]
async fn task_queue_carries_its_own_per_tick_cap() {
    let dir = TempDir::new().unwrap();
    let profile = AgentProfile::new("orion", "You are Orion.");
    let client = ScriptedChatProvider::with_replies([
        tool("task_queue", json!({ "action": "add", "to": "elysia", "subject": "sync" })),
        tool("task_queue", json!({ "action": "next" })),
        stop("done"),
    ]);

    let config = BurstConfig::new()
        .with_burst_ticks(1)
        .with_max_steps_per_tick(4)
        .with_max_tool_calls_per_tick(3)
        .with_allowed_tools(["task_queue.add", "task_queue.next", "task_queue.ack"]);

    let mut runner: BurstRunner<'_, _, SimEmbeddingProvider> =
        BurstRunner::new(&profile, &client, config)
            .with_task_queue(TaskQueueTool::new(dir.path().join("tasks.jsonl")))
            .with_boundary_log(boundary_log(&dir));

    let outcome = runner.run_tick(0).await;
    // General cap is 3, but the queue-specific cap of 1 kicks in first.
    assert_eq!(outcome.tools_used, vec!["task_queue.add"]);
    assert_eq!(outcome.errors.len(), 1);
    assert!(outcome.errors[0].contains("task_queue"));
    assert!(outcome.errors[0].contains("per tick"));
}

#[tokio::test]
async fn proposed_memories_flush_with_partial_failures() {
    let dir = TempDir::new().unwrap();
    let mut memory = make_memory(&dir).await;
    let profile = AgentProfile::new("orion", "You are Orion.");
    let client = ScriptedChatProvider::with_replies([
        step(json!({
            "step_summary": "Noting facts.",
            "action": "think",
            "proposed_memories": [
                { "text": "Creator runs the vault maintenance weekly", "scope": "shared", "category": "meta" },
                { "text": "password: hunter2", "scope": "shared", "category": "meta" },
                { "text": "Orion favors incremental refactors", "scope": "orion", "category": "self_state" },
            ],
        })),
        stop("done"),
    ]);

    let mut runner = BurstRunner::new(
        &profile,
        &client,
        BurstConfig::new().with_burst_ticks(1).with_max_steps_per_tick(3),
    )
    .with_memory(&mut memory)
    .with_boundary_log(boundary_log(&dir));

    let outcome = runner.run_tick(0).await;
    assert_eq!(outcome.memories_proposed, 3);
    assert_eq!(outcome.memories_written, 2);
    assert_eq!(outcome.errors.len(), 1);
    assert!(outcome.errors[0].starts_with("memory_write_error"));
    assert!(outcome.errors[0].contains("PII"));

    // The two clean memories are durable; the PII one never landed.
    drop(runner);
    let texts: Vec<String> = memory
        .recall(&RecallFilter::new())
        .unwrap()
        .into_iter()
        .map(|m| m.text)
        .collect();
    assert_eq!(texts.len(), 2);
    assert!(!texts.iter().any(|t| t.contains("hunter2")));
}

#[tokio::test]
async fn model_failure_ends_tick_not_burst() {
    let dir = TempDir::new().unwrap();
    let profile = AgentProfile::new("orion", "You are Orion.");
    let client = ScriptedChatProvider::new();
    client.push_error(ProviderError::Timeout);
    client.push_reply(stop("recovered"));

    let mut runner: BurstRunner<'_, _, SimEmbeddingProvider> = BurstRunner::new(
        &profile,
        &client,
        BurstConfig::new().with_burst_ticks(2).with_max_steps_per_tick(3),
    )
    .with_boundary_log(boundary_log(&dir));

    let report = runner.run().await;
    assert_eq!(report.outcomes.len(), 2);

    // Tick 0 captured the failure and stopped early.
    assert_eq!(report.outcomes[0].steps_taken, 0);
    assert!(report.outcomes[0].errors[0].contains("model_error"));

    // Tick 1 still ran.
    assert_eq!(report.outcomes[1].stop_reason.as_deref(), Some("recovered"));
    assert_eq!(report.total_errors, 1);
}

#[tokio::test]
async fn malformed_output_falls_back_to_think() {
    let dir = TempDir::new().unwrap();
    let profile = AgentProfile::new("orion", "You are Orion.");
    let client = ScriptedChatProvider::with_replies([
        "I will just write prose instead of JSON, sorry.".to_string(),
        stop("done"),
    ]);

    let mut runner: BurstRunner<'_, _, SimEmbeddingProvider> = BurstRunner::new(
        &profile,
        &client,
        BurstConfig::new().with_burst_ticks(1).with_max_steps_per_tick(3),
    )
    .with_boundary_log(boundary_log(&dir));

    let outcome = runner.run_tick(0).await;
    // The prose step became a think step; no error, no crash.
    assert_eq!(outcome.steps_taken, 2);
    assert!(outcome.errors.is_empty());
    assert_eq!(outcome.stop_reason.as_deref(), Some("done"));
}

#[tokio::test]
async fn burst_aggregates_metering_with_estimation_flag() {
    let dir = TempDir::new().unwrap();
    let profile = AgentProfile::new("orion", "You are Orion.");
    let client = ScriptedChatProvider::new();
    client.push_reply_with_usage(stop("t0"), 120, 30);
    // Second tick's reply has no usage; metering must estimate.
    client.push_reply(stop("t1"));

    let prices = PriceTable::new().with_model("scripted-sim", 1.0, 2.0);
    let mut runner: BurstRunner<'_, _, SimEmbeddingProvider> = BurstRunner::new(
        &profile,
        &client,
        BurstConfig::new().with_burst_ticks(2).with_max_steps_per_tick(2),
    )
    .with_boundary_log(boundary_log(&dir))
    .with_prices(prices);

    let report = runner.run().await;
    assert_eq!(report.outcomes.len(), 2);

    let tick0 = report.outcomes[0].metering.as_ref().unwrap();
    assert_eq!(tick0.usage.total_tokens, 150);
    assert!(!tick0.usage.is_estimated);
    assert!(tick0.cost.total_cost > 0.0);

    let tick1 = report.outcomes[1].metering.as_ref().unwrap();
    assert!(tick1.usage.is_estimated);
    assert!(tick1.usage.total_tokens > 0);

    // Totals carry the estimation taint and sum both ticks.
    assert!(report.metering.usage.is_estimated);
    assert_eq!(
        report.metering.usage.total_tokens,
        tick0.usage.total_tokens + tick1.usage.total_tokens
    );
}

#[tokio::test]
async fn exhausted_script_terminates_every_tick() {
    let dir = TempDir::new().unwrap();
    let profile = AgentProfile::new("orion", "You are Orion.");
    let client = ScriptedChatProvider::new();

    let mut runner: BurstRunner<'_, _, SimEmbeddingProvider> = BurstRunner::new(
        &profile,
        &client,
        BurstConfig::new().with_burst_ticks(3).with_max_steps_per_tick(3),
    )
    .with_boundary_log(boundary_log(&dir));

    let report = runner.run().await;
    assert_eq!(report.outcomes.len(), 3);
    for outcome in &report.outcomes {
        assert_eq!(outcome.stop_reason.as_deref(), Some("script_exhausted"));
        assert_eq!(outcome.steps_taken, 1);
    }
}
