//! Data types for the tick/burst runner.
//!
//! All structured objects exchanged between the burst loop, the tick
//! executor, and the model are defined here. Kept deliberately free of
//! business logic.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{
    BURST_TICKS_COUNT_DEFAULT, MODEL_CALL_TIMEOUT_SECS_DEFAULT, STEP_SUMMARY_FALLBACK_CHARS_MAX,
    TICK_STEPS_COUNT_DEFAULT, TICK_TOOL_CALLS_COUNT_DEFAULT,
};
use crate::metering::Metering;
use crate::vault::MemorySource;

// =============================================================================
// Agent Profile
// =============================================================================

/// Static identity of an agent: prompt, visible memory scopes.
#[derive(Debug, Clone)]
pub struct AgentProfile {
    /// Profile name; doubles as the agent-private memory scope
    pub name: String,
    /// Base system prompt
    pub system_prompt: String,
    /// Memory scopes injected into context (usually `shared` + own name)
    pub memory_scopes: Vec<String>,
}

impl AgentProfile {
    /// Create a profile; memory scopes default to `shared` + the name.
    #[must_use]
    pub fn new(name: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        let name = name.into().to_lowercase();
        let memory_scopes = vec!["shared".to_string(), name.clone()];
        Self {
            name,
            system_prompt: system_prompt.into(),
            memory_scopes,
        }
    }

    /// Override the visible memory scopes.
    #[must_use]
    pub fn with_memory_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.memory_scopes = scopes
            .into_iter()
            .map(|s| s.into().to_lowercase())
            .collect();
        self
    }
}

// =============================================================================
// Burst Configuration
// =============================================================================

/// Immutable configuration for a single burst execution.
#[derive(Debug, Clone)]
pub struct BurstConfig {
    /// Ticks to run
    pub burst_ticks: u32,
    /// Model-call steps per tick
    pub max_steps_per_tick: u32,
    /// Hard cap on tool calls per tick
    pub max_tool_calls_per_tick: u32,
    /// Qualified capabilities the model may use (`tool.action` form)
    pub allowed_tools: BTreeSet<String>,
    /// Optional seed message injected into each tick
    pub stimulus: String,
    /// Timeout for each model call, in seconds
    pub model_timeout_secs: u64,
}

impl BurstConfig {
    /// Create a config with defaults and the standard memory allow-list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tick count.
    ///
    /// # Panics
    /// Panics if `ticks` is zero.
    #[must_use]
    pub fn with_burst_ticks(mut self, ticks: u32) -> Self {
        assert!(ticks > 0, "burst_ticks must be positive");
        self.burst_ticks = ticks;
        self
    }

    /// Set the per-tick step budget.
    ///
    /// # Panics
    /// Panics if `steps` is zero.
    #[must_use]
    pub fn with_max_steps_per_tick(mut self, steps: u32) -> Self {
        assert!(steps > 0, "max_steps_per_tick must be positive");
        self.max_steps_per_tick = steps;
        self
    }

    /// Set the per-tick tool-call cap.
    #[must_use]
    pub fn with_max_tool_calls_per_tick(mut self, calls: u32) -> Self {
        self.max_tool_calls_per_tick = calls;
        self
    }

    /// Replace the allowed capability set.
    #[must_use]
    pub fn with_allowed_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    /// Set the per-tick stimulus message.
    #[must_use]
    pub fn with_stimulus(mut self, stimulus: impl Into<String>) -> Self {
        self.stimulus = stimulus.into();
        self
    }

    /// Set the model-call timeout.
    #[must_use]
    pub fn with_model_timeout_secs(mut self, secs: u64) -> Self {
        self.model_timeout_secs = secs;
        self
    }

    /// Whether a qualified capability is in the allowed set.
    #[must_use]
    pub fn allows(&self, qualified: &str) -> bool {
        self.allowed_tools.contains(qualified)
    }
}

impl Default for BurstConfig {
    fn default() -> Self {
        Self {
            burst_ticks: BURST_TICKS_COUNT_DEFAULT,
            max_steps_per_tick: TICK_STEPS_COUNT_DEFAULT,
            max_tool_calls_per_tick: TICK_TOOL_CALLS_COUNT_DEFAULT,
            allowed_tools: [
                "memory.recall",
                "memory.search",
                "memory.add",
                "memory.remember",
                "memory.bulk_add",
                "memory.update",
                "memory.delete",
                "memory.bulk_delete",
                "memory.get",
                "memory.list",
                "memory.stats",
                "runtime_info",
            ]
            .into_iter()
            .map(ToString::to_string)
            .collect(),
            stimulus: String::new(),
            model_timeout_secs: MODEL_CALL_TIMEOUT_SECS_DEFAULT,
        }
    }
}

// =============================================================================
// Step output (the structured JSON the model must produce)
// =============================================================================

/// What the model chose to do this step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepAction {
    /// Reflect, plan, reason; no side effects
    Think,
    /// Call exactly one tool
    Tool,
    /// End the tick immediately
    Stop,
}

/// A memory the model wants persisted at end-of-tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposedMemory {
    /// Fact content
    #[serde(default)]
    pub text: String,
    /// Target scope
    #[serde(default)]
    pub scope: String,
    /// Category label
    #[serde(default)]
    pub category: String,
    /// Optional tags
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Parsed model output for a single step within a tick.
#[derive(Debug, Clone, Deserialize)]
pub struct StepOutput {
    /// 1-2 sentence description of what the model did or decided
    #[serde(default)]
    pub step_summary: String,
    /// Chosen action; malformed values fall back to `Think`
    #[serde(default = "default_action", deserialize_with = "lenient_action")]
    pub action: StepAction,
    /// Tool name when `action == Tool`
    #[serde(default)]
    pub tool_name: Option<String>,
    /// Tool arguments when `action == Tool`
    #[serde(default)]
    pub tool_args: Option<Value>,
    /// Memories to flush at end of tick (any action may propose)
    #[serde(default)]
    pub proposed_memories: Vec<ProposedMemory>,
    /// Why the model stopped, when `action == Stop`
    #[serde(default)]
    pub stop_reason: Option<String>,
}

fn default_action() -> StepAction {
    StepAction::Think
}

fn lenient_action<'de, D>(deserializer: D) -> Result<StepAction, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(match raw.as_deref().map(str::to_lowercase).as_deref() {
        Some("tool") => StepAction::Tool,
        Some("stop") => StepAction::Stop,
        // Unknown or missing action is a think step, never a parse error.
        _ => StepAction::Think,
    })
}

impl StepOutput {
    /// Parse raw model text into a step, tolerating markdown fences.
    /// Unparseable output falls back to a `Think` step whose summary is
    /// the truncated raw text - parsing is total and never fails.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let text = strip_code_fences(raw.trim());
        match serde_json::from_str::<StepOutput>(text) {
            Ok(step) => step,
            Err(_) => Self::fallback_think(raw),
        }
    }

    fn fallback_think(raw: &str) -> Self {
        let summary: String = raw
            .trim()
            .chars()
            .take(STEP_SUMMARY_FALLBACK_CHARS_MAX)
            .collect();
        Self {
            step_summary: summary,
            action: StepAction::Think,
            tool_name: None,
            tool_args: None,
            proposed_memories: Vec::new(),
            stop_reason: None,
        }
    }
}

fn strip_code_fences(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the fence line (possibly "```json"), then everything after the
    // closing fence.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

// =============================================================================
// Tick outcome (journaled)
// =============================================================================

/// Summary of a single tick execution.
///
/// Ticks never raise: every failure mode lands in `errors` and the
/// outcome is always returned to the caller.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TickOutcome {
    /// Position of this tick within the burst
    pub tick_index: u32,
    /// Model calls consumed
    pub steps_taken: u32,
    /// Qualified names of tools successfully executed, in order
    pub tools_used: Vec<String>,
    /// Actions of those tool calls, in order
    pub tool_actions: Vec<String>,
    /// Contained failures: model errors, denials, rejected memories
    pub errors: Vec<String>,
    /// Model-declared stop reason, if the tick stopped explicitly
    pub stop_reason: Option<String>,
    /// Human-readable tick summary
    pub outcome_summary: String,
    /// Memories the model proposed across all steps
    pub memories_proposed: usize,
    /// Memories actually written by the end-of-tick flush
    pub memories_written: usize,
    /// Aggregated usage/cost for the tick's model calls
    pub metering: Option<Metering>,
}

impl TickOutcome {
    /// Create an empty outcome for a tick index.
    #[must_use]
    pub fn new(tick_index: u32) -> Self {
        Self {
            tick_index,
            ..Self::default()
        }
    }
}

/// Source recorded for end-of-tick memory flushes.
pub const PROPOSED_MEMORY_SOURCE: MemorySource = MemorySource::Tool;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_well_formed_step() {
        let raw = r#"{
            "step_summary": "Recalling project state.",
            "action": "tool",
            "tool_name": "memory",
            "tool_args": {"action": "recall"},
            "proposed_memories": [
                {"text": "Burst ran", "scope": "shared", "category": "meta"}
            ],
            "stop_reason": null
        }"#;
        let step = StepOutput::parse(raw);
        assert_eq!(step.action, StepAction::Tool);
        assert_eq!(step.tool_name.as_deref(), Some("memory"));
        assert_eq!(step.proposed_memories.len(), 1);
    }

    #[test]
    fn test_parse_strips_markdown_fences() {
        let raw = "```json\n{\"step_summary\": \"ok\", \"action\": \"stop\", \"stop_reason\": \"done\"}\n```";
        let step = StepOutput::parse(raw);
        assert_eq!(step.action, StepAction::Stop);
        assert_eq!(step.stop_reason.as_deref(), Some("done"));
    }

    #[test]
    fn test_parse_prose_falls_back_to_think() {
        let raw = "I think I should probably look at the vault first, then decide.";
        let step = StepOutput::parse(raw);
        assert_eq!(step.action, StepAction::Think);
        assert_eq!(step.step_summary, raw);
        assert!(step.proposed_memories.is_empty());
    }

    #[test]
    fn test_parse_truncates_long_fallback_summary() {
        let raw = "x".repeat(500);
        let step = StepOutput::parse(&raw);
        assert_eq!(step.step_summary.len(), STEP_SUMMARY_FALLBACK_CHARS_MAX);
    }

    #[test]
    fn test_unknown_action_becomes_think() {
        let raw = r#"{"step_summary": "weird", "action": "dance"}"#;
        let step = StepOutput::parse(raw);
        assert_eq!(step.action, StepAction::Think);
    }

    #[test]
    fn test_config_defaults_allow_memory_suite() {
        let config = BurstConfig::default();
        assert!(config.allows("memory.recall"));
        assert!(config.allows("memory.add"));
        assert!(config.allows("runtime_info"));
        assert!(!config.allows("web.search"));
        assert!(!config.allows("task_queue.add"));
        assert_eq!(config.max_tool_calls_per_tick, 2);
    }

    #[test]
    fn test_profile_default_scopes() {
        let profile = AgentProfile::new("Orion", "You are Orion.");
        assert_eq!(profile.name, "orion");
        assert_eq!(profile.memory_scopes, vec!["shared", "orion"]);
    }
}
