//! Tick - one bounded mini-loop within a burst.
//!
//! Each tick:
//! 1. Builds the system prompt (base + memory injection + step protocol).
//! 2. Runs up to `max_steps_per_tick` model calls.
//! 3. Enforces the per-tick tool-call caps; out-of-policy requests go
//!    through the boundary denial system and come back as tool results.
//! 4. Collects proposed memories and flushes them through the vault.
//! 5. Returns a [`TickOutcome`] for journaling.
//!
//! The tick never raises to its caller: model failures, denials, and
//! rejected memory writes all land in the outcome's error list.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{info, warn};

use super::types::{ProposedMemory, StepAction, StepOutput, TickOutcome, PROPOSED_MEMORY_SOURCE};
use super::BurstRunner;
use crate::boundary::build_denial;
use crate::embedding::EmbeddingProvider;
use crate::injector::build_memory_block;
use crate::llm::{ChatMessage, ChatProvider};
use crate::metering::{meter_response, Metering};
use crate::tools::{MemoryTool, RuntimeContext, RuntimeInfoTool, ToolId};
use crate::vault::{NewMemory, Tier};

impl<C: ChatProvider, E: EmbeddingProvider> BurstRunner<'_, C, E> {
    /// Execute a single bounded tick. Never raises - errors are captured.
    pub async fn run_tick(&mut self, tick_index: u32) -> TickOutcome {
        let mut outcome = TickOutcome::new(tick_index);
        let mut tool_calls: u32 = 0;
        let mut per_tool_calls: HashMap<String, u32> = HashMap::new();
        let mut proposed: Vec<ProposedMemory> = Vec::new();
        let mut tick_metering = Metering::default();
        let mut policy_state = self.policy.start();
        let mut last_step_summary: Option<String> = None;

        let system_prompt = self.build_system_prompt(tick_index).await;
        let opening = if self.config.stimulus.is_empty() {
            format!("Tick {tick_index}: autonomous step. Decide what to do.")
        } else {
            self.config.stimulus.clone()
        };
        let mut messages = vec![ChatMessage::system(system_prompt), ChatMessage::user(opening)];

        for step_idx in 0..self.config.max_steps_per_tick {
            if let Some(cause) = policy_state.should_stop() {
                outcome
                    .errors
                    .push(format!("step_{step_idx}_policy_stop: {cause}"));
                break;
            }

            // -- Model call (the tick's only suspension point) --
            let timeout = Duration::from_secs(self.config.model_timeout_secs);
            let response = match tokio::time::timeout(timeout, self.client.chat(&messages, None)).await {
                Ok(Ok(response)) => response,
                Ok(Err(err)) => {
                    outcome
                        .errors
                        .push(format!("step_{step_idx}_model_error: {err}"));
                    break;
                }
                Err(_) => {
                    outcome.errors.push(format!(
                        "step_{step_idx}_model_error: call timed out after {}s",
                        self.config.model_timeout_secs
                    ));
                    break;
                }
            };

            tick_metering = tick_metering + meter_response(&response, &messages, &self.prices);

            let raw = response.content.unwrap_or_default();
            let step = StepOutput::parse(&raw);
            outcome.steps_taken += 1;
            policy_state.record_iteration();

            if !step.step_summary.is_empty() {
                last_step_summary = Some(step.step_summary.clone());
            }
            proposed.extend(step.proposed_memories.iter().cloned());
            messages.push(ChatMessage::assistant(raw));

            match step.action {
                StepAction::Stop => {
                    outcome.stop_reason =
                        Some(step.stop_reason.unwrap_or_else(|| "model_stop".to_string()));
                    outcome.outcome_summary = step.step_summary;
                    break;
                }
                StepAction::Tool => {
                    self.dispatch_tool(
                        &step,
                        step_idx,
                        tick_index,
                        &mut outcome,
                        &mut messages,
                        &mut tool_calls,
                        &mut per_tool_calls,
                    )
                    .await;
                }
                StepAction::Think => {
                    messages.push(ChatMessage::user(
                        "Continue. Choose your next action (think / tool / stop).",
                    ));
                }
            }
        }

        // -- End-of-tick flush: always runs, even after stop or error --
        outcome.memories_proposed = proposed.len();
        if let Some(memory) = self.memory.as_deref_mut() {
            for pm in &proposed {
                let category = if pm.category.is_empty() {
                    "other"
                } else {
                    pm.category.as_str()
                };
                let req = NewMemory::new(pm.text.as_str(), pm.scope.as_str(), category)
                    .with_tags(pm.tags.clone())
                    .with_source(PROPOSED_MEMORY_SOURCE)
                    .with_tier(Tier::Register);
                match memory.add(&req).await {
                    Ok(_) => outcome.memories_written += 1,
                    Err(err) => outcome.errors.push(format!("memory_write_error: {err}")),
                }
            }
        }

        if outcome.outcome_summary.is_empty() {
            outcome.outcome_summary = last_step_summary.unwrap_or_else(|| {
                let tools = if outcome.tools_used.is_empty() {
                    "none".to_string()
                } else {
                    outcome.tools_used.join(",")
                };
                format!(
                    "Tick {tick_index} completed: {} steps, tools={tools}, memories={}/{}",
                    outcome.steps_taken, outcome.memories_written, outcome.memories_proposed
                )
            });
        }
        outcome.metering = Some(tick_metering);

        info!(
            tick = tick_index,
            steps = outcome.steps_taken,
            tools = outcome.tools_used.len(),
            errors = outcome.errors.len(),
            memories_written = outcome.memories_written,
            "tick finished"
        );
        outcome
    }

    /// Route one tool request through the caps, the allow-list, and the
    /// boundary system, then execute it. All outcomes - success, denial,
    /// failure - come back to the model as a user message.
    #[allow(clippy::too_many_arguments)]
    async fn dispatch_tool(
        &mut self,
        step: &StepOutput,
        step_idx: u32,
        tick_index: u32,
        outcome: &mut TickOutcome,
        messages: &mut Vec<ChatMessage>,
        tool_calls: &mut u32,
        per_tool_calls: &mut HashMap<String, u32>,
    ) {
        // Hard per-tick cap on all tool calls.
        if *tool_calls >= self.config.max_tool_calls_per_tick {
            let cap = self.config.max_tool_calls_per_tick;
            outcome.errors.push(format!(
                "step_{step_idx}_tool_denied: tool call blocked (max {cap} per tick)"
            ));
            messages.push(ChatMessage::user(
                json!({
                    "tool_error": format!(
                        "Tool call denied - you already used your {cap} tool call(s) \
                         for this tick. Choose 'think' or 'stop'."
                    )
                })
                .to_string(),
            ));
            return;
        }

        let tool_id = ToolId::parse(step.tool_name.as_deref().unwrap_or_default());
        let args = step.tool_args.clone().unwrap_or_else(|| json!({}));
        let action = args
            .get("action")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let qualified = tool_id.qualified(if action.is_empty() {
            None
        } else {
            Some(action.as_str())
        });

        // Unregistered tools and out-of-policy actions both resolve to a
        // deterministic denial fed back as the tool result.
        let denied = matches!(tool_id, ToolId::Unregistered(_)) || !self.config.allows(&qualified);
        if denied {
            let (payload, event) = build_denial(
                &qualified,
                &self.profile.name,
                &format!("Capability '{qualified}' is not in the allowed set for this burst."),
                Some(tick_index),
                Some(args.clone()),
            );
            self.boundary_log.append(&event);
            outcome.errors.push(format!(
                "step_{step_idx}_tool_denied: '{qualified}' not in allowed_tools"
            ));
            messages.push(ChatMessage::user(payload));
            return;
        }

        // Per-tool cap, independent of the general cap.
        if let Some(cap) = tool_id.per_tick_cap() {
            let used = per_tool_calls.get(tool_id.name()).copied().unwrap_or(0);
            if used >= cap {
                outcome.errors.push(format!(
                    "step_{step_idx}_{}_denied: only {cap} call(s) per tick",
                    tool_id.name()
                ));
                messages.push(ChatMessage::user(
                    json!({
                        "tool_error": format!(
                            "{} denied - limit is {cap} call(s) per tick. \
                             Choose 'think' or 'stop'.",
                            tool_id.name()
                        )
                    })
                    .to_string(),
                ));
                return;
            }
        }

        // Total dispatch over the enumeration. Tools return JSON strings
        // and never raise; a disabled collaborator is an error string too.
        let result = match &tool_id {
            ToolId::Memory => match self.memory.as_deref_mut() {
                Some(memory) => MemoryTool::execute(memory, &args).await,
                None => json!({
                    "status": "error",
                    "message": "memory is not enabled for this agent"
                })
                .to_string(),
            },
            ToolId::RuntimeInfo => RuntimeInfoTool::execute(&RuntimeContext {
                profile: self.profile.name.clone(),
                execution_mode: "burst".to_string(),
                tick_index,
                burst_ticks: self.config.burst_ticks,
                max_steps_per_tick: self.config.max_steps_per_tick,
                max_tool_calls_per_tick: self.config.max_tool_calls_per_tick,
                allowed_tools: self.config.allowed_tools.iter().cloned().collect(),
            }),
            ToolId::TaskQueue => match &self.task_queue {
                Some(queue) => queue.execute(&self.profile.name, &args),
                None => json!({
                    "status": "error",
                    "message": "task queue is not enabled for this agent"
                })
                .to_string(),
            },
            // Already denied above; kept so dispatch stays total.
            ToolId::Unregistered(_) => unreachable!("unregistered tools are denied before dispatch"),
        };

        *tool_calls += 1;
        *per_tool_calls
            .entry(tool_id.name().to_string())
            .or_insert(0) += 1;
        outcome.tools_used.push(qualified);
        outcome.tool_actions.push(if action.is_empty() {
            "snapshot".to_string()
        } else {
            action
        });
        messages.push(ChatMessage::user(
            json!({ "tool_result": result }).to_string(),
        ));
    }

    /// Assemble the full system prompt for one tick: base prompt, memory
    /// context, step protocol, tick metadata.
    async fn build_system_prompt(&self, tick_index: u32) -> String {
        let mut sections: Vec<String> = Vec::new();

        if !self.profile.system_prompt.is_empty() {
            sections.push(self.profile.system_prompt.clone());
        }

        if let Some(memory) = self.memory.as_deref() {
            let query = if self.config.stimulus.is_empty() {
                None
            } else {
                Some(self.config.stimulus.as_str())
            };
            match build_memory_block(
                memory,
                &self.profile.memory_scopes,
                crate::constants::INJECTION_ITEMS_COUNT_DEFAULT,
                query,
            )
            .await
            {
                Ok(block) if !block.is_empty() => sections.push(block),
                Ok(_) => {}
                Err(err) => warn!(error = %err, "memory injection skipped"),
            }
        }

        sections.push(self.step_protocol());
        sections.push(format!(
            "## Tick Context\n\n- tick_index: {tick_index}\n- burst_ticks: {}\n- stimulus: {}\n",
            self.config.burst_ticks,
            if self.config.stimulus.is_empty() {
                "(autonomous)"
            } else {
                &self.config.stimulus
            }
        ));

        sections.join("\n\n")
    }

    /// The structured-output instruction injected once per tick.
    fn step_protocol(&self) -> String {
        format!(
            r#"## Burst-Mode Step Protocol

You are running autonomously in burst mode. For EVERY reply you MUST
output exactly one JSON object (no markdown fences, no prose outside
the object). The schema is:

{{
  "step_summary": "<1-2 sentence description of what you did or decided>",
  "action": "think" | "tool" | "stop",
  "tool_name": "<tool name, or null if action != tool>",
  "tool_args": {{<tool arguments, or null>}},
  "proposed_memories": [
    {{"text": "...", "scope": "<scope>", "category": "<category>", "tags": [...]}}
  ],
  "stop_reason": "<why you are stopping, or null>"
}}

### Rules

- action = "think": reflect, plan, reason - no side effects.
- action = "tool": call exactly ONE tool. Allowed capabilities:
  {allowed}.
  Supply tool_name and tool_args={{"action": "<action>", ...}}.
- action = "stop": you have finished or have nothing useful left to do.
- You may accumulate proposed_memories across steps; they are persisted
  at the end of the tick.
- You get at most {max_steps} steps per tick and at most {max_tools} tool calls.
- Do NOT reveal internal chain-of-thought. Keep step_summary short."#,
            allowed = self
                .config
                .allowed_tools
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", "),
            max_steps = self.config.max_steps_per_tick,
            max_tools = self.config.max_tool_calls_per_tick,
        )
    }
}
