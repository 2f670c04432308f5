//! Runtime info tool - on-demand snapshot of identity and limits.
//!
//! The context is an explicit per-tick value built by the executor and
//! passed in; there is no process-wide state to reset between runs.

use serde::Serialize;
use serde_json::json;

/// Everything the snapshot reports, assembled fresh each tick.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeContext {
    /// Agent profile name
    pub profile: String,
    /// Execution mode label (always `burst` for tick-driven runs)
    pub execution_mode: String,
    /// Current tick index
    pub tick_index: u32,
    /// Ticks in the current burst
    pub burst_ticks: u32,
    /// Model-call steps allowed per tick
    pub max_steps_per_tick: u32,
    /// Tool calls allowed per tick
    pub max_tool_calls_per_tick: u32,
    /// Qualified capabilities currently allowed
    pub allowed_tools: Vec<String>,
}

/// Tool returning the runtime snapshot as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeInfoTool;

impl RuntimeInfoTool {
    /// Render the snapshot. Never raises.
    #[must_use]
    pub fn execute(context: &RuntimeContext) -> String {
        match serde_json::to_value(context) {
            Ok(mut v) => {
                v["status"] = json!("ok");
                v.to_string()
            }
            Err(err) => super::error_result(err),
        }
    }
}
