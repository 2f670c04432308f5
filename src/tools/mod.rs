//! Agent-facing tools and the closed tool enumeration.
//!
//! `TigerStyle`: Dispatch is a total function.
//!
//! Tool identity is a sum type, not a string lookup: every name the model
//! can utter parses to a [`ToolId`], and names outside the registry land
//! in [`ToolId::Unregistered`], which always resolves to a boundary
//! denial. Tools return JSON strings and never raise to the model -
//! validation failures become `{"status":"error","message":...}`.

mod memory_tool;
mod runtime_info;
mod task_queue;

pub use memory_tool::MemoryTool;
pub use runtime_info::{RuntimeContext, RuntimeInfoTool};
pub use task_queue::TaskQueueTool;

use crate::constants::TASK_QUEUE_CALLS_PER_TICK_MAX;

// =============================================================================
// ToolId
// =============================================================================

/// The closed set of tools the runtime knows how to dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ToolId {
    /// Vault-backed memory operations
    Memory,
    /// On-demand identity/config snapshot
    RuntimeInfo,
    /// Cross-agent task queue (extra 1-per-tick cap)
    TaskQueue,
    /// Anything else the model asked for; always denied
    Unregistered(String),
}

impl ToolId {
    /// Parse a model-supplied tool name. Total: unknown names become
    /// `Unregistered`, never an error.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "memory" => Self::Memory,
            "runtime_info" => Self::RuntimeInfo,
            "task_queue" => Self::TaskQueue,
            other => Self::Unregistered(other.to_string()),
        }
    }

    /// The canonical tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Memory => "memory",
            Self::RuntimeInfo => "runtime_info",
            Self::TaskQueue => "task_queue",
            Self::Unregistered(name) => name,
        }
    }

    /// Per-tool tick cap, independent of the general tool-call cap.
    #[must_use]
    pub fn per_tick_cap(&self) -> Option<u32> {
        match self {
            Self::TaskQueue => Some(TASK_QUEUE_CALLS_PER_TICK_MAX),
            _ => None,
        }
    }

    /// Qualified capability name used against the allow-list: the tool
    /// name plus the requested action, when the tool takes one.
    #[must_use]
    pub fn qualified(&self, action: Option<&str>) -> String {
        match action {
            Some(action) if !action.is_empty() => format!("{}.{action}", self.name()),
            _ => self.name().to_string(),
        }
    }
}

impl std::fmt::Display for ToolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Convenience: an error-status JSON string in the shared tool result shape.
#[must_use]
pub(crate) fn error_result(message: impl std::fmt::Display) -> String {
    serde_json::json!({ "status": "error", "message": message.to_string() }).to_string()
}

// =============================================================================
// Tests
// =============================================================================
