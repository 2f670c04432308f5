//! Tick/Burst runner - bounded autonomous execution.
//!
//! `TigerStyle`: Every failure mode is contained; nothing escapes a tick.
//!
//! # Architecture
//!
//! ```text
//! BurstRunner<C: ChatProvider, E: EmbeddingProvider>
//! ├── run()       N sequential ticks, catch-log-continue   (burst.rs)
//! └── run_tick()  one bounded step loop                    (tick.rs)
//!     ├── StepOutput::parse   Think | Tool | Stop + fallback (types.rs)
//!     ├── ToolId dispatch     total over the enumeration
//!     ├── boundary denials    fed back as tool results
//!     └── end-of-tick flush   proposed memories -> vault
//! ```
//!
//! Ticks are strictly sequential within a burst: each tick's context and
//! memory state depends on the prior tick's writes. The only suspension
//! point inside a step is the model call, which runs under a timeout.

mod burst;
mod policy;
mod tick;
mod types;

pub use burst::BurstReport;
pub use policy::{PolicyState, RuntimePolicy, StopCause};
pub use types::{
    AgentProfile, BurstConfig, ProposedMemory, StepAction, StepOutput, TickOutcome,
    PROPOSED_MEMORY_SOURCE,
};

use crate::boundary::BoundaryLog;
use crate::embedding::EmbeddingProvider;
use crate::index::SemanticMemory;
use crate::llm::ChatProvider;
use crate::metering::PriceTable;
use crate::tools::TaskQueueTool;

/// Drives one agent through bounded autonomous ticks.
///
/// The runner borrows the shared vault/model instances for the lifetime
/// of a burst; ticks never run concurrently.
///
/// # Example
///
/// ```rust,no_run
/// use vigil::boundary::BoundaryLog;
/// use vigil::llm::ScriptedChatProvider;
/// use vigil::runner::{AgentProfile, BurstConfig, BurstRunner};
///
/// #[tokio::main]
/// async fn main() {
///     let profile = AgentProfile::new("orion", "You are Orion.");
///     let client = ScriptedChatProvider::new();
///     let boundary = BoundaryLog::new("data/boundary_events.jsonl");
///
///     let mut runner: BurstRunner<'_, _, vigil::embedding::SimEmbeddingProvider> =
///         BurstRunner::new(&profile, &client, BurstConfig::new().with_burst_ticks(3))
///             .with_boundary_log(boundary);
///     let report = runner.run().await;
///     assert_eq!(report.outcomes.len(), 3);
/// }
/// ```
pub struct BurstRunner<'a, C: ChatProvider, E: EmbeddingProvider> {
    profile: &'a AgentProfile,
    client: &'a C,
    memory: Option<&'a mut SemanticMemory<E>>,
    task_queue: Option<TaskQueueTool>,
    config: BurstConfig,
    policy: RuntimePolicy,
    boundary_log: BoundaryLog,
    prices: PriceTable,
}

impl<'a, C: ChatProvider, E: EmbeddingProvider> BurstRunner<'a, C, E> {
    /// Create a runner with no memory, no task queue, an unlimited policy,
    /// and a boundary log in the current directory.
    #[must_use]
    pub fn new(profile: &'a AgentProfile, client: &'a C, config: BurstConfig) -> Self {
        Self {
            profile,
            client,
            memory: None,
            task_queue: None,
            config,
            policy: RuntimePolicy::unlimited(),
            boundary_log: BoundaryLog::new("boundary_events.jsonl"),
            prices: PriceTable::new(),
        }
    }

    /// Attach the shared semantic memory.
    #[must_use]
    pub fn with_memory(mut self, memory: &'a mut SemanticMemory<E>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Attach the cross-agent task queue.
    #[must_use]
    pub fn with_task_queue(mut self, queue: TaskQueueTool) -> Self {
        self.task_queue = Some(queue);
        self
    }

    /// Set the cancellation policy checked between steps.
    #[must_use]
    pub fn with_policy(mut self, policy: RuntimePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the boundary audit log.
    #[must_use]
    pub fn with_boundary_log(mut self, log: BoundaryLog) -> Self {
        self.boundary_log = log;
        self
    }

    /// Set the pricing registry used for metering.
    #[must_use]
    pub fn with_prices(mut self, prices: PriceTable) -> Self {
        self.prices = prices;
        self
    }

    /// The burst configuration.
    #[must_use]
    pub fn config(&self) -> &BurstConfig {
        &self.config
    }
}
