//! Burst - run an agent linearly for N ticks.
//!
//! Each tick is a bounded mini-loop (see `tick.rs`). A tick can never
//! raise; whatever goes wrong inside it is carried in its outcome, so
//! the burst always advances to the next tick index and always returns
//! one outcome per tick.

use serde::Serialize;
use tracing::info;

use super::types::TickOutcome;
use super::BurstRunner;
use crate::embedding::EmbeddingProvider;
use crate::llm::ChatProvider;
use crate::metering::Metering;

/// Aggregated result of one burst.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BurstReport {
    /// One outcome per tick, in execution order
    pub outcomes: Vec<TickOutcome>,
    /// Summed usage/cost across all ticks
    pub metering: Metering,
    /// Total contained errors across all ticks
    pub total_errors: usize,
    /// Total memories written by end-of-tick flushes
    pub total_memories_written: usize,
}

impl<C: ChatProvider, E: EmbeddingProvider> BurstRunner<'_, C, E> {
    /// Execute the configured number of ticks sequentially and aggregate
    /// their metering. Always returns one outcome per tick.
    pub async fn run(&mut self) -> BurstReport {
        info!(
            profile = %self.profile.name,
            ticks = self.config.burst_ticks,
            max_steps = self.config.max_steps_per_tick,
            "burst starting"
        );

        let mut report = BurstReport::default();
        for tick_index in 0..self.config.burst_ticks {
            let outcome = self.run_tick(tick_index).await;

            if let Some(metering) = &outcome.metering {
                report.metering = report.metering.clone() + metering.clone();
            }
            report.total_errors += outcome.errors.len();
            report.total_memories_written += outcome.memories_written;
            report.outcomes.push(outcome);
        }

        info!(
            ticks = report.outcomes.len(),
            errors = report.total_errors,
            memories_written = report.total_memories_written,
            tokens = report.metering.usage.total_tokens,
            estimated = report.metering.usage.is_estimated,
            "burst finished"
        );
        report
    }
}
