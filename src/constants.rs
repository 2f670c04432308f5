//! `TigerStyle` Constants
//!
//! All limits use big-endian naming: `CATEGORY_SPECIFICS_UNIT_LIMIT`
//! Example: `MEMORY_TEXT_CHARS_MAX` (not `MAX_MEMORY_TEXT`)
//!
//! Every constant includes units in the name:
//! - _`CHARS_MAX/MIN` for text limits
//! - _`COUNT_MAX/DEFAULT` for quantity limits
//! - _`SECS`_* for time durations

// =============================================================================
// Memory Record Limits
// =============================================================================

/// Maximum length of a single memory record's text, in characters
pub const MEMORY_TEXT_CHARS_MAX: usize = 1200;

/// Length of a memory id (truncated hex of a UUID v4)
pub const MEMORY_ID_CHARS: usize = 12;

/// Maximum number of tags on a single memory record
pub const MEMORY_TAGS_COUNT_MAX: usize = 32;

/// Maximum length of a single tag
pub const MEMORY_TAG_CHARS_MAX: usize = 64;

// =============================================================================
// Vault Capacity
// =============================================================================

/// Default ceiling on active (non-deleted) records in one vault
pub const VAULT_ACTIVE_COUNT_MAX_DEFAULT: usize = 500;

// =============================================================================
// Duplicate Detection
// =============================================================================

/// Default composite-similarity threshold above which a write is a duplicate
pub const DEDUP_SIMILARITY_THRESHOLD_DEFAULT: f64 = 0.70;

/// Default bare token-overlap threshold; catches paraphrases on its own
pub const DEDUP_TOKEN_OVERLAP_THRESHOLD_DEFAULT: f64 = 0.60;

/// Bonus added to the composite score when one text contains the other
pub const DEDUP_CONTAINMENT_BONUS: f64 = 0.15;

/// Weight of token overlap in the composite score
pub const DEDUP_WEIGHT_TOKEN_OVERLAP: f64 = 0.6;

/// Weight of the sequence-similarity ratio in the composite score
pub const DEDUP_WEIGHT_SEQUENCE_RATIO: f64 = 0.4;

/// Minimum length (chars) before the containment bonus applies
pub const DEDUP_CONTAINMENT_CHARS_MIN: usize = 12;

// =============================================================================
// Maintenance Heuristics
// =============================================================================

/// Register-tier records shorter than this are deletion candidates
pub const PRUNE_REGISTER_TEXT_CHARS_MIN: usize = 40;

// =============================================================================
// Search / Recall Limits
// =============================================================================

/// Default number of semantic search results
pub const SEARCH_RESULTS_COUNT_DEFAULT: usize = 10;

/// Maximum number of semantic search results
pub const SEARCH_RESULTS_COUNT_MAX: usize = 100;

/// Oversampling factor applied before post-retrieval filtering
pub const SEARCH_OVERSAMPLE_FACTOR: usize = 5;

/// Default number of recall (non-semantic list) results
pub const RECALL_RESULTS_COUNT_DEFAULT: usize = 20;

// =============================================================================
// Embedding Limits
// =============================================================================

/// Number of dimensions produced by the simulation embedding provider
pub const EMBEDDING_DIMENSIONS_COUNT: usize = 256;

// =============================================================================
// Tick / Burst Execution
// =============================================================================

/// Default model-call steps per tick
pub const TICK_STEPS_COUNT_DEFAULT: u32 = 3;

/// Default hard cap on tool calls per tick
pub const TICK_TOOL_CALLS_COUNT_DEFAULT: u32 = 2;

/// Per-tick cap on task-queue tool calls, independent of the general cap
pub const TASK_QUEUE_CALLS_PER_TICK_MAX: u32 = 1;

/// Default number of ticks in a burst
pub const BURST_TICKS_COUNT_DEFAULT: u32 = 15;

/// Default timeout for one model call
pub const MODEL_CALL_TIMEOUT_SECS_DEFAULT: u64 = 120;

/// Unparseable model output is truncated to this length for the fallback summary
pub const STEP_SUMMARY_FALLBACK_CHARS_MAX: usize = 200;

// =============================================================================
// Memory Injection
// =============================================================================

/// Default number of memories injected into a tick's system prompt
pub const INJECTION_ITEMS_COUNT_DEFAULT: usize = 20;

// =============================================================================
// Metering
// =============================================================================

/// Characters-per-token heuristic when a provider omits usage counts
pub const TOKEN_ESTIMATE_CHARS_PER_TOKEN: usize = 4;

/// Tokens per pricing unit (prices are quoted per million tokens)
pub const PRICING_TOKENS_PER_UNIT: u64 = 1_000_000;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_weights_sum_to_one() {
        let sum = DEDUP_WEIGHT_TOKEN_OVERLAP + DEDUP_WEIGHT_SEQUENCE_RATIO;
        assert!((sum - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_thresholds_in_unit_range() {
        assert!((0.0..=1.0).contains(&DEDUP_SIMILARITY_THRESHOLD_DEFAULT));
        assert!((0.0..=1.0).contains(&DEDUP_TOKEN_OVERLAP_THRESHOLD_DEFAULT));
        assert!(DEDUP_TOKEN_OVERLAP_THRESHOLD_DEFAULT <= DEDUP_SIMILARITY_THRESHOLD_DEFAULT);
    }

    #[test]
    fn test_tick_limits_valid() {
        assert!(TICK_STEPS_COUNT_DEFAULT > 0);
        assert!(TICK_TOOL_CALLS_COUNT_DEFAULT <= TICK_STEPS_COUNT_DEFAULT);
        assert!(TASK_QUEUE_CALLS_PER_TICK_MAX <= TICK_TOOL_CALLS_COUNT_DEFAULT);
    }
}
