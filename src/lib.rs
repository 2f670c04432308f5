//! # Vigil
//!
//! An autonomous agent runtime built around a durable memory vault and a
//! bounded tick/burst execution loop.
//!
//! ## Features
//!
//! - **Memory Vault**: append-only, versioned JSONL fact store with
//!   duplicate detection, PII filtering, capacity ceilings, and
//!   consolidation tooling
//! - **Semantic Search**: meaning-based retrieval over vault contents;
//!   the index is a rebuildable cache, the vault is the truth
//! - **Tick/Burst Runner**: bounded autonomous loops with per-tick tool
//!   caps, structured step output, and end-of-tick memory flushes
//! - **Boundary Denials**: out-of-policy capability requests become
//!   deterministic payloads plus an append-only audit trail, never crashes
//! - **Cost Metering**: token/USD accounting with estimation fallback
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vigil::embedding::SimEmbeddingProvider;
//! use vigil::index::{SearchFilter, SemanticMemory};
//! use vigil::vault::{NewMemory, VaultConfig, VaultStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let vault = VaultStore::open("data/vault.jsonl", VaultConfig::default())?;
//!     let mut memory = SemanticMemory::open(vault, SimEmbeddingProvider::new()).await?;
//!
//!     memory
//!         .add(&NewMemory::new("Alice is a software engineer at Acme", "shared", "bio"))
//!         .await?;
//!
//!     let hits = memory.search("Who works at Acme?", &SearchFilter::new()).await?;
//!     for hit in hits {
//!         println!("{} ({:.2})", hit.memory.text, hit.score);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     BurstRunner                         │
//! │   tick loop │ tool caps │ boundary denials │ metering   │
//! ├─────────────────────────────────────────────────────────┤
//! │  MemoryTool │ TaskQueueTool │ RuntimeInfoTool           │
//! ├─────────────────────────────────────────────────────────┤
//! │  SemanticMemory      │ derived vector cache + search    │
//! │  VaultStore          │ append-only JSONL, versioned     │
//! │  PII guard / dedup   │ the write gate                   │
//! ├─────────────────────────────────────────────────────────┤
//! │  ChatProvider / EmbeddingProvider (capability seams)    │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Simulation-First
//!
//! Every capability seam has a deterministic simulation implementation:
//! [`llm::ScriptedChatProvider`] replays canned model steps and
//! [`embedding::SimEmbeddingProvider`] produces stable vectors, so the
//! whole runtime - vault writes, tool gating, denials, metering - is
//! exercisable in tests with no network and no model weights.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod boundary;
pub mod constants;
pub mod embedding;
pub mod index;
pub mod injector;
pub mod llm;
pub mod metering;
pub mod runner;
pub mod telemetry;
pub mod tools;
pub mod vault;

// Re-export the main types.
pub use boundary::{build_denial, classify_risk, BoundaryEvent, BoundaryLog, RiskLevel};
pub use embedding::{EmbeddingError, EmbeddingProvider, SimEmbeddingProvider};
pub use index::{IndexError, SearchFilter, SearchHit, SemanticMemory};
pub use injector::build_memory_block;
pub use llm::{
    ChatMessage, ChatProvider, ChatResponse, ProviderError, ScriptedChatProvider, ToolCallRequest,
};
pub use metering::{meter_response, CostBreakdown, Metering, PriceTable, TokenUsage};
pub use runner::{
    AgentProfile, BurstConfig, BurstReport, BurstRunner, RuntimePolicy, StepAction, StepOutput,
    TickOutcome,
};
pub use tools::{MemoryTool, RuntimeInfoTool, TaskQueueTool, ToolId};
pub use vault::{
    check_pii, Memory, MemoryPatch, MemorySource, NewMemory, RecallFilter, Tier, VaultConfig,
    VaultError, VaultStore,
};
