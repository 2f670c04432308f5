//! Semantic Index Layer - meaning-based search over vault contents.
//!
//! `TigerStyle`: The index is a derived cache; the vault is the truth.
//!
//! # Architecture
//!
//! ```text
//! SemanticMemory<E: EmbeddingProvider>
//! ├── VaultStore        source of truth (append-only JSONL)
//! ├── rows: Vec<row>    one unit vector per indexed record
//! └── tombstones        ids excluded from results without a rebuild
//! ```
//!
//! - On open: embed every active vault record.
//! - On write: write to the vault first, then index the new version.
//! - On delete/update: tombstone the stale row; no rebuild required.
//! - [`SemanticMemory::rebuild_index`] reconstructs everything from the
//!   vault, for use after compaction, bulk edits, or index loss.
//!
//! Embedding failures on the write path degrade gracefully: the vault
//! line is already durable, the record is just unindexed until the next
//! rebuild. Search results are filtered by scope/category post-retrieval,
//! so the index itself needs no partitioning.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::constants::{SEARCH_OVERSAMPLE_FACTOR, SEARCH_RESULTS_COUNT_DEFAULT};
use crate::embedding::{cosine_similarity, EmbeddingError, EmbeddingProvider};
use crate::vault::{
    BulkDeleteReport, CompactReport, Memory, MemoryPatch, MemorySource, NewMemory, RecallFilter,
    Tier, VaultError, VaultStats, VaultStore,
};

// =============================================================================
// Error Types
// =============================================================================

/// Errors from the semantic memory facade.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The underlying vault rejected or failed the operation
    #[error(transparent)]
    Vault(#[from] VaultError),

    /// The embedding capability failed on a read path (e.g. the query)
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
}

/// Result type for semantic memory operations.
pub type IndexResult<T> = Result<T, IndexError>;

// =============================================================================
// Search Types
// =============================================================================

/// Filter for semantic search, applied after retrieval.
#[derive(Debug, Clone)]
pub struct SearchFilter {
    /// Restrict to these scopes; None means all scopes
    pub scopes: Option<Vec<String>>,
    /// Restrict to one category
    pub category: Option<String>,
    /// Maximum results
    pub top_k: usize,
}

impl SearchFilter {
    /// Create an unrestricted filter with the default result count.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to a single scope.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes = Some(vec![scope.into().to_lowercase()]);
        self
    }

    /// Restrict to a scope set.
    #[must_use]
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = Some(
            scopes
                .into_iter()
                .map(|s| s.into().to_lowercase())
                .collect(),
        );
        self
    }

    /// Restrict to one category.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into().to_lowercase());
        self
    }

    /// Cap the number of results.
    ///
    /// # Panics
    /// Panics if `top_k` is zero.
    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        assert!(top_k > 0, "top_k must be positive");
        self.top_k = top_k;
        self
    }

    fn matches(&self, mem: &Memory) -> bool {
        if let Some(scopes) = &self.scopes {
            if !scopes.iter().any(|s| s == &mem.scope) {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if &mem.category != category {
                return false;
            }
        }
        true
    }
}

impl Default for SearchFilter {
    fn default() -> Self {
        Self {
            scopes: None,
            category: None,
            top_k: SEARCH_RESULTS_COUNT_DEFAULT,
        }
    }
}

/// One semantic search result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    /// The matched record (current vault state, not the indexed snapshot)
    pub memory: Memory,
    /// Cosine similarity to the query
    pub score: f32,
}

/// Outcome of a `remember` convenience write.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RememberStatus {
    /// The memory was stored
    Remembered {
        /// Assigned id
        id: String,
        /// Normalized scope
        scope: String,
        /// Normalized category
        category: String,
    },
    /// The write gate rejected the memory
    Rejected {
        /// Rejection description
        reason: String,
    },
}

/// Combined vault + index health counters.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    /// Vault counters
    #[serde(flatten)]
    pub vault: VaultStats,
    /// Rows currently in the index (including tombstoned)
    pub index_vectors: usize,
    /// Rows excluded from results pending rebuild
    pub index_tombstoned: usize,
    /// Rows actually served
    pub index_effective: usize,
    /// True when effective rows equal active vault records
    pub in_sync: bool,
}

// =============================================================================
// SemanticMemory
// =============================================================================

struct IndexRow {
    id: String,
    vector: Vec<f32>,
}

/// Vault storage plus a rebuildable semantic index.
///
/// # Example
///
/// ```rust,no_run
/// use vigil::embedding::SimEmbeddingProvider;
/// use vigil::index::{SearchFilter, SemanticMemory};
/// use vigil::vault::{NewMemory, VaultConfig, VaultStore};
///
/// #[tokio::main]
/// async fn main() {
///     let vault = VaultStore::open("data/vault.jsonl", VaultConfig::default()).unwrap();
///     let mut memory = SemanticMemory::open(vault, SimEmbeddingProvider::new()).await.unwrap();
///
///     memory.add(&NewMemory::new("Creator likes coffee", "shared", "preference")).await.unwrap();
///     let hits = memory.search("what does Creator like?", &SearchFilter::new()).await.unwrap();
///     assert!(!hits.is_empty());
/// }
/// ```
pub struct SemanticMemory<E: EmbeddingProvider> {
    vault: VaultStore,
    embedder: E,
    rows: Vec<IndexRow>,
    id_to_row: HashMap<String, usize>,
    tombstones: HashSet<String>,
}

impl<E: EmbeddingProvider> SemanticMemory<E> {
    /// Open the facade, building the index from the vault's active records.
    ///
    /// # Errors
    /// `IndexError::Vault` if the vault cannot be read. Per-record
    /// embedding failures are logged and skipped, never fatal.
    pub async fn open(vault: VaultStore, embedder: E) -> IndexResult<Self> {
        let mut this = Self {
            vault,
            embedder,
            rows: Vec::new(),
            id_to_row: HashMap::new(),
            tombstones: HashSet::new(),
        };
        let indexed = this.rebuild_index().await?;
        info!(vectors = indexed, "semantic index built from vault");
        Ok(this)
    }

    /// The underlying vault store.
    #[must_use]
    pub fn vault(&self) -> &VaultStore {
        &self.vault
    }

    // -------------------------------------------------------------------------
    // Write operations
    // -------------------------------------------------------------------------

    /// Store a new memory in the vault, then index it.
    ///
    /// # Errors
    /// Vault rejections propagate; an embedding failure after a durable
    /// vault write degrades to an unindexed record (warned, not an error).
    pub async fn add(&mut self, req: &NewMemory) -> IndexResult<Memory> {
        let mem = self.vault.add(req)?;
        self.index_record(&mem).await;
        Ok(mem)
    }

    /// Quick-store with the `remembered` tag and register tier; rejections
    /// become a status instead of an error.
    pub async fn remember(
        &mut self,
        text: &str,
        scope: &str,
        category: &str,
        source: MemorySource,
        tags: Vec<String>,
    ) -> RememberStatus {
        let mut tags = tags;
        if !tags.iter().any(|t| t == "remembered") {
            tags.push("remembered".to_string());
        }
        let req = NewMemory::new(text, scope, category)
            .with_tags(tags)
            .with_source(source)
            .with_tier(Tier::Register);

        match self.add(&req).await {
            Ok(mem) => RememberStatus::Remembered {
                id: mem.id,
                scope: mem.scope,
                category: mem.category,
            },
            Err(err) => RememberStatus::Rejected {
                reason: err.to_string(),
            },
        }
    }

    /// Update a record; a text change re-embeds (stale row tombstoned).
    ///
    /// # Errors
    /// Same as [`VaultStore::update`].
    pub async fn update(&mut self, id: &str, patch: &MemoryPatch) -> IndexResult<Memory> {
        let next = self.vault.update(id, patch)?;
        if patch.text.is_some() {
            self.tombstones.insert(id.to_string());
            self.index_record(&next).await;
        }
        Ok(next)
    }

    /// Upsert keyed by `(scope, topic_id)`; see [`VaultStore::update_by_topic`].
    ///
    /// # Errors
    /// Same as the underlying vault operation.
    pub async fn update_by_topic(
        &mut self,
        topic_id: &str,
        scope: &str,
        text: &str,
        category: Option<&str>,
    ) -> IndexResult<Memory> {
        let mem = self.vault.update_by_topic(topic_id, scope, text, category)?;
        self.tombstones.insert(mem.id.clone());
        self.index_record(&mem).await;
        Ok(mem)
    }

    /// Soft-delete and exclude from search results.
    ///
    /// # Errors
    /// `IndexError::Vault` on storage failure.
    pub fn delete(&mut self, id: &str) -> IndexResult<bool> {
        let deleted = self.vault.delete(id)?;
        if deleted {
            self.tombstones.insert(id.to_string());
        }
        Ok(deleted)
    }

    /// Soft-delete several ids; see [`VaultStore::bulk_delete`].
    ///
    /// # Errors
    /// `IndexError::Vault` on storage failure.
    pub fn bulk_delete(&mut self, ids: &[String]) -> IndexResult<BulkDeleteReport> {
        let report = self.vault.bulk_delete(ids)?;
        for id in &report.deleted {
            self.tombstones.insert(id.clone());
        }
        Ok(report)
    }

    // -------------------------------------------------------------------------
    // Read operations
    // -------------------------------------------------------------------------

    /// Semantic search: cosine-ranked active records, filtered by scope and
    /// category after retrieval. Oversamples before filtering so filtered
    /// results cannot starve the requested `top_k`.
    ///
    /// # Errors
    /// `IndexError::Embedding` if the query cannot be embedded,
    /// `IndexError::Vault` if current record state cannot be read.
    pub async fn search(&self, query: &str, filter: &SearchFilter) -> IndexResult<Vec<SearchHit>> {
        if self.rows.is_empty() {
            return Ok(Vec::new());
        }
        let query_vec = self.embedder.embed(query).await?;

        let mut scored: Vec<(usize, f32)> = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| !self.tombstones.contains(&row.id))
            .map(|(i, row)| (i, cosine_similarity(&query_vec, &row.vector)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(filter.top_k * SEARCH_OVERSAMPLE_FACTOR);

        let resolved = self.vault.resolve_latest()?;
        let mut hits = Vec::new();
        for (row_idx, score) in scored {
            let id = &self.rows[row_idx].id;
            let Some(mem) = resolved.get(id).filter(|m| m.is_active()) else {
                continue;
            };
            if !filter.matches(mem) {
                continue;
            }
            hits.push(SearchHit {
                memory: mem.clone(),
                score,
            });
            if hits.len() >= filter.top_k {
                break;
            }
        }
        Ok(hits)
    }

    /// List active memories, newest first; no embedding involved.
    ///
    /// # Errors
    /// `IndexError::Vault` on read failure.
    pub fn recall(&self, filter: &RecallFilter) -> IndexResult<Vec<Memory>> {
        Ok(self.vault.recall(filter)?)
    }

    /// Get a single active memory by id.
    ///
    /// # Errors
    /// `IndexError::Vault` on read failure.
    pub fn get(&self, id: &str) -> IndexResult<Option<Memory>> {
        Ok(self.vault.get(id)?)
    }

    // -------------------------------------------------------------------------
    // Maintenance
    // -------------------------------------------------------------------------

    /// Compact the vault, then rebuild the index from the compacted log.
    ///
    /// # Errors
    /// `IndexError::Vault` if compaction fails.
    pub async fn compact(&mut self) -> IndexResult<CompactReport> {
        let report = self.vault.compact()?;
        self.rebuild_index().await?;
        Ok(report)
    }

    /// Rebuild the index from scratch out of all active vault records.
    /// Returns the number of vectors indexed.
    ///
    /// # Errors
    /// `IndexError::Vault` if the vault cannot be read; per-record
    /// embedding failures are skipped with a warning.
    pub async fn rebuild_index(&mut self) -> IndexResult<usize> {
        let active = self.vault.read_active()?;
        self.rows.clear();
        self.id_to_row.clear();
        self.tombstones.clear();

        for mem in &active {
            self.index_record(mem).await;
        }
        Ok(self.rows.len())
    }

    /// Combined vault + index statistics.
    ///
    /// # Errors
    /// `IndexError::Vault` on read failure.
    pub fn stats(&self) -> IndexResult<IndexStats> {
        let vault = self.vault.vault_stats()?;
        let effective = self
            .rows
            .iter()
            .filter(|row| !self.tombstones.contains(&row.id))
            .count();
        let in_sync = effective == vault.active_count;
        Ok(IndexStats {
            index_vectors: self.rows.len(),
            index_tombstoned: self.tombstones.len(),
            index_effective: effective,
            in_sync,
            vault,
        })
    }

    // -------------------------------------------------------------------------
    // Internal
    // -------------------------------------------------------------------------

    async fn index_record(&mut self, mem: &Memory) {
        match self.embedder.embed(&mem.text).await {
            Ok(vector) => {
                // Re-indexing a known id replaces its row in place so one id
                // never serves two vectors.
                if let Some(&row_idx) = self.id_to_row.get(&mem.id) {
                    self.rows[row_idx].vector = vector;
                } else {
                    self.rows.push(IndexRow {
                        id: mem.id.clone(),
                        vector,
                    });
                    self.id_to_row.insert(mem.id.clone(), self.rows.len() - 1);
                }
                self.tombstones.remove(&mem.id);
            }
            Err(err) => {
                // The vault line is durable; the record is just unindexed
                // until the next rebuild.
                warn!(id = %mem.id, error = %err, "embedding failed; record unindexed");
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::SimEmbeddingProvider;
    use crate::vault::VaultConfig;
    use tempfile::TempDir;

    async fn make_memory(dir: &TempDir) -> SemanticMemory<SimEmbeddingProvider> {
        let vault =
            VaultStore::open(dir.path().join("vault.jsonl"), VaultConfig::default()).unwrap();
        SemanticMemory::open(vault, SimEmbeddingProvider::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_search_finds_by_meaning_tokens() {
        let dir = TempDir::new().unwrap();
        let mut memory = make_memory(&dir).await;

        memory
            .add(&NewMemory::new("User prefers dark mode", "shared", "preference"))
            .await
            .unwrap();
        memory
            .add(&NewMemory::new(
                "Working on Python agent runtime",
                "orion",
                "project",
            ))
            .await
            .unwrap();
        memory
            .add(&NewMemory::new(
                "Enjoys writing science fiction stories",
                "elysia",
                "preference",
            ))
            .await
            .unwrap();

        let hits = memory
            .search("python agent", &SearchFilter::new())
            .await
            .unwrap();
        assert!(!hits.is_empty());
        assert!(hits[0].memory.text.contains("Python agent"));
    }

    #[tokio::test]
    async fn test_search_scope_filter() {
        let dir = TempDir::new().unwrap();
        let mut memory = make_memory(&dir).await;
        memory
            .add(&NewMemory::new(
                "Enjoys writing science fiction stories",
                "elysia",
                "preference",
            ))
            .await
            .unwrap();

        let scoped = memory
            .search("science fiction", &SearchFilter::new().with_scope("elysia"))
            .await
            .unwrap();
        assert_eq!(scoped.len(), 1);

        let excluded = memory
            .search("science fiction", &SearchFilter::new().with_scope("orion"))
            .await
            .unwrap();
        assert!(excluded.is_empty());
    }

    #[tokio::test]
    async fn test_delete_excludes_from_results_without_rebuild() {
        let dir = TempDir::new().unwrap();
        let mut memory = make_memory(&dir).await;
        let mem = memory
            .add(&NewMemory::new("Uses Windows 11 as primary OS", "shared", "bio"))
            .await
            .unwrap();

        assert!(!memory
            .search("windows primary os", &SearchFilter::new())
            .await
            .unwrap()
            .is_empty());

        memory.delete(&mem.id).unwrap();
        assert!(memory
            .search("windows primary os", &SearchFilter::new())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_update_reflects_new_text() {
        let dir = TempDir::new().unwrap();
        let mut memory = make_memory(&dir).await;
        let mem = memory
            .add(&NewMemory::new("Original topic is astronomy", "shared", "other"))
            .await
            .unwrap();

        memory
            .update(
                &mem.id,
                &MemoryPatch::new().with_text("Replacement topic is volcanology"),
            )
            .await
            .unwrap();

        let hits = memory
            .search("volcanology replacement", &SearchFilter::new())
            .await
            .unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].memory.version, 2);
    }

    #[tokio::test]
    async fn test_rebuild_restores_lost_index() {
        let dir = TempDir::new().unwrap();
        let mut memory = make_memory(&dir).await;
        memory
            .add(&NewMemory::new("The vault survives index loss", "shared", "meta"))
            .await
            .unwrap();

        // Simulate index loss.
        memory.rows.clear();
        memory.id_to_row.clear();
        assert!(memory
            .search("vault survives", &SearchFilter::new())
            .await
            .unwrap()
            .is_empty());

        let indexed = memory.rebuild_index().await.unwrap();
        assert_eq!(indexed, 1);
        assert!(!memory
            .search("vault survives", &SearchFilter::new())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_compact_rebuilds_and_stays_in_sync() {
        let dir = TempDir::new().unwrap();
        let mut memory = make_memory(&dir).await;
        let a = memory
            .add(&NewMemory::new("First fact to keep around", "shared", "meta"))
            .await
            .unwrap();
        let b = memory
            .add(&NewMemory::new("Second fact to delete later", "shared", "meta"))
            .await
            .unwrap();
        memory.delete(&b.id).unwrap();

        let report = memory.compact().await.unwrap();
        assert_eq!(report.lines_after, 1);

        let stats = memory.stats().unwrap();
        assert_eq!(stats.index_vectors, 1);
        assert_eq!(stats.index_tombstoned, 0);
        assert!(stats.in_sync);
        assert_eq!(memory.get(&a.id).unwrap().unwrap().id, a.id);
    }

    #[tokio::test]
    async fn test_remember_converts_rejection_to_status() {
        let dir = TempDir::new().unwrap();
        let mut memory = make_memory(&dir).await;

        let ok = memory
            .remember(
                "Creator keeps a standing desk",
                "shared",
                "bio",
                MemorySource::Chat,
                vec![],
            )
            .await;
        assert!(matches!(ok, RememberStatus::Remembered { .. }));

        let rejected = memory
            .remember(
                "password: hunter2",
                "shared",
                "bio",
                MemorySource::Chat,
                vec![],
            )
            .await;
        match rejected {
            RememberStatus::Rejected { reason } => assert!(reason.contains("PII")),
            RememberStatus::Remembered { .. } => panic!("PII text must be rejected"),
        }
    }

    #[tokio::test]
    async fn test_stats_in_sync_tracks_tombstones() {
        let dir = TempDir::new().unwrap();
        let mut memory = make_memory(&dir).await;
        let a = memory
            .add(&NewMemory::new("Fact one stays", "shared", "meta"))
            .await
            .unwrap();
        memory
            .add(&NewMemory::new("Docker containers use namespaces", "shared", "meta"))
            .await
            .unwrap();
        memory.delete(&a.id).unwrap();

        let stats = memory.stats().unwrap();
        assert_eq!(stats.index_vectors, 2);
        assert_eq!(stats.index_tombstoned, 1);
        assert_eq!(stats.index_effective, 1);
        assert!(stats.in_sync);
    }
}
