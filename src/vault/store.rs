//! Vault Store - append-only JSONL storage for memory records.
//!
//! `TigerStyle`: The log is the source of truth.
//!
//! Every write appends one JSON line; the file is never edited in place
//! except by [`VaultStore::compact`], which atomically replaces the whole
//! file. On read, each id resolves to its highest-version line; ties (which
//! should not occur) resolve by log order, later line wins, because the
//! wall-clock fields are advisory only.
//!
//! The store is a single-writer, single-process design. Each append opens,
//! writes one line, and closes the file - no long-held locks. Concurrent
//! writer processes are out of scope.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use super::dedup::score_pair;
use super::error::{VaultError, VaultResult};
use super::pii::check_pii;
use super::record::{Memory, MemorySource, Tier};
use crate::constants::{
    DEDUP_SIMILARITY_THRESHOLD_DEFAULT, DEDUP_TOKEN_OVERLAP_THRESHOLD_DEFAULT,
    MEMORY_TAGS_COUNT_MAX, MEMORY_TAG_CHARS_MAX, MEMORY_TEXT_CHARS_MAX,
    PRUNE_REGISTER_TEXT_CHARS_MIN, VAULT_ACTIVE_COUNT_MAX_DEFAULT,
};

// =============================================================================
// Configuration
// =============================================================================

/// Tunables for one vault instance.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Composite-similarity threshold for duplicate rejection
    pub similarity_threshold: f64,
    /// Bare token-overlap threshold for duplicate rejection
    pub token_overlap_threshold: f64,
    /// Ceiling on active records; writes of genuinely new ids fail beyond it
    pub max_active: usize,
    /// If set, writes must use one of these scopes; None accepts any
    pub allowed_scopes: Option<BTreeSet<String>>,
}

impl VaultConfig {
    /// Create a config with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the composite-similarity threshold.
    ///
    /// # Panics
    /// Panics if the threshold is not in [0.0, 1.0].
    #[must_use]
    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&threshold),
            "similarity threshold must be in [0.0, 1.0]"
        );
        self.similarity_threshold = threshold;
        self
    }

    /// Set the token-overlap threshold.
    ///
    /// # Panics
    /// Panics if the threshold is not in [0.0, 1.0].
    #[must_use]
    pub fn with_token_overlap_threshold(mut self, threshold: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&threshold),
            "token overlap threshold must be in [0.0, 1.0]"
        );
        self.token_overlap_threshold = threshold;
        self
    }

    /// Set the active-record ceiling.
    ///
    /// # Panics
    /// Panics if `max_active` is zero.
    #[must_use]
    pub fn with_max_active(mut self, max_active: usize) -> Self {
        assert!(max_active > 0, "max_active must be positive");
        self.max_active = max_active;
        self
    }

    /// Restrict writes to an explicit scope set (e.g. `shared` + agent names).
    #[must_use]
    pub fn with_allowed_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_scopes = Some(
            scopes
                .into_iter()
                .map(|s| s.into().to_lowercase())
                .collect(),
        );
        self
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEDUP_SIMILARITY_THRESHOLD_DEFAULT,
            token_overlap_threshold: DEDUP_TOKEN_OVERLAP_THRESHOLD_DEFAULT,
            max_active: VAULT_ACTIVE_COUNT_MAX_DEFAULT,
            allowed_scopes: None,
        }
    }
}

// =============================================================================
// Write Requests
// =============================================================================

/// A new-memory write request.
#[derive(Debug, Clone)]
pub struct NewMemory {
    /// The fact content
    pub text: String,
    /// Visibility namespace
    pub scope: String,
    /// Freeform category label
    pub category: String,
    /// Ordered free-text labels
    pub tags: Vec<String>,
    /// Provenance
    pub source: MemorySource,
    /// Lifecycle tier
    pub tier: Tier,
    /// Stable key for register upserts
    pub topic_id: Option<String>,
}

impl NewMemory {
    /// Create a request with the required fields; tier defaults to canon.
    #[must_use]
    pub fn new(text: impl Into<String>, scope: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            scope: scope.into(),
            category: category.into(),
            tags: Vec::new(),
            source: MemorySource::Manual,
            tier: Tier::Canon,
            topic_id: None,
        }
    }

    /// Set tags.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Set the provenance.
    #[must_use]
    pub fn with_source(mut self, source: MemorySource) -> Self {
        self.source = source;
        self
    }

    /// Set the tier.
    #[must_use]
    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = tier;
        self
    }

    /// Set the register topic key.
    #[must_use]
    pub fn with_topic_id(mut self, topic_id: impl Into<String>) -> Self {
        self.topic_id = Some(topic_id.into());
        self
    }
}

/// A partial update to an existing record. Unset fields are preserved.
#[derive(Debug, Clone, Default)]
pub struct MemoryPatch {
    /// Replacement text
    pub text: Option<String>,
    /// Replacement category
    pub category: Option<String>,
    /// Replacement tags
    pub tags: Option<Vec<String>>,
    /// Replacement tier
    pub tier: Option<Tier>,
    /// Replacement topic key
    pub topic_id: Option<String>,
}

impl MemoryPatch {
    /// Create an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set replacement text.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Set replacement category.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into().to_lowercase());
        self
    }

    /// Set replacement tags.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    /// Set replacement tier.
    #[must_use]
    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = Some(tier);
        self
    }

    /// Set replacement topic key.
    #[must_use]
    pub fn with_topic_id(mut self, topic_id: impl Into<String>) -> Self {
        self.topic_id = Some(topic_id.into());
        self
    }
}

// =============================================================================
// Read Filters and Reports
// =============================================================================

/// Filter for [`VaultStore::recall`] listing.
#[derive(Debug, Clone, Default)]
pub struct RecallFilter {
    /// Restrict to these scopes; None means all scopes
    pub scopes: Option<Vec<String>>,
    /// Restrict to one category
    pub category: Option<String>,
    /// Keep records sharing at least one of these tags
    pub tags: Option<Vec<String>>,
    /// Maximum results; None means unlimited
    pub limit: Option<usize>,
}

impl RecallFilter {
    /// Create an unrestricted filter.
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

    /// Restrict to records sharing at least one tag.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    /// Cap the number of results.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
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
        if let Some(tags) = &self.tags {
            if !tags.iter().any(|t| mem.tags.contains(t)) {
                return false;
            }
        }
        true
    }
}

/// Outcome of a [`VaultStore::bulk_delete`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkDeleteReport {
    /// Ids that were tombstoned
    pub deleted: Vec<String>,
    /// Ids with no active record
    pub not_found: Vec<String>,
}

/// One stored item from a [`VaultStore::bulk_add`].
#[derive(Debug, Clone, Serialize)]
pub struct BulkStored {
    /// Position in the input slice
    pub index: usize,
    /// Assigned memory id
    pub id: String,
}

/// One rejected item from a [`VaultStore::bulk_add`].
#[derive(Debug, Clone, Serialize)]
pub struct BulkRejected {
    /// Position in the input slice
    pub index: usize,
    /// Rejection description
    pub message: String,
}

/// Outcome of a [`VaultStore::bulk_add`]. Item failures never abort the batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkAddReport {
    /// Items written, in input order
    pub stored: Vec<BulkStored>,
    /// Items rejected, in input order
    pub errors: Vec<BulkRejected>,
}

/// Outcome of a [`VaultStore::compact`].
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CompactReport {
    /// Raw line count before the rewrite
    pub lines_before: usize,
    /// Line count after (equals the active-record count)
    pub lines_after: usize,
    /// Lines dropped (old versions and tombstones)
    pub lines_removed: usize,
}

/// A pair of similar records surfaced for operator review.
#[derive(Debug, Clone, Serialize)]
pub struct ConsolidationCandidate {
    /// First record of the pair
    pub a: Memory,
    /// Second record of the pair
    pub b: Memory,
    /// Composite similarity score
    pub score: f64,
}

/// A pruning suggestion. Informational only; nothing is deleted.
#[derive(Debug, Clone, Serialize)]
pub struct DeletionProposal {
    /// Candidate record id
    pub id: String,
    /// Why this record looks prunable
    pub reason: String,
}

/// Vault health counters.
#[derive(Debug, Clone, Serialize)]
pub struct VaultStats {
    /// Active (latest version, not tombstoned) record count
    pub active_count: usize,
    /// Ids whose latest version is a tombstone
    pub deleted_count: usize,
    /// Raw line count in the log
    pub raw_lines: usize,
    /// Configured active ceiling
    pub max_active: usize,
    /// active / max, as a percentage rounded to one decimal
    pub utilization_pct: f64,
    /// Active counts per scope
    pub by_scope: BTreeMap<String, usize>,
    /// Active counts per category
    pub by_category: BTreeMap<String, usize>,
    /// Active counts per tier
    pub by_tier: BTreeMap<String, usize>,
    /// Distinct (scope, topic) keys among active register records
    pub register_topics: usize,
    /// Lines a compact would remove
    pub compactable_lines: usize,
    /// raw / active ratio, rounded to one decimal
    pub bloat_ratio: f64,
}

// =============================================================================
// VaultStore
// =============================================================================

/// Append-only JSONL storage for [`Memory`] records.
#[derive(Debug)]
pub struct VaultStore {
    path: PathBuf,
    config: VaultConfig,
}

impl VaultStore {
    /// Open (or create) a vault at the given path.
    ///
    /// # Errors
    /// Returns `VaultError::Io` if the parent directory cannot be created.
    pub fn open(path: impl Into<PathBuf>, config: VaultConfig) -> VaultResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self { path, config })
    }

    /// The vault file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The vault configuration.
    #[must_use]
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // Write operations
    // -------------------------------------------------------------------------

    /// Validate and store a new memory. One appended line on success.
    ///
    /// The write gate runs in order: text validation, tier/journal-signal
    /// exclusion, scope/category/tag validation, PII check, register-topic
    /// upsert, duplicate scan (same scope only), capacity ceiling.
    ///
    /// # Errors
    /// `Validation`, `Pii`, `Duplicate`, or `CapacityExceeded` on
    /// rejection; `Io`/`Serde` on storage failure.
    pub fn add(&self, req: &NewMemory) -> VaultResult<Memory> {
        let text = req.text.trim();
        if text.is_empty() {
            return Err(VaultError::validation("memory text must not be empty"));
        }
        let chars = text.chars().count();
        if chars > MEMORY_TEXT_CHARS_MAX {
            return Err(VaultError::validation(format!(
                "memory text too long: {chars} chars (max {MEMORY_TEXT_CHARS_MAX})"
            )));
        }
        if !req.tier.is_storable() {
            return Err(VaultError::validation(
                "log tier is journal-only and never stored in the vault",
            ));
        }
        if Memory::has_journal_signal(text) {
            return Err(VaultError::validation(
                "text matches a journal-only signal phrase",
            ));
        }

        let scope = self.validate_scope(&req.scope)?;
        let category = validate_category(&req.category)?;
        validate_tags(&req.tags)?;

        let violations = check_pii(text);
        if !violations.is_empty() {
            return Err(VaultError::pii(&violations));
        }

        let resolved = self.resolve_latest()?;
        let active: Vec<&Memory> = resolved.values().filter(|m| m.is_active()).collect();

        // Register upsert: same (scope, topic) updates in place instead of
        // creating a new id, so it bypasses dedup and the capacity ceiling.
        if req.tier == Tier::Register {
            if let Some(topic) = &req.topic_id {
                if let Some(existing) = active
                    .iter()
                    .find(|m| {
                        m.tier == Tier::Register
                            && m.scope == scope
                            && m.topic_id.as_deref() == Some(topic.as_str())
                    })
                {
                    let mut next = existing.next_version(Utc::now());
                    next.text = text.to_string();
                    next.category = category;
                    if !req.tags.is_empty() {
                        next.tags = req.tags.clone();
                    }
                    self.append(&next)?;
                    return Ok(next);
                }
            }
        }

        for existing in active.iter().filter(|m| m.scope == scope) {
            let score = score_pair(text, &existing.text);
            if score.is_duplicate(
                self.config.similarity_threshold,
                self.config.token_overlap_threshold,
            ) {
                return Err(VaultError::duplicate(
                    existing.id.clone(),
                    score.composite.max(score.token_overlap),
                ));
            }
        }

        if active.len() >= self.config.max_active {
            return Err(VaultError::CapacityExceeded {
                active: active.len(),
                max: self.config.max_active,
            });
        }

        let mem = Memory {
            id: Memory::new_id(),
            version: 1,
            created_at: Utc::now(),
            updated_at: None,
            tier: req.tier,
            topic_id: req.topic_id.clone(),
            source: req.source,
            scope,
            category,
            tags: req.tags.clone(),
            deleted_at: None,
            text: text.to_string(),
        };
        self.append(&mem)?;
        Ok(mem)
    }

    /// Store several memories in one call. Item rejections are collected
    /// per index and never abort the rest of the batch.
    #[must_use]
    pub fn bulk_add(&self, items: &[NewMemory]) -> BulkAddReport {
        let mut report = BulkAddReport::default();
        for (index, item) in items.iter().enumerate() {
            match self.add(item) {
                Ok(mem) => report.stored.push(BulkStored { index, id: mem.id }),
                Err(err) => report.errors.push(BulkRejected {
                    index,
                    message: err.to_string(),
                }),
            }
        }
        report
    }

    /// Append a new version of an existing record.
    ///
    /// Immutable fields (scope, `created_at`, source) are preserved.
    ///
    /// # Errors
    /// `NotFound` if the id has no active record; `Validation`/`Pii` if the
    /// replacement text fails the gate.
    pub fn update(&self, id: &str, patch: &MemoryPatch) -> VaultResult<Memory> {
        let resolved = self.resolve_latest()?;
        let current = resolved
            .get(id)
            .filter(|m| m.is_active())
            .ok_or_else(|| VaultError::not_found(id))?;

        let new_text = match &patch.text {
            Some(raw) => {
                let text = raw.trim();
                if text.is_empty() {
                    return Err(VaultError::validation("memory text must not be empty"));
                }
                let chars = text.chars().count();
                if chars > MEMORY_TEXT_CHARS_MAX {
                    return Err(VaultError::validation(format!(
                        "memory text too long: {chars} chars (max {MEMORY_TEXT_CHARS_MAX})"
                    )));
                }
                let violations = check_pii(text);
                if !violations.is_empty() {
                    return Err(VaultError::pii(&violations));
                }
                Some(text.to_string())
            }
            None => None,
        };

        let mut next = current.next_version(Utc::now());
        if let Some(text) = new_text {
            next.text = text;
        }
        if let Some(category) = &patch.category {
            next.category = validate_category(category)?;
        }
        if let Some(tags) = &patch.tags {
            validate_tags(tags)?;
            next.tags = tags.clone();
        }
        if let Some(tier) = patch.tier {
            if !tier.is_storable() {
                return Err(VaultError::validation(
                    "log tier is journal-only and never stored in the vault",
                ));
            }
            next.tier = tier;
        }
        if let Some(topic_id) = &patch.topic_id {
            next.topic_id = Some(topic_id.clone());
        }

        self.append(&next)?;
        Ok(next)
    }

    /// Upsert keyed by `(scope, topic_id)`: update the matching active
    /// register record, or create one with tier forced to register.
    ///
    /// # Errors
    /// Propagates the underlying `add`/`update` rejections.
    pub fn update_by_topic(
        &self,
        topic_id: &str,
        scope: &str,
        text: &str,
        category: Option<&str>,
    ) -> VaultResult<Memory> {
        let scope = self.validate_scope(scope)?;
        let existing = self
            .read_active()?
            .into_iter()
            .find(|m| {
                m.tier == Tier::Register
                    && m.scope == scope
                    && m.topic_id.as_deref() == Some(topic_id)
            });

        match existing {
            Some(current) => {
                let mut patch = MemoryPatch::new().with_text(text);
                if let Some(category) = category {
                    patch = patch.with_category(category);
                }
                self.update(&current.id, &patch)
            }
            None => {
                let mut req = NewMemory::new(text, scope, category.unwrap_or("other"))
                    .with_tier(Tier::Register)
                    .with_topic_id(topic_id);
                req.source = MemorySource::Tool;
                self.add(&req)
            }
        }
    }

    /// Soft-delete by appending a tombstone. Returns false if no active
    /// record exists for the id.
    ///
    /// # Errors
    /// `Io`/`Serde` on storage failure only; a missing id is not an error.
    pub fn delete(&self, id: &str) -> VaultResult<bool> {
        let resolved = self.resolve_latest()?;
        let Some(current) = resolved.get(id).filter(|m| m.is_active()) else {
            return Ok(false);
        };
        self.append(&current.tombstone(Utc::now()))?;
        Ok(true)
    }

    /// Soft-delete several ids, partitioning them by whether an active
    /// record existed. Missing ids never abort the batch.
    ///
    /// # Errors
    /// `Io`/`Serde` on storage failure only.
    pub fn bulk_delete(&self, ids: &[String]) -> VaultResult<BulkDeleteReport> {
        let resolved = self.resolve_latest()?;
        let now = Utc::now();
        let mut report = BulkDeleteReport::default();
        // Ids tombstoned earlier in this same batch must not match twice.
        let mut done: HashSet<&str> = HashSet::new();

        for id in ids {
            let current = resolved
                .get(id.as_str())
                .filter(|m| m.is_active() && !done.contains(m.id.as_str()));
            match current {
                Some(current) => {
                    self.append(&current.tombstone(now))?;
                    done.insert(&current.id);
                    report.deleted.push(id.clone());
                }
                None => report.not_found.push(id.clone()),
            }
        }
        Ok(report)
    }

    /// Rewrite an existing record as canon with new text and provenance
    /// `promotion`, as a single appended version.
    ///
    /// # Errors
    /// `NotFound` if the id has no active record; `Validation`/`Pii` if the
    /// replacement text fails the gate.
    pub fn promote_to_canon(
        &self,
        id: &str,
        new_text: &str,
        tags: Option<Vec<String>>,
    ) -> VaultResult<Memory> {
        let resolved = self.resolve_latest()?;
        let current = resolved
            .get(id)
            .filter(|m| m.is_active())
            .ok_or_else(|| VaultError::not_found(id))?;

        let text = new_text.trim();
        if text.is_empty() {
            return Err(VaultError::validation("memory text must not be empty"));
        }
        let chars = text.chars().count();
        if chars > MEMORY_TEXT_CHARS_MAX {
            return Err(VaultError::validation(format!(
                "memory text too long: {chars} chars (max {MEMORY_TEXT_CHARS_MAX})"
            )));
        }
        let violations = check_pii(text);
        if !violations.is_empty() {
            return Err(VaultError::pii(&violations));
        }

        let mut promoted = current.next_version(Utc::now());
        promoted.text = text.to_string();
        promoted.tier = Tier::Canon;
        promoted.source = MemorySource::Promotion;
        if let Some(tags) = tags {
            validate_tags(&tags)?;
            promoted.tags = tags;
        }
        self.append(&promoted)?;
        Ok(promoted)
    }

    // -------------------------------------------------------------------------
    // Read operations
    // -------------------------------------------------------------------------

    /// Read every raw line: all versions, including tombstones.
    ///
    /// # Errors
    /// `Io` if the file cannot be read, `Serde` on a corrupt line.
    pub fn read_all(&self) -> VaultResult<Vec<Memory>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = fs::File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            records.push(serde_json::from_str(line)?);
        }
        Ok(records)
    }

    /// Resolve each id to its highest-version record. This is the canonical
    /// read algorithm every other read builds on. Ties resolve by log order
    /// (later line wins); wall-clock fields are never compared.
    ///
    /// # Errors
    /// Same as [`VaultStore::read_all`].
    pub fn resolve_latest(&self) -> VaultResult<BTreeMap<String, Memory>> {
        let mut latest: BTreeMap<String, Memory> = BTreeMap::new();
        for mem in self.read_all()? {
            match latest.get(&mem.id) {
                Some(prev) if mem.version < prev.version => {}
                _ => {
                    latest.insert(mem.id.clone(), mem);
                }
            }
        }
        Ok(latest)
    }

    /// Return only non-deleted latest-version records.
    ///
    /// # Errors
    /// Same as [`VaultStore::read_all`].
    pub fn read_active(&self) -> VaultResult<Vec<Memory>> {
        Ok(self
            .resolve_latest()?
            .into_values()
            .filter(Memory::is_active)
            .collect())
    }

    /// Get a single memory by id (latest version, active only).
    ///
    /// # Errors
    /// Same as [`VaultStore::read_all`].
    pub fn get(&self, id: &str) -> VaultResult<Option<Memory>> {
        Ok(self
            .resolve_latest()?
            .remove(id)
            .filter(Memory::is_active))
    }

    /// List active memories matching a filter, newest first.
    ///
    /// # Errors
    /// Same as [`VaultStore::read_all`].
    pub fn recall(&self, filter: &RecallFilter) -> VaultResult<Vec<Memory>> {
        let mut results: Vec<Memory> = self
            .read_active()?
            .into_iter()
            .filter(|m| filter.matches(m))
            .collect();
        results.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filter.limit {
            results.truncate(limit);
        }
        Ok(results)
    }

    // -------------------------------------------------------------------------
    // Maintenance
    // -------------------------------------------------------------------------

    /// Rewrite the log to exactly the active latest-version records, sorted
    /// by (category, `created_at`) for deterministic diffing. The rewrite is
    /// atomic: a temp file is renamed over the original, so a crash
    /// mid-compact cannot corrupt the log.
    ///
    /// # Errors
    /// `Io`/`Serde` on failure; the original file is untouched on error.
    pub fn compact(&self) -> VaultResult<CompactReport> {
        let lines_before = self.read_all()?.len();
        let mut active = self.read_active()?;
        active.sort_by(|a, b| {
            (a.category.as_str(), a.created_at, a.id.as_str())
                .cmp(&(b.category.as_str(), b.created_at, b.id.as_str()))
        });

        let tmp_path = self.path.with_extension("jsonl.compact.tmp");
        {
            let mut tmp = fs::File::create(&tmp_path)?;
            for mem in &active {
                serde_json::to_writer(&mut tmp, mem)?;
                tmp.write_all(b"\n")?;
            }
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        let report = CompactReport {
            lines_before,
            lines_after: active.len(),
            lines_removed: lines_before - active.len(),
        };
        info!(
            removed = report.lines_removed,
            remaining = report.lines_after,
            "vault compacted"
        );
        Ok(report)
    }

    /// Pairwise-score all active records in a scope and return pairs at or
    /// above the floor, best first. Review-only: nothing is merged.
    ///
    /// # Errors
    /// Same as [`VaultStore::read_all`].
    pub fn find_consolidation_candidates(
        &self,
        scope: &str,
        similarity_floor: f64,
    ) -> VaultResult<Vec<ConsolidationCandidate>> {
        let scope = scope.to_lowercase();
        let in_scope: Vec<Memory> = self
            .read_active()?
            .into_iter()
            .filter(|m| m.scope == scope)
            .collect();

        let mut pairs = Vec::new();
        for i in 0..in_scope.len() {
            for j in (i + 1)..in_scope.len() {
                let score = score_pair(&in_scope[i].text, &in_scope[j].text).composite;
                if score >= similarity_floor {
                    pairs.push(ConsolidationCandidate {
                        a: in_scope[i].clone(),
                        b: in_scope[j].clone(),
                        score,
                    });
                }
            }
        }
        pairs.sort_by(|x, y| y.score.total_cmp(&x.score));
        Ok(pairs)
    }

    /// Heuristic pruning candidates: very short register-tier notes with no
    /// topic continuation. Informational only, no side effects.
    ///
    /// # Errors
    /// Same as [`VaultStore::read_all`].
    pub fn propose_deletions(&self, scope: &str) -> VaultResult<Vec<DeletionProposal>> {
        let scope = scope.to_lowercase();
        let mut proposals = Vec::new();
        for mem in self.read_active()? {
            if mem.scope != scope {
                continue;
            }
            let chars = mem.text.chars().count();
            if mem.tier == Tier::Register
                && mem.topic_id.is_none()
                && chars < PRUNE_REGISTER_TEXT_CHARS_MIN
            {
                proposals.push(DeletionProposal {
                    id: mem.id,
                    reason: format!(
                        "very short register note ({chars} chars) with no topic continuation"
                    ),
                });
            }
        }
        Ok(proposals)
    }

    /// Render the continuity snapshot for a scope: all active canon records
    /// plus register records that carry a `topic_id`. Topicless registers
    /// are excluded - they cannot be meaningfully tracked over time.
    ///
    /// # Errors
    /// Same as [`VaultStore::read_all`].
    pub fn build_snapshot(&self, scope: &str) -> VaultResult<String> {
        let scope = scope.to_lowercase();
        let mut canon: Vec<Memory> = Vec::new();
        let mut registers: Vec<Memory> = Vec::new();
        for mem in self.read_active()? {
            if mem.scope != scope {
                continue;
            }
            match mem.tier {
                Tier::Canon => canon.push(mem),
                Tier::Register if mem.topic_id.is_some() => registers.push(mem),
                _ => {}
            }
        }
        canon.sort_by(|a, b| (a.category.clone(), a.created_at).cmp(&(b.category.clone(), b.created_at)));
        registers.sort_by(|a, b| a.topic_id.cmp(&b.topic_id));

        let mut out = format!("# Memory Snapshot - {scope}\n\n## Canon\n\n");
        if canon.is_empty() {
            out.push_str("(none)\n");
        }
        for mem in &canon {
            out.push_str(&format!("- [{}] {}\n", mem.category, mem.text));
        }
        out.push_str("\n## Active Registers\n\n");
        if registers.is_empty() {
            out.push_str("(none)\n");
        }
        for mem in &registers {
            let topic = mem.topic_id.as_deref().unwrap_or_default();
            out.push_str(&format!("- **{topic}** ({}): {}\n", mem.category, mem.text));
        }
        Ok(out)
    }

    /// Vault health counters: active/deleted/raw counts, utilization against
    /// the ceiling, per-scope/category/tier breakdowns, and bloat ratio.
    ///
    /// # Errors
    /// Same as [`VaultStore::read_all`].
    pub fn vault_stats(&self) -> VaultResult<VaultStats> {
        let raw = self.read_all()?;
        let resolved = {
            let mut latest: BTreeMap<&str, &Memory> = BTreeMap::new();
            for mem in &raw {
                match latest.get(mem.id.as_str()) {
                    Some(prev) if mem.version < prev.version => {}
                    _ => {
                        latest.insert(&mem.id, mem);
                    }
                }
            }
            latest
        };
        let active: Vec<&Memory> = resolved.values().filter(|m| m.is_active()).copied().collect();

        let mut by_scope = BTreeMap::new();
        let mut by_category = BTreeMap::new();
        let mut by_tier = BTreeMap::new();
        let mut topics: HashSet<(String, String)> = HashSet::new();
        for mem in &active {
            *by_scope.entry(mem.scope.clone()).or_insert(0) += 1;
            *by_category.entry(mem.category.clone()).or_insert(0) += 1;
            *by_tier.entry(mem.tier.to_string()).or_insert(0) += 1;
            if mem.tier == Tier::Register {
                if let Some(topic) = &mem.topic_id {
                    topics.insert((mem.scope.clone(), topic.clone()));
                }
            }
        }

        #[allow(clippy::cast_precision_loss)]
        let utilization_pct = if self.config.max_active == 0 {
            0.0
        } else {
            round1(active.len() as f64 / self.config.max_active as f64 * 100.0)
        };
        #[allow(clippy::cast_precision_loss)]
        let bloat_ratio = round1(raw.len() as f64 / active.len().max(1) as f64);

        Ok(VaultStats {
            active_count: active.len(),
            deleted_count: resolved.len() - active.len(),
            raw_lines: raw.len(),
            max_active: self.config.max_active,
            utilization_pct,
            by_scope,
            by_category,
            by_tier,
            register_topics: topics.len(),
            compactable_lines: raw.len().saturating_sub(active.len()),
            bloat_ratio,
        })
    }

    // -------------------------------------------------------------------------
    // Internal
    // -------------------------------------------------------------------------

    fn append(&self, mem: &Memory) -> VaultResult<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = serde_json::to_string(mem)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        Ok(())
    }

    fn validate_scope(&self, scope: &str) -> VaultResult<String> {
        let scope = scope.trim().to_lowercase();
        if scope.is_empty() {
            return Err(VaultError::validation("scope must not be empty"));
        }
        if let Some(allowed) = &self.config.allowed_scopes {
            if !allowed.contains(&scope) {
                return Err(VaultError::validation(format!("invalid scope '{scope}'")));
            }
        }
        Ok(scope)
    }
}

fn validate_category(category: &str) -> VaultResult<String> {
    let category = category.trim().to_lowercase();
    if category.is_empty() {
        return Err(VaultError::validation("category must not be empty"));
    }
    Ok(category)
}

fn validate_tags(tags: &[String]) -> VaultResult<()> {
    if tags.len() > MEMORY_TAGS_COUNT_MAX {
        return Err(VaultError::validation(format!(
            "too many tags: {} (max {MEMORY_TAGS_COUNT_MAX})",
            tags.len()
        )));
    }
    for tag in tags {
        if tag.chars().count() > MEMORY_TAG_CHARS_MAX {
            return Err(VaultError::validation(format!(
                "tag too long: '{tag}' (max {MEMORY_TAG_CHARS_MAX} chars)"
            )));
        }
    }
    Ok(())
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

// =============================================================================
// Tests
// =============================================================================
