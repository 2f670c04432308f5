//! Memory record model - identity, versioning, and the tier taxonomy.
//!
//! `TigerStyle`: Explicit types, validation at construction.
//!
//! # Memory Taxonomy (three tiers)
//!
//! - **Canon** - durable invariants: mission, identity, hard constraints,
//!   stable bio facts. Rarely change, high injection priority.
//! - **Register** - mutable state registers: one record per `topic_id`,
//!   updated in place via append-only version bumps.
//! - **Log** - ephemeral events: tick markers, runtime snapshots, check-ins.
//!   These never belong in the vault; the write gate rejects them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Phrases that almost always signal ephemeral, journal-only content.
/// The write gate rejects any text containing one of these.
pub const JOURNAL_ONLY_SIGNALS: &[&str] = &[
    "tick marker",
    "runtime snapshot",
    "check-in",
    "heartbeat",
    "no changes",
    "nothing to report",
    "status unchanged",
    "routine scan",
    "ephemeral",
];

// =============================================================================
// Tier
// =============================================================================

/// Lifecycle classification of a memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Durable, rarely changes, high injection priority
    Canon,
    /// Mutable, keyed by `topic_id`; latest version replaces prior state
    Register,
    /// Ephemeral; rejected at the write gate, never stored
    Log,
}

impl Tier {
    /// Get string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Canon => "canon",
            Self::Register => "register",
            Self::Log => "log",
        }
    }

    /// Parse from string (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "canon" => Some(Self::Canon),
            "register" => Some(Self::Register),
            "log" => Some(Self::Log),
            _ => None,
        }
    }

    /// Whether this tier may be persisted to the vault.
    #[must_use]
    pub fn is_storable(&self) -> bool {
        !matches!(self, Self::Log)
    }
}

impl Default for Tier {
    // Records written before the tier field existed are canon.
    fn default() -> Self {
        Self::Canon
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Source
// =============================================================================

/// Provenance of a memory record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemorySource {
    /// Captured from a conversation
    Chat,
    /// Entered by a human operator through the vault API
    Manual,
    /// Written by an agent tool call or end-of-tick flush
    Tool,
    /// Operator-issued maintenance write
    Operator,
    /// Result of a register-to-canon promotion
    Promotion,
}

impl MemorySource {
    /// Get string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Manual => "manual",
            Self::Tool => "tool",
            Self::Operator => "operator",
            Self::Promotion => "promotion",
        }
    }

    /// Parse from string (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "chat" => Some(Self::Chat),
            "manual" => Some(Self::Manual),
            "tool" => Some(Self::Tool),
            "operator" => Some(Self::Operator),
            "promotion" => Some(Self::Promotion),
            _ => None,
        }
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::Manual
    }
}

impl std::fmt::Display for MemorySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Memory
// =============================================================================

/// A single memory record in the vault.
///
/// One JSON line in the vault file per version. The `id` is stable across
/// versions; the active state of an id is its highest-version line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    /// Opaque 12-char identifier, stable across versions
    pub id: String,
    /// Monotonically increasing version per id, starting at 1
    #[serde(default = "default_version")]
    pub version: u32,
    /// Creation timestamp (RFC 3339, UTC)
    pub created_at: DateTime<Utc>,
    /// Last update timestamp; None until the first update
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Lifecycle tier (records from before the field default to canon)
    #[serde(default)]
    pub tier: Tier,
    /// Stable key for register-tier upserts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_id: Option<String>,
    /// Provenance
    #[serde(default)]
    pub source: MemorySource,
    /// Visibility namespace: `shared` or an agent-specific scope
    pub scope: String,
    /// Freeform label (bio, preference, project, goal, meta, ...)
    pub category: String,
    /// Ordered free-text labels
    #[serde(default)]
    pub tags: Vec<String>,
    /// Tombstone marker; set means the record is inactive
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    /// The fact content
    pub text: String,
}

fn default_version() -> u32 {
    1
}

impl Memory {
    /// A record is active iff its latest version has no tombstone.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Generate a fresh 12-char opaque id.
    #[must_use]
    pub fn new_id() -> String {
        let hex = uuid::Uuid::new_v4().simple().to_string();
        hex[..crate::constants::MEMORY_ID_CHARS].to_string()
    }

    /// Derive the next version of this record with updated fields.
    ///
    /// Immutable fields (id, scope, `created_at`, source) are preserved;
    /// version increments and `updated_at` is stamped.
    #[must_use]
    pub fn next_version(&self, now: DateTime<Utc>) -> Memory {
        Memory {
            id: self.id.clone(),
            version: self.version + 1,
            created_at: self.created_at,
            updated_at: Some(now),
            tier: self.tier,
            topic_id: self.topic_id.clone(),
            source: self.source,
            scope: self.scope.clone(),
            category: self.category.clone(),
            tags: self.tags.clone(),
            deleted_at: None,
            text: self.text.clone(),
        }
    }

    /// Derive a tombstone version of this record.
    #[must_use]
    pub fn tombstone(&self, now: DateTime<Utc>) -> Memory {
        let mut next = self.next_version(now);
        next.updated_at = self.updated_at;
        next.deleted_at = Some(now);
        next
    }

    /// Whether the lowercased text contains a journal-only signal phrase.
    #[must_use]
    pub fn has_journal_signal(text: &str) -> bool {
        let lower = text.to_lowercase();
        JOURNAL_ONLY_SIGNALS.iter().any(|s| lower.contains(s))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_roundtrip() {
        assert_eq!(Tier::parse("canon"), Some(Tier::Canon));
        assert_eq!(Tier::parse("REGISTER"), Some(Tier::Register));
        assert_eq!(Tier::parse("log"), Some(Tier::Log));
        assert_eq!(Tier::parse("ephemeral"), None);
        assert_eq!(Tier::Canon.as_str(), "canon");
    }

    #[test]
    fn test_log_tier_not_storable() {
        assert!(Tier::Canon.is_storable());
        assert!(Tier::Register.is_storable());
        assert!(!Tier::Log.is_storable());
    }

    #[test]
    fn test_source_parse() {
        assert_eq!(MemorySource::parse("tool"), Some(MemorySource::Tool));
        assert_eq!(
            MemorySource::parse("Promotion"),
            Some(MemorySource::Promotion)
        );
        assert_eq!(MemorySource::parse("invalid_src"), None);
    }

    #[test]
    fn test_new_id_length() {
        let id = Memory::new_id();
        assert_eq!(id.len(), 12);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_next_version_preserves_immutable_fields() {
        let now = Utc::now();
        let mem = Memory {
            id: "abc123def456".into(),
            version: 1,
            created_at: now,
            updated_at: None,
            tier: Tier::Register,
            topic_id: Some("current_projects".into()),
            source: MemorySource::Chat,
            scope: "shared".into(),
            category: "project".into(),
            tags: vec!["test".into()],
            deleted_at: None,
            text: "Working on the dashboard".into(),
        };

        let later = now + chrono::Duration::seconds(5);
        let next = mem.next_version(later);
        assert_eq!(next.id, mem.id);
        assert_eq!(next.version, 2);
        assert_eq!(next.created_at, mem.created_at);
        assert_eq!(next.updated_at, Some(later));
        assert_eq!(next.source, MemorySource::Chat);
        assert!(next.is_active());
    }

    #[test]
    fn test_tombstone_marks_inactive() {
        let now = Utc::now();
        let mem = Memory {
            id: "abc123def456".into(),
            version: 3,
            created_at: now,
            updated_at: Some(now),
            tier: Tier::Canon,
            topic_id: None,
            source: MemorySource::Manual,
            scope: "shared".into(),
            category: "bio".into(),
            tags: vec![],
            deleted_at: None,
            text: "fact".into(),
        };

        let stone = mem.tombstone(now);
        assert_eq!(stone.version, 4);
        assert!(!stone.is_active());
        assert_eq!(stone.text, mem.text);
    }

    #[test]
    fn test_journal_signal_detection() {
        assert!(Memory::has_journal_signal("tick marker for burst 5"));
        assert!(Memory::has_journal_signal(
            "Routine scan complete, nothing to report"
        ));
        assert!(!Memory::has_journal_signal("Creator prefers dark mode"));
    }

    #[test]
    fn test_serde_backward_compat_defaults() {
        // A line written before tier/topic_id/version existed still parses.
        let line = r#"{"id":"old123old123","text":"Some old memory","scope":"shared","category":"bio","tags":["legacy"],"created_at":"2026-01-01T00:00:00Z","updated_at":null,"deleted_at":null}"#;
        let mem: Memory = serde_json::from_str(line).unwrap();
        assert_eq!(mem.tier, Tier::Canon);
        assert_eq!(mem.topic_id, None);
        assert_eq!(mem.version, 1);
        assert_eq!(mem.source, MemorySource::Manual);
        assert!(mem.is_active());
    }

    #[test]
    fn test_serde_roundtrip_preserves_tier_and_topic() {
        let mem = Memory {
            id: "abc123def456".into(),
            version: 2,
            created_at: Utc::now(),
            updated_at: None,
            tier: Tier::Register,
            topic_id: Some("current_projects".into()),
            source: MemorySource::Tool,
            scope: "shared".into(),
            category: "project".into(),
            tags: vec![],
            deleted_at: None,
            text: "Current projects: dashboard".into(),
        };
        let line = serde_json::to_string(&mem).unwrap();
        let back: Memory = serde_json::from_str(&line).unwrap();
        assert_eq!(back, mem);
    }
}
