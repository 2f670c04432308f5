//! Boundary contact handling - deterministic denials and structured audit.
//!
//! When the model requests a tool or capability outside its allowed set,
//! the runtime does NOT crash or raise. Instead it:
//!
//! 1. Builds a deterministic denial payload, returned to the model as a
//!    normal tool result so it can continue reasoning.
//! 2. Appends a structured `boundary_request` event to an append-only
//!    JSONL audit log.
//!
//! The host is the sole authority on tool availability. The model may
//! *request* expanded capability via the payload's `how_to_enable` field,
//! but it cannot grant itself access. A denial is terminal for that
//! attempt; the model may re-request on a later step.
//!
//! Deterministic means identical inputs always produce a byte-identical
//! payload shape; timestamps live only in the audit event.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

// =============================================================================
// Risk classification
// =============================================================================

/// Baseline risk of a denied capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Read-only, internal
    Low,
    /// Writes to internal stores
    Med,
    /// External I/O or system access
    High,
}

impl RiskLevel {
    /// Get string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Med => "med",
            Self::High => "high",
        }
    }
}

static RISK_MAP: Lazy<HashMap<&'static str, RiskLevel>> = Lazy::new(|| {
    use RiskLevel::{High, Low, Med};
    HashMap::from([
        // Low risk: read-only, internal
        ("memory.recall", Low),
        ("memory.search", Low),
        ("memory.get", Low),
        ("memory.list", Low),
        ("memory.stats", Low),
        ("runtime_info", Low),
        // Medium risk: writes to internal stores
        ("memory.add", Med),
        ("memory.remember", Med),
        ("memory.bulk_add", Med),
        ("memory.update", Med),
        ("memory.delete", Med),
        ("memory.bulk_delete", Med),
        ("memory.compact", Med),
        ("memory.rebuild_index", Med),
        ("task_queue", Med),
        ("task_queue.add", Med),
        ("task_queue.next", Med),
        ("task_queue.ack", Med),
        // High risk: external I/O, system access (base names for fallback)
        ("web", High),
        ("web.search", High),
        ("web.fetch", High),
        ("email", High),
        ("email.send", High),
        ("filesystem", High),
        ("filesystem.read", High),
        ("filesystem.write", High),
        ("shell", High),
        ("shell.exec", High),
        ("http", High),
        ("http.request", High),
    ])
});

/// Classify a tool/capability name into a risk level.
///
/// Exact matches are checked first, then the base name before the first
/// dot. Wholly unknown tools default to `med`.
#[must_use]
pub fn classify_risk(tool_name: &str) -> RiskLevel {
    if let Some(risk) = RISK_MAP.get(tool_name) {
        return *risk;
    }
    let base = tool_name.split('.').next().unwrap_or(tool_name);
    RISK_MAP.get(base).copied().unwrap_or(RiskLevel::Med)
}

/// Suggest limits the host could configure if it chose to enable the tool.
#[must_use]
pub fn proposed_limits(tool_name: &str) -> serde_json::Value {
    let base = tool_name.split('.').next().unwrap_or(tool_name);
    match base {
        "web" => json!({
            "rate_limit": "5/min",
            "allowed_domains": [],
            "max_response_bytes": 50_000,
        }),
        "email" => json!({
            "rate_limit": "3/hour",
            "allowed_recipients": [],
            "require_approval": true,
        }),
        "filesystem" => json!({
            "allowed_paths": [],
            "max_file_size_bytes": 1_000_000,
            "read_only": true,
        }),
        "shell" => json!({
            "allowed_commands": [],
            "require_approval": true,
            "timeout_seconds": 10,
        }),
        "http" => json!({
            "rate_limit": "10/min",
            "allowed_domains": [],
            "max_response_bytes": 50_000,
        }),
        _ => json!({ "note": "No predefined limits - configure per policy." }),
    }
}

// =============================================================================
// Denial payload and audit event
// =============================================================================

/// The deterministic JSON payload returned to the model on denial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenialPayload {
    /// Always `TOOL_NOT_ALLOWED`
    pub error: String,
    /// The requested capability
    pub tool: String,
    /// Where the host can enable it
    pub how_to_enable: String,
}

/// Structured record of one boundary contact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundaryEvent {
    /// Always `boundary_request`
    #[serde(rename = "type")]
    pub event_type: String,
    /// Agent profile that made the request
    pub profile: String,
    /// Tick index, when the request came from a burst
    pub tick_index: Option<u32>,
    /// The capability that was denied
    pub requested_capability: String,
    /// Free-text reason for the denial
    pub reason: String,
    /// Baseline risk classification
    pub risk_level: RiskLevel,
    /// Limits the host could set to enable this safely
    pub proposed_limits: serde_json::Value,
    /// Event timestamp (RFC 3339, UTC); lives here, never in the payload
    pub timestamp: DateTime<Utc>,
    /// Arguments the model supplied, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_args: Option<serde_json::Value>,
    /// The payload returned to the model
    pub denial_payload: DenialPayload,
}

/// Build a denial payload and its audit event.
///
/// Returns the JSON string to feed back to the model as a tool result,
/// plus the structured event for the audit log. The payload is
/// deterministic; only the event carries the timestamp.
#[must_use]
pub fn build_denial(
    tool_name: &str,
    profile: &str,
    reason: &str,
    tick_index: Option<u32>,
    tool_args: Option<serde_json::Value>,
) -> (String, BoundaryEvent) {
    let reason = if reason.is_empty() {
        format!("Tool '{tool_name}' is not in the allowed set for profile '{profile}'.")
    } else {
        reason.to_string()
    };

    let payload = DenialPayload {
        error: "TOOL_NOT_ALLOWED".to_string(),
        tool: tool_name.to_string(),
        how_to_enable: format!("profiles/{profile} -> allowed_tools"),
    };
    let payload_json =
        serde_json::to_string(&payload).expect("denial payload serialization is infallible");

    let event = BoundaryEvent {
        event_type: "boundary_request".to_string(),
        profile: profile.to_string(),
        tick_index,
        requested_capability: tool_name.to_string(),
        reason,
        risk_level: classify_risk(tool_name),
        proposed_limits: proposed_limits(tool_name),
        timestamp: Utc::now(),
        tool_args,
        denial_payload: payload,
    };

    (payload_json, event)
}

// =============================================================================
// Append-only audit log
// =============================================================================

/// Append-only JSONL writer for boundary contact events.
///
/// Appending never raises: a failed write is logged and swallowed so the
/// caller always has a usable denial payload to feed back to the model.
#[derive(Debug, Clone)]
pub struct BoundaryLog {
    path: PathBuf,
}

impl BoundaryLog {
    /// Create a logger writing to the given path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The audit log path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a single event line. Infallible by contract.
    pub fn append(&self, event: &BoundaryEvent) {
        if let Err(err) = self.try_append(event) {
            warn!(error = %err, path = %self.path.display(), "boundary audit append failed");
        }
    }

    fn try_append(&self, event: &BoundaryEvent) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = serde_json::to_string(event)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        Ok(())
    }

    /// Read all events (for diagnostics and tests).
    ///
    /// # Errors
    /// Returns `std::io::Error` if the file exists but cannot be read.
    pub fn read_all(&self) -> std::io::Result<Vec<BoundaryEvent>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(fs::File::open(&self.path)?);
        let mut events = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let event = serde_json::from_str(&line)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            events.push(event);
        }
        Ok(events)
    }
}

// =============================================================================
// Tests
// =============================================================================
