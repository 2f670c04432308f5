//! Task queue tool - cross-agent handoff of small work items.
//!
//! A JSONL-backed queue: `add` enqueues a task for another agent, `next`
//! peeks the oldest pending task addressed to the caller, `ack` marks a
//! task done. Appends only; acks append a completion line rather than
//! rewriting the file, mirroring the vault's write model.
//!
//! The tick executor gives this tool an extra 1-call-per-tick cap on top
//! of the general tool budget.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::error_result;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum QueueLine {
    Task(QueuedTask),
    Ack { task_id: String, by: String },
}

/// One queued work item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedTask {
    /// Opaque task id
    pub id: String,
    /// Agent that enqueued the task
    pub from: String,
    /// Agent the task is addressed to
    pub to: String,
    /// Short description
    pub subject: String,
    /// Full task body
    pub body: String,
    /// Enqueue timestamp
    pub created_at: DateTime<Utc>,
}

/// JSONL-backed cross-agent task queue.
#[derive(Debug, Clone)]
pub struct TaskQueueTool {
    path: PathBuf,
}

impl TaskQueueTool {
    /// Create a queue backed by the given file.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Execute one action on behalf of `agent`. Always returns a JSON
    /// string, never raises.
    #[must_use]
    pub fn execute(&self, agent: &str, args: &Value) -> String {
        let action = args.get("action").and_then(Value::as_str).unwrap_or("");
        match action {
            "add" => self.add(agent, args),
            "next" => self.next(agent),
            "ack" => self.ack(agent, args),
            other => error_result(format!("Unknown action '{other}'")),
        }
    }

    fn add(&self, agent: &str, args: &Value) -> String {
        let to = args.get("to").and_then(Value::as_str).unwrap_or("");
        let subject = args.get("subject").and_then(Value::as_str).unwrap_or("");
        if to.is_empty() || subject.is_empty() {
            return error_result("to and subject are required");
        }
        let task = QueuedTask {
            id: crate::vault::Memory::new_id(),
            from: agent.to_string(),
            to: to.to_lowercase(),
            subject: subject.to_string(),
            body: args
                .get("body")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            created_at: Utc::now(),
        };
        match self.append(&QueueLine::Task(task.clone())) {
            Ok(()) => json!({ "status": "queued", "task_id": task.id }).to_string(),
            Err(err) => error_result(err),
        }
    }

    fn next(&self, agent: &str) -> String {
        match self.pending_for(agent) {
            Ok(Some(task)) => json!({ "status": "ok", "task": task }).to_string(),
            Ok(None) => json!({ "status": "empty" }).to_string(),
            Err(err) => error_result(err),
        }
    }

    fn ack(&self, agent: &str, args: &Value) -> String {
        let Some(task_id) = args.get("task_id").and_then(Value::as_str) else {
            return error_result("task_id is required");
        };
        let known = match self.read_lines() {
            Ok(lines) => lines.iter().any(|line| match line {
                QueueLine::Task(task) => task.id == task_id,
                QueueLine::Ack { .. } => false,
            }),
            Err(err) => return error_result(err),
        };
        if !known {
            return json!({ "status": "not_found" }).to_string();
        }
        let ack = QueueLine::Ack {
            task_id: task_id.to_string(),
            by: agent.to_string(),
        };
        match self.append(&ack) {
            Ok(()) => json!({ "status": "acked", "task_id": task_id }).to_string(),
            Err(err) => error_result(err),
        }
    }

    fn pending_for(&self, agent: &str) -> std::io::Result<Option<QueuedTask>> {
        let lines = self.read_lines()?;
        let acked: HashSet<&str> = lines
            .iter()
            .filter_map(|line| match line {
                QueueLine::Ack { task_id, .. } => Some(task_id.as_str()),
                QueueLine::Task(_) => None,
            })
            .collect();
        Ok(lines
            .iter()
            .filter_map(|line| match line {
                QueueLine::Task(task) => Some(task),
                QueueLine::Ack { .. } => None,
            })
            .find(|task| task.to == agent.to_lowercase() && !acked.contains(task.id.as_str()))
            .cloned())
    }

    fn read_lines(&self) -> std::io::Result<Vec<QueueLine>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(fs::File::open(&self.path)?);
        let mut lines = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let parsed = serde_json::from_str(&line)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            lines.push(parsed);
        }
        Ok(lines)
    }

    fn append(&self, line: &QueueLine) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(serde_json::to_string(line)?.as_bytes())?;
        file.write_all(b"\n")?;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
