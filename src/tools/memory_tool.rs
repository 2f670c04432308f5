//! Memory tool - the agent-facing interface to the vault + semantic index.
//!
//! All writes go to the vault first and sync to the index automatically.
//! Every action takes a flat argument object and returns a JSON string;
//! nothing here ever raises to the model.

use serde_json::{json, Value};

use super::error_result;
use crate::constants::{RECALL_RESULTS_COUNT_DEFAULT, SEARCH_RESULTS_COUNT_DEFAULT};
use crate::embedding::EmbeddingProvider;
use crate::index::{SearchFilter, SemanticMemory};
use crate::vault::{Memory, MemoryPatch, MemorySource, NewMemory, RecallFilter, Tier};

/// Tool exposing vault-backed memory operations to agents.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryTool;

impl MemoryTool {
    /// The tool-call schema advertised to the model.
    #[must_use]
    pub fn definition() -> Value {
        json!({
            "name": "memory",
            "description": "Store, search, and manage durable memories. \
                Memories persist across sessions in the vault and are \
                searchable by meaning.\n\n\
                ACTIONS:\n\
                - add: store a new memory (text + scope + category required)\n\
                - remember: quick-store with sensible defaults\n\
                - bulk_add: store several memories in one call\n\
                - search: find memories by meaning\n\
                - recall: list memories (newest first, no embedding needed)\n\
                - get: retrieve a single memory by id\n\
                - update: change text/category/tags on an existing memory\n\
                - delete: soft-delete a memory by id\n\
                - bulk_delete: soft-delete multiple memories\n\
                - list: list all active memories\n\
                - stats: vault + index health counters\n\
                - compact: drop old versions/tombstones and rebuild the index\n\
                - rebuild_index: rebuild the semantic index from the vault",
            "parameters": {
                "type": "object",
                "properties": {
                    "action": {
                        "type": "string",
                        "enum": [
                            "add", "remember", "bulk_add", "search", "recall",
                            "get", "update", "delete", "bulk_delete", "list",
                            "stats", "compact", "rebuild_index",
                        ],
                        "description": "The operation to perform.",
                    },
                    "text": { "type": "string", "description": "Memory content (add/remember/update)." },
                    "scope": { "type": "string", "description": "Memory scope (shared, or agent-specific)." },
                    "category": { "type": "string", "description": "Freeform category label." },
                    "tier": { "type": "string", "enum": ["canon", "register"], "description": "Lifecycle tier." },
                    "topic_id": { "type": "string", "description": "Stable key for register upserts." },
                    "tags": { "type": "array", "items": { "type": "string" }, "description": "Optional tags." },
                    "source": { "type": "string", "description": "Origin of the memory." },
                    "query": { "type": "string", "description": "Search query text (search action)." },
                    "memory_id": { "type": "string", "description": "Memory id (get/update/delete)." },
                    "memory_ids": { "type": "array", "items": { "type": "string" }, "description": "Memory ids (bulk_delete)." },
                    "memories": { "type": "array", "items": { "type": "object" }, "description": "Memory objects (bulk_add)." },
                    "limit": { "type": "integer", "description": "Max results." },
                },
                "required": ["action"],
            },
        })
    }

    /// Execute one action. Always returns a JSON string, never raises.
    pub async fn execute<E: EmbeddingProvider>(
        memory: &mut SemanticMemory<E>,
        args: &Value,
    ) -> String {
        let action = args.get("action").and_then(Value::as_str).unwrap_or("");
        match action {
            "add" => Self::add(memory, args).await,
            "remember" => Self::remember(memory, args).await,
            "bulk_add" => Self::bulk_add(memory, args).await,
            "search" => Self::search(memory, args).await,
            "recall" => Self::recall(memory, args),
            "get" => Self::get(memory, args),
            "update" => Self::update(memory, args).await,
            "delete" => Self::delete(memory, args),
            "bulk_delete" => Self::bulk_delete(memory, args),
            "list" => Self::list(memory, args),
            "stats" => Self::stats(memory),
            "compact" => Self::compact(memory).await,
            "rebuild_index" => Self::rebuild_index(memory).await,
            other => error_result(format!("Unknown action '{other}'")),
        }
    }

    // -------------------------------------------------------------------------
    // Action handlers
    // -------------------------------------------------------------------------

    async fn add<E: EmbeddingProvider>(memory: &mut SemanticMemory<E>, args: &Value) -> String {
        let Some(req) = Self::new_memory_from(args) else {
            return error_result("text, scope, and category are required");
        };
        match memory.add(&req).await {
            Ok(mem) => json!({
                "status": "stored",
                "id": mem.id,
                "scope": mem.scope,
                "category": mem.category,
            })
            .to_string(),
            Err(err) => error_result(err),
        }
    }

    async fn remember<E: EmbeddingProvider>(memory: &mut SemanticMemory<E>, args: &Value) -> String {
        let text = args.get("text").and_then(Value::as_str).unwrap_or("");
        if text.is_empty() {
            return error_result("text is required");
        }
        let scope = args.get("scope").and_then(Value::as_str).unwrap_or("shared");
        let category = args
            .get("category")
            .and_then(Value::as_str)
            .unwrap_or("other");
        let source = args
            .get("source")
            .and_then(Value::as_str)
            .and_then(MemorySource::parse)
            .unwrap_or(MemorySource::Tool);
        let status = memory
            .remember(text, scope, category, source, string_list(args, "tags"))
            .await;
        serde_json::to_string(&status).unwrap_or_else(|e| error_result(e))
    }

    async fn bulk_add<E: EmbeddingProvider>(memory: &mut SemanticMemory<E>, args: &Value) -> String {
        let Some(items) = args.get("memories").and_then(Value::as_array) else {
            return error_result("memories is required");
        };

        let mut stored = Vec::new();
        let mut errors = Vec::new();
        for (index, item) in items.iter().enumerate() {
            let Some(req) = Self::new_memory_from(item) else {
                errors.push(json!({
                    "index": index,
                    "message": "text, scope, and category are required",
                }));
                continue;
            };
            match memory.add(&req).await {
                Ok(mem) => stored.push(json!({ "index": index, "id": mem.id })),
                Err(err) => errors.push(json!({ "index": index, "message": err.to_string() })),
            }
        }
        json!({
            "status": "ok",
            "stored_count": stored.len(),
            "stored": stored,
            "errors": errors,
        })
        .to_string()
    }

    async fn search<E: EmbeddingProvider>(memory: &SemanticMemory<E>, args: &Value) -> String {
        let query = args.get("query").and_then(Value::as_str).unwrap_or("");
        if query.is_empty() {
            return error_result("query is required");
        }
        let mut filter = SearchFilter::new().with_top_k(
            usize_arg(args, "limit").unwrap_or(SEARCH_RESULTS_COUNT_DEFAULT).max(1),
        );
        if let Some(scope) = args.get("scope").and_then(Value::as_str) {
            filter = filter.with_scope(scope);
        }
        if let Some(category) = args.get("category").and_then(Value::as_str) {
            filter = filter.with_category(category);
        }

        match memory.search(query, &filter).await {
            Ok(hits) => {
                let memories: Vec<Value> = hits
                    .iter()
                    .map(|hit| {
                        let mut v = format_memory(&hit.memory);
                        v["score"] = json!((f64::from(hit.score) * 10_000.0).round() / 10_000.0);
                        v
                    })
                    .collect();
                json!({ "status": "ok", "count": memories.len(), "memories": memories }).to_string()
            }
            Err(err) => error_result(err),
        }
    }

    fn recall<E: EmbeddingProvider>(memory: &SemanticMemory<E>, args: &Value) -> String {
        let mut filter = RecallFilter::new()
            .with_limit(usize_arg(args, "limit").unwrap_or(RECALL_RESULTS_COUNT_DEFAULT));
        if let Some(scope) = args.get("scope").and_then(Value::as_str) {
            filter = filter.with_scope(scope);
        }
        if let Some(category) = args.get("category").and_then(Value::as_str) {
            filter = filter.with_category(category);
        }
        let tags = string_list(args, "tags");
        if !tags.is_empty() {
            filter = filter.with_tags(tags);
        }

        match memory.recall(&filter) {
            Ok(memories) => json!({
                "status": "ok",
                "count": memories.len(),
                "memories": memories.iter().map(format_memory).collect::<Vec<_>>(),
            })
            .to_string(),
            Err(err) => error_result(err),
        }
    }

    fn get<E: EmbeddingProvider>(memory: &SemanticMemory<E>, args: &Value) -> String {
        let Some(id) = args.get("memory_id").and_then(Value::as_str) else {
            return error_result("memory_id is required");
        };
        match memory.get(id) {
            Ok(Some(mem)) => json!({ "status": "ok", "memory": format_memory(&mem) }).to_string(),
            Ok(None) => json!({ "status": "not_found" }).to_string(),
            Err(err) => error_result(err),
        }
    }

    async fn update<E: EmbeddingProvider>(memory: &mut SemanticMemory<E>, args: &Value) -> String {
        let Some(id) = args.get("memory_id").and_then(Value::as_str) else {
            return error_result("memory_id is required");
        };
        let mut patch = MemoryPatch::new();
        if let Some(text) = args.get("text").and_then(Value::as_str) {
            patch = patch.with_text(text);
        }
        if let Some(category) = args.get("category").and_then(Value::as_str) {
            patch = patch.with_category(category);
        }
        if args.get("tags").is_some() {
            patch = patch.with_tags(string_list(args, "tags"));
        }
        if let Some(tier) = args.get("tier").and_then(Value::as_str) {
            match Tier::parse(tier) {
                Some(tier) => patch = patch.with_tier(tier),
                None => return error_result(format!("unknown tier '{tier}'")),
            }
        }
        if let Some(topic_id) = args.get("topic_id").and_then(Value::as_str) {
            patch = patch.with_topic_id(topic_id);
        }

        match memory.update(id, &patch).await {
            Ok(mem) => json!({
                "status": "updated",
                "id": mem.id,
                "version": mem.version,
            })
            .to_string(),
            Err(err) => error_result(err),
        }
    }

    fn delete<E: EmbeddingProvider>(memory: &mut SemanticMemory<E>, args: &Value) -> String {
        let Some(id) = args.get("memory_id").and_then(Value::as_str) else {
            return error_result("memory_id is required");
        };
        match memory.delete(id) {
            Ok(true) => json!({ "status": "deleted" }).to_string(),
            Ok(false) => json!({ "status": "not_found" }).to_string(),
            Err(err) => error_result(err),
        }
    }

    fn bulk_delete<E: EmbeddingProvider>(memory: &mut SemanticMemory<E>, args: &Value) -> String {
        let ids = string_list(args, "memory_ids");
        if ids.is_empty() {
            return error_result("memory_ids is required");
        }
        match memory.bulk_delete(&ids) {
            Ok(report) => json!({
                "status": "ok",
                "deleted_count": report.deleted.len(),
                "deleted": report.deleted,
                "not_found": report.not_found,
            })
            .to_string(),
            Err(err) => error_result(err),
        }
    }

    fn list<E: EmbeddingProvider>(memory: &SemanticMemory<E>, args: &Value) -> String {
        let mut filter = RecallFilter::new();
        if let Some(scope) = args.get("scope").and_then(Value::as_str) {
            filter = filter.with_scope(scope);
        }
        match memory.recall(&filter) {
            Ok(memories) => {
                let limit = usize_arg(args, "limit").unwrap_or(50);
                let shown: Vec<Value> = memories.iter().take(limit).map(format_memory).collect();
                json!({
                    "status": "ok",
                    "count": shown.len(),
                    "total": memories.len(),
                    "memories": shown,
                })
                .to_string()
            }
            Err(err) => error_result(err),
        }
    }

    fn stats<E: EmbeddingProvider>(memory: &SemanticMemory<E>) -> String {
        match memory.stats() {
            Ok(stats) => {
                let mut v = serde_json::to_value(&stats).unwrap_or_default();
                v["status"] = json!("ok");
                v.to_string()
            }
            Err(err) => error_result(err),
        }
    }

    async fn compact<E: EmbeddingProvider>(memory: &mut SemanticMemory<E>) -> String {
        match memory.compact().await {
            Ok(report) => json!({
                "status": "ok",
                "lines_before": report.lines_before,
                "lines_after": report.lines_after,
                "lines_removed": report.lines_removed,
            })
            .to_string(),
            Err(err) => error_result(err),
        }
    }

    async fn rebuild_index<E: EmbeddingProvider>(memory: &mut SemanticMemory<E>) -> String {
        match memory.rebuild_index().await {
            Ok(vectors) => json!({ "status": "ok", "vectors": vectors }).to_string(),
            Err(err) => error_result(err),
        }
    }

    // -------------------------------------------------------------------------
    // Argument helpers
    // -------------------------------------------------------------------------

    fn new_memory_from(args: &Value) -> Option<NewMemory> {
        let text = args.get("text").and_then(Value::as_str).unwrap_or("");
        let scope = args.get("scope").and_then(Value::as_str).unwrap_or("");
        let category = args.get("category").and_then(Value::as_str).unwrap_or("");
        if text.is_empty() || scope.is_empty() || category.is_empty() {
            return None;
        }

        let mut req = NewMemory::new(text, scope, category)
            .with_tags(string_list(args, "tags"))
            .with_source(
                args.get("source")
                    .and_then(Value::as_str)
                    .and_then(MemorySource::parse)
                    .unwrap_or(MemorySource::Tool),
            )
            .with_tier(
                args.get("tier")
                    .and_then(Value::as_str)
                    .and_then(Tier::parse)
                    .unwrap_or(Tier::Register),
            );
        if let Some(topic_id) = args.get("topic_id").and_then(Value::as_str) {
            req = req.with_topic_id(topic_id);
        }
        Some(req)
    }
}

fn string_list(args: &Value, key: &str) -> Vec<String> {
    args.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn usize_arg(args: &Value, key: &str) -> Option<usize> {
    args.get(key)
        .and_then(Value::as_u64)
        .map(|v| usize::try_from(v).unwrap_or(usize::MAX))
}

fn format_memory(mem: &Memory) -> Value {
    let mut v = json!({
        "id": mem.id,
        "text": mem.text,
        "scope": mem.scope,
        "category": mem.category,
        "tier": mem.tier.as_str(),
        "tags": mem.tags,
        "source": mem.source.as_str(),
        "created_at": mem.created_at.to_rfc3339(),
        "version": mem.version,
    });
    if let Some(topic_id) = &mem.topic_id {
        v["topic_id"] = json!(topic_id);
    }
    v
}

// =============================================================================
// Tests
// =============================================================================
