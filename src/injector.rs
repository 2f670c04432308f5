//! Memory injector - builds context blocks for system-prompt injection.
//!
//! Produces a compact Markdown block of relevant memories for a tick's
//! system prompt. Two modes:
//!
//! 1. **Semantic** (query given): vector search finds the memories most
//!    relevant to the current stimulus.
//! 2. **Recall** (no query): newest memories in the visible scopes.
//!
//! The block is appended to the system prompt so agents carry long-term
//! context without manual lookups.

use std::collections::BTreeMap;

use crate::embedding::EmbeddingProvider;
use crate::index::{IndexResult, SearchFilter, SemanticMemory};
use crate::vault::RecallFilter;

struct DisplayItem {
    text: String,
    scope: String,
    category: String,
    tags: Vec<String>,
    score: Option<f32>,
}

/// Render the Long-Term Memory Context block for prompt injection.
///
/// Returns an empty string when nothing is visible in the given scopes.
///
/// # Errors
/// Propagates vault read errors and query-embedding failures.
pub async fn build_memory_block<E: EmbeddingProvider>(
    memory: &SemanticMemory<E>,
    scopes: &[String],
    max_items: usize,
    query: Option<&str>,
) -> IndexResult<String> {
    if max_items == 0 {
        return Ok(String::new());
    }

    let items: Vec<DisplayItem> = match query {
        Some(query) if !query.trim().is_empty() => {
            let filter = SearchFilter::new()
                .with_scopes(scopes.iter().cloned())
                .with_top_k(max_items);
            memory
                .search(query, &filter)
                .await?
                .into_iter()
                .map(|hit| DisplayItem {
                    text: hit.memory.text,
                    scope: hit.memory.scope,
                    category: hit.memory.category,
                    tags: hit.memory.tags,
                    score: Some(hit.score),
                })
                .collect()
        }
        _ => {
            let filter = RecallFilter::new()
                .with_scopes(scopes.iter().cloned())
                .with_limit(max_items);
            memory
                .recall(&filter)?
                .into_iter()
                .map(|mem| DisplayItem {
                    text: mem.text,
                    scope: mem.scope,
                    category: mem.category,
                    tags: mem.tags,
                    score: None,
                })
                .collect()
        }
    };

    if items.is_empty() {
        return Ok(String::new());
    }

    let semantic = query.is_some_and(|q| !q.trim().is_empty());
    let mut lines = vec![
        "## Long-Term Memory Context".to_string(),
        String::new(),
        "The following durable memories were retrieved from the Memory Vault".to_string(),
        if semantic {
            "(semantic search).".to_string()
        } else {
            "(most recent).".to_string()
        },
        "Treat them as established facts unless the user corrects them.".to_string(),
        String::new(),
    ];

    // Group by category for readability.
    let mut by_category: BTreeMap<String, Vec<&DisplayItem>> = BTreeMap::new();
    for item in &items {
        by_category.entry(item.category.clone()).or_default().push(item);
    }

    for (category, group) in &by_category {
        lines.push(format!("**{}**", title_case(category)));
        for item in group {
            let tag_str = if item.tags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", item.tags.join(", "))
            };
            let score_str = item
                .score
                .map(|s| format!(" (relevance: {s:.2})"))
                .unwrap_or_default();
            lines.push(format!(
                "- {}{tag_str}{score_str}  *(scope: {})*",
                item.text, item.scope
            ));
        }
        lines.push(String::new());
    }

    Ok(lines.join("\n"))
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::SimEmbeddingProvider;
    use crate::vault::{NewMemory, VaultConfig, VaultStore};
    use tempfile::TempDir;

    async fn seeded_memory(dir: &TempDir) -> SemanticMemory<SimEmbeddingProvider> {
        let vault =
            VaultStore::open(dir.path().join("vault.jsonl"), VaultConfig::default()).unwrap();
        let mut memory = SemanticMemory::open(vault, SimEmbeddingProvider::new())
            .await
            .unwrap();
        memory
            .add(&NewMemory::new("Name is Alice", "shared", "bio"))
            .await
            .unwrap();
        memory
            .add(&NewMemory::new("Prefers Python", "orion", "preference").with_tags(["language"]))
            .await
            .unwrap();
        memory
            .add(&NewMemory::new("Likes poetry", "elysia", "preference").with_tags(["writing"]))
            .await
            .unwrap();
        memory
    }

    #[tokio::test]
    async fn test_recall_block_respects_scopes() {
        let dir = TempDir::new().unwrap();
        let memory = seeded_memory(&dir).await;

        let block = build_memory_block(
            &memory,
            &["shared".to_string(), "orion".to_string()],
            10,
            None,
        )
        .await
        .unwrap();

        assert!(block.contains("Long-Term Memory Context"));
        assert!(block.contains("Alice"));
        assert!(block.contains("Python"));
        assert!(!block.contains("poetry"));
    }

    #[tokio::test]
    async fn test_semantic_block_carries_relevance() {
        let dir = TempDir::new().unwrap();
        let memory = seeded_memory(&dir).await;

        let block = build_memory_block(
            &memory,
            &["shared".to_string(), "orion".to_string()],
            10,
            Some("python language preferences"),
        )
        .await
        .unwrap();

        assert!(block.contains("relevance:"));
        assert!(block.contains("Python"));
    }

    #[tokio::test]
    async fn test_zero_items_yields_empty_block() {
        let dir = TempDir::new().unwrap();
        let memory = seeded_memory(&dir).await;
        let block = build_memory_block(&memory, &["shared".to_string()], 0, None)
            .await
            .unwrap();
        assert!(block.is_empty());
    }

    #[tokio::test]
    async fn test_empty_scope_yields_empty_block() {
        let dir = TempDir::new().unwrap();
        let memory = seeded_memory(&dir).await;
        let block = build_memory_block(&memory, &["nonexistent".to_string()], 10, None)
            .await
            .unwrap();
        assert!(block.is_empty());
    }
}
