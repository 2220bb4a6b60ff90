//! 资料检索工具：从学习资料索引中取 top-k 片段
//!
//! 只用于语言学习类内容（语法、词汇、阅读理解），时事与常识走 search_web。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::memory::DocumentIndex;
use crate::tools::Tool;

const DEFAULT_MAX_RESULTS: usize = 5;

/// 资料检索：委托给 DocumentIndex（内存实现或真实向量库）
pub struct SearchDocumentTool {
    index: Arc<dyn DocumentIndex>,
}

impl SearchDocumentTool {
    pub fn new(index: Arc<dyn DocumentIndex>) -> Self {
        Self { index }
    }
}

#[async_trait]
impl Tool for SearchDocumentTool {
    fn name(&self) -> &str {
        "search_document"
    }

    fn description(&self) -> &str {
        "Search study materials (grammar, vocabulary, reading comprehension, legal concepts). \
         Do NOT use for current events or general knowledge. \
         Args: {\"query\": \"topic to look up\", \"max_results\": 5}"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "study topic to search for"
                },
                "max_results": {
                    "type": "integer",
                    "description": "number of snippets to return"
                }
            },
            "required": ["query"]
        })
    }

    fn strict_arguments(&self) -> bool {
        true
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| "Missing query".to_string())?;
        let max_results = args
            .get("max_results")
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_MAX_RESULTS);

        let results = self.index.search(query, max_results);
        tracing::debug!(query = %query, hits = results.len(), "document search");
        Ok(json!({
            "query": query,
            "count": results.len(),
            "results": results,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryIndex;

    #[tokio::test]
    async fn returns_matching_snippets() {
        let index = Arc::new(InMemoryIndex::default());
        index.add("Grammar", "The past perfect tense describes a completed past action.");
        let tool = SearchDocumentTool::new(index);

        let payload = tool
            .execute(json!({"query": "past perfect tense", "max_results": 3}))
            .await
            .unwrap();
        assert_eq!(payload["count"], 1);
        assert!(payload["results"][0].as_str().unwrap().contains("past perfect"));
    }

    #[tokio::test]
    async fn missing_query_is_an_error() {
        let tool = SearchDocumentTool::new(Arc::new(InMemoryIndex::default()));
        assert!(tool.execute(json!({})).await.is_err());
    }
}
