//! 学习资料索引（检索后端的进程内替身）
//!
//! 资料检索工具只依赖 DocumentIndex trait；真实部署可接向量库，
//! 内置实现按小写词重叠打分，足够演示与测试。

use std::collections::HashSet;
use std::sync::RwLock;

/// 一条学习资料：主题 + 正文
#[derive(Clone, Debug)]
pub struct StudyDocument {
    pub topic: String,
    pub text: String,
}

/// 资料索引 trait：写入与 top-k 检索
pub trait DocumentIndex: Send + Sync {
    fn add(&self, topic: &str, text: &str);

    /// 按查询返回最相关的 k 条，格式 "[topic] text"
    fn search(&self, query: &str, k: usize) -> Vec<String>;
}

/// 将文本切分为小写词集合，用于词重叠打分
fn tokenize_lower(s: &str) -> HashSet<String> {
    s.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| w.len() > 1)
        .collect()
}

/// 内存索引：词重叠计分，超出 max_entries 时丢弃最旧资料
pub struct InMemoryIndex {
    entries: RwLock<Vec<(StudyDocument, HashSet<String>)>>,
    max_entries: usize,
}

impl InMemoryIndex {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            max_entries,
        }
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl DocumentIndex for InMemoryIndex {
    fn add(&self, topic: &str, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        // 主题词也参与匹配，让 "grammar" 查询能命中主题为 Grammar 的资料
        let mut tokens = tokenize_lower(text);
        tokens.extend(tokenize_lower(topic));
        let mut entries = self.entries.write().unwrap();
        entries.push((
            StudyDocument {
                topic: topic.to_string(),
                text: text.to_string(),
            },
            tokens,
        ));
        let n = entries.len();
        if n > self.max_entries {
            entries.drain(0..n - self.max_entries);
        }
    }

    fn search(&self, query: &str, k: usize) -> Vec<String> {
        let query_tokens = tokenize_lower(query);
        if query_tokens.is_empty() {
            return Vec::new();
        }
        let entries = self.entries.read().unwrap();
        let mut scored: Vec<(usize, String)> = entries
            .iter()
            .map(|(doc, tokens)| {
                let score = query_tokens.intersection(tokens).count();
                (score, format!("[{}] {}", doc.topic, doc.text))
            })
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().take(k).map(|(_, text)| text).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_ranks_by_overlap_and_respects_k() {
        let index = InMemoryIndex::default();
        index.add("Grammar", "The past perfect tense describes an action completed before another past action.");
        index.add("Grammar", "Subject and verb must agree in number.");
        index.add("Vocabulary", "Ephemeral means lasting for a very short time.");

        let hits = index.search("past perfect tense", 1);
        assert_eq!(hits.len(), 1);
        assert!(hits[0].contains("past perfect"));
    }

    #[test]
    fn topic_words_are_searchable() {
        let index = InMemoryIndex::default();
        index.add("Legal Reasoning", "A contract requires offer, acceptance and consideration.");

        assert!(!index.search("legal reasoning basics", 3).is_empty());
    }

    #[test]
    fn empty_query_returns_nothing() {
        let index = InMemoryIndex::default();
        index.add("Grammar", "Articles precede nouns.");
        assert!(index.search("  ", 3).is_empty());
    }
}
