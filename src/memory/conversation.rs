//! 会话记忆：按 (user_id, session_id) 追加的轮次日志
//!
//! 会话键显式传参，不放在模块级全局状态；Planner / Responder 只拿到一个有界窗口，
//! 窗口大小由配置决定（memory_window），核心不自行计算。

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::core::AgentError;

/// 会话键：用户 + 会话二元组
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub user_id: String,
    pub session_id: String,
}

impl SessionKey {
    pub fn new(user_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }

    /// 存储键："user_id::session_id"
    pub fn storage_key(&self) -> String {
        format!("{}::{}", self.user_id, self.session_id)
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.user_id, self.session_id)
    }
}

/// 一轮对话：用户输入与最终回复，提交后不可变
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Turn {
    /// 产生本轮的 Run
    pub run_id: String,
    pub user_text: String,
    /// Responder 提交前为 None
    pub answer: Option<String>,
    pub timestamp_ms: i64,
}

impl Turn {
    pub fn new(run_id: impl Into<String>, user_text: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            user_text: user_text.into(),
            answer: None,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// 会话记忆存储：追加轮次 / 读取最近窗口
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn append(&self, key: &SessionKey, turn: Turn) -> Result<(), AgentError>;

    /// 最近 limit 轮，按时间先后排列
    async fn recent(&self, key: &SessionKey, limit: usize) -> Result<Vec<Turn>, AgentError>;
}

/// 内存会话记忆（单进程）
#[derive(Default)]
pub struct InMemorySessionMemory {
    sessions: RwLock<HashMap<String, Vec<Turn>>>,
}

impl InMemorySessionMemory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemoryStore for InMemorySessionMemory {
    async fn append(&self, key: &SessionKey, turn: Turn) -> Result<(), AgentError> {
        let mut sessions = self.sessions.write().await;
        sessions.entry(key.storage_key()).or_default().push(turn);
        Ok(())
    }

    async fn recent(&self, key: &SessionKey, limit: usize) -> Result<Vec<Turn>, AgentError> {
        let sessions = self.sessions.read().await;
        let turns = sessions.get(&key.storage_key()).map(Vec::as_slice).unwrap_or(&[]);
        let start = turns.len().saturating_sub(limit);
        Ok(turns[start..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recent_returns_bounded_window_in_order() {
        let store = InMemorySessionMemory::new();
        let key = SessionKey::new("u1", "s1");
        for i in 0..5 {
            store
                .append(&key, Turn::new(format!("run-{i}"), format!("question {i}")))
                .await
                .unwrap();
        }

        let recent = store.recent(&key, 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].user_text, "question 3");
        assert_eq!(recent[1].user_text, "question 4");
    }

    #[tokio::test]
    async fn sessions_are_isolated_by_key() {
        let store = InMemorySessionMemory::new();
        let a = SessionKey::new("u1", "s1");
        let b = SessionKey::new("u1", "s2");
        store.append(&a, Turn::new("r1", "hello")).await.unwrap();

        assert_eq!(store.recent(&a, 10).await.unwrap().len(), 1);
        assert!(store.recent(&b, 10).await.unwrap().is_empty());
    }
}
