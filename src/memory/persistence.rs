//! 会话持久化
//!
//! 每个会话一个 JSON 文件，跨进程重启恢复对话历史；文件名由会话键清洗得到。

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::core::AgentError;
use crate::memory::{MemoryStore, SessionKey, Turn};

/// 文件会话记忆：root 目录下每会话一个 JSON 文件
pub struct FileSessionMemory {
    root: PathBuf,
}

impl FileSessionMemory {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn session_path(&self, key: &SessionKey) -> PathBuf {
        let name: String = key
            .storage_key()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.root.join(format!("{name}.json"))
    }

    fn load(&self, key: &SessionKey) -> Result<Vec<Turn>, AgentError> {
        let path = self.session_path(key);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let data = std::fs::read_to_string(&path).map_err(|e| AgentError::Memory(e.to_string()))?;
        serde_json::from_str(&data).map_err(|e| AgentError::Memory(e.to_string()))
    }

    fn save(&self, key: &SessionKey, turns: &[Turn]) -> Result<(), AgentError> {
        std::fs::create_dir_all(&self.root).map_err(|e| AgentError::Memory(e.to_string()))?;
        let data =
            serde_json::to_string_pretty(turns).map_err(|e| AgentError::Memory(e.to_string()))?;
        std::fs::write(self.session_path(key), data).map_err(|e| AgentError::Memory(e.to_string()))
    }
}

#[async_trait]
impl MemoryStore for FileSessionMemory {
    async fn append(&self, key: &SessionKey, turn: Turn) -> Result<(), AgentError> {
        let mut turns = self.load(key)?;
        turns.push(turn);
        self.save(key, &turns)
    }

    async fn recent(&self, key: &SessionKey, limit: usize) -> Result<Vec<Turn>, AgentError> {
        let turns = self.load(key)?;
        let start = turns.len().saturating_sub(limit);
        Ok(turns[start..].to_vec())
    }
}
