//! 检查点存储：挂起 Run 的持久化与恢复
//!
//! put/get/delete 之外提供 claim：resume 路径的原子领取，成功后条目被移除并记为已决，
//! 同一 run_id 的第二次领取返回 AlreadyResolved。编排器是唯一写入方；
//! 文件实现每个 Run 一个 JSON 文件，进程重启后在途审批不丢失。

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::workflow::types::RunState;

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Checkpoint not found: {0}")]
    NotFound(String),

    #[error("Run already resolved: {0}")]
    AlreadyResolved(String),

    #[error("Checkpoint storage error: {0}")]
    Storage(String),
}

/// 检查点存储 trait
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn put(&self, state: &RunState) -> Result<(), CheckpointError>;

    async fn get(&self, run_id: &str) -> Result<RunState, CheckpointError>;

    async fn delete(&self, run_id: &str) -> Result<(), CheckpointError>;

    /// 原子领取：移除条目并记为已决；不存在返回 NotFound，已领取过返回 AlreadyResolved
    async fn claim(&self, run_id: &str) -> Result<RunState, CheckpointError>;
}

#[derive(Default)]
struct MemoryInner {
    entries: HashMap<String, RunState>,
    resolved: HashSet<String>,
}

/// 内存检查点存储（单进程）
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    inner: Mutex<MemoryInner>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn put(&self, state: &RunState) -> Result<(), CheckpointError> {
        let mut inner = self.inner.lock().await;
        inner.entries.insert(state.run_id.clone(), state.clone());
        Ok(())
    }

    async fn get(&self, run_id: &str) -> Result<RunState, CheckpointError> {
        let inner = self.inner.lock().await;
        inner
            .entries
            .get(run_id)
            .cloned()
            .ok_or_else(|| CheckpointError::NotFound(run_id.to_string()))
    }

    async fn delete(&self, run_id: &str) -> Result<(), CheckpointError> {
        let mut inner = self.inner.lock().await;
        inner.entries.remove(run_id);
        Ok(())
    }

    async fn claim(&self, run_id: &str) -> Result<RunState, CheckpointError> {
        let mut inner = self.inner.lock().await;
        match inner.entries.remove(run_id) {
            Some(state) => {
                inner.resolved.insert(run_id.to_string());
                Ok(state)
            }
            None if inner.resolved.contains(run_id) => {
                Err(CheckpointError::AlreadyResolved(run_id.to_string()))
            }
            None => Err(CheckpointError::NotFound(run_id.to_string())),
        }
    }
}

/// 文件检查点存储：dir 下每个 Run 一个 "<run_id>.json"
///
/// 已决集合为进程内状态：重启后对已决 Run 的再次领取报 NotFound 而非 AlreadyResolved，
/// 在单写入方纪律下语义等价（均拒绝决策）。
pub struct FileCheckpointStore {
    dir: PathBuf,
    resolved: Mutex<HashSet<String>>,
}

impl FileCheckpointStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            resolved: Mutex::new(HashSet::new()),
        }
    }

    fn path_for(&self, run_id: &str) -> PathBuf {
        let name: String = run_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{name}.json"))
    }

    fn read_state(&self, run_id: &str) -> Result<RunState, CheckpointError> {
        let path = self.path_for(run_id);
        if !path.exists() {
            return Err(CheckpointError::NotFound(run_id.to_string()));
        }
        let data =
            std::fs::read_to_string(&path).map_err(|e| CheckpointError::Storage(e.to_string()))?;
        serde_json::from_str(&data).map_err(|e| CheckpointError::Storage(e.to_string()))
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn put(&self, state: &RunState) -> Result<(), CheckpointError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| CheckpointError::Storage(e.to_string()))?;
        let data = serde_json::to_string_pretty(state)
            .map_err(|e| CheckpointError::Storage(e.to_string()))?;
        std::fs::write(self.path_for(&state.run_id), data)
            .map_err(|e| CheckpointError::Storage(e.to_string()))
    }

    async fn get(&self, run_id: &str) -> Result<RunState, CheckpointError> {
        self.read_state(run_id)
    }

    async fn delete(&self, run_id: &str) -> Result<(), CheckpointError> {
        let path = self.path_for(run_id);
        if path.exists() {
            std::fs::remove_file(path).map_err(|e| CheckpointError::Storage(e.to_string()))?;
        }
        Ok(())
    }

    async fn claim(&self, run_id: &str) -> Result<RunState, CheckpointError> {
        // resolved 锁覆盖「读文件 + 删文件 + 记已决」，并发 resume 只有一个能领到
        let mut resolved = self.resolved.lock().await;
        match self.read_state(run_id) {
            Ok(state) => {
                std::fs::remove_file(self.path_for(run_id))
                    .map_err(|e| CheckpointError::Storage(e.to_string()))?;
                resolved.insert(run_id.to_string());
                Ok(state)
            }
            Err(CheckpointError::NotFound(_)) if resolved.contains(run_id) => {
                Err(CheckpointError::AlreadyResolved(run_id.to_string()))
            }
            Err(e) => Err(e),
        }
    }
}
