//! Agent 错误类型
//!
//! 单次工具调用内可恢复的失败（未知工具、超时、执行出错、参数非法）不走这里，
//! 而是折叠进 ToolResult 向后传递；这里只保留会让 start/resume 返回错误或
//! 中止整个 Run 的类别，由 retry_advisable 区分「建议重试」与「终止」。

use thiserror::Error;

/// Run 推进过程中的全局错误（规划、恢复路径误用、存储）
#[derive(Error, Debug)]
pub enum AgentError {
    /// 规划阶段模型/供应商错误：整个 Run 中止，提示用户重试
    #[error("Planning failed: {0}")]
    PlanningFailure(String),

    /// resume 时检查点不存在（从未挂起，或已完成）
    #[error("Unknown run: {0}")]
    UnknownRun(String),

    /// 同一 run_id 的第二次决策提交，防止工具重复执行
    #[error("Run already resolved: {0}")]
    RunAlreadyResolved(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Memory error: {0}")]
    Memory(String),
}

impl AgentError {
    /// 中止后是否建议用户重试（resume 路径误用等客户端错误除外）
    pub fn retry_advisable(&self) -> bool {
        matches!(
            self,
            Self::PlanningFailure(_) | Self::Checkpoint(_) | Self::Memory(_)
        )
    }
}
