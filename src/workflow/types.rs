//! 工作流数据模型
//!
//! RunState 是编排器唯一持有的运行单元；status 标签即图中位置（封闭状态集，
//! 每状态一个转移函数，不依赖动态图库）。全部类型可序列化，挂起时整体写入检查点存储，
//! 恢复进程重建同一结构体即可继续。

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::memory::{SessionKey, Turn};

pub type RunId = String;

pub fn new_run_id() -> RunId {
    uuid::Uuid::new_v4().to_string()
}

/// Planner 请求的单次工具调用
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub tool_name: String,
    pub arguments: Value,
    /// Planner 给出的调用理由
    pub rationale: String,
    /// 执行前是否按工具声明的 schema 严格校验参数
    #[serde(default)]
    pub strict: bool,
}

/// 一次规划结果：调用列表 + 置信度 + 推理文本，创建后不可变
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Plan {
    pub invocations: Vec<ToolInvocation>,
    /// [0, 1]，低于审批阈值时挂起
    pub confidence: f64,
    pub reasoning: String,
}

impl Plan {
    /// 无需工具的计划：直达 Responder，不经审批门禁
    pub fn no_tools(reasoning: impl Into<String>, confidence: f64) -> Self {
        Self {
            invocations: Vec::new(),
            confidence,
            reasoning: reasoning.into(),
        }
    }
}

/// 单次调用失败的类别
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    UnknownTool,
    Timeout,
    ExecutionError,
    InvalidArguments,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::UnknownTool => "unknown_tool",
            Self::Timeout => "timeout",
            Self::ExecutionError => "execution_error",
            Self::InvalidArguments => "invalid_arguments",
        };
        f.write_str(s)
    }
}

/// 单次调用的结果：成功载荷或失败描述
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolOutcome {
    Success { payload: Value },
    Failure { kind: FailureKind, message: String },
}

/// 每个进入执行的 ToolInvocation 恰好产生一条
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_name: String,
    pub outcome: ToolOutcome,
}

impl ToolResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Success { .. })
    }
}

/// Run 状态标签（即图中位置）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Planning,
    AwaitingApproval,
    Executing,
    Responding,
    Completed,
    Aborted,
}

/// 一次 Run 的完整状态；挂起期间的持久化副本存于检查点存储
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunState {
    pub run_id: RunId,
    pub session: SessionKey,
    pub turn: Turn,
    pub status: RunStatus,
    pub plan: Option<Plan>,
    pub tool_results: Vec<ToolResult>,
    pub created_at_ms: i64,
}

impl RunState {
    pub fn new(session: SessionKey, turn: Turn) -> Self {
        Self {
            run_id: turn.run_id.clone(),
            session,
            turn,
            status: RunStatus::Planning,
            plan: None,
            tool_results: Vec::new(),
            created_at_ms: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// 审批请求：Run 挂起期间存在，由恰好一个决策解除
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub run_id: RunId,
    pub plan: Plan,
    pub confidence: f64,
    /// 给审批人看的挂起原因
    pub message: String,
}

/// 人工决策类别
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
    /// 按 reject 处理执行，但反馈文本注入该会话的下一次规划
    Modify,
}

/// 人工决策 + 可选反馈文本
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub decision: Decision,
    pub feedback: Option<String>,
}

impl ApprovalDecision {
    pub fn approve() -> Self {
        Self {
            decision: Decision::Approve,
            feedback: None,
        }
    }

    pub fn reject(feedback: Option<String>) -> Self {
        Self {
            decision: Decision::Reject,
            feedback,
        }
    }

    pub fn modify(feedback: impl Into<String>) -> Self {
        Self {
            decision: Decision::Modify,
            feedback: Some(feedback.into()),
        }
    }
}

/// start / resume 的对外结果
#[derive(Clone, Debug)]
pub enum RunOutcome {
    Completed {
        answer: String,
    },
    PendingApproval(ApprovalRequest),
    Failed {
        reason: String,
        /// true 表示建议用户重试，false 表示终止性错误
        retry_advisable: bool,
    },
}
