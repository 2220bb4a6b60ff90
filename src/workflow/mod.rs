//! 工作流编排：规划 -> 审批门禁 -> 工具执行 -> 回复合成，带检查点挂起/恢复

pub mod executor;
pub mod gate;
pub mod orchestrator;
pub mod planner;
pub mod responder;
pub mod types;

pub use executor::PlanExecutor;
pub use gate::{ApprovalGate, GateVerdict};
pub use orchestrator::{Orchestrator, OrchestratorOptions};
pub use planner::PlannerNode;
pub use responder::{Responder, FALLBACK_ANSWER};
pub use types::{
    new_run_id, ApprovalDecision, ApprovalRequest, Decision, FailureKind, Plan, RunId, RunOutcome,
    RunState, RunStatus, ToolInvocation, ToolOutcome, ToolResult,
};
