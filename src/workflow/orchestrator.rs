//! 编排器：状态标签驱动的工作流图
//!
//! start / resume 各自把一个 Run 同步推进到下一个挂起点或终点；状态集封闭
//! （planning -> awaiting_approval | executing -> responding -> completed / aborted）。
//! 唯一的挂起点是审批门禁：挂起时将 RunState 整体写入检查点存储并释放调用方，
//! 恢复可发生在别的线程/进程；resume 通过原子领取保证同一决策下工具至多执行一次。
//! 完成时才把整轮写入会话记忆；任何节点的不可恢复错误转为 aborted 并清理检查点，
//! 不留半提交状态。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::checkpoint::{CheckpointError, CheckpointStore};
use crate::core::AgentError;
use crate::llm::LlmClient;
use crate::memory::{MemoryStore, SessionKey, Turn};
use crate::tools::ToolRegistry;
use crate::workflow::executor::PlanExecutor;
use crate::workflow::gate::{ApprovalGate, GateVerdict};
use crate::workflow::planner::PlannerNode;
use crate::workflow::responder::Responder;
use crate::workflow::types::{
    new_run_id, ApprovalDecision, Decision, RunOutcome, RunState, RunStatus,
};

/// 编排器运行参数（来自配置）
#[derive(Clone, Debug)]
pub struct OrchestratorOptions {
    /// 低于该置信度的计划挂起待审批
    pub approval_threshold: f64,
    /// 审批门禁总开关
    pub approval_enabled: bool,
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
    /// 工具并发上限
    pub max_concurrent_tools: usize,
    /// 规划/回复可见的历史轮数
    pub memory_window: usize,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            approval_threshold: 0.8,
            approval_enabled: true,
            tool_timeout_secs: 30,
            max_concurrent_tools: 3,
            memory_window: 10,
        }
    }
}

/// 工作流编排器
pub struct Orchestrator {
    planner: PlannerNode,
    gate: ApprovalGate,
    executor: PlanExecutor,
    responder: Responder,
    memory: Arc<dyn MemoryStore>,
    checkpoints: Arc<dyn CheckpointStore>,
    memory_window: usize,
    /// modify 决策留下的反馈，按会话保存，注入该会话的下一次规划
    pending_feedback: Mutex<HashMap<String, String>>,
}

impl Orchestrator {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        registry: Arc<ToolRegistry>,
        memory: Arc<dyn MemoryStore>,
        checkpoints: Arc<dyn CheckpointStore>,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            planner: PlannerNode::new(llm.clone(), registry.clone()),
            gate: ApprovalGate::new(options.approval_threshold, options.approval_enabled),
            executor: PlanExecutor::new(
                registry,
                options.tool_timeout_secs,
                options.max_concurrent_tools,
            ),
            responder: Responder::new(llm),
            memory,
            checkpoints,
            memory_window: options.memory_window,
            pending_feedback: Mutex::new(HashMap::new()),
        }
    }

    /// 新轮次入口：规划 -> 门禁 ->（挂起）或（执行 -> 回复 -> 提交）
    pub async fn start(
        &self,
        session: SessionKey,
        text: impl Into<String>,
    ) -> Result<RunOutcome, AgentError> {
        let turn = Turn::new(new_run_id(), text);
        let mut state = RunState::new(session, turn);
        tracing::info!(run_id = %state.run_id, session = %state.session, "run started");

        let history = match self.memory.recent(&state.session, self.memory_window).await {
            Ok(history) => history,
            Err(e) => return Ok(self.abort(state, e).await),
        };
        let carried = self.take_feedback(&state.session).await;

        let plan = match self
            .planner
            .plan(&state.turn, &history, carried.as_deref())
            .await
        {
            Ok(plan) => plan,
            Err(e) => return Ok(self.abort(state, e).await),
        };

        // 空计划：不经门禁与执行，直达 Responder
        if plan.invocations.is_empty() {
            state.plan = Some(plan);
            return Ok(self.respond_and_commit(state, None).await);
        }

        match self.gate.evaluate(&state.run_id, &plan, self.executor.registry()) {
            GateVerdict::Suspend(request) => {
                state.plan = Some(plan);
                state.status = RunStatus::AwaitingApproval;
                if let Err(e) = self.checkpoints.put(&state).await {
                    return Ok(self
                        .abort(state, AgentError::Checkpoint(e.to_string()))
                        .await);
                }
                tracing::info!(
                    run_id = %state.run_id,
                    confidence = request.confidence,
                    "run suspended for approval"
                );
                Ok(RunOutcome::PendingApproval(request))
            }
            GateVerdict::Pass => {
                state.plan = Some(plan);
                Ok(self.execute_and_respond(state, None).await)
            }
        }
    }

    /// 恢复挂起的 Run：原子领取检查点后按决策分路
    pub async fn resume(
        &self,
        run_id: &str,
        decision: ApprovalDecision,
    ) -> Result<RunOutcome, AgentError> {
        let state = match self.checkpoints.claim(run_id).await {
            Ok(state) => state,
            Err(CheckpointError::NotFound(_)) => {
                return Err(AgentError::UnknownRun(run_id.to_string()))
            }
            Err(CheckpointError::AlreadyResolved(_)) => {
                return Err(AgentError::RunAlreadyResolved(run_id.to_string()))
            }
            Err(CheckpointError::Storage(e)) => return Err(AgentError::Checkpoint(e)),
        };
        if state.status != RunStatus::AwaitingApproval {
            return Err(AgentError::UnknownRun(run_id.to_string()));
        }
        tracing::info!(run_id, decision = ?decision.decision, "run resumed");

        match decision.decision {
            Decision::Approve => Ok(self.execute_and_respond(state, Some(decision)).await),
            Decision::Reject => Ok(self.respond_and_commit(state, Some(decision)).await),
            Decision::Modify => {
                // 执行层面同 reject；反馈进入该会话的下一次规划
                if let Some(feedback) = decision.feedback.clone() {
                    self.set_feedback(&state.session, feedback).await;
                }
                Ok(self.respond_and_commit(state, Some(decision)).await)
            }
        }
    }

    /// 外部取消挂起的审批：领取并丢弃检查点（Run 即 aborted），此后任何决策都被拒绝
    pub async fn cancel(&self, run_id: &str) -> Result<(), AgentError> {
        match self.checkpoints.claim(run_id).await {
            Ok(state) => {
                tracing::info!(run_id = %state.run_id, "pending approval cancelled");
                Ok(())
            }
            Err(CheckpointError::NotFound(_)) => Err(AgentError::UnknownRun(run_id.to_string())),
            Err(CheckpointError::AlreadyResolved(_)) => {
                Err(AgentError::RunAlreadyResolved(run_id.to_string()))
            }
            Err(CheckpointError::Storage(e)) => Err(AgentError::Checkpoint(e)),
        }
    }

    async fn execute_and_respond(
        &self,
        mut state: RunState,
        human: Option<ApprovalDecision>,
    ) -> RunOutcome {
        state.status = RunStatus::Executing;
        let Some(plan) = state.plan.clone() else {
            // 按构造不可达：执行阶段必有计划
            return self
                .abort(state, AgentError::PlanningFailure("run has no plan".to_string()))
                .await;
        };
        state.tool_results = self.executor.execute(&plan, &state.session).await;
        self.respond_and_commit(state, human).await
    }

    async fn respond_and_commit(
        &self,
        mut state: RunState,
        human: Option<ApprovalDecision>,
    ) -> RunOutcome {
        state.status = RunStatus::Responding;
        let history = self
            .memory
            .recent(&state.session, self.memory_window)
            .await
            .unwrap_or_default();

        let answer = self
            .responder
            .respond(
                &state.turn,
                state.plan.as_ref(),
                &state.tool_results,
                &history,
                human.as_ref(),
            )
            .await;

        state.turn.answer = Some(answer.clone());
        state.status = RunStatus::Completed;
        if let Err(e) = self.memory.append(&state.session, state.turn.clone()).await {
            return self.abort(state, e).await;
        }
        let _ = self.checkpoints.delete(&state.run_id).await;
        tracing::info!(run_id = %state.run_id, "run completed");
        RunOutcome::Completed { answer }
    }

    async fn abort(&self, mut state: RunState, err: AgentError) -> RunOutcome {
        state.status = RunStatus::Aborted;
        let _ = self.checkpoints.delete(&state.run_id).await;
        tracing::error!(run_id = %state.run_id, error = %err, "run aborted");
        RunOutcome::Failed {
            reason: err.to_string(),
            retry_advisable: err.retry_advisable(),
        }
    }

    async fn take_feedback(&self, session: &SessionKey) -> Option<String> {
        self.pending_feedback.lock().await.remove(&session.storage_key())
    }

    async fn set_feedback(&self, session: &SessionKey, feedback: String) {
        self.pending_feedback
            .lock()
            .await
            .insert(session.storage_key(), feedback);
    }
}
