//! 无界面辅导智能体运行时（传输层边界）
//!
//! 对外两个逻辑操作：submit_turn（提交用户输入，返回答案或待审批句柄）与
//! submit_decision（按会话提交审批决策）；HTTP / RPC / 进程内调用均可复用。
//! 构造时装配默认工具箱（资料检索、网页抓取、练习题、进度）、LLM、记忆与检查点存储。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::checkpoint::{CheckpointStore, FileCheckpointStore, InMemoryCheckpointStore};
use crate::config::AppConfig;
use crate::core::AgentError;
use crate::llm::create_llm_from_config;
use crate::memory::{
    DocumentIndex, FileSessionMemory, InMemoryIndex, InMemorySessionMemory, MemoryStore,
    ProgressStore, SessionKey,
};
use crate::tools::{
    EchoTool, LearningProgressTool, PracticeQuestionTool, QuestionBank, RecordAnswerTool,
    SearchDocumentTool, SearchWebTool, ToolRegistry,
};
use crate::workflow::{
    ApprovalDecision, Orchestrator, OrchestratorOptions, RunId, RunOutcome,
};

/// 辅导智能体：编排器 + 会话到挂起 Run 的映射
pub struct CoachAgent {
    orchestrator: Orchestrator,
    /// 会话 -> 挂起中的 run_id（传输层按 (user, session) 定位决策）
    pending_runs: Mutex<HashMap<String, RunId>>,
}

impl CoachAgent {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator,
            pending_runs: Mutex::new(HashMap::new()),
        }
    }

    /// 按配置装配全套组件
    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let llm = create_llm_from_config(cfg);

        let index: Arc<dyn DocumentIndex> = Arc::new(InMemoryIndex::default());
        seed_study_corpus(index.as_ref());
        let bank = Arc::new(QuestionBank::builtin());
        let progress = Arc::new(match &cfg.tools.progress_db {
            Some(path) => ProgressStore::open(path)?,
            None => ProgressStore::open_in_memory()?,
        });

        let mut registry = ToolRegistry::new();
        registry.register(SearchDocumentTool::new(index));
        registry.register(SearchWebTool::new(
            cfg.tools.search.allowed_domains.clone(),
            cfg.tools.search.timeout_secs,
            cfg.tools.search.max_result_chars,
        ));
        registry.register(PracticeQuestionTool::new(bank.clone()));
        registry.register(RecordAnswerTool::new(bank, progress.clone()));
        registry.register(LearningProgressTool::new(progress));
        registry.register(EchoTool);

        let memory: Arc<dyn MemoryStore> = match &cfg.app.session_dir {
            Some(dir) => Arc::new(FileSessionMemory::new(dir)),
            None => Arc::new(InMemorySessionMemory::new()),
        };
        let checkpoints: Arc<dyn CheckpointStore> = match &cfg.app.checkpoint_dir {
            Some(dir) => Arc::new(FileCheckpointStore::new(dir)),
            None => Arc::new(InMemoryCheckpointStore::new()),
        };

        let options = OrchestratorOptions {
            approval_threshold: cfg.approval.threshold,
            approval_enabled: cfg.approval.enabled,
            tool_timeout_secs: cfg.tools.tool_timeout_secs,
            max_concurrent_tools: cfg.tools.max_concurrent,
            memory_window: cfg.app.memory_window,
        };

        Ok(Self::new(Orchestrator::new(
            llm,
            Arc::new(registry),
            memory,
            checkpoints,
            options,
        )))
    }

    /// 提交一轮用户输入；挂起时记下会话到 run 的映射供后续决策寻址
    pub async fn submit_turn(
        &self,
        user_id: &str,
        session_id: &str,
        text: &str,
    ) -> Result<RunOutcome, AgentError> {
        let session = SessionKey::new(user_id, session_id);
        let outcome = self.orchestrator.start(session.clone(), text).await?;
        if let RunOutcome::PendingApproval(request) = &outcome {
            self.pending_runs
                .lock()
                .await
                .insert(session.storage_key(), request.run_id.clone());
        }
        Ok(outcome)
    }

    /// 对会话内挂起的审批提交决策
    pub async fn submit_decision(
        &self,
        user_id: &str,
        session_id: &str,
        decision: ApprovalDecision,
    ) -> Result<RunOutcome, AgentError> {
        let session = SessionKey::new(user_id, session_id);
        let run_id = self
            .pending_runs
            .lock()
            .await
            .remove(&session.storage_key())
            .ok_or_else(|| {
                AgentError::UnknownRun(format!("no pending approval for session {session}"))
            })?;
        self.orchestrator.resume(&run_id, decision).await
    }

    /// 取消会话内挂起的审批；此后对该 Run 的任何决策都被拒绝
    pub async fn cancel_pending(&self, user_id: &str, session_id: &str) -> Result<(), AgentError> {
        let session = SessionKey::new(user_id, session_id);
        let run_id = self
            .pending_runs
            .lock()
            .await
            .remove(&session.storage_key())
            .ok_or_else(|| {
                AgentError::UnknownRun(format!("no pending approval for session {session}"))
            })?;
        self.orchestrator.cancel(&run_id).await
    }

    /// 底层编排器（按 run_id 寻址的 resume/cancel 走这里）
    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }
}

/// 内置学习资料：真实部署由外部摄取管道灌入
fn seed_study_corpus(index: &dyn DocumentIndex) {
    index.add(
        "Grammar",
        "The past perfect tense (had + past participle) describes an action completed before \
         another past action: 'She had left when we arrived.'",
    );
    index.add(
        "Grammar",
        "Subject-verb agreement: singular subjects take singular verbs; intervening phrases do \
         not change the number of the subject.",
    );
    index.add(
        "Vocabulary",
        "Ephemeral: lasting for a very short time. Ubiquitous: present everywhere. \
         Ameliorate: to make something better.",
    );
    index.add(
        "Reading Comprehension",
        "Skim the passage for structure first, then read the questions, then re-read the \
         relevant paragraphs closely before answering.",
    );
    index.add(
        "Legal Reasoning",
        "A valid contract requires offer, acceptance, consideration and an intention to create \
         legal relations.",
    );
}
