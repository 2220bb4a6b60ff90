//! 工具执行节点
//!
//! 对计划内的每个调用：注册表查找（规划后注册表变更按单调用失败处理，不整 Run 中止）、
//! 可选严格参数校验、限时执行。调用间无顺序依赖，按有界并发跑、结果按计划顺序汇总；
//! 单调用失败不影响其余调用。每次调用输出 tool_audit 结构化日志。

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{stream, StreamExt};
use serde_json::Value;
use tokio::time::timeout;

use crate::memory::SessionKey;
use crate::tools::{validate_args, ToolRegistry};
use crate::workflow::types::{FailureKind, Plan, ToolInvocation, ToolOutcome, ToolResult};

/// 计划执行器：有界并发 + 单调用超时
pub struct PlanExecutor {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
    max_concurrent: usize,
}

impl PlanExecutor {
    pub fn new(registry: Arc<ToolRegistry>, timeout_secs: u64, max_concurrent: usize) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// 执行整个计划；每个进入执行的调用恰好产生一条 ToolResult，顺序与计划一致
    pub async fn execute(&self, plan: &Plan, session: &SessionKey) -> Vec<ToolResult> {
        stream::iter(
            plan.invocations
                .iter()
                .map(|inv| self.execute_one(inv, session)),
        )
        .buffered(self.max_concurrent)
        .collect()
        .await
    }

    async fn execute_one(&self, inv: &ToolInvocation, session: &SessionKey) -> ToolResult {
        let start = Instant::now();
        let outcome = self.run_invocation(inv, session).await;

        let label = match &outcome {
            ToolOutcome::Success { .. } => "ok".to_string(),
            ToolOutcome::Failure { kind, .. } => kind.to_string(),
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": inv.tool_name,
            "ok": matches!(outcome, ToolOutcome::Success { .. }),
            "outcome": label,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview(&inv.arguments),
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        ToolResult {
            tool_name: inv.tool_name.clone(),
            outcome,
        }
    }

    async fn run_invocation(&self, inv: &ToolInvocation, session: &SessionKey) -> ToolOutcome {
        let Some(tool) = self.registry.get(&inv.tool_name) else {
            return ToolOutcome::Failure {
                kind: FailureKind::UnknownTool,
                message: format!("tool {} is not registered", inv.tool_name),
            };
        };

        let mut args = inv.arguments.clone();
        // 参数缺 user_id 时由执行器注入，进度类工具据此定位用户
        if let Some(obj) = args.as_object_mut() {
            if !obj.contains_key("user_id") {
                obj.insert("user_id".to_string(), Value::String(session.user_id.clone()));
            }
        }

        if inv.strict {
            if let Err(message) = validate_args(&tool.parameters_schema(), &args) {
                return ToolOutcome::Failure {
                    kind: FailureKind::InvalidArguments,
                    message,
                };
            }
        }

        match timeout(self.timeout, tool.execute(args)).await {
            Ok(Ok(payload)) => ToolOutcome::Success { payload },
            Ok(Err(message)) => ToolOutcome::Failure {
                kind: FailureKind::ExecutionError,
                message,
            },
            Err(_) => ToolOutcome::Failure {
                kind: FailureKind::Timeout,
                message: format!(
                    "tool {} timed out after {}s",
                    inv.tool_name,
                    self.timeout.as_secs()
                ),
            },
        }
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.len() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{EchoTool, Tool};
    use async_trait::async_trait;
    use serde_json::json;

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }

        fn description(&self) -> &str {
            "sleeps past the timeout"
        }

        async fn execute(&self, _args: Value) -> Result<Value, String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(json!({}))
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "failing"
        }

        fn description(&self) -> &str {
            "always errors"
        }

        async fn execute(&self, _args: Value) -> Result<Value, String> {
            Err("boom".to_string())
        }
    }

    struct StrictTool;

    #[async_trait]
    impl Tool for StrictTool {
        fn name(&self) -> &str {
            "strict"
        }

        fn description(&self) -> &str {
            "requires a string query"
        }

        fn parameters_schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": {"query": {"type": "string"}},
                "required": ["query"]
            })
        }

        fn strict_arguments(&self) -> bool {
            true
        }

        async fn execute(&self, _args: Value) -> Result<Value, String> {
            Ok(json!({"ok": true}))
        }
    }

    fn invocation(tool: &str, args: Value, strict: bool) -> ToolInvocation {
        ToolInvocation {
            tool_name: tool.to_string(),
            arguments: args,
            rationale: String::new(),
            strict,
        }
    }

    fn plan(invocations: Vec<ToolInvocation>) -> Plan {
        Plan {
            invocations,
            confidence: 1.0,
            reasoning: String::new(),
        }
    }

    fn executor(timeout_secs: u64) -> PlanExecutor {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        registry.register(SlowTool);
        registry.register(FailingTool);
        registry.register(StrictTool);
        PlanExecutor::new(Arc::new(registry), timeout_secs, 3)
    }

    fn session() -> SessionKey {
        SessionKey::new("u1", "s1")
    }

    #[tokio::test]
    async fn results_preserve_plan_order() {
        let exec = executor(5);
        let results = exec
            .execute(
                &plan(vec![
                    invocation("echo", json!({"text": "one"}), false),
                    invocation("echo", json!({"text": "two"}), false),
                ]),
                &session(),
            )
            .await;

        assert_eq!(results.len(), 2);
        match (&results[0].outcome, &results[1].outcome) {
            (ToolOutcome::Success { payload: a }, ToolOutcome::Success { payload: b }) => {
                assert_eq!(a["text"], "one");
                assert_eq!(b["text"], "two");
            }
            _ => panic!("expected both successes"),
        }
    }

    #[tokio::test]
    async fn timeout_yields_failure_without_aborting_siblings() {
        let exec = executor(1);
        let results = exec
            .execute(
                &plan(vec![
                    invocation("slow", json!({}), false),
                    invocation("echo", json!({"text": "fine"}), false),
                ]),
                &session(),
            )
            .await;

        assert!(matches!(
            results[0].outcome,
            ToolOutcome::Failure { kind: FailureKind::Timeout, .. }
        ));
        assert!(results[1].is_success());
    }

    #[tokio::test]
    async fn unknown_tool_is_a_per_invocation_failure() {
        let exec = executor(5);
        let results = exec
            .execute(&plan(vec![invocation("vanished", json!({}), false)]), &session())
            .await;

        assert!(matches!(
            results[0].outcome,
            ToolOutcome::Failure { kind: FailureKind::UnknownTool, .. }
        ));
    }

    #[tokio::test]
    async fn execution_error_is_captured() {
        let exec = executor(5);
        let results = exec
            .execute(&plan(vec![invocation("failing", json!({}), false)]), &session())
            .await;

        match &results[0].outcome {
            ToolOutcome::Failure { kind, message } => {
                assert_eq!(*kind, FailureKind::ExecutionError);
                assert_eq!(message, "boom");
            }
            ToolOutcome::Success { .. } => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn strict_validation_rejects_bad_arguments() {
        let exec = executor(5);
        let results = exec
            .execute(
                &plan(vec![invocation("strict", json!({"query": 42}), true)]),
                &session(),
            )
            .await;

        assert!(matches!(
            results[0].outcome,
            ToolOutcome::Failure { kind: FailureKind::InvalidArguments, .. }
        ));
    }

    #[tokio::test]
    async fn user_id_is_injected_when_absent() {
        struct CaptureTool;

        #[async_trait]
        impl Tool for CaptureTool {
            fn name(&self) -> &str {
                "capture"
            }

            fn description(&self) -> &str {
                "returns its arguments"
            }

            async fn execute(&self, args: Value) -> Result<Value, String> {
                Ok(args)
            }
        }

        let mut registry = ToolRegistry::new();
        registry.register(CaptureTool);
        let exec = PlanExecutor::new(Arc::new(registry), 5, 1);

        let results = exec
            .execute(&plan(vec![invocation("capture", json!({}), false)]), &session())
            .await;

        match &results[0].outcome {
            ToolOutcome::Success { payload } => assert_eq!(payload["user_id"], "u1"),
            ToolOutcome::Failure { .. } => panic!("expected success"),
        }
    }
}
