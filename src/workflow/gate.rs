//! 审批门禁：确定性谓词，不做任何外部调用
//!
//! 挂起条件：confidence 低于阈值，或计划含注册表标记为敏感的工具。
//! 空计划不经此门（编排器直接送 Responder）。阈值越低自动放行越多。

use crate::tools::ToolRegistry;
use crate::workflow::types::{ApprovalRequest, Plan};

/// 门禁判定结果
#[derive(Debug)]
pub enum GateVerdict {
    /// 原样放行
    Pass,
    /// 挂起并生成审批请求
    Suspend(ApprovalRequest),
}

/// 审批门禁
pub struct ApprovalGate {
    threshold: f64,
    enabled: bool,
}

impl ApprovalGate {
    pub fn new(threshold: f64, enabled: bool) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
            enabled,
        }
    }

    pub fn evaluate(&self, run_id: &str, plan: &Plan, registry: &ToolRegistry) -> GateVerdict {
        if !self.enabled {
            return GateVerdict::Pass;
        }

        let sensitive: Vec<&str> = plan
            .invocations
            .iter()
            .filter(|inv| registry.is_sensitive(&inv.tool_name))
            .map(|inv| inv.tool_name.as_str())
            .collect();
        let low_confidence = plan.confidence < self.threshold;

        if !low_confidence && sensitive.is_empty() {
            return GateVerdict::Pass;
        }

        let message = self.approval_message(plan.confidence, low_confidence, &sensitive);
        GateVerdict::Suspend(ApprovalRequest {
            run_id: run_id.to_string(),
            plan: plan.clone(),
            confidence: plan.confidence,
            message,
        })
    }

    /// 给审批人看的挂起原因
    fn approval_message(&self, confidence: f64, low_confidence: bool, sensitive: &[&str]) -> String {
        let mut reasons = Vec::new();
        if low_confidence {
            if confidence < 0.5 {
                reasons.push(format!("very low confidence ({confidence:.2})"));
            } else {
                reasons.push(format!("low confidence ({confidence:.2})"));
            }
        }
        if !sensitive.is_empty() {
            reasons.push(format!("sensitive tools: {}", sensitive.join(", ")));
        }
        format!("Human approval needed: {}", reasons.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{Tool, ToolRegistry};
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct FlaggedTool {
        name: &'static str,
        sensitive: bool,
    }

    #[async_trait]
    impl Tool for FlaggedTool {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "test tool"
        }

        fn sensitive(&self) -> bool {
            self.sensitive
        }

        async fn execute(&self, _args: Value) -> Result<Value, String> {
            Ok(json!({}))
        }
    }

    fn registry() -> ToolRegistry {
        let mut r = ToolRegistry::new();
        r.register(FlaggedTool { name: "safe", sensitive: false });
        r.register(FlaggedTool { name: "risky", sensitive: true });
        r
    }

    fn plan_with(tool: &str, confidence: f64) -> Plan {
        Plan {
            invocations: vec![crate::workflow::types::ToolInvocation {
                tool_name: tool.to_string(),
                arguments: json!({}),
                rationale: String::new(),
                strict: false,
            }],
            confidence,
            reasoning: String::new(),
        }
    }

    #[test]
    fn confident_safe_plan_passes() {
        let gate = ApprovalGate::new(0.8, true);
        assert!(matches!(
            gate.evaluate("r1", &plan_with("safe", 0.9), &registry()),
            GateVerdict::Pass
        ));
    }

    #[test]
    fn low_confidence_suspends() {
        let gate = ApprovalGate::new(0.8, true);
        match gate.evaluate("r1", &plan_with("safe", 0.4), &registry()) {
            GateVerdict::Suspend(req) => {
                assert_eq!(req.run_id, "r1");
                assert!((req.confidence - 0.4).abs() < f64::EPSILON);
                assert!(req.message.contains("very low confidence"));
            }
            GateVerdict::Pass => panic!("expected suspension"),
        }
    }

    #[test]
    fn sensitive_tool_suspends_even_when_confident() {
        let gate = ApprovalGate::new(0.8, true);
        match gate.evaluate("r1", &plan_with("risky", 0.99), &registry()) {
            GateVerdict::Suspend(req) => assert!(req.message.contains("risky")),
            GateVerdict::Pass => panic!("expected suspension"),
        }
    }

    #[test]
    fn disabled_gate_passes_everything() {
        let gate = ApprovalGate::new(0.8, false);
        assert!(matches!(
            gate.evaluate("r1", &plan_with("risky", 0.1), &registry()),
            GateVerdict::Pass
        ));
    }

    #[test]
    fn boundary_confidence_passes() {
        let gate = ApprovalGate::new(0.8, true);
        assert!(matches!(
            gate.evaluate("r1", &plan_with("safe", 0.8), &registry()),
            GateVerdict::Pass
        ));
    }
}
