//! Planner 节点：调用 LLM 产出计划，并把计划当作不可信输入校验
//!
//! LLM 按固定 JSON 形状回复（needs_tools / reasoning / confidence / tools_to_use）；
//! 输出非 JSON 或解析失败时回退关键词规则计划；未知工具名丢弃并告警（不致命）；
//! confidence 缺失时按启发式评估，最终一律夹取到 [0, 1]。
//! 供应商错误（不可用/超时）中止整个 Run。

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::AgentError;
use crate::llm::{ChatMessage, LlmClient};
use crate::memory::Turn;
use crate::tools::{plan_schema_json, ToolRegistry};
use crate::workflow::types::{Plan, ToolInvocation};

/// 启发式置信度基线
const BASELINE_CONFIDENCE: f64 = 0.8;
/// 简单明确的请求：加分
const SIMPLE_KEYWORDS: &[&str] = &["practice", "question", "progress", "simple", "basic", "help", "show"];
/// 复杂请求：减分
const COMPLEX_KEYWORDS: &[&str] = &["analyze", "complex", "detailed", "comprehensive", "elaborate", "explain"];
/// 含糊请求：大幅减分
const AMBIGUOUS_KEYWORDS: &[&str] = &["something", "anything", "whatever", "not sure", "maybe"];

/// LLM 回复的计划 JSON
#[derive(Debug, Deserialize)]
struct PlanJson {
    #[serde(default)]
    needs_tools: bool,
    #[serde(default)]
    reasoning: String,
    confidence: Option<f64>,
    #[serde(default)]
    tools_to_use: Vec<PlannedToolJson>,
}

#[derive(Debug, Deserialize)]
struct PlannedToolJson {
    tool_name: String,
    #[serde(default)]
    parameters: Value,
    #[serde(default)]
    reason: String,
}

/// 从 LLM 输出中提取 JSON 片段（```json 围栏或首末花括号）
fn extract_json(output: &str) -> Option<&str> {
    let trimmed = output.trim();
    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        let inner = rest.find("```").map(|end| &rest[..end]).unwrap_or(rest);
        return Some(inner.trim());
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (end > start).then(|| &trimmed[start..=end])
}

fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

/// 启发式置信度：基线 0.8，按关键词与长度加减分
fn assess_confidence(question: &str, has_tools: bool) -> f64 {
    let lower = question.to_lowercase();
    let mut confidence = BASELINE_CONFIDENCE;

    if SIMPLE_KEYWORDS.iter().any(|k| lower.contains(k)) {
        confidence += 0.1;
    }
    if COMPLEX_KEYWORDS.iter().any(|k| lower.contains(k)) {
        confidence -= 0.3;
    }
    if AMBIGUOUS_KEYWORDS.iter().any(|k| lower.contains(k)) {
        confidence -= 0.4;
    }
    if question.len() > 200 {
        confidence -= 0.2;
    } else if question.len() < 20 {
        confidence += 0.1;
    }
    if !has_tools && COMPLEX_KEYWORDS.iter().any(|k| lower.contains(k)) {
        confidence -= 0.2;
    }

    clamp01(confidence)
}

/// 关键词规则计划：LLM 输出不可解析时的回退
fn fallback_plan(question: &str) -> PlanJson {
    tracing::info!("planner falling back to keyword routing");
    let lower = question.to_lowercase();

    if ["practice", "question", "start"].iter().any(|k| lower.contains(k)) {
        PlanJson {
            needs_tools: true,
            reasoning: "Fallback: detected practice-related request".to_string(),
            confidence: None,
            tools_to_use: vec![PlannedToolJson {
                tool_name: "get_practice_question".to_string(),
                parameters: json!({"topic": "Grammar", "difficulty": "medium"}),
                reason: "User wants practice questions".to_string(),
            }],
        }
    } else if ["progress", "performance"].iter().any(|k| lower.contains(k)) {
        PlanJson {
            needs_tools: true,
            reasoning: "Fallback: detected progress request".to_string(),
            confidence: None,
            tools_to_use: vec![PlannedToolJson {
                tool_name: "get_learning_progress".to_string(),
                parameters: json!({}),
                reason: "User wants to see progress".to_string(),
            }],
        }
    } else if ["grammar", "english", "vocabulary"].iter().any(|k| lower.contains(k)) {
        PlanJson {
            needs_tools: true,
            reasoning: "Fallback: detected study-content request".to_string(),
            confidence: None,
            tools_to_use: vec![PlannedToolJson {
                tool_name: "search_document".to_string(),
                parameters: json!({"query": question, "max_results": 5}),
                reason: "User needs study content".to_string(),
            }],
        }
    } else {
        PlanJson {
            needs_tools: false,
            reasoning: "Fallback: general question, no tools needed".to_string(),
            confidence: None,
            tools_to_use: Vec::new(),
        }
    }
}

/// Planner：持有 LLM 与注册表，产出经过校验的 Plan
pub struct PlannerNode {
    llm: Arc<dyn LlmClient>,
    registry: Arc<ToolRegistry>,
}

impl PlannerNode {
    pub fn new(llm: Arc<dyn LlmClient>, registry: Arc<ToolRegistry>) -> Self {
        Self { llm, registry }
    }

    fn system_prompt(&self) -> String {
        format!(
            "You are a coaching assistant with access to the following tools:\n\n\
             Available tools:\n{}\n\n\
             Analyze the user's question and decide if you need to use any tools. \
             Be specific about WHY.\n\n\
             Reply only with JSON matching this schema:\n{}\n\n\
             If no tools are needed, set needs_tools to false and use an empty array for \
             tools_to_use. Include a confidence value between 0.0 and 1.0 for how certain \
             you are about the plan.",
            self.registry.to_schema_json(),
            plan_schema_json(),
        )
    }

    /// 产出计划：历史窗口 + 当前输入 +（可选）上一轮 modify 反馈
    pub async fn plan(
        &self,
        turn: &Turn,
        history: &[Turn],
        carried_feedback: Option<&str>,
    ) -> Result<Plan, AgentError> {
        let mut messages = vec![ChatMessage::system(self.system_prompt())];
        for prior in history {
            messages.push(ChatMessage::user(&prior.user_text));
            if let Some(answer) = &prior.answer {
                messages.push(ChatMessage::assistant(answer));
            }
        }
        if let Some(feedback) = carried_feedback {
            messages.push(ChatMessage::system(format!(
                "The user revised the previous plan with this feedback: {feedback}. \
                 Incorporate it into the new plan."
            )));
        }
        messages.push(ChatMessage::user(&turn.user_text));

        let output = self
            .llm
            .complete(&messages)
            .await
            .map_err(|e| AgentError::PlanningFailure(e.to_string()))?;

        let parsed = match extract_json(&output) {
            Some(snippet) => match serde_json::from_str::<PlanJson>(snippet) {
                Ok(plan) => plan,
                Err(e) => {
                    tracing::warn!(error = %e, "planner output JSON invalid");
                    fallback_plan(&turn.user_text)
                }
            },
            None => {
                tracing::warn!("planner output contained no JSON");
                fallback_plan(&turn.user_text)
            }
        };

        Ok(self.validate(parsed, &turn.user_text))
    }

    /// 注册表校验 + 置信度收口
    fn validate(&self, parsed: PlanJson, question: &str) -> Plan {
        if !parsed.needs_tools || parsed.tools_to_use.is_empty() {
            // 无需工具：直达 Responder，置信度默认拉满
            return Plan::no_tools(parsed.reasoning, parsed.confidence.map(clamp01).unwrap_or(1.0));
        }

        let mut invocations = Vec::new();
        for requested in parsed.tools_to_use {
            match self.registry.get(&requested.tool_name) {
                Some(tool) => invocations.push(ToolInvocation {
                    tool_name: requested.tool_name,
                    arguments: if requested.parameters.is_object() {
                        requested.parameters
                    } else {
                        json!({})
                    },
                    rationale: requested.reason,
                    strict: tool.strict_arguments(),
                }),
                None => {
                    tracing::warn!(tool = %requested.tool_name, "planner requested unknown tool, dropping");
                }
            }
        }

        let confidence = clamp01(
            parsed
                .confidence
                .unwrap_or_else(|| assess_confidence(question, !invocations.is_empty())),
        );

        Plan {
            invocations,
            confidence,
            reasoning: parsed.reasoning,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::tools::EchoTool;

    fn registry_with_echo() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        Arc::new(registry)
    }

    fn turn(text: &str) -> Turn {
        Turn::new("run-1", text)
    }

    #[test]
    fn extract_json_handles_fences_and_bare_objects() {
        assert_eq!(
            extract_json("```json\n{\"a\": 1}\n```"),
            Some("{\"a\": 1}")
        );
        assert_eq!(extract_json("prefix {\"a\": 1} suffix"), Some("{\"a\": 1}"));
        assert_eq!(extract_json("no json here"), None);
    }

    #[test]
    fn confidence_heuristic_rewards_simple_and_penalizes_ambiguous() {
        assert!(assess_confidence("show my progress", true) > BASELINE_CONFIDENCE);
        assert!(assess_confidence("maybe do something, not sure what", true) < 0.5);
    }

    #[tokio::test]
    async fn unknown_tools_are_dropped_not_fatal() {
        let llm = Arc::new(MockLlmClient::with_responses(vec![
            r#"{"needs_tools": true, "reasoning": "mix", "confidence": 0.9,
                "tools_to_use": [
                    {"tool_name": "bogus", "parameters": {}, "reason": "no"},
                    {"tool_name": "echo", "parameters": {"text": "hi"}, "reason": "yes"}
                ]}"#,
        ]));
        let planner = PlannerNode::new(llm, registry_with_echo());

        let plan = planner.plan(&turn("say hi"), &[], None).await.unwrap();
        assert_eq!(plan.invocations.len(), 1);
        assert_eq!(plan.invocations[0].tool_name, "echo");
    }

    #[tokio::test]
    async fn confidence_is_clamped_to_unit_interval() {
        let llm = Arc::new(MockLlmClient::with_responses(vec![
            r#"{"needs_tools": true, "reasoning": "r", "confidence": 3.5,
                "tools_to_use": [{"tool_name": "echo", "parameters": {}, "reason": "r"}]}"#,
        ]));
        let planner = PlannerNode::new(llm, registry_with_echo());

        let plan = planner.plan(&turn("hi"), &[], None).await.unwrap();
        assert!((plan.confidence - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn no_tools_plan_defaults_to_full_confidence() {
        let llm = Arc::new(MockLlmClient::with_responses(vec![
            r#"{"needs_tools": false, "reasoning": "small talk", "tools_to_use": []}"#,
        ]));
        let planner = PlannerNode::new(llm, registry_with_echo());

        let plan = planner.plan(&turn("hello"), &[], None).await.unwrap();
        assert!(plan.invocations.is_empty());
        assert!((plan.confidence - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn non_json_output_uses_keyword_fallback() {
        let llm = Arc::new(MockLlmClient::with_responses(vec![
            "I think the user wants to practice.",
        ]));
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        registry.register(crate::tools::PracticeQuestionTool::new(std::sync::Arc::new(
            crate::tools::QuestionBank::builtin(),
        )));
        let planner = PlannerNode::new(llm, Arc::new(registry));

        let plan = planner
            .plan(&turn("let's practice some questions"), &[], None)
            .await
            .unwrap();
        assert_eq!(plan.invocations.len(), 1);
        assert_eq!(plan.invocations[0].tool_name, "get_practice_question");
    }

    #[tokio::test]
    async fn carried_feedback_lands_in_planner_context() {
        let llm = Arc::new(MockLlmClient::with_responses(vec![
            r#"{"needs_tools": false, "reasoning": "ok", "tools_to_use": []}"#,
        ]));
        let planner = PlannerNode::new(llm.clone(), registry_with_echo());

        planner
            .plan(&turn("try again"), &[], Some("use easier questions"))
            .await
            .unwrap();

        let requests = llm.requests();
        assert!(requests[0]
            .iter()
            .any(|m| m.content.contains("use easier questions")));
    }
}
