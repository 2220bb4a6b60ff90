//! Responder 节点：汇总计划、工具结果与人工反馈，生成最终回复
//!
//! 文本生成交给 LLM；本节点只组装结构化上下文，并保证回复非空：
//! LLM 返回空串或出错时回退为固定致歉文案，错误不向上抛。

use std::sync::Arc;

use crate::llm::{ChatMessage, LlmClient};
use crate::memory::Turn;
use crate::workflow::types::{ApprovalDecision, Decision, Plan, ToolOutcome, ToolResult};

/// LLM 失败/空回复时的兜底文案
pub const FALLBACK_ANSWER: &str = "I apologize, but I ran into a problem while preparing my \
response. Please try asking your question again.";

const RESULT_PREVIEW_CHARS: usize = 1000;

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        format!("{}...", s.chars().take(max_chars).collect::<String>())
    } else {
        s.to_string()
    }
}

/// 组装给 LLM 的 system 上下文：按「被拒绝 / 有工具结果 / 直接回答」三种形态
fn compose_context(
    plan: Option<&Plan>,
    results: &[ToolResult],
    human: Option<&ApprovalDecision>,
) -> String {
    let reasoning = plan
        .map(|p| p.reasoning.as_str())
        .filter(|r| !r.is_empty())
        .unwrap_or("Direct response without tools");

    if let Some(decision) = human {
        if matches!(decision.decision, Decision::Reject | Decision::Modify) {
            let feedback = decision.feedback.as_deref().unwrap_or("(no feedback given)");
            return format!(
                "You are a helpful coaching assistant.\n\n\
                 The user declined the proposed plan before any tools ran.\n\n\
                 Proposed plan: {reasoning}\n\
                 User feedback: {feedback}\n\n\
                 Acknowledge that nothing was executed, address the feedback, and offer a \
                 concrete next step."
            );
        }
    }

    if results.is_empty() {
        return format!(
            "You are a helpful coaching assistant guiding a learner.\n\n\
             Planning decision:\n{reasoning}\n\n\
             Answer the user's question directly with a clear, educational explanation. \
             Be encouraging and supportive; share relevant advice or study strategies where \
             appropriate. If you cannot fully answer, suggest useful next steps."
        );
    }

    let summaries: Vec<String> = results
        .iter()
        .map(|r| match &r.outcome {
            ToolOutcome::Success { payload } => format!(
                "Tool {}: {}",
                r.tool_name,
                truncate(&payload.to_string(), RESULT_PREVIEW_CHARS)
            ),
            ToolOutcome::Failure { kind, message } => {
                format!("Tool {} failed ({kind}): {message}", r.tool_name)
            }
        })
        .collect();

    format!(
        "You are a helpful coaching assistant.\n\n\
         Planning decision:\n{reasoning}\n\n\
         Tool results:\n{}\n\n\
         Answer the user's question using the tool results. If a result contains a practice \
         question, present it clearly with its options and wait for the user's answer. If it \
         contains progress data, summarize it encouragingly. If any tools failed or timed out, \
         acknowledge this but still do your best to assist.",
        summaries.join("\n")
    )
}

/// Responder：组装上下文并调用 LLM
pub struct Responder {
    llm: Arc<dyn LlmClient>,
}

impl Responder {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// 合成最终回复；保证非空
    pub async fn respond(
        &self,
        turn: &Turn,
        plan: Option<&Plan>,
        results: &[ToolResult],
        history: &[Turn],
        human: Option<&ApprovalDecision>,
    ) -> String {
        let mut messages = vec![ChatMessage::system(compose_context(plan, results, human))];
        for prior in history {
            messages.push(ChatMessage::user(&prior.user_text));
            if let Some(answer) = &prior.answer {
                messages.push(ChatMessage::assistant(answer));
            }
        }
        messages.push(ChatMessage::user(&turn.user_text));

        match self.llm.complete(&messages).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                tracing::warn!("responder returned empty answer, using fallback");
                FALLBACK_ANSWER.to_string()
            }
            Err(e) => {
                tracing::warn!(error = %e, "responder LLM failed, using fallback");
                FALLBACK_ANSWER.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::workflow::types::FailureKind;
    use serde_json::json;

    fn turn(text: &str) -> Turn {
        Turn::new("run-1", text)
    }

    #[tokio::test]
    async fn empty_llm_answer_falls_back() {
        let llm = Arc::new(MockLlmClient::with_responses(vec!["   "]));
        let responder = Responder::new(llm);

        let answer = responder.respond(&turn("hi"), None, &[], &[], None).await;
        assert_eq!(answer, FALLBACK_ANSWER);
    }

    #[tokio::test]
    async fn rejection_context_carries_feedback() {
        let llm = Arc::new(MockLlmClient::with_responses(vec!["Understood."]));
        let responder = Responder::new(llm.clone());
        let decision = ApprovalDecision::reject(Some("too risky".to_string()));

        responder
            .respond(&turn("do it"), None, &[], &[], Some(&decision))
            .await;

        let requests = llm.requests();
        let system = &requests[0][0].content;
        assert!(system.contains("declined the proposed plan"));
        assert!(system.contains("too risky"));
    }

    #[tokio::test]
    async fn failed_tools_appear_in_context() {
        let llm = Arc::new(MockLlmClient::with_responses(vec!["ok"]));
        let responder = Responder::new(llm.clone());
        let results = vec![
            ToolResult {
                tool_name: "search_document".to_string(),
                outcome: ToolOutcome::Success { payload: json!({"count": 1}) },
            },
            ToolResult {
                tool_name: "search_web".to_string(),
                outcome: ToolOutcome::Failure {
                    kind: FailureKind::Timeout,
                    message: "timed out".to_string(),
                },
            },
        ];

        responder
            .respond(&turn("look this up"), None, &results, &[], None)
            .await;

        let system = &llm.requests()[0][0].content;
        assert!(system.contains("search_document"));
        assert!(system.contains("failed (timeout)"));
    }
}
