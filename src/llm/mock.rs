//! Mock LLM 客户端（测试与无 API Key 环境用）
//!
//! 维护一个脚本化回复队列：每次 complete 按序弹出一条；队列耗尽时返回固定文案。
//! 同时记录收到的全部请求消息，便于测试断言 Prompt 内容（如 modify 反馈是否进入下一轮规划）。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{ChatMessage, LlmClient, LlmError};

/// Mock 客户端：按脚本回复并记录请求
pub struct MockLlmClient {
    responses: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
    fallback: String,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            fallback: "I'm a mock language model. Configure a real provider to get helpful answers."
                .to_string(),
        }
    }

    /// 预置一组按序返回的回复
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let client = Self::new();
        {
            let mut queue = client.responses.lock().unwrap();
            queue.extend(responses.into_iter().map(Into::into));
        }
        client
    }

    /// 追加一条回复到队列尾部
    pub fn push(&self, response: impl Into<String>) {
        self.responses.lock().unwrap().push_back(response.into());
    }

    /// 收到过的全部请求（按调用顺序）
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        let next = self.responses.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| self.fallback.clone()))
    }
}
