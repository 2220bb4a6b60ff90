//! LLM 客户端抽象与实现（OpenAI 兼容 / Mock）

pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;

pub use mock::MockLlmClient;
pub use openai::OpenAiClient;
pub use traits::{ChatMessage, LlmClient, LlmError, Role};

use crate::config::AppConfig;

/// 根据配置与环境变量选择 LLM 后端；无 API Key 时回退 Mock 并告警
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    let has_key = std::env::var("OPENAI_API_KEY").is_ok();

    if provider == "mock" {
        tracing::info!("Using mock LLM (configured)");
        return Arc::new(MockLlmClient::new());
    }
    if !has_key {
        tracing::warn!("No API key set, using mock LLM");
        return Arc::new(MockLlmClient::new());
    }

    tracing::info!("Using OpenAI-compatible LLM ({})", cfg.llm.model);
    Arc::new(OpenAiClient::new(
        cfg.llm.base_url.as_deref(),
        &cfg.llm.model,
        None,
        cfg.llm.request_timeout_secs,
    ))
}
