//! Coach - Rust 对话式辅导智能体
//!
//! 模块划分：
//! - **agent**: 无界面运行时（传输层边界 submit_turn / submit_decision）
//! - **checkpoint**: 挂起 Run 的检查点存储（内存 / 文件）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误分类与重试建议
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **memory**: 会话轮次日志、学习资料索引、学习进度存储
//! - **tools**: 辅导工具箱（资料检索、网页抓取、练习题、进度）与注册表
//! - **workflow**: 规划 -> 审批门禁 -> 工具执行 -> 回复合成 的编排引擎

pub mod agent;
pub mod checkpoint;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod tools;
pub mod workflow;

pub use agent::CoachAgent;
