//! 核心层：错误分类与重试建议

pub mod error;

pub use error::AgentError;
