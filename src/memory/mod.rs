//! 记忆层：会话轮次日志、学习资料索引、学习进度存储与持久化

pub mod conversation;
pub mod index;
pub mod persistence;
pub mod progress;

pub use conversation::{InMemorySessionMemory, MemoryStore, SessionKey, Turn};
pub use index::{DocumentIndex, InMemoryIndex};
pub use persistence::FileSessionMemory;
pub use progress::{ProgressStore, TopicProgress};
