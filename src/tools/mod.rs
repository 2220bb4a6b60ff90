//! 辅导工具箱与注册表

pub mod echo;
pub mod practice;
pub mod progress;
pub mod registry;
pub mod schema;
pub mod search_document;
pub mod search_web;

pub use echo::EchoTool;
pub use practice::{PracticeQuestion, PracticeQuestionTool, QuestionBank, RecordAnswerTool};
pub use progress::LearningProgressTool;
pub use registry::{validate_args, Tool, ToolRegistry};
pub use schema::plan_schema_json;
pub use search_document::SearchDocumentTool;
pub use search_web::SearchWebTool;
