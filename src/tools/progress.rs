//! 学习进度工具：按主题汇报正确率

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::memory::ProgressStore;
use crate::tools::Tool;

/// 进度查询：读取进度存储的主题聚合
pub struct LearningProgressTool {
    progress: Arc<ProgressStore>,
}

impl LearningProgressTool {
    pub fn new(progress: Arc<ProgressStore>) -> Self {
        Self { progress }
    }
}

#[async_trait]
impl Tool for LearningProgressTool {
    fn name(&self) -> &str {
        "get_learning_progress"
    }

    fn description(&self) -> &str {
        "Show the user's learning progress per topic (questions answered, accuracy). \
         Args: {} (user is inferred from the session)"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "user_id": {
                    "type": "string",
                    "description": "filled in automatically when omitted"
                }
            },
            "required": []
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let user_id = args
            .get("user_id")
            .and_then(|v| v.as_str())
            .unwrap_or("anonymous");

        let topics = self
            .progress
            .topic_progress(user_id)
            .map_err(|e| format!("Failed to load progress: {e}"))?;

        let rows: Vec<Value> = topics
            .iter()
            .map(|t| {
                json!({
                    "topic": t.topic,
                    "total_questions": t.total,
                    "correct": t.correct,
                    "accuracy": (t.accuracy() * 10.0).round() / 10.0,
                })
            })
            .collect();

        Ok(json!({ "user_id": user_id, "topics": rows }))
    }
}
