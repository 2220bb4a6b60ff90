//! 计划 JSON Schema 生成
//!
//! 用 schemars 生成「合法计划」的 JSON 结构并注入 Planner 的 system prompt，
//! 降低 LLM 输出格式错误率。

use std::collections::HashMap;

use schemars::{schema_for, JsonSchema};

/// 计划格式：与 Planner 解析的 JSON 一致（仅用于 Schema 生成）
#[allow(dead_code)]
#[derive(JsonSchema)]
struct PlanFormat {
    /// 是否需要调用工具
    pub needs_tools: bool,
    /// 规划理由
    pub reasoning: String,
    /// 对本计划的置信度，0.0 - 1.0
    pub confidence: Option<f64>,
    /// 要调用的工具列表；needs_tools 为 false 时为空数组
    pub tools_to_use: Vec<PlannedToolFormat>,
}

#[allow(dead_code)]
#[derive(JsonSchema)]
struct PlannedToolFormat {
    /// 注册表中的确切工具名
    pub tool_name: String,
    /// 工具参数
    pub parameters: HashMap<String, String>,
    /// 选择该工具及参数的原因
    pub reason: String,
}

/// 返回计划的 JSON Schema 字符串，可拼入 system prompt
pub fn plan_schema_json() -> String {
    let schema = schema_for!(PlanFormat);
    serde_json::to_string_pretty(&schema).unwrap_or_else(|_| String::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_mentions_plan_fields() {
        let schema = plan_schema_json();
        assert!(schema.contains("needs_tools"));
        assert!(schema.contains("tools_to_use"));
        assert!(schema.contains("tool_name"));
    }
}
