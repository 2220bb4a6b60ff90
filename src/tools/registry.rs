//! 工具注册表
//!
//! 所有能力实现 Tool trait（name / description / sensitive / parameters_schema / execute），
//! 启动时按名注册。Planner 产出的工具名是不可信输入：只有经注册表确认的名字才会进入执行，
//! 敏感标记由审批门禁读取。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

/// 工具 trait：名称、描述（供 LLM 理解）、敏感标记、参数 schema、异步执行
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（计划 JSON 中的 "tool_name" 字段）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 决定是否调用）
    fn description(&self) -> &str;

    /// 敏感工具：包含它的计划一律挂起待人工审批
    fn sensitive(&self) -> bool {
        false
    }

    /// 参数 JSON Schema（供 LLM 生成正确参数，并用于 strict 校验）
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    /// 执行前是否按声明 schema 严格校验参数结构
    fn strict_arguments(&self) -> bool {
        false
    }

    /// 执行工具，返回结构化载荷
    async fn execute(&self, args: Value) -> Result<Value, String>;
}

/// 工具注册表：按名称存储 Arc<dyn Tool>
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// 未注册的名字按不敏感处理（执行层会另行报 unknown tool）
    pub fn is_sensitive(&self, name: &str) -> bool {
        self.tools.get(name).is_some_and(|t| t.sensitive())
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// 工具清单 JSON（name / description / sensitive / parameters），拼入 Planner 的 system prompt
    pub fn to_schema_json(&self) -> String {
        let mut tools: Vec<Value> = self
            .tools
            .iter()
            .map(|(name, tool)| {
                serde_json::json!({
                    "name": name,
                    "description": tool.description(),
                    "sensitive": tool.sensitive(),
                    "parameters": tool.parameters_schema()
                })
            })
            .collect();
        tools.sort_by_key(|t| t["name"].as_str().unwrap_or_default().to_string());
        serde_json::to_string_pretty(&tools).unwrap_or_else(|_| "[]".to_string())
    }
}

/// 按声明 schema 做结构校验：required 齐全、已声明属性的原始类型匹配
pub fn validate_args(schema: &Value, args: &Value) -> Result<(), String> {
    let obj = args
        .as_object()
        .ok_or_else(|| "arguments must be a JSON object".to_string())?;

    if let Some(required) = schema.get("required").and_then(|v| v.as_array()) {
        for entry in required {
            if let Some(name) = entry.as_str() {
                if !obj.contains_key(name) {
                    return Err(format!("missing required argument: {name}"));
                }
            }
        }
    }

    if let Some(props) = schema.get("properties").and_then(|v| v.as_object()) {
        for (key, value) in obj {
            let Some(declared) = props.get(key) else {
                continue; // 未声明的参数放行（如执行器注入的 user_id）
            };
            if let Some(ty) = declared.get("type").and_then(|t| t.as_str()) {
                let matches = match ty {
                    "string" => value.is_string(),
                    "integer" => value.is_i64() || value.is_u64(),
                    "number" => value.is_number(),
                    "boolean" => value.is_boolean(),
                    "array" => value.is_array(),
                    "object" => value.is_object(),
                    _ => true,
                };
                if !matches {
                    return Err(format!("argument {key} should be of type {ty}"));
                }
            }
        }
    }

    Ok(())
}
