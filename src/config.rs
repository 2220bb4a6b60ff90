//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `COACH__*` 覆盖（双下划线表示嵌套，
//! 如 `COACH__APPROVAL__THRESHOLD=0.5`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub approval: ApprovalSection,
    pub tools: ToolsSection,
}

/// [app] 段：应用名、历史窗口、可选持久化目录
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: Option<String>,
    /// 规划/回复可见的历史轮数（窗口大小由外部给定，核心不自行计算）
    pub memory_window: usize,
    /// 会话日志目录；未设置时用内存存储
    pub session_dir: Option<PathBuf>,
    /// 检查点目录；未设置时用内存存储（重启丢失在途审批）
    pub checkpoint_dir: Option<PathBuf>,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            memory_window: 10,
            session_dir: None,
            checkpoint_dir: None,
        }
    }
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// openai / mock
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            request_timeout_secs: 60,
        }
    }
}

/// [approval] 段：人工审批门禁
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApprovalSection {
    /// 置信度低于该值的计划挂起待审批；越低自动放行越多
    pub threshold: f64,
    pub enabled: bool,
}

impl Default for ApprovalSection {
    fn default() -> Self {
        Self {
            threshold: 0.8,
            enabled: true,
        }
    }
}

/// [tools] 段：超时、并发、进度库、网页抓取
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
    /// 工具并发上限
    pub max_concurrent: usize,
    /// 进度 SQLite 路径；未设置时用内存库
    pub progress_db: Option<PathBuf>,
    pub search: SearchSection,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 30,
            max_concurrent: 3,
            progress_db: None,
            search: SearchSection::default(),
        }
    }
}

/// [tools.search] 段：网页抓取的超时、大小限制与域名白名单
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    pub timeout_secs: u64,
    pub max_result_chars: usize,
    pub allowed_domains: Vec<String>,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            max_result_chars: 8000,
            allowed_domains: vec![
                // 百科与词典
                "en.wikipedia.org".into(),
                "simple.wikipedia.org".into(),
                "www.merriam-webster.com".into(),
                "dictionary.cambridge.org".into(),
                // 写作与语法
                "owl.purdue.edu".into(),
                // 法律资源
                "www.law.cornell.edu".into(),
                // 新闻
                "www.bbc.com".into(),
            ],
        }
    }
}

/// 从 config 目录加载配置，环境变量 COACH__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 COACH__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{name}.toml");
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("COACH")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.app.memory_window, 10);
        assert!((cfg.approval.threshold - 0.8).abs() < f64::EPSILON);
        assert!(cfg.approval.enabled);
        assert_eq!(cfg.tools.tool_timeout_secs, 30);
        assert_eq!(cfg.tools.max_concurrent, 3);
        assert!(!cfg.tools.search.allowed_domains.is_empty());
    }
}
