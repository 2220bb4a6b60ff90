//! 网页抓取工具：域名白名单、超时、结果大小限制
//!
//! 用于时事与常识类查询；仅允许配置中的域名，HTML 响应经 html2text 提取可读文本，
//! 超过 max_result_chars 时截断并追加 ...[truncated]。

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use html2text::from_read;
use reqwest::Client;
use serde_json::{json, Value};

use crate::tools::Tool;

/// 从 URL 中提取 host（小写，不含端口与路径）
fn extract_domain(url: &str) -> Option<String> {
    let rest = url
        .trim()
        .strip_prefix("https://")
        .or_else(|| url.trim().strip_prefix("http://"))?;
    let host = rest.split('/').next()?.split(':').next()?;
    Some(host.to_lowercase())
}

/// 判断响应是否像 HTML 文档
fn looks_like_html(body: &str) -> bool {
    let s = body.trim_start();
    s.starts_with("<!") || s.starts_with("<html") || s.starts_with("<HTML")
}

/// 网页抓取：GET 允许域名内的 URL，返回可读文本
pub struct SearchWebTool {
    client: Client,
    allowed_domains: HashSet<String>,
    max_result_chars: usize,
}

impl SearchWebTool {
    pub fn new(allowed_domains: Vec<String>, timeout_secs: u64, max_result_chars: usize) -> Self {
        let allowed_domains = allowed_domains.into_iter().map(|d| d.to_lowercase()).collect();
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("coach-agent/0.1")
            .build()
            .unwrap_or_default();
        Self {
            client,
            allowed_domains,
            max_result_chars,
        }
    }

    fn check_allowed(&self, url: &str) -> Result<(), String> {
        let domain = extract_domain(url).ok_or_else(|| "Invalid or missing URL".to_string())?;
        if self.allowed_domains.contains(&domain) {
            Ok(())
        } else {
            Err(format!("Domain not in allowlist: {domain}"))
        }
    }

    async fn fetch(&self, url: &str) -> Result<String, String> {
        self.check_allowed(url)?;
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("Request failed: {e}"))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let body = resp.text().await.map_err(|e| format!("Read body: {e}"))?;

        let text = if looks_like_html(&body) {
            from_read(body.as_bytes(), 120).unwrap_or_else(|_| body.clone())
        } else {
            body
        };

        if text.chars().count() > self.max_result_chars {
            Ok(text.chars().take(self.max_result_chars).collect::<String>() + "\n...[truncated]")
        } else {
            Ok(text)
        }
    }
}

#[async_trait]
impl Tool for SearchWebTool {
    fn name(&self) -> &str {
        "search_web"
    }

    fn description(&self) -> &str {
        "Fetch a web page for current events and general knowledge (allowlisted domains only). \
         Args: {\"url\": \"https://...\"}"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "page to fetch, domain must be allowlisted"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let url = args
            .get("url")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| "Missing url".to_string())?;
        tracing::info!(url = %url, "web fetch");
        let content = self.fetch(url).await?;
        Ok(json!({ "url": url, "content": content }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_extraction() {
        assert_eq!(
            extract_domain("https://en.wikipedia.org/wiki/Grammar"),
            Some("en.wikipedia.org".to_string())
        );
        assert_eq!(
            extract_domain("http://Example.COM:8080/page"),
            Some("example.com".to_string())
        );
        assert_eq!(extract_domain("not a url"), None);
    }

    #[tokio::test]
    async fn rejects_domains_outside_allowlist() {
        let tool = SearchWebTool::new(vec!["en.wikipedia.org".into()], 5, 1000);
        let err = tool
            .execute(json!({"url": "https://evil.example.com/page"}))
            .await
            .unwrap_err();
        assert!(err.contains("allowlist"));
    }

    #[tokio::test]
    async fn rejects_missing_url() {
        let tool = SearchWebTool::new(vec![], 5, 1000);
        assert!(tool.execute(json!({})).await.is_err());
    }
}
