//! Coach - 对话式辅导智能体
//!
//! 入口：初始化日志与配置，创建 CoachAgent，标准输入 REPL 驱动
//! submit_turn / submit_decision（审批在终端内交互完成）。

use std::io::Write;

use anyhow::Context;
use coach::config::{load_config, AppConfig};
use coach::workflow::{ApprovalDecision, RunOutcome};
use coach::CoachAgent;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn prompt(label: &str) -> anyhow::Result<Option<String>> {
    print!("{label}");
    std::io::stdout().flush()?;
    let mut line = String::new();
    if std::io::stdin().read_line(&mut line)? == 0 {
        return Ok(None); // EOF
    }
    Ok(Some(line.trim().to_string()))
}

/// "approve" / "reject too risky" / "modify use easier questions" -> 决策
fn parse_decision(input: &str) -> ApprovalDecision {
    let (word, rest) = match input.split_once(' ') {
        Some((w, r)) => (w, r.trim()),
        None => (input, ""),
    };
    let feedback = (!rest.is_empty()).then(|| rest.to_string());
    match word.to_lowercase().as_str() {
        "approve" | "a" | "yes" | "y" => ApprovalDecision::approve(),
        "modify" | "m" => ApprovalDecision {
            decision: coach::workflow::Decision::Modify,
            feedback,
        },
        _ => ApprovalDecision::reject(feedback),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志：默认 info，可通过 RUST_LOG 覆盖
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with(fmt::layer())
        .init();

    let cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });
    let agent = CoachAgent::from_config(&cfg).context("Failed to build agent")?;

    let user_id = std::env::var("COACH_USER").unwrap_or_else(|_| "local".to_string());
    let session_id = "default";

    println!("Coach ready. Ask a question, or /quit to exit.");
    loop {
        let Some(text) = prompt("you> ")? else { break };
        if text.is_empty() {
            continue;
        }
        if text == "/quit" || text == "/exit" {
            break;
        }

        match agent.submit_turn(&user_id, session_id, &text).await {
            Ok(RunOutcome::Completed { answer }) => println!("coach> {answer}"),
            Ok(RunOutcome::PendingApproval(request)) => {
                println!("coach> {}", request.message);
                for inv in &request.plan.invocations {
                    println!("  - {} {}", inv.tool_name, inv.arguments);
                }
                let Some(input) = prompt("approve / reject [feedback] / modify [feedback]> ")?
                else {
                    break;
                };
                match agent
                    .submit_decision(&user_id, session_id, parse_decision(&input))
                    .await
                {
                    Ok(RunOutcome::Completed { answer }) => println!("coach> {answer}"),
                    Ok(RunOutcome::Failed { reason, .. }) => {
                        println!("coach> Sorry, that didn't work out: {reason}")
                    }
                    Ok(RunOutcome::PendingApproval(_)) => {
                        // 恢复路径不会再次挂起
                        println!("coach> Unexpected second approval request");
                    }
                    Err(e) => println!("coach> {e}"),
                }
            }
            Ok(RunOutcome::Failed { reason, retry_advisable }) => {
                if retry_advisable {
                    println!("coach> Sorry, something went wrong ({reason}). Please try again.");
                } else {
                    println!("coach> Sorry, something went wrong: {reason}");
                }
            }
            Err(e) => println!("coach> {e}"),
        }
    }

    Ok(())
}
