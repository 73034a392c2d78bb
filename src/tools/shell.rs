//! Shell 执行工具
//!
//! 单次 sh -c 执行，带超时；实例内用异步互斥串行化，避免并发命令互相干扰。
//! 退出码与 stderr 一并折叠进观测文本，交给 LLM 自行判断。

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tokio::sync::Mutex;

use crate::tools::base::{Tool, ToolResult};

const DESCRIPTION: &str = "Execute a shell command in the terminal. \
Long-running commands should be run in the background with output redirection, e.g. `command > out.log 2>&1 &`.";

/// Shell 工具：每次调用独立进程，串行执行
pub struct ShellTool {
    timeout: Duration,
    lock: Mutex<()>,
}

impl ShellTool {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_secs),
            lock: Mutex::new(()),
        }
    }
}

impl Default for ShellTool {
    fn default() -> Self {
        Self::new(120)
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute."
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let command = args
            .get("command")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim()
            .to_string();
        if command.is_empty() {
            return ToolResult::err("No command provided");
        }

        let _guard = self.lock.lock().await;
        tracing::info!(command = %command, "shell tool execute");

        let mut cmd = Command::new("sh");
        cmd.args(["-c", &command]);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return ToolResult::err(format!("Execution failed: {e}")),
            Err(_) => {
                return ToolResult::err(format!(
                    "Command timed out after {}s. Consider running it in the background with output redirection.",
                    self.timeout.as_secs()
                ));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        let mut observed = stdout;
        if !stderr.is_empty() {
            if !observed.is_empty() {
                observed.push('\n');
            }
            observed.push_str(&format!("stderr: {stderr}"));
        }
        if !output.status.success() {
            if !observed.is_empty() {
                observed.push('\n');
            }
            observed.push_str(&format!("exit status: {}", output.status));
        }
        ToolResult::ok(observed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shell_captures_stdout() {
        let tool = ShellTool::new(10);
        let result = tool
            .execute(serde_json::json!({"command": "echo hello"}))
            .await;
        assert_eq!(result.output.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_shell_reports_nonzero_exit() {
        let tool = ShellTool::new(10);
        let result = tool.execute(serde_json::json!({"command": "false"})).await;
        let observed = result.output.unwrap();
        assert!(observed.contains("exit status"));
    }

    #[tokio::test]
    async fn test_shell_rejects_empty_command() {
        let tool = ShellTool::new(10);
        let result = tool.execute(serde_json::json!({})).await;
        assert!(result.is_error());
    }

    #[tokio::test]
    async fn test_shell_times_out() {
        let tool = ShellTool::new(1);
        let result = tool
            .execute(serde_json::json!({"command": "sleep 5"}))
            .await;
        assert!(result.error.unwrap().contains("timed out"));
    }
}
