//! 终止工具
//!
//! LLM 通过该工具声明任务完成或无法继续；is_terminating 为 true，调度层
//! 据此把状态置为 FINISHED。

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::base::{Tool, ToolResult};

const DESCRIPTION: &str = "Terminate the interaction when the request is met OR if the assistant cannot proceed further with the task. \
When you have finished all the tasks, call this tool to end the work.";

/// 终止工具：唯一参数 status 为 success 或 failure
#[derive(Default)]
pub struct TerminateTool;

#[async_trait]
impl Tool for TerminateTool {
    fn name(&self) -> &str {
        "terminate"
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "status": {
                    "type": "string",
                    "description": "The finish status of the interaction.",
                    "enum": ["success", "failure"]
                }
            },
            "required": ["status"]
        })
    }

    fn is_terminating(&self) -> bool {
        true
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let status = args
            .get("status")
            .and_then(|v| v.as_str())
            .unwrap_or("success");
        ToolResult::ok(format!(
            "The interaction has been completed with status: {status}"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_terminate_reports_status() {
        let tool = TerminateTool;
        assert!(tool.is_terminating());
        let result = tool.execute(serde_json::json!({"status": "failure"})).await;
        assert_eq!(
            result.output.as_deref(),
            Some("The interaction has been completed with status: failure")
        );
    }
}
