//! 直接回复工具
//!
//! 当任务只需要一段面向用户的文字时，LLM 通过该工具给出最终回复，而不是
//! 继续调用执行类工具。

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::base::{Tool, ToolResult};

/// 文本回复工具
#[derive(Default)]
pub struct CreateChatCompletionTool;

#[async_trait]
impl Tool for CreateChatCompletionTool {
    fn name(&self) -> &str {
        "create_chat_completion"
    }

    fn description(&self) -> &str {
        "Creates a structured chat completion with a formatted response for the user."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "response": {
                    "type": "string",
                    "description": "The response text that should be delivered to the user."
                }
            },
            "required": ["response"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        match args.get("response").and_then(|v| v.as_str()) {
            Some(response) => ToolResult::ok(response),
            None => ToolResult::err("Missing required argument 'response'"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_returns_response_text() {
        let tool = CreateChatCompletionTool;
        let result = tool
            .execute(serde_json::json!({"response": "All done."}))
            .await;
        assert_eq!(result.output.as_deref(), Some("All done."));
    }
}
