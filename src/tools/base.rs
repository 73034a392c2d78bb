//! 工具 trait 与执行结果
//!
//! 所有工具实现 Tool trait（name / description / 参数 schema / 异步执行）。
//! 终结能力通过 is_terminating 声明，调度层据此结束运行，不做名字匹配。

use async_trait::async_trait;
use serde_json::Value;

use crate::core::AgentError;

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、异步执行（args 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（函数调用中的 function.name）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 参数 JSON Schema（供 LLM 生成正确的参数格式）
    /// 默认返回空对象，表示无参数
    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    /// 该工具成功执行后是否应结束本次运行
    fn is_terminating(&self) -> bool {
        false
    }

    /// 执行工具；失败也通过 ToolResult 的 error 字段表达
    async fn execute(&self, args: Value) -> ToolResult;

    /// 运行结束时的资源清理
    async fn cleanup(&self) {}

    /// OpenAI 函数调用格式的工具声明
    fn to_param(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name(),
                "description": self.description(),
                "parameters": self.parameters(),
            }
        })
    }
}

/// 工具执行结果：正常输出 / 错误 / 系统侧信息，三者均可缺省
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ToolResult {
    pub output: Option<String>,
    pub error: Option<String>,
    pub system: Option<String>,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            output: Some(output.into()),
            ..Default::default()
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.output.is_none() && self.error.is_none() && self.system.is_none()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// 合并两个结果：output 与 error 拼接；system 不可拼接，双方都非空时报
    /// ToolResultConflict
    pub fn combine(self, other: ToolResult) -> Result<ToolResult, AgentError> {
        fn concat(a: Option<String>, b: Option<String>) -> Option<String> {
            match (a, b) {
                (Some(a), Some(b)) => Some(a + &b),
                (Some(v), None) | (None, Some(v)) => Some(v),
                (None, None) => None,
            }
        }
        let system = match (self.system, other.system) {
            (Some(_), Some(_)) => return Err(AgentError::ToolResultConflict),
            (Some(v), None) | (None, Some(v)) => Some(v),
            (None, None) => None,
        };
        Ok(ToolResult {
            output: concat(self.output, other.output),
            error: concat(self.error, other.error),
            system,
        })
    }
}

impl std::fmt::Display for ToolResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(e) = &self.error {
            write!(f, "Error: {e}")
        } else {
            write!(f, "{}", self.output.as_deref().unwrap_or(""))
        }
    }
}
