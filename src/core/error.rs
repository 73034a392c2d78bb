//! 引擎错误类型
//!
//! 协议违规（状态、参数）、预算超限（不可重试）、后端瞬时失败（可重试）、
//! 计划存储不一致等；工具执行失败不走此类型，统一编码进 ToolResult。

use thiserror::Error;

use crate::core::AgentState;

/// 引擎运行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    /// 非 IDLE 状态下调用 run
    #[error("Cannot run agent from state: {0}")]
    StateViolation(AgentState),

    /// 输入 token 预算超限；不可重试，当前 run 优雅终止
    #[error("Token limit exceeded: {0}")]
    TokenLimitExceeded(String),

    /// tool_choice 为 required 但后端未提出任何工具调用
    #[error("Tool calls required but none provided")]
    ToolCallRequired,

    /// 消息缺少 role 或既无 content 也无 tool_calls
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// 后端瞬时失败（限流、API 错误等），重试耗尽后上抛
    #[error("LLM error: {0}")]
    LlmError(String),

    /// 后端返回了无可用内容的响应
    #[error("Empty or invalid response from LLM")]
    EmptyResponse,

    /// 两个 ToolResult 的非空字段无法拼接
    #[error("Cannot combine tool results")]
    ToolResultConflict,

    /// 计划存储层操作失败
    #[error("Plan error: {0}")]
    PlanError(String),

    /// 流程级失败
    #[error("Flow error: {0}")]
    FlowError(String),

    /// 整个 execute 超过墙钟上限
    #[error("Flow timed out after {0}s")]
    FlowTimeout(u64),
}

impl AgentError {
    /// 是否为瞬时失败：仅后端调用错误参与退避重试，
    /// TokenLimitExceeded 与 EmptyResponse 明确排除在外
    pub fn is_retryable(&self) -> bool {
        matches!(self, AgentError::LlmError(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_limit_is_not_retryable() {
        assert!(!AgentError::TokenLimitExceeded("over budget".into()).is_retryable());
        assert!(!AgentError::EmptyResponse.is_retryable());
        assert!(AgentError::LlmError("rate limited".into()).is_retryable());
    }
}
