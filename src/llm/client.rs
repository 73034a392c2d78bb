//! LLM 客户端抽象
//!
//! ask（纯文本）与 ask_with_tools（函数调用），发送前校验消息并估算输入 token；
//! 预算超限直接返回不可重试错误。累计输入 token 计数按客户端实例作用域共享。

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::core::AgentError;
use crate::memory::{Message, ToolCall, ToolChoice};

/// 后端响应：可选正文 + 有序工具调用列表
#[derive(Clone, Debug, Default)]
pub struct LlmResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

/// LLM 客户端 trait：所有后端（OpenAI 兼容 / Mock）实现
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 纯文本问答；stream 为 true 时边收边聚合完整回复
    async fn ask(
        &self,
        messages: &[Message],
        system_msgs: Option<&[Message]>,
        stream: bool,
    ) -> Result<String, AgentError>;

    /// 携带工具 schema 的问答，返回正文与工具调用
    async fn ask_with_tools(
        &self,
        messages: &[Message],
        system_msgs: Option<&[Message]>,
        tools: &[serde_json::Value],
        tool_choice: ToolChoice,
    ) -> Result<LlmResponse, AgentError>;

    /// 累计已发送的输入 token 数
    fn total_input_tokens(&self) -> u64 {
        0
    }
}

/// 校验消息列表：每条必须有合法 role，且 content 与 tool_calls 至少一项非空
pub fn validate_messages(messages: &[Message]) -> Result<(), AgentError> {
    for msg in messages {
        let has_content = msg.content.as_deref().map_or(false, |c| !c.is_empty());
        let has_calls = msg.tool_calls.as_ref().map_or(false, |t| !t.is_empty());
        if !has_content && !has_calls {
            return Err(AgentError::InvalidMessage(
                "message must have either content or tool_calls".to_string(),
            ));
        }
    }
    Ok(())
}

/// Token 估算（字符计数近似）：ASCII 约 4 字符/token，其余约 1.5 字符/token
pub fn estimate_tokens(text: &str) -> u64 {
    if text.is_empty() {
        return 0;
    }
    let mut ascii_chars: u64 = 0;
    let mut non_ascii_chars: u64 = 0;
    for c in text.chars() {
        if c.is_ascii() {
            ascii_chars += 1;
        } else {
            non_ascii_chars += 1;
        }
    }
    (ascii_chars / 4 + (non_ascii_chars as f64 / 1.5).ceil() as u64).max(1)
}

/// 估算一组消息的输入 token：role + content + 工具调用名与参数 + 关联字段
pub fn estimate_message_tokens(messages: &[Message]) -> u64 {
    let mut count: u64 = 0;
    for msg in messages {
        // 每条消息的格式开销（参考 OpenAI 的计费口径）
        count += 4;
        count += estimate_tokens(role_str(msg));
        if let Some(content) = &msg.content {
            count += estimate_tokens(content);
        }
        if let Some(calls) = &msg.tool_calls {
            for call in calls {
                count += estimate_tokens(&call.function.name);
                count += estimate_tokens(&call.function.arguments);
            }
        }
        if let Some(name) = &msg.name {
            count += estimate_tokens(name);
        }
        if let Some(id) = &msg.tool_call_id {
            count += estimate_tokens(id);
        }
    }
    count + 2
}

fn role_str(msg: &Message) -> &'static str {
    match msg.role {
        crate::memory::Role::System => "system",
        crate::memory::Role::User => "user",
        crate::memory::Role::Assistant => "assistant",
        crate::memory::Role::Tool => "tool",
    }
}

/// 输入 token 预算：累计计数 + 可选上限，多 Agent 共享同一客户端时并发安全
#[derive(Debug, Default)]
pub struct TokenBudget {
    total_input: AtomicU64,
    max_input: Option<u64>,
}

impl TokenBudget {
    pub fn new(max_input: Option<u64>) -> Self {
        Self {
            total_input: AtomicU64::new(0),
            max_input,
        }
    }

    /// 发送前检查：本次请求会否超出预算
    pub fn check(&self, input_tokens: u64) -> Result<(), AgentError> {
        if let Some(max) = self.max_input {
            let total = self.total_input.load(Ordering::Relaxed);
            if total + input_tokens > max {
                return Err(AgentError::TokenLimitExceeded(format!(
                    "request may exceed input token limit (current: {total}, needed: {input_tokens}, max: {max})"
                )));
            }
        }
        Ok(())
    }

    /// 请求成功后记入实际（或流式场景下估算的）消耗
    pub fn add(&self, input_tokens: u64) {
        let total = self.total_input.fetch_add(input_tokens, Ordering::Relaxed) + input_tokens;
        tracing::info!(input_tokens, cumulative_input = total, "token usage");
    }

    pub fn total(&self) -> u64 {
        self.total_input.load(Ordering::Relaxed)
    }
}
