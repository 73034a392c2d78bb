//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按预置脚本依次弹出响应，耗尽后回退为回显；记录调用次数供测试断言
//! （如预算超限场景下必须零次调用后端）。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::core::AgentError;
use crate::llm::client::{LlmClient, LlmResponse};
use crate::memory::{Message, Role, ToolCall, ToolChoice};

/// 脚本化 Mock 客户端
#[derive(Debug, Default)]
pub struct MockLlmClient {
    responses: Mutex<VecDeque<LlmResponse>>,
    calls: AtomicU64,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<LlmResponse>> {
        // 与 PlanStore 同策略：poisoned 直接恢复
        match self.responses.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// 预置一条纯文本响应
    pub fn push_content(&self, content: impl Into<String>) {
        self.queue().push_back(LlmResponse {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        });
    }

    /// 预置一条工具调用响应
    pub fn push_tool_call(&self, name: &str, arguments: serde_json::Value) {
        let id = format!("call_{}", uuid::Uuid::new_v4().simple());
        self.queue().push_back(LlmResponse {
            content: None,
            tool_calls: vec![ToolCall::new(id, name, arguments.to_string())],
        });
    }

    /// 预置任意响应（可同时含正文与多个调用）
    pub fn push_response(&self, response: LlmResponse) {
        self.queue().push_back(response);
    }

    /// 已发生的后端调用次数
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    fn next_response(&self, messages: &[Message]) -> LlmResponse {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Some(r) = self.queue().pop_front() {
            return r;
        }
        // 脚本耗尽：回显最后一条 user 消息
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .and_then(|m| m.content.clone())
            .unwrap_or_else(|| "(no input)".to_string());
        LlmResponse {
            content: Some(format!("Echo from mock: {last_user}")),
            tool_calls: Vec::new(),
        }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn ask(
        &self,
        messages: &[Message],
        _system_msgs: Option<&[Message]>,
        _stream: bool,
    ) -> Result<String, AgentError> {
        let response = self.next_response(messages);
        response.content.ok_or(AgentError::EmptyResponse)
    }

    async fn ask_with_tools(
        &self,
        messages: &[Message],
        _system_msgs: Option<&[Message]>,
        _tools: &[serde_json::Value],
        _tool_choice: ToolChoice,
    ) -> Result<LlmResponse, AgentError> {
        Ok(self.next_response(messages))
    }
}
