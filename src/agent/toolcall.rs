//! 工具调用 Agent
//!
//! think 让 LLM 产出正文与工具调用，act 按序派发并把观测写回记忆。
//! tool_choice 控制三种派发策略：none 只许正文、auto 两者皆可、
//! required 必须给出调用。

use std::sync::Arc;

use async_trait::async_trait;

use crate::agent::base::{Agent, AgentCore};
use crate::core::{AgentError, AgentState};
use crate::llm::LlmClient;
use crate::memory::{Message, ToolCall, ToolChoice};
use crate::tools::{CreateChatCompletionTool, TerminateTool, Tool, ToolCollection, ToolResult};

pub const SYSTEM_PROMPT: &str = "You are an agent that can execute tool calls";
pub const NEXT_STEP_PROMPT: &str =
    "If you want to stop interaction, use `terminate` tool/function call.";

/// 终结判定：工具声明可终结后，再经此谓词确认
pub type FinishPredicate = Box<dyn Fn(&str, &ToolResult) -> bool + Send + Sync>;

/// 工具调用 Agent
pub struct ToolCallAgent {
    core: AgentCore,
    pub available_tools: ToolCollection,
    pub tool_choice: ToolChoice,
    tool_calls: Vec<ToolCall>,
    pub max_observe: Option<usize>,
    finish_when: FinishPredicate,
}

impl ToolCallAgent {
    pub fn new(name: impl Into<String>, llm: Arc<dyn LlmClient>) -> Self {
        let mut core = AgentCore::new(name, llm);
        core.description = "an agent that can execute tool calls.".to_string();
        core.system_prompt = Some(SYSTEM_PROMPT.to_string());
        core.next_step_prompt = Some(NEXT_STEP_PROMPT.to_string());

        let mut tools = ToolCollection::new();
        tools.add_tool(CreateChatCompletionTool);
        tools.add_tool(TerminateTool);

        Self {
            core,
            available_tools: tools,
            tool_choice: ToolChoice::Auto,
            tool_calls: Vec::new(),
            max_observe: None,
            finish_when: Box::new(|_, _| true),
        }
    }

    pub fn with_tools(mut self, tools: ToolCollection) -> Self {
        self.available_tools = tools;
        self
    }

    pub fn add_tool(&mut self, tool: impl Tool + 'static) -> &mut Self {
        self.available_tools.add_tool(tool);
        self
    }

    pub fn with_tool_choice(mut self, tool_choice: ToolChoice) -> Self {
        self.tool_choice = tool_choice;
        self
    }

    pub fn with_max_observe(mut self, max_observe: Option<usize>) -> Self {
        self.max_observe = max_observe;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.core.max_steps = max_steps;
        self
    }

    /// 覆盖终结判定（默认任何可终结工具成功即结束）
    pub fn with_finish_predicate(mut self, predicate: FinishPredicate) -> Self {
        self.finish_when = predicate;
        self
    }

    pub fn pending_tool_calls(&self) -> &[ToolCall] {
        &self.tool_calls
    }

    /// 决策阶段：请求 LLM，记录正文与待派发调用；返回是否需要 act
    pub async fn think(&mut self) -> Result<bool, AgentError> {
        if let Some(prompt) = self.core.next_step_prompt.clone() {
            self.core.memory.add_message(Message::user(prompt));
        }

        let system = self
            .core
            .system_prompt
            .clone()
            .map(|s| vec![Message::system(s)]);
        let response = match self
            .core
            .llm
            .ask_with_tools(
                self.core.memory.messages(),
                system.as_deref(),
                &self.available_tools.to_params(),
                self.tool_choice,
            )
            .await
        {
            Ok(r) => r,
            Err(AgentError::TokenLimitExceeded(msg)) => {
                // 预算耗尽不可恢复，收尾而不是上抛
                tracing::error!(agent = %self.core.name, error = %msg, "token limit reached");
                self.core.memory.add_message(Message::assistant(format!(
                    "Maximum token limit reached, cannot continue execution: {msg}"
                )));
                self.core.set_state(AgentState::Finished);
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        self.tool_calls = response.tool_calls.clone();
        let content = response.content.clone().unwrap_or_default();
        tracing::info!(
            agent = %self.core.name,
            tools = self.tool_calls.len(),
            thoughts = %content,
            "thinking complete"
        );

        if self.tool_choice == ToolChoice::None {
            if !self.tool_calls.is_empty() {
                tracing::warn!(agent = %self.core.name, "agent tried to use tools when they weren't available");
                self.tool_calls.clear();
            }
            if content.is_empty() {
                return Ok(false);
            }
            self.core.memory.add_message(Message::assistant(content));
            return Ok(true);
        }

        if self.tool_calls.is_empty() {
            if !content.is_empty() {
                self.core.memory.add_message(Message::assistant(content.clone()));
            }
            return match self.tool_choice {
                // 缺失调用的失败留给 act 统一报告
                ToolChoice::Required => Ok(true),
                _ => Ok(!content.is_empty()),
            };
        }

        self.core.memory.add_message(Message::from_tool_calls(
            response.content,
            self.tool_calls.clone(),
        ));
        Ok(true)
    }

    /// 执行阶段：按 LLM 给出的顺序派发全部调用，每个调用恰好回写一条 tool 消息
    pub async fn act(&mut self) -> Result<String, AgentError> {
        if self.tool_calls.is_empty() {
            if self.tool_choice == ToolChoice::Required {
                return Err(AgentError::ToolCallRequired);
            }
            return Ok(self
                .core
                .memory
                .messages()
                .last()
                .and_then(|m| m.content.clone())
                .unwrap_or_else(|| "No content or commands to execute".to_string()));
        }

        let calls = self.tool_calls.clone();
        let mut results = Vec::with_capacity(calls.len());
        for call in &calls {
            let mut observation = self.execute_tool(call).await;
            if let Some(max) = self.max_observe {
                observation = observation.chars().take(max).collect();
            }
            tracing::info!(tool = %call.function.name, "tool completed its mission");
            self.core.memory.add_message(Message::tool(
                observation.clone(),
                call.function.name.clone(),
                call.id.clone(),
            ));
            results.push(observation);
        }
        Ok(results.join("\n\n"))
    }

    /// 单个调用的派发：一切失败折叠为观测文本，绝不让坏调用中断循环
    async fn execute_tool(&mut self, call: &ToolCall) -> String {
        let name = call.function.name.as_str();
        if name.is_empty() {
            return "Error: Invalid command format".to_string();
        }
        if self.available_tools.get(name).is_none() {
            return format!("Error: Unknown tool '{name}'");
        }

        let raw = call.function.arguments.trim();
        let raw = if raw.is_empty() { "{}" } else { raw };
        let args: serde_json::Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(_) => {
                tracing::error!(tool = %name, "invalid JSON arguments");
                return format!("Error: failed to parse arguments for {name}: invalid JSON");
            }
        };

        tracing::info!(tool = %name, "activating tool");
        let result = self.available_tools.execute(name, args).await;
        self.handle_terminating_tool(name, &result).await;

        let text = result.to_string();
        if text.is_empty() {
            format!("Cmd `{name}` completed with no output")
        } else {
            format!("Observed output of cmd `{name}` executed:\n{text}")
        }
    }

    /// 可终结工具成功且谓词放行时，清理资源并置 FINISHED
    async fn handle_terminating_tool(&mut self, name: &str, result: &ToolResult) {
        let terminating = self
            .available_tools
            .get(name)
            .map(|t| t.is_terminating())
            .unwrap_or(false);
        if terminating && !result.is_error() && (self.finish_when)(name, result) {
            tracing::info!(tool = %name, "terminating tool has completed the task");
            self.available_tools.cleanup_all().await;
            self.core.set_state(AgentState::Finished);
        }
    }
}

#[async_trait]
impl Agent for ToolCallAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AgentCore {
        &mut self.core
    }

    async fn step(&mut self) -> Result<String, AgentError> {
        if self.think().await? {
            self.act().await
        } else {
            Ok("Thinking complete - no action needed".to_string())
        }
    }
}
