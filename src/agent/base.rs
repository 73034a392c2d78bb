//! Agent 基础：共享状态核与执行循环
//!
//! AgentCore 持有名称、prompt、LLM 句柄、记忆与状态机；Agent trait 的默认
//! run 循环负责状态迁移、步数预算与卡死检测，具体每步行为由实现者的 step
//! 提供。

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::{AgentError, AgentState};
use crate::llm::LlmClient;
use crate::memory::{Memory, Message, Role};

/// 卡死时注入的提示
const STUCK_PROMPT: &str = "Observed duplicate responses. Consider new strategies and avoid repeating ineffective paths already attempted.";

/// 默认步数预算
const DEFAULT_MAX_STEPS: usize = 10;
/// 默认重复阈值
const DEFAULT_DUPLICATE_THRESHOLD: usize = 2;

/// Agent 共享核：身份、prompt、LLM、记忆、状态与步数计数
pub struct AgentCore {
    pub name: String,
    pub description: String,
    pub system_prompt: Option<String>,
    pub next_step_prompt: Option<String>,
    pub llm: Arc<dyn LlmClient>,
    pub memory: Memory,
    state: AgentState,
    pub max_steps: usize,
    pub current_step: usize,
    pub duplicate_threshold: usize,
}

impl AgentCore {
    pub fn new(name: impl Into<String>, llm: Arc<dyn LlmClient>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            system_prompt: None,
            next_step_prompt: None,
            llm,
            memory: Memory::default(),
            state: AgentState::Idle,
            max_steps: DEFAULT_MAX_STEPS,
            current_step: 0,
            duplicate_threshold: DEFAULT_DUPLICATE_THRESHOLD,
        }
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn set_state(&mut self, state: AgentState) {
        if self.state != state {
            tracing::debug!(agent = %self.name, from = %self.state, to = %state, "state transition");
        }
        self.state = state;
    }

    /// 最近一条消息的内容在此前的 assistant 消息里重复出现达到阈值即视为卡死
    pub fn is_stuck(&self) -> bool {
        let messages = self.memory.messages();
        if messages.len() < 2 {
            return false;
        }
        let last = &messages[messages.len() - 1];
        let Some(content) = last.content.as_deref().filter(|c| !c.is_empty()) else {
            return false;
        };
        let duplicates = messages[..messages.len() - 1]
            .iter()
            .filter(|m| m.role == Role::Assistant && m.content.as_deref() == Some(content))
            .count();
        duplicates >= self.duplicate_threshold
    }

    /// 把破局提示前置到下一步 prompt
    pub fn handle_stuck_state(&mut self) {
        let base = self.next_step_prompt.clone().unwrap_or_default();
        self.next_step_prompt = Some(if base.is_empty() {
            STUCK_PROMPT.to_string()
        } else {
            format!("{STUCK_PROMPT}\n{base}")
        });
        tracing::warn!(agent = %self.name, "agent detected stuck state, added prompt");
    }
}

/// Agent trait：实现 step，继承默认 run 循环
#[async_trait]
pub trait Agent: Send {
    fn core(&self) -> &AgentCore;

    fn core_mut(&mut self) -> &mut AgentCore;

    /// 执行一步；返回该步的结果描述
    async fn step(&mut self) -> Result<String, AgentError>;

    /// 运行前钩子；返回 true 表示请求已被消费，run 不再追加 user 消息
    async fn prepare(&mut self, _request: Option<&str>) -> Result<bool, AgentError> {
        Ok(false)
    }

    /// 主循环：仅允许从 IDLE 启动；逐步执行直到 FINISHED 或步数耗尽
    async fn run(&mut self, request: Option<&str>) -> Result<String, AgentError> {
        if self.core().state() != AgentState::Idle {
            return Err(AgentError::StateViolation(self.core().state()));
        }

        let consumed = self.prepare(request).await?;
        if let Some(req) = request {
            if !consumed {
                self.core_mut().memory.add_message(Message::user(req));
            }
        }

        let previous = self.core().state();
        self.core_mut().set_state(AgentState::Running);

        let mut results: Vec<String> = Vec::new();
        while self.core().current_step < self.core().max_steps
            && self.core().state() != AgentState::Finished
        {
            self.core_mut().current_step += 1;
            let step_no = self.core().current_step;
            tracing::info!(
                agent = %self.core().name,
                step = step_no,
                max_steps = self.core().max_steps,
                "executing step"
            );

            match self.step().await {
                Ok(result) => {
                    if self.core().is_stuck() {
                        self.core_mut().handle_stuck_state();
                    }
                    results.push(format!("Step {step_no}: {result}"));
                }
                Err(e) => {
                    // ERROR 为瞬时态，回退到进入前的状态后上抛
                    self.core_mut().set_state(AgentState::Error);
                    tracing::error!(agent = %self.core().name, error = %e, "step failed");
                    self.core_mut().set_state(previous);
                    return Err(e);
                }
            }
        }

        if self.core().state() != AgentState::Finished
            && self.core().current_step >= self.core().max_steps
        {
            let max = self.core().max_steps;
            self.core_mut().current_step = 0;
            self.core_mut().set_state(AgentState::Idle);
            results.push(format!("Terminated: Reached max steps ({max})"));
        }

        // FINISHED 保留给调用方检查，其余情况回退
        if self.core().state() != AgentState::Finished {
            self.core_mut().set_state(previous);
        }

        Ok(if results.is_empty() {
            "No steps executed".to_string()
        } else {
            results.join("\n")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    struct CountingAgent {
        core: AgentCore,
        reply: String,
    }

    impl CountingAgent {
        fn new(reply: &str) -> Self {
            Self {
                core: AgentCore::new("counter", Arc::new(MockLlmClient::new())),
                reply: reply.to_string(),
            }
        }
    }

    #[async_trait]
    impl Agent for CountingAgent {
        fn core(&self) -> &AgentCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut AgentCore {
            &mut self.core
        }

        async fn step(&mut self) -> Result<String, AgentError> {
            let reply = self.reply.clone();
            self.core.memory.add_message(Message::assistant(reply.clone()));
            Ok(reply)
        }
    }

    #[tokio::test]
    async fn test_run_rejects_non_idle_state() {
        let mut agent = CountingAgent::new("ok");
        agent.core_mut().set_state(AgentState::Running);
        let err = agent.run(Some("task")).await.unwrap_err();
        assert!(matches!(err, AgentError::StateViolation(AgentState::Running)));
    }

    #[tokio::test]
    async fn test_run_exhausts_budget_and_resets() {
        let mut agent = CountingAgent::new("working");
        agent.core_mut().max_steps = 3;
        // 避免触发卡死检测
        agent.core_mut().duplicate_threshold = 10;
        let summary = agent.run(Some("task")).await.unwrap();
        assert!(summary.contains("Step 3: working"));
        assert!(summary.contains("Terminated: Reached max steps (3)"));
        assert_eq!(agent.core().state(), AgentState::Idle);
        assert_eq!(agent.core().current_step, 0);
    }

    #[tokio::test]
    async fn test_stuck_detection_injects_prompt() {
        let mut agent = CountingAgent::new("same answer");
        agent.core_mut().max_steps = 4;
        agent.core_mut().next_step_prompt = Some("continue".to_string());
        agent.run(Some("task")).await.unwrap();
        let prompt = agent.core().next_step_prompt.clone().unwrap();
        assert!(prompt.starts_with("Observed duplicate responses."));
        assert!(prompt.ends_with("continue"));
    }

    #[test]
    fn test_is_stuck_requires_threshold() {
        let mut core = AgentCore::new("t", Arc::new(MockLlmClient::new()));
        core.memory.add_message(Message::user("go"));
        core.memory.add_message(Message::assistant("same"));
        assert!(!core.is_stuck());
        core.memory.add_message(Message::assistant("same"));
        assert!(!core.is_stuck());
        core.memory.add_message(Message::assistant("same"));
        assert!(core.is_stuck());
    }

    #[test]
    fn test_is_stuck_ignores_empty_content() {
        let mut core = AgentCore::new("t", Arc::new(MockLlmClient::new()));
        core.memory.add_message(Message::assistant("a"));
        core.memory.add_message(Message::from_tool_calls(
            None,
            vec![crate::memory::ToolCall::new("c1", "shell", "{}")],
        ));
        assert!(!core.is_stuck());
    }
}
