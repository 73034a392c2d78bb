//! 计划驱动流程编排
//!
//! 流程先让 LLM 建立计划，然后逐步选取活跃步骤、挑选执行者 Agent 执行，
//! 步骤文本中的 `[TYPE]` 标签决定执行者；全部步骤完成后生成收尾总结。
//! 计划变更尽量走规划工具，工具层失败时退回直接存储操作。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use regex::Regex;

use crate::agent::Agent;
use crate::core::{AgentError, AgentState};
use crate::llm::LlmClient;
use crate::memory::{Message, ToolChoice};
use crate::plan::{PlanStore, PlanningTool, StepStatus};
use crate::tools::Tool;

const PLANNING_SYSTEM_PROMPT: &str = "You are a planning assistant. Create a concise, actionable plan with clear steps. \
Focus on key milestones rather than detailed sub-steps. Optimize for clarity and efficiency.";

const FINALIZE_SYSTEM_PROMPT: &str = "You are a planning assistant. Your task is to summarize the completed plan.";

/// 当前待执行步骤的信息
#[derive(Clone, Debug)]
struct StepInfo {
    index: usize,
    text: String,
    step_type: Option<String>,
}

/// 计划驱动流程：一组按 key 注册的执行者 Agent + 共享计划
pub struct PlanningFlow {
    agents: HashMap<String, Box<dyn Agent>>,
    agent_order: Vec<String>,
    executor_keys: Vec<String>,
    llm: Arc<dyn LlmClient>,
    store: PlanStore,
    planning_tool: PlanningTool,
    pub active_plan_id: String,
    step_type_re: Regex,
}

impl PlanningFlow {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        let store = PlanStore::new();
        Self {
            agents: HashMap::new(),
            agent_order: Vec::new(),
            executor_keys: Vec::new(),
            llm,
            planning_tool: PlanningTool::new(store.clone()),
            store,
            active_plan_id: format!("plan_{}", Utc::now().timestamp()),
            // 步骤文本里的类型标签，如 [CODE]、[SEARCH]
            step_type_re: Regex::new(r"\[([A-Z_]+)\]").expect("static regex"),
        }
    }

    /// 注册执行者；首个注册者为主执行者
    pub fn add_agent(mut self, key: impl Into<String>, agent: Box<dyn Agent>) -> Self {
        let key = key.into();
        if !self.agents.contains_key(&key) {
            self.agent_order.push(key.clone());
        }
        self.agents.insert(key, agent);
        self
    }

    /// 限定可作为步骤执行者的 key 顺序；为空时全部可用
    pub fn with_executors(mut self, keys: Vec<String>) -> Self {
        self.executor_keys = keys;
        self
    }

    pub fn with_plan_id(mut self, id: impl Into<String>) -> Self {
        self.active_plan_id = id.into();
        self
    }

    pub fn store(&self) -> &PlanStore {
        &self.store
    }

    fn primary_key(&self) -> Option<&str> {
        self.agent_order.first().map(|s| s.as_str())
    }

    /// 按步骤类型挑选执行者：同名 key 优先，其次执行者列表顺序，最后主执行者
    fn executor_key(&self, step_type: Option<&str>) -> Option<String> {
        if let Some(t) = step_type {
            if self.agents.contains_key(t) {
                return Some(t.to_string());
            }
        }
        for key in &self.executor_keys {
            if self.agents.contains_key(key) {
                return Some(key.clone());
            }
        }
        self.primary_key().map(|s| s.to_string())
    }

    /// 带墙钟上限的执行
    pub async fn execute_with_timeout(
        &mut self,
        input: &str,
        timeout_secs: u64,
    ) -> Result<String, AgentError> {
        match tokio::time::timeout(Duration::from_secs(timeout_secs), self.execute(input)).await {
            Ok(result) => result,
            Err(_) => Err(AgentError::FlowTimeout(timeout_secs)),
        }
    }

    /// 主入口：建计划、逐步执行、收尾总结
    pub async fn execute(&mut self, input: &str) -> Result<String, AgentError> {
        if self.agents.is_empty() {
            return Err(AgentError::FlowError("No agents registered".to_string()));
        }

        if !input.is_empty() {
            self.create_initial_plan(input).await?;
            if !self.store.contains(&self.active_plan_id) {
                tracing::error!(
                    plan_id = %self.active_plan_id,
                    "plan creation failed, plan not found in storage"
                );
                return Ok(format!("Failed to create plan for: {input}"));
            }
        }

        let mut result = String::new();
        loop {
            let Some(step) = self.current_step_info().await else {
                result.push_str(&self.finalize_plan().await);
                break;
            };

            let Some(key) = self.executor_key(step.step_type.as_deref()) else {
                return Err(AgentError::FlowError("No agents registered".to_string()));
            };
            tracing::info!(step = step.index, executor = %key, "executing plan step");

            match self.execute_step(&key, &step).await {
                Ok(step_result) => {
                    self.mark_step_status(step.index, StepStatus::Completed).await;
                    result.push_str(&step_result);
                    result.push('\n');
                }
                Err(e) => {
                    tracing::error!(step = step.index, error = %e, "step execution failed");
                    result.push_str(&format!("Error executing step {}: {e}\n", step.index));
                    break;
                }
            }

            // 执行者自行终止时提前收场
            if let Some(agent) = self.agents.get(&key) {
                if agent.core().state() == AgentState::Finished {
                    break;
                }
            }
        }
        Ok(result)
    }

    /// 让 LLM 通过规划工具建初始计划；失败时落默认计划
    async fn create_initial_plan(&mut self, request: &str) -> Result<(), AgentError> {
        tracing::info!(plan_id = %self.active_plan_id, "creating initial plan");

        let system = vec![Message::system(PLANNING_SYSTEM_PROMPT)];
        let user = vec![Message::user(format!(
            "Create a reasonable plan with clear steps to accomplish the task: {request}"
        ))];
        let params = vec![self.planning_tool.to_param()];

        let response = self
            .llm
            .ask_with_tools(&user, Some(&system), &params, ToolChoice::Auto)
            .await;

        if let Ok(response) = response {
            for call in &response.tool_calls {
                if call.function.name != "planning" {
                    continue;
                }
                let mut args: serde_json::Value =
                    serde_json::from_str(&call.function.arguments).unwrap_or_default();
                if let Some(map) = args.as_object_mut() {
                    // 计划 ID 由流程统一分配
                    map.insert(
                        "plan_id".to_string(),
                        serde_json::Value::String(self.active_plan_id.clone()),
                    );
                }
                let result = self.planning_tool.execute(args).await;
                if !result.is_error() {
                    tracing::info!(result = %result, "plan created");
                    return Ok(());
                }
                tracing::warn!(error = %result, "planning tool rejected the create command");
            }
        }

        tracing::warn!("creating default plan");
        self.create_default_plan(request).await;
        Ok(())
    }

    async fn create_default_plan(&mut self, request: &str) {
        let title = if request.chars().count() > 50 {
            format!("Plan: {}...", request.chars().take(50).collect::<String>())
        } else {
            format!("Plan: {request}")
        };
        let steps = vec![
            "Analyze the request".to_string(),
            "Execute the task".to_string(),
            "Verify the results".to_string(),
        ];

        let result = self
            .planning_tool
            .execute(serde_json::json!({
                "command": "create",
                "plan_id": self.active_plan_id,
                "title": title,
                "steps": steps,
            }))
            .await;
        if result.is_error() {
            // 工具层失败时直接写存储
            if let Err(e) = self.store.create(&self.active_plan_id, &title, steps) {
                tracing::error!(error = %e, "failed to create default plan");
            }
        }
    }

    /// 首个活跃步骤及其类型标签；未开始的标成进行中
    async fn current_step_info(&mut self) -> Option<StepInfo> {
        let plan = match self.store.get(Some(&self.active_plan_id)) {
            Ok(plan) => plan,
            Err(e) => {
                tracing::error!(error = %e, "failed to load plan");
                return None;
            }
        };
        let (index, text) = plan.first_active_step()?;
        let text = text.to_string();
        let step_type = self
            .step_type_re
            .captures(&text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_lowercase());

        if plan.statuses()[index] == StepStatus::NotStarted {
            self.mark_step_status(index, StepStatus::InProgress).await;
        }
        Some(StepInfo {
            index,
            text,
            step_type,
        })
    }

    /// 标记步骤状态；规划工具失败时退回直接存储操作，状态变更不丢失
    async fn mark_step_status(&self, index: usize, status: StepStatus) {
        let result = self
            .planning_tool
            .execute(serde_json::json!({
                "command": "mark_step",
                "plan_id": self.active_plan_id,
                "step_index": index,
                "step_status": status.as_str(),
            }))
            .await;
        if !result.is_error() {
            return;
        }
        tracing::warn!(step = index, error = %result, "planning tool rejected status update, writing directly");
        if let Err(e) = self
            .store
            .mark_step(Some(&self.active_plan_id), index, Some(status), None)
        {
            tracing::warn!(step = index, error = %e, "failed to update step status");
        }
    }

    async fn execute_step(&mut self, key: &str, step: &StepInfo) -> Result<String, AgentError> {
        let plan_text = self
            .store
            .render(Some(&self.active_plan_id))
            .unwrap_or_else(|e| format!("Error retrieving plan: {e}"));

        let prompt = format!(
            "CURRENT PLAN STATUS:\n{plan_text}\n\nYOUR CURRENT TASK:\nYou are now working on step {}: \"{}\"\n\nPlease execute this step using the appropriate tools. When you're done, provide a summary of what you accomplished.",
            step.index, step.text
        );

        let agent = self
            .agents
            .get_mut(key)
            .ok_or_else(|| AgentError::FlowError(format!("No agent registered for key: {key}")))?;
        agent.run(Some(&prompt)).await
    }

    /// 收尾：优先用 LLM 生成总结，失败则退回主执行者，再失败给固定文案
    async fn finalize_plan(&mut self) -> String {
        let plan_text = self
            .store
            .render(Some(&self.active_plan_id))
            .unwrap_or_else(|e| format!("Error retrieving plan: {e}"));

        let system = vec![Message::system(FINALIZE_SYSTEM_PROMPT)];
        let user = vec![Message::user(format!(
            "The plan has been completed. Here is the final plan status:\n\n{plan_text}\n\nPlease provide a summary of what was accomplished and any final thoughts."
        ))];

        match self.llm.ask(&user, Some(&system), false).await {
            Ok(response) => format!("Plan completed:\n\n{response}"),
            Err(e) => {
                tracing::error!(error = %e, "failed to finalize plan with LLM");
                let Some(key) = self.primary_key().map(|s| s.to_string()) else {
                    return "Plan completed. Error generating summary.".to_string();
                };
                let prompt = format!(
                    "The plan has been completed. Here is the final plan status:\n\n{plan_text}\n\nPlease provide a summary of what was accomplished and any final thoughts."
                );
                match self.agents.get_mut(&key) {
                    Some(agent) if agent.core().state() == AgentState::Idle => {
                        match agent.run(Some(&prompt)).await {
                            Ok(summary) => format!("Plan completed:\n\n{summary}"),
                            Err(e) => {
                                tracing::error!(error = %e, "agent fallback summary failed");
                                "Plan completed. Error generating summary.".to_string()
                            }
                        }
                    }
                    _ => "Plan completed. Error generating summary.".to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::ToolCallAgent;
    use crate::llm::MockLlmClient;
    use serde_json::json;

    fn flow_with(mock: Arc<MockLlmClient>) -> PlanningFlow {
        let agent = ToolCallAgent::new("executor", mock.clone());
        PlanningFlow::new(mock)
            .add_agent("executor", Box::new(agent))
            .with_plan_id("plan_flow")
    }

    #[tokio::test]
    async fn test_default_plan_when_llm_gives_no_tool_call() {
        let mock = Arc::new(MockLlmClient::new());
        // 建计划请求只回文本
        mock.push_content("no plan from me");
        // 执行者在首步直接 terminate
        mock.push_tool_call("terminate", json!({"status": "success"}));

        let mut flow = flow_with(mock);
        let result = flow.execute("do the thing").await.unwrap();

        let plan = flow.store().get(Some("plan_flow")).unwrap();
        assert_eq!(plan.len(), 3);
        assert_eq!(plan.steps()[0], "Analyze the request");
        assert!(result.contains("completed with status: success"));
    }

    #[tokio::test]
    async fn test_flow_overrides_plan_id_from_llm() {
        let mock = Arc::new(MockLlmClient::new());
        mock.push_tool_call(
            "planning",
            json!({
                "command": "create",
                "plan_id": "whatever_the_llm_said",
                "title": "T",
                "steps": ["one"]
            }),
        );
        mock.push_tool_call("terminate", json!({"status": "success"}));

        let mut flow = flow_with(mock);
        flow.execute("task").await.unwrap();

        assert!(flow.store().contains("plan_flow"));
        assert!(!flow.store().contains("whatever_the_llm_said"));
    }

    #[tokio::test]
    async fn test_finalize_after_all_steps() {
        let mock = Arc::new(MockLlmClient::new());
        mock.push_tool_call(
            "planning",
            json!({
                "command": "create",
                "title": "Short",
                "steps": ["reply"]
            }),
        );
        // 步骤执行：回复后终止
        mock.push_tool_call("create_chat_completion", json!({"response": "done"}));
        mock.push_tool_call("terminate", json!({"status": "success"}));

        let mut flow = flow_with(mock);
        let result = flow.execute("say done").await.unwrap();
        // 执行者终止后提前收场，步骤已标完成
        let plan = flow.store().get(Some("plan_flow")).unwrap();
        assert_eq!(plan.statuses()[0], StepStatus::Completed);
        assert!(result.contains("done"));
    }

    #[tokio::test]
    async fn test_timeout_maps_to_flow_error() {
        struct SlowClient;

        #[async_trait::async_trait]
        impl LlmClient for SlowClient {
            async fn ask(
                &self,
                _messages: &[Message],
                _system_msgs: Option<&[Message]>,
                _stream: bool,
            ) -> Result<String, AgentError> {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok("late".to_string())
            }

            async fn ask_with_tools(
                &self,
                _messages: &[Message],
                _system_msgs: Option<&[Message]>,
                _tools: &[serde_json::Value],
                _tool_choice: ToolChoice,
            ) -> Result<crate::llm::LlmResponse, AgentError> {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(crate::llm::LlmResponse::default())
            }
        }

        let llm: Arc<dyn LlmClient> = Arc::new(SlowClient);
        let agent = ToolCallAgent::new("executor", llm.clone());
        let mut flow = PlanningFlow::new(llm).add_agent("executor", Box::new(agent));
        let err = flow.execute_with_timeout("task", 1).await.unwrap_err();
        assert!(matches!(err, AgentError::FlowTimeout(1)));
    }

    #[tokio::test]
    async fn test_active_step_selection_after_completion() {
        let mock = Arc::new(MockLlmClient::new());
        let mut flow = flow_with(mock);
        flow.store()
            .create("plan_flow", "Two steps", vec!["A".into(), "B".into()])
            .unwrap();
        flow.store()
            .mark_step(Some("plan_flow"), 0, Some(StepStatus::Completed), None)
            .unwrap();

        let step = flow.current_step_info().await.unwrap();
        assert_eq!(step.index, 1);
        assert_eq!(step.text, "B");

        let plan = flow.store().get(Some("plan_flow")).unwrap();
        assert_eq!(plan.statuses()[1], StepStatus::InProgress);
    }

    #[tokio::test]
    async fn test_step_type_routes_to_matching_agent() {
        let mock = Arc::new(MockLlmClient::new());
        mock.push_tool_call(
            "planning",
            json!({
                "command": "create",
                "title": "Typed",
                "steps": ["[CODE] write it"]
            }),
        );
        mock.push_tool_call("terminate", json!({"status": "success"}));

        let generic = ToolCallAgent::new("generic", mock.clone());
        let coder = ToolCallAgent::new("coder", mock.clone());
        let mut flow = PlanningFlow::new(mock.clone())
            .add_agent("generic", Box::new(generic))
            .add_agent("code", Box::new(coder))
            .with_plan_id("plan_flow");

        flow.execute("write code").await.unwrap();

        // [CODE] 步骤应路由到 "code" 执行者，该执行者终止后流程收场
        let code_agent = flow.agents.get("code").unwrap();
        assert_eq!(code_agent.core().state(), AgentState::Finished);
        let generic_agent = flow.agents.get("generic").unwrap();
        assert_eq!(generic_agent.core().state(), AgentState::Idle);
    }
}
