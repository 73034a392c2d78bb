//! 计划驱动 Agent
//!
//! 在工具调用 Agent 之上挂接共享计划：每次 think 前注入当前计划状态并把
//! 首个活跃步骤置为进行中；act 之后按调用追踪表把对应步骤标记完成。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::agent::base::{Agent, AgentCore};
use crate::agent::toolcall::ToolCallAgent;
use crate::core::AgentError;
use crate::llm::LlmClient;
use crate::memory::{Message, ToolChoice};
use crate::plan::{PlanStore, PlanningTool, StepStatus};
use crate::tools::Tool;

const SYSTEM_PROMPT: &str = "You are an expert Planning Agent tasked with solving problems efficiently through structured plans.";
const NEXT_STEP_PROMPT: &str = "Based on the current state, what's your next action? \
Choose the most efficient path forward. If the task is complete, use `terminate`.";

/// 单次工具调用与计划步骤的关联记录
#[derive(Clone, Debug)]
pub struct StepExecutionRecord {
    pub step_index: usize,
    pub tool_name: String,
    pub completed: bool,
    pub result: Option<String>,
}

/// 计划驱动 Agent：ToolCallAgent + 共享计划存储
pub struct PlanningAgent {
    inner: ToolCallAgent,
    store: PlanStore,
    pub active_plan_id: String,
    step_tracker: HashMap<String, StepExecutionRecord>,
    current_step_index: Option<usize>,
}

impl PlanningAgent {
    pub fn new(llm: Arc<dyn LlmClient>, store: PlanStore) -> Self {
        let mut inner = ToolCallAgent::new("planning", llm).with_max_steps(20);
        inner.core_mut().system_prompt = Some(SYSTEM_PROMPT.to_string());
        inner.core_mut().next_step_prompt = Some(NEXT_STEP_PROMPT.to_string());
        inner.add_tool(PlanningTool::new(store.clone()));

        Self {
            inner,
            store,
            active_plan_id: format!("plan_{}", Utc::now().timestamp()),
            step_tracker: HashMap::new(),
            current_step_index: None,
        }
    }

    pub fn inner(&self) -> &ToolCallAgent {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut ToolCallAgent {
        &mut self.inner
    }

    pub fn store(&self) -> &PlanStore {
        &self.store
    }

    pub fn tracker(&self) -> &HashMap<String, StepExecutionRecord> {
        &self.step_tracker
    }

    fn plan_text(&self) -> String {
        self.store
            .render(Some(&self.active_plan_id))
            .unwrap_or_else(|e| format!("Error retrieving plan: {e}"))
    }

    /// 计划里首个活跃步骤；未开始的顺手标成进行中
    fn select_current_step(&mut self) -> Option<usize> {
        let plan = self.store.get(Some(&self.active_plan_id)).ok()?;
        let (index, _) = plan.first_active_step()?;
        if plan.statuses()[index] == StepStatus::NotStarted {
            if let Err(e) = self.store.mark_step(
                Some(&self.active_plan_id),
                index,
                Some(StepStatus::InProgress),
                None,
            ) {
                tracing::warn!(error = %e, "failed to mark step in progress");
            }
        }
        Some(index)
    }

    /// 首次运行时让 LLM 通过规划工具建出初始计划
    async fn create_initial_plan(&mut self, request: &str) -> Result<(), AgentError> {
        tracing::info!(plan_id = %self.active_plan_id, "creating initial plan");

        self.inner.core_mut().memory.add_message(Message::user(format!(
            "Analyze the request and create a plan with ID {}: {request}",
            self.active_plan_id
        )));

        let planning_tool = PlanningTool::new(self.store.clone());
        let params = vec![planning_tool.to_param()];
        let system = vec![Message::system(SYSTEM_PROMPT)];
        let messages = self.inner.core().memory.messages().to_vec();
        let response = self
            .inner
            .core()
            .llm
            .ask_with_tools(&messages, Some(&system), &params, ToolChoice::Auto)
            .await?;

        let assistant =
            Message::from_tool_calls(response.content.clone(), response.tool_calls.clone());
        self.inner.core_mut().memory.add_message(assistant);

        let mut created = false;
        for call in &response.tool_calls {
            if call.function.name != "planning" {
                continue;
            }
            let args: serde_json::Value =
                serde_json::from_str(&call.function.arguments).unwrap_or_default();
            let result = planning_tool.execute(args).await;
            tracing::info!(result = %result, "executed planning command");
            self.inner.core_mut().memory.add_message(Message::tool(
                result.to_string(),
                call.function.name.clone(),
                call.id.clone(),
            ));
            created = !result.is_error();
            break;
        }

        if !created {
            tracing::warn!(plan_id = %self.active_plan_id, "no plan created from initial request");
            self.inner.core_mut().memory.add_message(Message::assistant(
                "Error: Parameter `plan_id` is required for command: create",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Agent for PlanningAgent {
    fn core(&self) -> &AgentCore {
        self.inner.core()
    }

    fn core_mut(&mut self) -> &mut AgentCore {
        self.inner.core_mut()
    }

    async fn prepare(&mut self, request: Option<&str>) -> Result<bool, AgentError> {
        if let Some(request) = request {
            self.create_initial_plan(request).await?;
            return Ok(true);
        }
        Ok(false)
    }

    async fn step(&mut self) -> Result<String, AgentError> {
        // 注入当前计划状态，只在本次 think 生效
        let base_prompt = self.inner.core().next_step_prompt.clone();
        let with_plan = format!(
            "CURRENT PLAN STATUS:\n{}\n\n{}",
            self.plan_text(),
            base_prompt.as_deref().unwrap_or(NEXT_STEP_PROMPT)
        );
        self.inner.core_mut().next_step_prompt = Some(with_plan);
        self.current_step_index = self.select_current_step();

        let should_act = self.inner.think().await;
        self.inner.core_mut().next_step_prompt = base_prompt;
        let should_act = should_act?;

        if should_act {
            if let (Some(step_index), Some(call)) = (
                self.current_step_index,
                self.inner.pending_tool_calls().first().cloned(),
            ) {
                let executes_step = call.function.name != "planning"
                    && self
                        .inner
                        .available_tools
                        .get(&call.function.name)
                        .map(|t| !t.is_terminating())
                        .unwrap_or(true);
                if executes_step {
                    self.step_tracker.insert(
                        call.id.clone(),
                        StepExecutionRecord {
                            step_index,
                            tool_name: call.function.name.clone(),
                            completed: false,
                            result: None,
                        },
                    );
                }
            }
        }

        if !should_act {
            return Ok("Thinking complete - no action needed".to_string());
        }

        let executed: Vec<String> = self
            .inner
            .pending_tool_calls()
            .iter()
            .map(|c| c.id.clone())
            .collect();
        let result = self.inner.act().await?;

        // 执行类调用结束后，把关联步骤标记完成
        for id in executed {
            if let Some(record) = self.step_tracker.get_mut(&id) {
                record.completed = true;
                record.result = Some(result.clone());
                let step_index = record.step_index;
                if let Err(e) = self.store.mark_step(
                    Some(&self.active_plan_id),
                    step_index,
                    Some(StepStatus::Completed),
                    None,
                ) {
                    tracing::warn!(error = %e, "failed to mark step completed");
                }
            }
        }
        Ok(result)
    }
}
