//! 规划工具
//!
//! LLM 通过该工具管理计划：create / update / list / get / set_active /
//! mark_step / delete。实际状态保存在共享的 PlanStore 中。

use async_trait::async_trait;
use schemars::{schema_for, JsonSchema};
use serde::Deserialize;
use serde_json::Value;

use crate::plan::plan::StepStatus;
use crate::plan::store::PlanStore;
use crate::tools::{Tool, ToolResult};

const DESCRIPTION: &str = "A planning tool that allows the agent to create and manage plans for solving complex tasks. \
The tool provides functionality for creating plans, updating plan steps, and tracking progress.";

/// 规划命令
#[derive(Debug, Clone, Copy, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
enum PlanCommand {
    Create,
    Update,
    List,
    Get,
    SetActive,
    MarkStep,
    Delete,
}

impl PlanCommand {
    fn as_str(&self) -> &'static str {
        match self {
            PlanCommand::Create => "create",
            PlanCommand::Update => "update",
            PlanCommand::List => "list",
            PlanCommand::Get => "get",
            PlanCommand::SetActive => "set_active",
            PlanCommand::MarkStep => "mark_step",
            PlanCommand::Delete => "delete",
        }
    }
}

/// 规划工具参数
#[derive(Debug, Deserialize, JsonSchema)]
struct PlanningArgs {
    /// The command to execute. Available commands: create, update, list, get, set_active, mark_step, delete.
    command: PlanCommand,
    /// Unique identifier for the plan. Required for create, update, set_active, and delete commands. Optional for get and mark_step (uses active plan if not specified).
    plan_id: Option<String>,
    /// Title for the plan. Required for create command, optional for update command.
    title: Option<String>,
    /// List of plan steps. Required for create command, optional for update command.
    steps: Option<Vec<String>>,
    /// Index of the step to update (0-based). Required for mark_step command.
    step_index: Option<usize>,
    /// Status to set for a step. Used with mark_step command. One of: not_started, in_progress, completed, blocked.
    step_status: Option<String>,
    /// Additional notes for a step. Optional for mark_step command.
    step_notes: Option<String>,
}

/// 规划工具：对共享 PlanStore 的命令式封装
pub struct PlanningTool {
    store: PlanStore,
}

impl PlanningTool {
    pub fn new(store: PlanStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &PlanStore {
        &self.store
    }

    fn run(&self, args: PlanningArgs) -> Result<String, String> {
        let require_id = |cmd: PlanCommand| {
            args.plan_id
                .clone()
                .ok_or_else(|| format!("Parameter `plan_id` is required for command: {}", cmd.as_str()))
        };

        match args.command {
            PlanCommand::Create => {
                let id = require_id(PlanCommand::Create)?;
                let title = args.title.ok_or_else(|| {
                    "Parameter `title` is required for command: create".to_string()
                })?;
                let steps = args.steps.ok_or_else(|| {
                    "Parameter `steps` is required for command: create".to_string()
                })?;
                self.store
                    .create(&id, &title, steps)
                    .map_err(|e| e.to_string())
            }
            PlanCommand::Update => {
                let id = require_id(PlanCommand::Update)?;
                self.store
                    .update(&id, args.title.as_deref(), args.steps)
                    .map_err(|e| e.to_string())
            }
            PlanCommand::List => Ok(self.store.list()),
            PlanCommand::Get => self
                .store
                .render(args.plan_id.as_deref())
                .map_err(|e| e.to_string()),
            PlanCommand::SetActive => {
                let id = require_id(PlanCommand::SetActive)?;
                self.store.set_active(&id).map_err(|e| e.to_string())
            }
            PlanCommand::MarkStep => {
                let step_index = args.step_index.ok_or_else(|| {
                    "Parameter `step_index` is required for command: mark_step".to_string()
                })?;
                let status = match args.step_status.as_deref() {
                    None => None,
                    Some(s) => Some(StepStatus::parse(s).ok_or_else(|| {
                        format!(
                            "Invalid step_status: {s}. Valid statuses are: not_started, in_progress, completed, blocked"
                        )
                    })?),
                };
                self.store
                    .mark_step(args.plan_id.as_deref(), step_index, status, args.step_notes)
                    .map_err(|e| e.to_string())
            }
            PlanCommand::Delete => {
                let id = require_id(PlanCommand::Delete)?;
                self.store.delete(&id).map_err(|e| e.to_string())
            }
        }
    }
}

#[async_trait]
impl Tool for PlanningTool {
    fn name(&self) -> &str {
        "planning"
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn parameters(&self) -> Value {
        serde_json::to_value(schema_for!(PlanningArgs)).unwrap_or_else(|_| {
            serde_json::json!({"type": "object", "properties": {}, "required": []})
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let args: PlanningArgs = match serde_json::from_value(args) {
            Ok(a) => a,
            Err(e) => return ToolResult::err(format!("Invalid arguments: {e}")),
        };
        match self.run(args) {
            Ok(output) => ToolResult::ok(output),
            Err(e) => ToolResult::err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool() -> PlanningTool {
        PlanningTool::new(PlanStore::new())
    }

    #[tokio::test]
    async fn test_create_requires_plan_id() {
        let tool = tool();
        let result = tool
            .execute(serde_json::json!({
                "command": "create",
                "title": "T",
                "steps": ["a"]
            }))
            .await;
        assert_eq!(
            result.error.as_deref(),
            Some("Parameter `plan_id` is required for command: create")
        );
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let tool = tool();

        let created = tool
            .execute(serde_json::json!({
                "command": "create",
                "plan_id": "p1",
                "title": "Build",
                "steps": ["design", "implement"]
            }))
            .await;
        assert!(!created.is_error(), "{created}");

        let marked = tool
            .execute(serde_json::json!({
                "command": "mark_step",
                "step_index": 0,
                "step_status": "completed",
                "step_notes": "design done"
            }))
            .await;
        assert!(marked.output.unwrap().contains("[✓] design"));

        let listed = tool.execute(serde_json::json!({"command": "list"})).await;
        assert!(listed.output.unwrap().contains("p1 (active)"));

        let deleted = tool
            .execute(serde_json::json!({"command": "delete", "plan_id": "p1"}))
            .await;
        assert!(!deleted.is_error());
    }

    #[tokio::test]
    async fn test_mark_step_rejects_bad_status() {
        let tool = tool();
        tool.execute(serde_json::json!({
            "command": "create",
            "plan_id": "p1",
            "title": "T",
            "steps": ["a"]
        }))
        .await;
        let result = tool
            .execute(serde_json::json!({
                "command": "mark_step",
                "step_index": 0,
                "step_status": "done"
            }))
            .await;
        assert!(result.error.unwrap().contains("Invalid step_status"));
    }

    #[tokio::test]
    async fn test_invalid_command_rejected() {
        let tool = tool();
        let result = tool
            .execute(serde_json::json!({"command": "explode"}))
            .await;
        assert!(result.error.unwrap().contains("Invalid arguments"));
    }
}
