//! 流程集成测试
//!
//! 用脚本化的 Mock LLM 驱动完整的计划流程：建计划、逐步执行真实工具、
//! 标记进度并收尾。

use std::sync::Arc;

use serde_json::json;

use hornet::agent::{Agent, PlanningAgent, ToolCallAgent};
use hornet::core::AgentState;
use hornet::flow::{FlowFactory, FlowType};
use hornet::llm::MockLlmClient;
use hornet::memory::Role;
use hornet::plan::{PlanStore, StepStatus};
use hornet::tools::{FileWriteTool, TerminateTool, ToolCollection};

fn executor_with_tools(mock: Arc<MockLlmClient>, workspace: &std::path::Path) -> ToolCallAgent {
    let mut tools = ToolCollection::new();
    tools.add_tool(FileWriteTool::new(workspace));
    tools.add_tool(TerminateTool);
    ToolCallAgent::new("executor", mock)
        .with_tools(tools)
        .with_max_steps(5)
}

#[tokio::test]
async fn test_planning_flow_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockLlmClient::new());

    // 1. 流程建计划：两个步骤
    mock.push_tool_call(
        "planning",
        json!({
            "command": "create",
            "title": "Write a greeting file",
            "steps": ["Write hello.txt with a greeting", "Confirm completion"]
        }),
    );
    // 2. 步骤 0 执行：写文件，然后该步内终止（结束首个 run）
    mock.push_tool_call(
        "file_write",
        json!({"content": "hello from the flow\n", "file_path": "hello.txt"}),
    );
    mock.push_tool_call("terminate", json!({"status": "success"}));

    let executor = executor_with_tools(mock.clone(), dir.path());
    let mut flow = FlowFactory::create_flow(
        FlowType::Planning,
        mock.clone(),
        vec![("executor".to_string(), Box::new(executor) as _)],
        vec![],
    );

    let result = flow.execute("write a greeting file").await.unwrap();

    // 工具真实执行
    let written = std::fs::read_to_string(dir.path().join("hello.txt")).unwrap();
    assert_eq!(written, "hello from the flow\n");

    // 步骤 0 已完成，执行者终止导致提前收场
    let plan = flow.store().get(None).unwrap();
    assert_eq!(plan.statuses()[0], StepStatus::Completed);
    assert!(result.contains("Content successfully saved"));
    // 建计划 1 次 + 执行者 2 步
    assert_eq!(mock.call_count(), 3);
}

#[tokio::test]
async fn test_planning_flow_finalizes_when_steps_run_out() {
    let mock = Arc::new(MockLlmClient::new());

    mock.push_tool_call(
        "planning",
        json!({
            "command": "create",
            "title": "One step",
            "steps": ["Say hello"]
        }),
    );
    // 步骤 0：执行者只给正文就返回（auto 模式允许）
    mock.push_content("hello there");
    // 执行者步数预算 1，run 结束；步骤被标完成后无活跃步骤
    // 收尾总结走 ask
    mock.push_content("Everything went fine.");

    let dir = tempfile::tempdir().unwrap();
    let mut executor = executor_with_tools(mock.clone(), dir.path());
    executor.core_mut().max_steps = 1;
    let mut flow = FlowFactory::create_flow(
        FlowType::Planning,
        mock.clone(),
        vec![("executor".to_string(), Box::new(executor) as _)],
        vec![],
    );

    let result = flow.execute("greet me").await.unwrap();
    assert!(result.contains("Plan completed:"));
    assert!(result.contains("Everything went fine."));
}

#[tokio::test]
async fn test_planning_agent_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockLlmClient::new());
    let store = PlanStore::new();

    let mut agent = PlanningAgent::new(mock.clone(), store.clone());
    agent.active_plan_id = "plan_e2e".to_string();
    agent
        .inner_mut()
        .add_tool(FileWriteTool::new(dir.path()));

    // 初始计划
    mock.push_tool_call(
        "planning",
        json!({
            "command": "create",
            "plan_id": "plan_e2e",
            "title": "Write and finish",
            "steps": ["Write the file", "Finish"]
        }),
    );
    // 步骤 1：写文件
    mock.push_tool_call(
        "file_write",
        json!({"content": "done\n", "file_path": "out.txt"}),
    );
    // 步骤 2：终止
    mock.push_tool_call("terminate", json!({"status": "success"}));

    agent.run(Some("write a file then stop")).await.unwrap();

    assert_eq!(agent.core().state(), AgentState::Finished);
    let plan = store.get(Some("plan_e2e")).unwrap();
    assert_eq!(plan.statuses()[0], StepStatus::Completed);

    // 每个工具调用恰好一条 tool 消息
    let tool_msgs = agent
        .core()
        .memory
        .messages()
        .iter()
        .filter(|m| m.role == Role::Tool)
        .count();
    assert_eq!(tool_msgs, 3);

    let written = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();
    assert_eq!(written, "done\n");
}
