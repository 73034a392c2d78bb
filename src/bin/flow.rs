//! Hornet Flow - 计划驱动流程入口
//!
//! 组装执行者 Agent 与 PlanningFlow，在墙钟上限内处理单条用户请求。

use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use hornet::agent::ToolCallAgent;
use hornet::config::load_config;
use hornet::core::AgentError;
use hornet::flow::{FlowFactory, FlowType};
use hornet::llm::LlmRegistry;
use hornet::tools::{CreateChatCompletionTool, FileWriteTool, ShellTool, TerminateTool, ToolCollection};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    hornet::observability::init();

    let config = load_config(None).context("Failed to load configuration")?;
    let registry = LlmRegistry::new(config.llm.clone());
    let llm = registry.default_client();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let prompt = if args.is_empty() {
        print!("Enter your prompt: ");
        std::io::stdout().flush().ok();
        let mut line = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut line)
            .context("Failed to read prompt")?;
        line.trim().to_string()
    } else {
        args.join(" ")
    };
    if prompt.is_empty() {
        tracing::warn!("empty prompt provided");
        return Ok(());
    }

    let workspace = config
        .tools
        .workspace_root
        .clone()
        .unwrap_or_else(|| "./workspace".into());
    let _ = std::fs::create_dir_all(&workspace);

    let mut tools = ToolCollection::new();
    tools.add_tool(CreateChatCompletionTool);
    tools.add_tool(ShellTool::new(config.tools.tool_timeout_secs));
    tools.add_tool(FileWriteTool::new(workspace));
    tools.add_tool(TerminateTool);

    let executor = ToolCallAgent::new("hornet", Arc::clone(&llm))
        .with_tools(tools)
        .with_max_observe(config.agent.max_observe)
        .with_max_steps(config.agent.max_steps);

    let mut flow = FlowFactory::create_flow(
        FlowType::Planning,
        Arc::clone(&llm),
        vec![("hornet".to_string(), Box::new(executor) as _)],
        config.flow.executors.clone(),
    );

    tracing::info!("processing your request");
    let start = Instant::now();
    match flow
        .execute_with_timeout(&prompt, config.flow.timeout_secs)
        .await
    {
        Ok(result) => {
            tracing::info!(
                elapsed_secs = start.elapsed().as_secs(),
                "request processed"
            );
            println!("{result}");
        }
        Err(AgentError::FlowTimeout(secs)) => {
            tracing::error!(timeout_secs = secs, "request processing timed out");
            println!("Operation terminated due to timeout after {secs} seconds. Please try a simpler request.");
        }
        Err(e) => return Err(e).context("Flow execution failed"),
    }
    Ok(())
}
