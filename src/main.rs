//! Hornet - Rust 自主任务执行引擎
//!
//! 入口：初始化日志与配置，组装计划驱动 Agent 并处理单条用户请求。

use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::Context;
use hornet::agent::{Agent, PlanningAgent};
use hornet::config::load_config;
use hornet::llm::LlmRegistry;
use hornet::plan::PlanStore;
use hornet::tools::{FileWriteTool, ShellTool};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    hornet::observability::init();

    let config = load_config(None).context("Failed to load configuration")?;
    let registry = LlmRegistry::new(config.llm.clone());
    let llm = registry.default_client();

    // 请求：优先取命令行参数，否则交互读取
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

    let mut agent = PlanningAgent::new(Arc::clone(&llm), PlanStore::new());
    agent
        .inner_mut()
        .add_tool(ShellTool::new(config.tools.tool_timeout_secs))
        .add_tool(FileWriteTool::new(workspace));
    agent.inner_mut().max_observe = config.agent.max_observe;
    agent.core_mut().max_steps = config.agent.max_steps;
    agent.core_mut().duplicate_threshold = config.agent.duplicate_threshold;
    agent.core_mut().memory = hornet::memory::Memory::new(config.agent.max_messages);

    tracing::info!("processing your request");
    let result = agent.run(Some(&prompt)).await?;
    println!("{result}");
    tracing::info!(
        input_tokens = llm.total_input_tokens(),
        "request processing completed"
    );
    Ok(())
}
