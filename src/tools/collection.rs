//! 工具集合
//!
//! 按注册顺序维护工具列表（声明顺序决定发给 LLM 的顺序），按名查找执行。
//! execute 永不抛错：未知工具与执行失败都折叠进 ToolResult；每次调用输出
//! 结构化审计日志（JSON）。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use crate::tools::base::{Tool, ToolResult};

/// 工具集合：有序列表 + 名称索引
#[derive(Default)]
pub struct ToolCollection {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, Arc<dyn Tool>>,
}

impl ToolCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册工具；同名后注册者覆盖索引，列表保留首次位置
    pub fn add_tool(&mut self, tool: impl Tool + 'static) -> &mut Self {
        self.add_arc(Arc::new(tool))
    }

    pub fn add_arc(&mut self, tool: Arc<dyn Tool>) -> &mut Self {
        let name = tool.name().to_string();
        if !self.index.contains_key(&name) {
            self.tools.push(tool.clone());
        } else {
            tracing::warn!(tool = %name, "duplicate tool registration, overriding");
            if let Some(slot) = self.tools.iter_mut().find(|t| t.name() == name) {
                *slot = tool.clone();
            }
        }
        self.index.insert(name, tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// 全部工具的函数调用声明，顺序与注册顺序一致
    pub fn to_params(&self) -> Vec<Value> {
        self.tools.iter().map(|t| t.to_param()).collect()
    }

    /// 执行指定工具；未知工具与内部失败都以 ToolResult 返回，不向上抛错
    pub async fn execute(&self, name: &str, args: Value) -> ToolResult {
        let start = Instant::now();
        let args_preview = args_preview(&args);

        let result = match self.index.get(name) {
            Some(tool) => tool.execute(args).await,
            None => ToolResult::err(format!("Tool '{name}' is invalid")),
        };

        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": name,
            "ok": !result.is_error(),
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        result
    }

    /// 运行结束时依次清理所有工具
    pub async fn cleanup_all(&self) {
        for tool in &self.tools {
            tool.cleanup().await;
        }
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.len() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo back the given text"
        }

        async fn execute(&self, args: Value) -> ToolResult {
            let text = args.get("text").and_then(|v| v.as_str()).unwrap_or("");
            ToolResult::ok(text)
        }
    }

    struct FailTool;

    #[async_trait]
    impl Tool for FailTool {
        fn name(&self) -> &str {
            "fail"
        }

        fn description(&self) -> &str {
            "Always fails"
        }

        async fn execute(&self, _args: Value) -> ToolResult {
            ToolResult::err("intentional failure")
        }
    }

    #[tokio::test]
    async fn test_execute_unknown_tool_returns_error_result() {
        let collection = ToolCollection::new();
        let result = collection.execute("nope", serde_json::json!({})).await;
        assert!(result.is_error());
        assert!(result.error.unwrap().contains("invalid"));
    }

    #[tokio::test]
    async fn test_execute_failure_folds_into_result() {
        let mut collection = ToolCollection::new();
        collection.add_tool(FailTool);
        let result = collection.execute("fail", serde_json::json!({})).await;
        assert_eq!(result.error.as_deref(), Some("intentional failure"));
    }

    #[tokio::test]
    async fn test_params_preserve_registration_order() {
        let mut collection = ToolCollection::new();
        collection.add_tool(FailTool);
        collection.add_tool(EchoTool);
        let names: Vec<String> = collection
            .to_params()
            .iter()
            .map(|p| p["function"]["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["fail", "echo"]);
        assert_eq!(collection.names(), vec!["fail", "echo"]);
    }

    #[tokio::test]
    async fn test_echo_executes() {
        let mut collection = ToolCollection::new();
        collection.add_tool(EchoTool);
        let result = collection
            .execute("echo", serde_json::json!({"text": "hi"}))
            .await;
        assert_eq!(result.output.as_deref(), Some("hi"));
    }
}
