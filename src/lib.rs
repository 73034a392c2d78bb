//! Hornet - Rust 自主任务执行引擎
//!
//! 模块划分：
//! - **agent**: 执行循环、工具调用 Agent 与计划驱动 Agent
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 状态机与错误类型
//! - **flow**: 计划驱动的多 Agent 流程编排
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）及档位注册表
//! - **memory**: 消息模型与有界对话记忆
//! - **plan**: 结构化计划、共享存储与规划工具
//! - **tools**: 工具箱（shell、file_write、terminate 等）与集合派发

pub mod agent;
pub mod config;
pub mod core;
pub mod flow;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod plan;
pub mod tools;
