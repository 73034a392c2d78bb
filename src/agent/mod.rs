//! Agent 层：执行循环、工具调用与计划驱动

pub mod base;
pub mod planning;
pub mod toolcall;

pub use base::{Agent, AgentCore};
pub use planning::PlanningAgent;
pub use toolcall::ToolCallAgent;
