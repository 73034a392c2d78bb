//! 核心类型：错误分类与 Agent 状态机

pub mod error;
pub mod state;

pub use error::AgentError;
pub use state::AgentState;
