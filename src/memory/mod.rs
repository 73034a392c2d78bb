//! 会话记忆：消息模型与有界对话日志

pub mod conversation;
pub mod message;

pub use conversation::{Memory, DEFAULT_MAX_MESSAGES};
pub use message::{Function, Message, Role, ToolCall, ToolChoice};
