//! 工具层：Tool trait、工具集合与内置工具

pub mod base;
pub mod chat_completion;
pub mod collection;
pub mod file_write;
pub mod shell;
pub mod terminate;

pub use base::{Tool, ToolResult};
pub use chat_completion::CreateChatCompletionTool;
pub use collection::ToolCollection;
pub use file_write::FileWriteTool;
pub use shell::ShellTool;
pub use terminate::TerminateTool;
