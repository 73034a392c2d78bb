//! 文件写入工具
//!
//! 在工作区根目录下写入或追加文件，必要时创建父目录。参数结构体通过
//! schemars 派生 JSON Schema，保证声明与解析一致。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use schemars::{schema_for, JsonSchema};
use serde::Deserialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;

use crate::tools::base::{Tool, ToolResult};

const DESCRIPTION: &str = "Save content to a local file at a specified path. \
Use this tool when you need to save text, code, or generated content to a file.";

/// 写入参数
#[derive(Debug, Deserialize, JsonSchema)]
struct FileWriteArgs {
    /// The content to save to the file.
    content: String,
    /// The path where the file should be saved, including filename and extension.
    file_path: String,
    /// The file opening mode. Default is "w" for write. Use "a" for append.
    #[serde(default = "default_mode")]
    mode: String,
}

fn default_mode() -> String {
    "w".to_string()
}

/// 文件写入工具：限定在 workspace_root 之下
pub struct FileWriteTool {
    workspace_root: PathBuf,
}

impl FileWriteTool {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
        }
    }

    /// 相对路径拼到根目录，绝对路径原样使用
    fn resolve(&self, file_path: &str) -> PathBuf {
        let p = Path::new(file_path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.workspace_root.join(p)
        }
    }
}

impl Default for FileWriteTool {
    fn default() -> Self {
        Self::new("./workspace")
    }
}

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "file_write"
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn parameters(&self) -> Value {
        serde_json::to_value(schema_for!(FileWriteArgs)).unwrap_or_else(|_| {
            serde_json::json!({"type": "object", "properties": {}, "required": []})
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let args: FileWriteArgs = match serde_json::from_value(args) {
            Ok(a) => a,
            Err(e) => return ToolResult::err(format!("Invalid arguments: {e}")),
        };
        if args.mode != "w" && args.mode != "a" {
            return ToolResult::err(format!("Invalid mode '{}', expected 'w' or 'a'", args.mode));
        }

        let path = self.resolve(&args.file_path);
        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return ToolResult::err(format!("Failed to create directory: {e}"));
            }
        }

        let result = tokio::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .append(args.mode == "a")
            .truncate(args.mode == "w")
            .open(&path)
            .await;
        let mut file = match result {
            Ok(f) => f,
            Err(e) => return ToolResult::err(format!("Failed to open file: {e}")),
        };
        if let Err(e) = file.write_all(args.content.as_bytes()).await {
            return ToolResult::err(format!("Failed to write file: {e}"));
        }
        // tokio File 带写缓冲，成功返回前必须落盘
        if let Err(e) = file.flush().await {
            return ToolResult::err(format!("Failed to flush file: {e}"));
        }

        ToolResult::ok(format!(
            "Content successfully saved to {}",
            path.display()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_and_append() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FileWriteTool::new(dir.path());

        let result = tool
            .execute(serde_json::json!({"content": "one\n", "file_path": "notes/a.txt"}))
            .await;
        assert!(!result.is_error(), "{result}");

        let result = tool
            .execute(serde_json::json!({
                "content": "two\n",
                "file_path": "notes/a.txt",
                "mode": "a"
            }))
            .await;
        assert!(!result.is_error());

        let written = std::fs::read_to_string(dir.path().join("notes/a.txt")).unwrap();
        assert_eq!(written, "one\ntwo\n");
    }

    #[tokio::test]
    async fn test_content_durable_when_execute_returns() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FileWriteTool::new(dir.path());
        let result = tool
            .execute(serde_json::json!({"content": "done\n", "file_path": "out.txt"}))
            .await;
        assert!(!result.is_error(), "{result}");
        // 不等待任何后续事件，返回即可读到完整内容
        let written = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();
        assert_eq!(written, "done\n");
    }

    #[tokio::test]
    async fn test_invalid_mode_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FileWriteTool::new(dir.path());
        let result = tool
            .execute(serde_json::json!({"content": "x", "file_path": "a.txt", "mode": "rw"}))
            .await;
        assert!(result.is_error());
    }

    #[tokio::test]
    async fn test_missing_args_rejected() {
        let tool = FileWriteTool::default();
        let result = tool.execute(serde_json::json!({"content": "x"})).await;
        assert!(result.is_error());
    }
}
