//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `HORNET__*` 覆盖（双下划线表示嵌套，
//! 如 `HORNET__LLM__MODEL=gpt-4o-mini`）。[llm] 为默认档位，[llm.profiles.<name>]
//! 在其上做字段级覆盖。

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmSection,
    pub agent: AgentSection,
    pub tools: ToolsSection,
    pub flow: FlowSection,
}

/// [llm] 段：默认档位参数与命名档位覆盖
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// 全部请求累计的输入 token 上限；None 表示不限
    pub max_input_tokens: Option<u64>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// 命名档位：未给出的字段继承默认档位
    #[serde(default)]
    pub profiles: HashMap<String, LlmOverride>,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: None,
            api_key: None,
            max_tokens: default_max_tokens(),
            max_input_tokens: None,
            temperature: default_temperature(),
            profiles: HashMap::new(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    1.0
}

/// 档位级字段覆盖
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LlmOverride {
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub max_tokens: Option<u32>,
    pub max_input_tokens: Option<u64>,
    pub temperature: Option<f32>,
}

/// 解析后的单档位设置（供客户端构造使用）
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub max_input_tokens: Option<u64>,
    pub temperature: f32,
}

impl LlmSection {
    /// 合并默认档位与命名覆盖；未知档位名回落为默认档位
    pub fn resolve(&self, profile: &str) -> LlmSettings {
        let over = self.profiles.get(profile).cloned().unwrap_or_default();
        LlmSettings {
            model: over.model.unwrap_or_else(|| self.model.clone()),
            base_url: over.base_url.or_else(|| self.base_url.clone()),
            api_key: over.api_key.or_else(|| self.api_key.clone()),
            max_tokens: over.max_tokens.unwrap_or(self.max_tokens),
            max_input_tokens: over.max_input_tokens.or(self.max_input_tokens),
            temperature: over.temperature.unwrap_or(self.temperature),
        }
    }
}

/// [agent] 段：步数预算、重复阈值、观测截断、记忆上限
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    #[serde(default = "default_duplicate_threshold")]
    pub duplicate_threshold: usize,
    /// 单次工具观测结果的最大字符数；None 表示不截断
    #[serde(default = "default_max_observe")]
    pub max_observe: Option<usize>,
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            duplicate_threshold: default_duplicate_threshold(),
            max_observe: default_max_observe(),
            max_messages: default_max_messages(),
        }
    }
}

fn default_max_steps() -> usize {
    20
}

fn default_duplicate_threshold() -> usize {
    2
}

fn default_max_observe() -> Option<usize> {
    Some(2000)
}

fn default_max_messages() -> usize {
    100
}

/// [tools] 段：工具超时与文件写入根目录
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    /// 文件写入根目录，未设置时用 ./workspace
    pub workspace_root: Option<PathBuf>,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: default_tool_timeout_secs(),
            workspace_root: None,
        }
    }
}

fn default_tool_timeout_secs() -> u64 {
    120
}

/// [flow] 段：整体墙钟上限与执行者选取顺序
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FlowSection {
    #[serde(default = "default_flow_timeout_secs")]
    pub timeout_secs: u64,
    /// 执行者 key 的优先顺序；为空时按注册顺序
    #[serde(default)]
    pub executors: Vec<String>,
}

impl Default for FlowSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_flow_timeout_secs(),
            executors: Vec::new(),
        }
    }
}

fn default_flow_timeout_secs() -> u64 {
    3600
}

/// 从 config 目录加载配置，环境变量 HORNET__* 可覆盖
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "../config/default", "default"] {
        if std::path::Path::new(&format!("{name}.toml")).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("HORNET")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_resolution_inherits_defaults() {
        let mut section = LlmSection {
            model: "gpt-4o".into(),
            max_input_tokens: Some(50_000),
            ..Default::default()
        };
        section.profiles.insert(
            "fast".into(),
            LlmOverride {
                model: Some("gpt-4o-mini".into()),
                ..Default::default()
            },
        );

        let fast = section.resolve("fast");
        assert_eq!(fast.model, "gpt-4o-mini");
        assert_eq!(fast.max_input_tokens, Some(50_000));

        let unknown = section.resolve("nope");
        assert_eq!(unknown.model, "gpt-4o");
    }

    #[test]
    fn test_section_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.agent.max_steps, 20);
        assert_eq!(cfg.agent.duplicate_threshold, 2);
        assert_eq!(cfg.agent.max_messages, 100);
        assert_eq!(cfg.flow.timeout_secs, 3600);
        assert_eq!(cfg.tools.tool_timeout_secs, 120);
    }
}
