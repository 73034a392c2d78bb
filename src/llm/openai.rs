//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）。发送前做消息
//! 校验与 token 预算检查（超限立即失败、不参与重试）；瞬时失败按随机指数退避
//! 重试，最多 6 次；成功后把实际（流式为估算）输入 token 记入累计计数。

use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionMessageToolCalls, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionToolChoiceOption, ChatCompletionTools, CreateChatCompletionRequestArgs,
    ToolChoiceOptions,
};
use async_openai::Client;
use async_trait::async_trait;
use futures_util::StreamExt;
use rand::Rng;

use crate::config::LlmSettings;
use crate::core::AgentError;
use crate::llm::client::{
    estimate_message_tokens, estimate_tokens, validate_messages, LlmClient, LlmResponse,
    TokenBudget,
};
use crate::memory::{Message, Role, ToolCall, ToolChoice};

/// 瞬时失败最大尝试次数
const MAX_RETRIES: u32 = 6;
/// 退避上限（秒）
const MAX_BACKOFF_SECS: f64 = 60.0;

/// OpenAI 兼容客户端：持有 Client、模型参数与 token 预算
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    max_tokens: u32,
    temperature: f32,
    budget: TokenBudget,
}

impl OpenAiClient {
    pub fn new(settings: &LlmSettings) -> Self {
        let api_key = settings
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let config = if let Some(url) = &settings.base_url {
            OpenAIConfig::new().with_api_base(url).with_api_key(api_key)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };

        Self {
            client: Client::with_config(config),
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            budget: TokenBudget::new(settings.max_input_tokens),
        }
    }

    /// 随机指数退避：uniform(1, min(60, 2^attempt)) 秒
    fn backoff_delay(attempt: u32) -> Duration {
        let cap = MAX_BACKOFF_SECS.min(2f64.powi(attempt as i32)).max(2.0);
        let secs = rand::thread_rng().gen_range(1.0..cap);
        Duration::from_secs_f64(secs)
    }

    /// 拼接 system 消息并校验
    fn prepare_messages(
        messages: &[Message],
        system_msgs: Option<&[Message]>,
    ) -> Result<Vec<Message>, AgentError> {
        let mut all = Vec::new();
        if let Some(sys) = system_msgs {
            all.extend(sys.iter().cloned());
        }
        all.extend(messages.iter().cloned());
        validate_messages(&all)?;
        Ok(all)
    }

    fn to_api_messages(
        messages: &[Message],
    ) -> Result<Vec<ChatCompletionRequestMessage>, AgentError> {
        let mut out = Vec::with_capacity(messages.len());
        for m in messages {
            let content = m.content.clone().unwrap_or_default();
            let converted = match m.role {
                Role::System => ChatCompletionRequestMessage::System(
                    ChatCompletionRequestSystemMessageArgs::default()
                        .content(content)
                        .build()
                        .map_err(|e| AgentError::LlmError(e.to_string()))?,
                ),
                Role::User => ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(content)
                        .build()
                        .map_err(|e| AgentError::LlmError(e.to_string()))?,
                ),
                Role::Assistant => {
                    let mut builder = ChatCompletionRequestAssistantMessageArgs::default();
                    builder.content(content);
                    if let Some(calls) = &m.tool_calls {
                        // 我们的 ToolCall 序列化即带 "type":"function" 标签的线格式
                        let api_calls: Vec<ChatCompletionMessageToolCalls> =
                            serde_json::to_value(calls)
                                .and_then(serde_json::from_value)
                                .map_err(|e| AgentError::LlmError(e.to_string()))?;
                        builder.tool_calls(api_calls);
                    }
                    ChatCompletionRequestMessage::Assistant(
                        builder
                            .build()
                            .map_err(|e| AgentError::LlmError(e.to_string()))?,
                    )
                }
                Role::Tool => ChatCompletionRequestMessage::Tool(
                    ChatCompletionRequestToolMessageArgs::default()
                        .content(content)
                        .tool_call_id(m.tool_call_id.clone().unwrap_or_default())
                        .build()
                        .map_err(|e| AgentError::LlmError(e.to_string()))?,
                ),
            };
            out.push(converted);
        }
        Ok(out)
    }

    async fn ask_once(&self, messages: &[Message], stream: bool) -> Result<String, AgentError> {
        let api_messages = Self::to_api_messages(messages)?;
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(api_messages)
            .max_tokens(self.max_tokens)
            .temperature(self.temperature)
            .stream(stream)
            .build()
            .map_err(|e| AgentError::LlmError(e.to_string()))?;

        if stream {
            let mut response = self
                .client
                .chat()
                .create_stream(request)
                .await
                .map_err(|e| AgentError::LlmError(e.to_string()))?;
            let mut collected = String::new();
            while let Some(chunk) = response.next().await {
                let chunk = chunk.map_err(|e| AgentError::LlmError(e.to_string()))?;
                if let Some(delta) = chunk.choices.first().and_then(|c| c.delta.content.as_deref())
                {
                    collected.push_str(delta);
                }
            }
            let collected = collected.trim().to_string();
            if collected.is_empty() {
                return Err(AgentError::EmptyResponse);
            }
            return Ok(collected);
        }

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| AgentError::LlmError(e.to_string()))?;

        if let Some(usage) = &response.usage {
            self.budget.add(usage.prompt_tokens as u64);
        }

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();
        if content.is_empty() {
            return Err(AgentError::EmptyResponse);
        }
        Ok(content)
    }

    async fn ask_with_tools_once(
        &self,
        messages: &[Message],
        tools: &[serde_json::Value],
        tool_choice: ToolChoice,
    ) -> Result<LlmResponse, AgentError> {
        let api_messages = Self::to_api_messages(messages)?;
        let api_tools: Vec<ChatCompletionTools> = tools
            .iter()
            .map(|t| {
                serde_json::from_value(t.clone())
                    .map_err(|e| AgentError::LlmError(format!("invalid tool schema: {e}")))
            })
            .collect::<Result<_, _>>()?;
        let api_choice = ChatCompletionToolChoiceOption::Mode(match tool_choice {
            ToolChoice::None => ToolChoiceOptions::None,
            ToolChoice::Auto => ToolChoiceOptions::Auto,
            ToolChoice::Required => ToolChoiceOptions::Required,
        });

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(api_messages)
            .max_tokens(self.max_tokens)
            .temperature(self.temperature)
            .tools(api_tools)
            .tool_choice(api_choice)
            .build()
            .map_err(|e| AgentError::LlmError(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| AgentError::LlmError(e.to_string()))?;

        let Some(choice) = response.choices.first() else {
            return Err(AgentError::EmptyResponse);
        };

        if let Some(usage) = &response.usage {
            self.budget.add(usage.prompt_tokens as u64);
        }

        // 响应侧调用与我们的 ToolCall 同为 OpenAI 线格式，经 serde 转换
        let tool_calls: Vec<ToolCall> = match &choice.message.tool_calls {
            Some(calls) => serde_json::to_value(calls)
                .and_then(serde_json::from_value)
                .map_err(|e| AgentError::LlmError(e.to_string()))?,
            None => Vec::new(),
        };

        Ok(LlmResponse {
            content: choice.message.content.clone().filter(|c| !c.is_empty()),
            tool_calls,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn ask(
        &self,
        messages: &[Message],
        system_msgs: Option<&[Message]>,
        stream: bool,
    ) -> Result<String, AgentError> {
        let all = Self::prepare_messages(messages, system_msgs)?;
        let input_tokens = estimate_message_tokens(&all);
        self.budget.check(input_tokens)?;
        if stream {
            // 流式响应拿不到 usage，请求前记入估算值
            self.budget.add(input_tokens);
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.ask_once(&all, stream).await {
                Ok(content) => return Ok(content),
                Err(e) if e.is_retryable() && attempt < MAX_RETRIES => {
                    let wait = Self::backoff_delay(attempt);
                    tracing::warn!(attempt, error = %e, "transient LLM error, retrying");
                    tokio::time::sleep(wait).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn ask_with_tools(
        &self,
        messages: &[Message],
        system_msgs: Option<&[Message]>,
        tools: &[serde_json::Value],
        tool_choice: ToolChoice,
    ) -> Result<LlmResponse, AgentError> {
        for tool in tools {
            if tool.get("type").is_none() {
                return Err(AgentError::InvalidMessage(
                    "each tool must carry a 'type' field".to_string(),
                ));
            }
        }

        let all = Self::prepare_messages(messages, system_msgs)?;
        let mut input_tokens = estimate_message_tokens(&all);
        for tool in tools {
            input_tokens += estimate_tokens(&tool.to_string());
        }
        self.budget.check(input_tokens)?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.ask_with_tools_once(&all, tools, tool_choice).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < MAX_RETRIES => {
                    let wait = Self::backoff_delay(attempt);
                    tracing::warn!(attempt, error = %e, "transient LLM error, retrying");
                    tokio::time::sleep(wait).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn total_input_tokens(&self) -> u64 {
        self.budget.total()
    }
}
