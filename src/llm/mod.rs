//! LLM 客户端抽象与实现（OpenAI 兼容 / Mock）及按档位的注册表

pub mod client;
pub mod mock;
pub mod openai;
pub mod registry;

pub use client::{
    estimate_message_tokens, estimate_tokens, validate_messages, LlmClient, LlmResponse,
    TokenBudget,
};
pub use mock::MockLlmClient;
pub use openai::OpenAiClient;
pub use registry::{LlmRegistry, DEFAULT_PROFILE};
