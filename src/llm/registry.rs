//! 按配置档位索引的客户端注册表
//!
//! 进程内每个档位（profile）恰好一个客户端实例，懒构造并复用；注册表本身
//! 显式传递给需要客户端的组件，不做隐式全局可变状态。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::LlmSection;
use crate::llm::client::LlmClient;
use crate::llm::openai::OpenAiClient;

/// 默认档位键
pub const DEFAULT_PROFILE: &str = "default";

/// 档位 -> 客户端 的注册表
pub struct LlmRegistry {
    section: LlmSection,
    clients: Mutex<HashMap<String, Arc<dyn LlmClient>>>,
}

impl LlmRegistry {
    pub fn new(section: LlmSection) -> Self {
        Self {
            section,
            clients: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<dyn LlmClient>>> {
        // 与 PlanStore 同策略：锁内不做 IO，poisoned 直接恢复
        match self.clients.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// 取指定档位的客户端，首次访问时按档位配置构造
    pub fn get(&self, profile: &str) -> Arc<dyn LlmClient> {
        let mut clients = self.lock();
        clients
            .entry(profile.to_string())
            .or_insert_with(|| {
                let settings = self.section.resolve(profile);
                tracing::debug!(profile, model = %settings.model, "constructing LLM client");
                Arc::new(OpenAiClient::new(&settings))
            })
            .clone()
    }

    pub fn default_client(&self) -> Arc<dyn LlmClient> {
        self.get(DEFAULT_PROFILE)
    }

    /// 注入现成客户端（测试时替换为 Mock）
    pub fn insert(&self, profile: &str, client: Arc<dyn LlmClient>) {
        self.lock().insert(profile.to_string(), client);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    #[test]
    fn test_same_profile_reuses_instance() {
        let registry = LlmRegistry::new(LlmSection::default());
        let a = registry.get("default");
        let b = registry.get("default");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_insert_overrides_profile() {
        let registry = LlmRegistry::new(LlmSection::default());
        let mock: Arc<dyn crate::llm::LlmClient> = Arc::new(MockLlmClient::new());
        registry.insert("default", mock.clone());
        let got = registry.default_client();
        assert!(Arc::ptr_eq(&mock, &got));
    }
}
