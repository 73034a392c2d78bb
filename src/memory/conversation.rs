//! 对话记忆
//!
//! 有序有界的消息日志，是传给推理后端的唯一状态。超出上限时按 FIFO 淘汰最旧
//! 消息并保持顺序；淘汰通过计数器可观测。由单个 Agent 独占，不跨 Agent 共享。

use crate::memory::Message;

/// 默认消息上限
pub const DEFAULT_MAX_MESSAGES: usize = 100;

/// 有界对话记忆：append-only + FIFO 淘汰
#[derive(Clone, Debug)]
pub struct Memory {
    messages: Vec<Message>,
    max_messages: usize,
    evicted: u64,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGES)
    }
}

impl Memory {
    pub fn new(max_messages: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_messages,
            evicted: 0,
        }
    }

    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
        self.prune();
    }

    pub fn add_messages(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.extend(messages);
        self.prune();
    }

    /// 超出上限时丢弃最旧的消息
    fn prune(&mut self) {
        if self.messages.len() > self.max_messages {
            let drop = self.messages.len() - self.max_messages;
            self.messages.drain(..drop);
            self.evicted += drop as u64;
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// 最近 n 条消息
    pub fn recent(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// 累计被 FIFO 淘汰的消息条数
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_eviction_preserves_order() {
        let mut memory = Memory::new(3);
        for i in 0..5 {
            memory.add_message(Message::user(format!("m{i}")));
        }
        assert_eq!(memory.len(), 3);
        assert_eq!(memory.evicted(), 2);
        let contents: Vec<_> = memory
            .messages()
            .iter()
            .map(|m| m.content.clone().unwrap())
            .collect();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn test_no_eviction_under_cap() {
        let mut memory = Memory::default();
        memory.add_messages([Message::user("a"), Message::assistant("b")]);
        assert_eq!(memory.len(), 2);
        assert_eq!(memory.evicted(), 0);
    }

    #[test]
    fn test_recent_returns_tail() {
        let mut memory = Memory::new(10);
        for i in 0..4 {
            memory.add_message(Message::user(format!("m{i}")));
        }
        let recent = memory.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content.as_deref(), Some("m2"));
    }
}
