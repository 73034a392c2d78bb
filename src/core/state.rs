//! Agent 执行状态
//!
//! IDLE -> RUNNING -> FINISHED / ERROR；ERROR 仅在失败的 run 作用域内短暂存在，
//! 退出作用域时恢复先前状态；步数耗尽时回到 IDLE。

use std::fmt;

use serde::{Deserialize, Serialize};

/// Agent 执行状态机
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AgentState {
    /// 空闲，可接受新的 run
    Idle,
    /// 主循环执行中
    Running,
    /// 终止工具触发或流程层判定完成
    Finished,
    /// 运行中步骤内发生未处理失败
    Error,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentState::Idle => "IDLE",
            AgentState::Running => "RUNNING",
            AgentState::Finished => "FINISHED",
            AgentState::Error => "ERROR",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_wire_values() {
        assert_eq!(AgentState::Idle.to_string(), "IDLE");
        assert_eq!(AgentState::Finished.to_string(), "FINISHED");
    }
}
