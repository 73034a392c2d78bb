//! 流程编排层

pub mod planning;

use std::sync::Arc;

use crate::agent::Agent;
use crate::llm::LlmClient;
pub use planning::PlanningFlow;

/// 支持的流程类型
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowType {
    Planning,
}

/// 流程工厂：按类型组装流程
pub struct FlowFactory;

impl FlowFactory {
    pub fn create_flow(
        flow_type: FlowType,
        llm: Arc<dyn LlmClient>,
        agents: Vec<(String, Box<dyn Agent>)>,
        executors: Vec<String>,
    ) -> PlanningFlow {
        match flow_type {
            FlowType::Planning => {
                let mut flow = PlanningFlow::new(llm);
                for (key, agent) in agents {
                    flow = flow.add_agent(key, agent);
                }
                flow.with_executors(executors)
            }
        }
    }
}
