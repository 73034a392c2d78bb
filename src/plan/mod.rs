//! 计划子系统：结构化计划、共享存储与规划工具

pub mod plan;
pub mod store;
pub mod tool;

pub use plan::{scan_active_step, Plan, StepStatus};
pub use store::PlanStore;
pub use tool::PlanningTool;
