//! 计划存储
//!
//! 进程内共享的计划表：按 ID 存放计划与一个活跃计划指针。克隆句柄共享同一
//! 份状态，规划工具与流程编排都经由它读写。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::core::AgentError;
use crate::plan::plan::{Plan, StepStatus};

#[derive(Default)]
struct Inner {
    plans: HashMap<String, Plan>,
    active: Option<String>,
}

/// 计划存储句柄（Clone 共享）
#[derive(Clone, Default)]
pub struct PlanStore {
    inner: Arc<Mutex<Inner>>,
}

impl PlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn plan_err(msg: impl Into<String>) -> AgentError {
        AgentError::PlanError(msg.into())
    }

    /// 新建计划并设为活跃；重复 ID 报错
    pub fn create(
        &self,
        id: &str,
        title: &str,
        steps: Vec<String>,
    ) -> Result<String, AgentError> {
        let mut inner = self.lock();
        if inner.plans.contains_key(id) {
            return Err(Self::plan_err(format!(
                "A plan with ID '{id}' already exists. Use 'update' to modify existing plans."
            )));
        }
        let plan = Plan::new(id, title, steps);
        let rendered = plan.render();
        inner.plans.insert(id.to_string(), plan);
        inner.active = Some(id.to_string());
        Ok(format!("Plan created successfully with ID: {id}\n\n{rendered}"))
    }

    /// 更新标题或步骤；未变位置的步骤状态保留
    pub fn update(
        &self,
        id: &str,
        title: Option<&str>,
        steps: Option<Vec<String>>,
    ) -> Result<String, AgentError> {
        let mut inner = self.lock();
        let plan = inner
            .plans
            .get_mut(id)
            .ok_or_else(|| Self::plan_err(format!("No plan found with ID: {id}")))?;
        if let Some(title) = title {
            plan.title = title.to_string();
        }
        if let Some(steps) = steps {
            plan.set_steps(steps);
        }
        Ok(format!("Plan updated successfully: {id}\n\n{}", plan.render()))
    }

    /// 所有计划的一行摘要，活跃者标注 (active)
    pub fn list(&self) -> String {
        let inner = self.lock();
        if inner.plans.is_empty() {
            return "No plans available. Create a plan with the 'create' command.".to_string();
        }
        let mut out = String::from("Available plans:\n");
        for (id, plan) in &inner.plans {
            let marker = if inner.active.as_deref() == Some(id) {
                " (active)"
            } else {
                ""
            };
            let (completed, total, _) = plan.progress();
            out.push_str(&format!(
                "• {id}{marker}: {} - {completed}/{total} steps completed\n",
                plan.title
            ));
        }
        out
    }

    /// 渲染指定计划；id 为 None 时取活跃计划
    pub fn render(&self, id: Option<&str>) -> Result<String, AgentError> {
        let inner = self.lock();
        let id = match id {
            Some(id) => id.to_string(),
            None => inner.active.clone().ok_or_else(|| {
                Self::plan_err("No active plan. Please specify a plan_id or set an active plan.")
            })?,
        };
        inner
            .plans
            .get(&id)
            .map(|p| p.render())
            .ok_or_else(|| Self::plan_err(format!("No plan found with ID: {id}")))
    }

    /// 指定计划的结构化快照
    pub fn get(&self, id: Option<&str>) -> Result<Plan, AgentError> {
        let inner = self.lock();
        let id = match id {
            Some(id) => id.to_string(),
            None => inner.active.clone().ok_or_else(|| {
                Self::plan_err("No active plan. Please specify a plan_id or set an active plan.")
            })?,
        };
        inner
            .plans
            .get(&id)
            .cloned()
            .ok_or_else(|| Self::plan_err(format!("No plan found with ID: {id}")))
    }

    pub fn set_active(&self, id: &str) -> Result<String, AgentError> {
        let mut inner = self.lock();
        if !inner.plans.contains_key(id) {
            return Err(Self::plan_err(format!("No plan found with ID: {id}")));
        }
        inner.active = Some(id.to_string());
        let rendered = inner.plans[id].render();
        Ok(format!("Plan '{id}' is now the active plan.\n\n{rendered}"))
    }

    /// 标记单步状态与备注；id 为 None 时作用于活跃计划
    pub fn mark_step(
        &self,
        id: Option<&str>,
        step_index: usize,
        status: Option<StepStatus>,
        note: Option<String>,
    ) -> Result<String, AgentError> {
        let mut inner = self.lock();
        let id = match id {
            Some(id) => id.to_string(),
            None => inner.active.clone().ok_or_else(|| {
                Self::plan_err("No active plan. Please specify a plan_id or set an active plan.")
            })?,
        };
        let plan = inner
            .plans
            .get_mut(&id)
            .ok_or_else(|| Self::plan_err(format!("No plan found with ID: {id}")))?;
        plan.mark_step(step_index, status, note)
            .map_err(Self::plan_err)?;
        Ok(format!(
            "Step {step_index} updated in plan '{id}'.\n\n{}",
            plan.render()
        ))
    }

    pub fn delete(&self, id: &str) -> Result<String, AgentError> {
        let mut inner = self.lock();
        if inner.plans.remove(id).is_none() {
            return Err(Self::plan_err(format!("No plan found with ID: {id}")));
        }
        if inner.active.as_deref() == Some(id) {
            inner.active = None;
        }
        Ok(format!("Plan '{id}' has been deleted."))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().plans.contains_key(id)
    }

    pub fn active_id(&self) -> Option<String> {
        self.lock().active.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // 锁内不做 IO，poisoned 只会来自持锁 panic，此处直接恢复
        match self.inner.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
